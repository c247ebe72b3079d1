//! Last-known playback state per video, restored when the video is reopened.

use crate::models::PlaybackState;
use crate::paths;
use std::collections::BTreeMap;
use std::path::Path;
use storage::Store;
use tracing::{debug, error, warn};

pub struct PlaybackTracker<'s> {
    store: &'s Store,
    states: BTreeMap<String, PlaybackState>,
    dirty: bool,
}

impl<'s> PlaybackTracker<'s> {
    pub fn load(store: &'s Store) -> Self {
        Self {
            store,
            states: store.load_playback_states(),
            dirty: false,
        }
    }

    /// Upserts the state for `video` and persists the whole map.
    pub fn record_state(
        &mut self,
        video: &Path,
        elapsed_ms: u64,
        volume: u8,
        speed: f64,
        playing: bool,
    ) {
        let speed = if speed.is_finite() && speed > 0.0 {
            speed
        } else {
            warn!(speed, "invalid playback speed, storing default");
            PlaybackState::DEFAULT_SPEED
        };
        self.record(PlaybackState {
            path: paths::record_key(video),
            time_ms: elapsed_ms,
            volume: volume.min(100),
            speed,
            playing,
        });
    }

    pub fn record(&mut self, state: PlaybackState) {
        debug!(
            video = %state.path,
            time_ms = state.time_ms,
            volume = state.volume,
            speed = state.speed,
            playing = state.playing,
            "recording playback state"
        );
        self.states.insert(state.path.clone(), state);
        self.dirty = true;
        self.persist();
    }

    /// Stored state, or the defaults for a video never played before.
    pub fn get_state(&self, video: &Path) -> PlaybackState {
        let key = paths::record_key(video);
        self.states
            .get(&key)
            .cloned()
            .unwrap_or_else(|| PlaybackState::fresh(key))
    }

    pub fn states(&self) -> &BTreeMap<String, PlaybackState> {
        &self.states
    }

    pub fn is_durable(&self) -> bool {
        !self.dirty
    }

    pub fn flush(&mut self) -> bool {
        if self.dirty {
            self.persist();
        }
        !self.dirty
    }

    fn persist(&mut self) {
        match self.store.save_playback_states(&self.states) {
            Ok(()) => self.dirty = false,
            Err(err) => error!(error = %err, "playback state kept in memory only"),
        }
    }
}
