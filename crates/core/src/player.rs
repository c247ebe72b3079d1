//! Drives a [`MediaEngine`] for one video at a time.
//!
//! The session mirrors the volume, speed and play flags it last asked the
//! engine for, and captures them into the [`PlaybackTracker`] when a different
//! video is opened or the session is closed.

use crate::models::{PlaybackState, SPEED_PRESETS};
use crate::paths;
use crate::playback::PlaybackTracker;
use engine::{EngineError, EngineState, MediaEngine};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no video is loaded")]
    NothingLoaded,
    #[error("unsupported playback speed {0}")]
    UnsupportedSpeed(f64),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeDisplay {
    pub position_ms: u64,
    pub duration_ms: u64,
}

impl TimeDisplay {
    /// Fraction of the video already played, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        (self.position_ms as f64 / self.duration_ms as f64).clamp(0.0, 1.0)
    }
}

impl fmt::Display for TimeDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {}",
            format_time(self.position_ms),
            format_time(self.duration_ms)
        )
    }
}

/// `HH:MM:SS`. Hours are not wrapped.
pub fn format_time(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn note<T>(op: &str, result: Result<T, EngineError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(err) => {
            warn!(op, error = %err, "engine call failed");
            None
        }
    }
}

pub struct PlayerSession<E: MediaEngine> {
    engine: E,
    current: Option<PathBuf>,
    volume: u8,
    speed: f64,
    is_playing: bool,
    ended: bool,
    volume_before_mute: u8,
    /// Resume position waiting for the engine to report a duration.
    pending_seek: Option<u64>,
    last_display: Option<TimeDisplay>,
}

impl<E: MediaEngine> PlayerSession<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            current: None,
            volume: PlaybackState::DEFAULT_VOLUME,
            speed: PlaybackState::DEFAULT_SPEED,
            is_playing: false,
            ended: false,
            volume_before_mute: PlaybackState::DEFAULT_VOLUME,
            pending_seek: None,
            last_display: None,
        }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing && !self.ended
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn last_display(&self) -> Option<TimeDisplay> {
        self.last_display
    }

    /// Opens `video`, first recording the state of whatever was playing.
    /// The stored volume and speed are applied, playback starts, and the
    /// stored position is restored once the engine knows the duration.
    pub fn open(
        &mut self,
        video: &Path,
        tracker: &mut PlaybackTracker<'_>,
    ) -> Result<(), PlayerError> {
        if self.current.is_some() {
            self.capture_into(tracker);
        }
        let video = paths::normalize(video);
        let state = tracker.get_state(&video);

        self.current = None;
        self.last_display = None;
        self.pending_seek = None;
        self.engine.load(&video)?;

        note("set_rate", self.engine.set_rate(state.speed));
        note("set_volume", self.engine.set_volume(state.volume));
        note("play", self.engine.play());
        if !state.playing {
            note("pause", self.engine.pause());
        }

        info!(
            video = %video.display(),
            engine = self.engine.name(),
            resume_ms = state.time_ms,
            "opened video"
        );
        self.current = Some(video);
        self.volume = state.volume;
        self.speed = state.speed;
        self.is_playing = state.playing;
        self.ended = false;
        self.pending_seek = (state.time_ms > 0).then_some(state.time_ms);
        Ok(())
    }

    /// Records the current state and stops the engine.
    pub fn close(&mut self, tracker: &mut PlaybackTracker<'_>) {
        if self.current.is_none() {
            return;
        }
        self.capture_into(tracker);
        note("stop", self.engine.stop());
        if let Some(video) = self.current.take() {
            debug!(video = %video.display(), "closed video");
        }
        self.is_playing = false;
        self.ended = false;
        self.pending_seek = None;
        self.last_display = None;
    }

    /// Polls the engine. `None` while nothing is loaded or the engine does
    /// not know the duration yet.
    pub fn tick(&mut self) -> Option<TimeDisplay> {
        self.current.as_ref()?;
        let duration = match self.engine.duration() {
            Ok(d) if d > 0 => d,
            Ok(_) => return None,
            Err(err) => {
                debug!(error = %err, "duration unavailable");
                return None;
            }
        };
        if let Some(ms) = self.pending_seek.take() {
            if note("set_time", self.engine.set_time(ms.min(duration))).is_none() {
                self.pending_seek = Some(ms);
            }
        }

        match self.engine.state() {
            EngineState::Playing => {
                self.is_playing = true;
                self.ended = false;
            }
            EngineState::Paused => {
                self.is_playing = false;
                self.ended = false;
            }
            EngineState::Ended => self.ended = true,
            EngineState::Idle | EngineState::Opening | EngineState::Error => {}
        }

        let position = match self.engine.time() {
            Ok(t) => t.min(duration),
            Err(err) => {
                debug!(error = %err, "position unavailable");
                return None;
            }
        };
        let display = TimeDisplay {
            position_ms: position,
            duration_ms: duration,
        };
        self.last_display = Some(display);
        Some(display)
    }

    /// Snapshot for persistence. `None` when nothing is loaded or the engine
    /// has not reported a duration and there is no resume position pending.
    pub fn capture_state(&mut self) -> Option<PlaybackState> {
        let video = self.current.as_ref()?;
        let time_ms = match self.pending_seek {
            Some(ms) => ms,
            None => {
                let duration = self.engine.duration().unwrap_or(0);
                if duration == 0 {
                    return None;
                }
                self.engine.time().ok()?.min(duration)
            }
        };
        Some(PlaybackState {
            path: paths::key(video),
            time_ms,
            volume: self.volume,
            speed: self.speed,
            playing: self.is_playing && !self.ended,
        })
    }

    pub fn capture_into(&mut self, tracker: &mut PlaybackTracker<'_>) {
        if let Some(state) = self.capture_state() {
            tracker.record(state);
        }
    }

    /// Returns whether the video is now playing. An ended video restarts.
    pub fn toggle_play_pause(&mut self) -> Result<bool, PlayerError> {
        self.require_loaded()?;
        if self.ended {
            self.restart()?;
        } else if self.is_playing {
            self.engine.pause()?;
            self.is_playing = false;
        } else {
            self.engine.play()?;
            self.is_playing = true;
        }
        Ok(self.is_playing)
    }

    pub fn restart(&mut self) -> Result<(), PlayerError> {
        self.require_loaded()?;
        self.pending_seek = None;
        self.engine.set_time(0)?;
        self.engine.play()?;
        self.ended = false;
        self.is_playing = true;
        Ok(())
    }

    /// Seeks to `ms`, clamped to the duration. Returns the target position.
    pub fn seek_to(&mut self, ms: u64) -> Result<u64, PlayerError> {
        self.require_loaded()?;
        let duration = self.engine.duration().unwrap_or(0);
        if duration == 0 {
            self.pending_seek = Some(ms);
            return Ok(ms);
        }
        let target = ms.min(duration);
        self.pending_seek = None;
        self.engine.set_time(target)?;
        if target < duration {
            self.ended = false;
        }
        Ok(target)
    }

    pub fn seek_relative(&mut self, delta_ms: i64) -> Result<u64, PlayerError> {
        self.require_loaded()?;
        let position = match self.pending_seek {
            Some(ms) => ms,
            None => self.engine.time()?,
        };
        self.seek_to(position.saturating_add_signed(delta_ms))
    }

    /// Sets the volume, clamped to 0..=100, and returns the applied value.
    pub fn set_volume(&mut self, volume: u8) -> Result<u8, PlayerError> {
        let volume = volume.min(100);
        if self.current.is_some() {
            self.engine.set_volume(volume)?;
        }
        self.volume = volume;
        Ok(volume)
    }

    pub fn volume_step(&mut self, delta: i16) -> Result<u8, PlayerError> {
        let target = (i16::from(self.volume) + delta).clamp(0, 100) as u8;
        self.set_volume(target)
    }

    /// Mutes, or restores the volume that was active before muting.
    pub fn toggle_mute(&mut self) -> Result<u8, PlayerError> {
        if self.volume > 0 {
            self.volume_before_mute = self.volume;
            self.set_volume(0)
        } else {
            self.set_volume(self.volume_before_mute)
        }
    }

    pub fn set_speed(&mut self, speed: f64) -> Result<(), PlayerError> {
        if !SPEED_PRESETS.iter().any(|p| (p - speed).abs() < 1e-9) {
            return Err(PlayerError::UnsupportedSpeed(speed));
        }
        if self.current.is_some() {
            self.engine.set_rate(speed)?;
        }
        self.speed = speed;
        Ok(())
    }

    fn require_loaded(&self) -> Result<(), PlayerError> {
        match self.current {
            Some(_) => Ok(()),
            None => Err(PlayerError::NothingLoaded),
        }
    }

    #[cfg(test)]
    pub(crate) fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeEngine;
    use super::*;
    use storage::Store;

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(format_time(0), "00:00:00");
        assert_eq!(format_time(3_725_999), "01:02:05");
        let display = TimeDisplay {
            position_ms: 45_000,
            duration_ms: 100_000,
        };
        assert_eq!(display.to_string(), "00:00:45 / 00:01:40");
        assert!((display.progress() - 0.45).abs() < 1e-9);
    }

    #[test]
    fn open_restores_stored_state_once_ready() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::new(temp.path());
        let mut tracker = PlaybackTracker::load(&store);
        let video = Path::new("/movies/a.mp4");
        tracker.record_state(video, 45_000, 80, 1.5, false);

        let mut player = PlayerSession::new(FakeEngine::default());
        player.open(video, &mut tracker).unwrap();
        assert_eq!(player.engine_mut().volume, 80);
        assert_eq!(player.engine_mut().rate, 1.5);
        assert!(player.engine_mut().paused);
        assert!(!player.is_playing());

        assert_eq!(player.tick(), None);
        player.engine_mut().make_ready(100_000);
        let display = player.tick().unwrap();
        assert_eq!(display.position_ms, 45_000);
        assert_eq!(player.engine_mut().time, 45_000);
    }

    #[test]
    fn opening_another_video_records_the_first() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::new(temp.path());
        let mut tracker = PlaybackTracker::load(&store);
        let first = Path::new("/movies/a.mp4");
        let second = Path::new("/movies/b.mp4");

        let mut player = PlayerSession::new(FakeEngine::default());
        player.open(first, &mut tracker).unwrap();
        player.engine_mut().make_ready(60_000);
        player.tick();
        player.set_volume(40).unwrap();
        player.engine_mut().time = 12_000;

        player.open(second, &mut tracker).unwrap();
        let saved = tracker.get_state(first);
        assert_eq!((saved.time_ms, saved.volume, saved.playing), (12_000, 40, true));
        assert_eq!(player.current(), Some(second));
        assert_eq!(player.volume(), 100);
    }

    #[test]
    fn nothing_captured_before_engine_is_ready() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::new(temp.path());
        let mut tracker = PlaybackTracker::load(&store);
        let mut player = PlayerSession::new(FakeEngine::default());
        assert!(player.capture_state().is_none());

        player.open(Path::new("/movies/a.mp4"), &mut tracker).unwrap();
        assert!(player.capture_state().is_none());
        player.close(&mut tracker);
        assert!(tracker.states().is_empty());
        assert_eq!(player.engine_mut().stops, 1);
    }

    #[test]
    fn seek_relative_clamps_to_bounds() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::new(temp.path());
        let mut tracker = PlaybackTracker::load(&store);
        let mut player = PlayerSession::new(FakeEngine::default());
        player.open(Path::new("/movies/a.mp4"), &mut tracker).unwrap();
        player.engine_mut().make_ready(10_000);
        player.engine_mut().time = 8_000;

        assert_eq!(player.seek_relative(5_000).unwrap(), 10_000);
        assert_eq!(player.seek_relative(-20_000).unwrap(), 0);
        assert_eq!(player.engine_mut().time, 0);
    }

    #[test]
    fn mute_restores_previous_volume() {
        let mut player = PlayerSession::new(FakeEngine::default());
        player.set_volume(70).unwrap();
        assert_eq!(player.toggle_mute().unwrap(), 0);
        assert_eq!(player.toggle_mute().unwrap(), 70);
        assert_eq!(player.volume_step(50).unwrap(), 100);
        assert_eq!(player.volume_step(-120).unwrap(), 0);
        assert_eq!(player.set_volume(200).unwrap(), 100);
    }

    #[test]
    fn only_preset_speeds_are_accepted() {
        let mut player = PlayerSession::new(FakeEngine::default());
        assert!(matches!(
            player.set_speed(1.1),
            Err(PlayerError::UnsupportedSpeed(_))
        ));
        player.set_speed(2.0).unwrap();
        assert_eq!(player.speed(), 2.0);
    }

    #[test]
    fn controls_need_a_loaded_video() {
        let mut player = PlayerSession::new(FakeEngine::default());
        assert!(matches!(
            player.toggle_play_pause(),
            Err(PlayerError::NothingLoaded)
        ));
        assert!(matches!(player.seek_to(10), Err(PlayerError::NothingLoaded)));
    }

    #[test]
    fn paused_after_end_resumes_in_place() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::new(temp.path());
        let mut tracker = PlaybackTracker::load(&store);
        let mut player = PlayerSession::new(FakeEngine::default());
        player.open(Path::new("/movies/a.mp4"), &mut tracker).unwrap();
        player.engine_mut().make_ready(5_000);
        player.engine_mut().time = 5_000;
        player.engine_mut().state = Some(EngineState::Ended);
        player.tick();
        assert!(player.is_ended());

        // Seeking back in the player window leaves it paused mid-file.
        player.engine_mut().time = 1_000;
        player.engine_mut().state = Some(EngineState::Paused);
        player.tick();
        assert!(!player.is_ended());

        assert!(player.toggle_play_pause().unwrap());
        assert_eq!(player.engine_mut().time, 1_000);
        assert!(!player.engine_mut().paused);
    }

    #[test]
    fn toggle_after_end_restarts() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::new(temp.path());
        let mut tracker = PlaybackTracker::load(&store);
        let mut player = PlayerSession::new(FakeEngine::default());
        player.open(Path::new("/movies/a.mp4"), &mut tracker).unwrap();
        player.engine_mut().make_ready(5_000);
        player.engine_mut().time = 5_000;
        player.engine_mut().state = Some(EngineState::Ended);
        player.tick();
        assert!(player.is_ended());
        assert!(!player.is_playing());

        assert!(player.toggle_play_pause().unwrap());
        assert!(!player.is_ended());
        assert_eq!(player.engine_mut().time, 0);
    }
}
