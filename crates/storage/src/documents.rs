//! On-disk document shapes and the validation applied when loading them.
//!
//! Loading goes through `serde_json::Value` first so that one malformed entry
//! is dropped on its own instead of discarding the whole collection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Tag assignment for one video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// Last known playback position and settings for a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub path: String,
    pub time_ms: u64,
    pub volume: u8,
    pub speed: f64,
    pub playing: bool,
}

impl PlaybackState {
    pub const DEFAULT_VOLUME: u8 = 100;
    pub const DEFAULT_SPEED: f64 = 1.0;

    /// State used for a video that has never been played.
    pub fn fresh(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            time_ms: 0,
            volume: Self::DEFAULT_VOLUME,
            speed: Self::DEFAULT_SPEED,
            playing: true,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct FolderListDoc<'a> {
    pub folders: &'a [String],
}

#[derive(Serialize)]
pub(crate) struct VocabularyDoc<'a> {
    pub tags: &'a BTreeSet<String>,
}

#[derive(Deserialize)]
struct RawPlaybackState {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    time_ms: i64,
    #[serde(default = "default_volume")]
    volume: i64,
    #[serde(default = "default_speed")]
    speed: f64,
    #[serde(default = "default_playing")]
    playing: bool,
}

fn default_volume() -> i64 {
    PlaybackState::DEFAULT_VOLUME as i64
}

fn default_speed() -> f64 {
    PlaybackState::DEFAULT_SPEED
}

fn default_playing() -> bool {
    true
}

impl RawPlaybackState {
    fn validate(self, key: &str) -> Option<PlaybackState> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return None;
        }
        Some(PlaybackState {
            path: self.path.unwrap_or_else(|| key.to_string()),
            time_ms: self.time_ms.max(0) as u64,
            volume: self.volume.clamp(0, 100) as u8,
            speed: self.speed,
            playing: self.playing,
        })
    }
}

fn string_list(value: &Value, field: &str, what: &str) -> Vec<String> {
    let Some(items) = value.get(field).and_then(Value::as_array) else {
        warn!("{} has no \"{}\" array, treating as empty", what, field);
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                warn!(entry = %item, "dropping non-string entry from {}", what);
                None
            }
        })
        .collect()
}

pub(crate) fn folders_from_value(value: Value) -> Vec<String> {
    string_list(&value, "folders", "folder list")
}

pub(crate) fn vocabulary_from_value(value: Value) -> BTreeSet<String> {
    string_list(&value, "tags", "tag vocabulary")
        .into_iter()
        .collect()
}

pub(crate) fn records_from_value(value: Value) -> BTreeMap<String, VideoRecord> {
    let Value::Object(map) = value else {
        warn!("video tag file is not a JSON object, treating as empty");
        return BTreeMap::new();
    };
    let mut records = BTreeMap::new();
    for (path, entry) in map {
        match serde_json::from_value::<VideoRecord>(entry) {
            Ok(record) => {
                records.insert(path, record);
            }
            Err(err) => warn!(video = %path, error = %err, "dropping malformed video record"),
        }
    }
    records
}

pub(crate) fn playback_from_value(value: Value) -> BTreeMap<String, PlaybackState> {
    let Value::Object(map) = value else {
        warn!("playback state file is not a JSON object, treating as empty");
        return BTreeMap::new();
    };
    let mut states = BTreeMap::new();
    for (path, entry) in map {
        let state = serde_json::from_value::<RawPlaybackState>(entry)
            .ok()
            .and_then(|raw| raw.validate(&path));
        match state {
            Some(state) => {
                states.insert(path, state);
            }
            None => warn!(video = %path, "dropping malformed playback state"),
        }
    }
    states
}
