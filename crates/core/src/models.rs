use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use storage::{PlaybackState, VideoRecord};

/// Extensions recognised as video files when no configuration overrides them.
pub const VIDEO_EXTENSIONS: [&str; 8] = ["mp4", "avi", "mkv", "mov", "flv", "wmv", "webm", "m4v"];

/// Playback rates offered to the user.
pub const SPEED_PRESETS: [f64; 7] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0, 3.0];

/// What a front end renders for one video: its path and sorted tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoEntry {
    pub path: PathBuf,
    pub tags: Vec<String>,
}
