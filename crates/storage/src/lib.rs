//! Storage layer: JSON documents under one save directory.
//!
//! Each collection lives in its own file and is saved independently. Loads
//! never fail: a missing or unreadable file yields an empty collection and a
//! log line. Saves write to a temp file in the same directory and rename it
//! over the target, so readers never observe a partial document.

mod documents;
mod json;

pub use documents::{PlaybackState, VideoRecord};

use documents::{FolderListDoc, VocabularyDoc};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const FOLDERS_FILE: &str = "folders.json";
pub const VIDEO_TAGS_FILE: &str = "video_tags.json";
pub const VOCABULARY_FILE: &str = "tag_vocabulary.json";
pub const PLAYBACK_FILE: &str = "playback_state.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },
    #[error("failed to write {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },
}

impl StorageError {
    pub(crate) fn read(path: &Path, reason: impl Display) -> Self {
        StorageError::Read {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: &Path, reason: impl Display) -> Self {
        StorageError::Write {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Handle to the save directory. Constructed once at startup and passed by
/// reference to everything that persists state.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %e, "could not create save directory");
        }
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn load_folders(&self) -> Vec<String> {
        self.load_value(FOLDERS_FILE, "folder list")
            .map(documents::folders_from_value)
            .unwrap_or_default()
    }

    pub fn save_folders(&self, folders: &[String]) -> Result<(), StorageError> {
        json::write_json(&self.file(FOLDERS_FILE), &FolderListDoc { folders })?;
        debug!(count = folders.len(), "saved folder list");
        Ok(())
    }

    pub fn load_video_records(&self) -> BTreeMap<String, VideoRecord> {
        self.load_value(VIDEO_TAGS_FILE, "video tags")
            .map(documents::records_from_value)
            .unwrap_or_default()
    }

    pub fn save_video_records(
        &self,
        records: &BTreeMap<String, VideoRecord>,
    ) -> Result<(), StorageError> {
        json::write_json(&self.file(VIDEO_TAGS_FILE), records)?;
        debug!(count = records.len(), "saved video tags");
        Ok(())
    }

    pub fn load_vocabulary(&self) -> BTreeSet<String> {
        self.load_value(VOCABULARY_FILE, "tag vocabulary")
            .map(documents::vocabulary_from_value)
            .unwrap_or_default()
    }

    pub fn save_vocabulary(&self, tags: &BTreeSet<String>) -> Result<(), StorageError> {
        json::write_json(&self.file(VOCABULARY_FILE), &VocabularyDoc { tags })?;
        debug!(count = tags.len(), "saved tag vocabulary");
        Ok(())
    }

    /// Saves vocabulary and video records together. Both documents are fully
    /// written to temp files before either target is replaced, so a
    /// serialization or disk-full failure leaves both files untouched.
    pub fn save_vocabulary_and_records(
        &self,
        tags: &BTreeSet<String>,
        records: &BTreeMap<String, VideoRecord>,
    ) -> Result<(), StorageError> {
        let vocabulary = json::stage_json(&self.file(VOCABULARY_FILE), &VocabularyDoc { tags })?;
        let videos = json::stage_json(&self.file(VIDEO_TAGS_FILE), records)?;
        videos.commit()?;
        vocabulary.commit()?;
        debug!(
            tags = tags.len(),
            videos = records.len(),
            "saved tag vocabulary and video tags"
        );
        Ok(())
    }

    pub fn load_playback_states(&self) -> BTreeMap<String, PlaybackState> {
        self.load_value(PLAYBACK_FILE, "playback state")
            .map(documents::playback_from_value)
            .unwrap_or_default()
    }

    pub fn save_playback_states(
        &self,
        states: &BTreeMap<String, PlaybackState>,
    ) -> Result<(), StorageError> {
        json::write_json(&self.file(PLAYBACK_FILE), states)?;
        debug!(count = states.len(), "saved playback state");
        Ok(())
    }

    fn load_value(&self, name: &str, what: &str) -> Option<Value> {
        let path = self.file(name);
        match json::read_json(&path) {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                debug!(file = %path.display(), "no saved {}, starting empty", what);
                None
            }
            Err(err) => {
                warn!(error = %err, "{} unreadable, starting empty", what);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_load_empty() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::new(temp.path().join("save"));
        assert!(store.dir().is_dir());
        assert!(store.load_folders().is_empty());
        assert!(store.load_video_records().is_empty());
        assert!(store.load_vocabulary().is_empty());
        assert!(store.load_playback_states().is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::new(temp.path());
        fs::write(store.file(VOCABULARY_FILE), "{ \"tags\": [\"a\", ").unwrap();
        fs::write(store.file(VIDEO_TAGS_FILE), "not json at all").unwrap();
        assert!(store.load_vocabulary().is_empty());
        assert!(store.load_video_records().is_empty());
    }

    #[test]
    fn records_file_has_expected_shape() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::new(temp.path());
        let mut records = BTreeMap::new();
        records.insert(
            "/movies/a.mp4".to_string(),
            VideoRecord {
                tags: ["Comedy".to_string()].into_iter().collect(),
            },
        );
        store.save_video_records(&records).unwrap();

        let raw = fs::read_to_string(store.file(VIDEO_TAGS_FILE)).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"/movies/a.mp4": {"tags": ["Comedy"]}})
        );
        assert!(raw.contains('\n'), "document should be pretty-printed");
    }

    #[test]
    fn save_leaves_no_temp_files_behind() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::new(temp.path());
        let tags: BTreeSet<String> = ["b", "a"].iter().map(|s| s.to_string()).collect();
        store.save_vocabulary(&tags).unwrap();
        store
            .save_vocabulary_and_records(&tags, &BTreeMap::new())
            .unwrap();
        store.save_folders(&["/x".to_string()]).unwrap();

        let mut names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![FOLDERS_FILE, VOCABULARY_FILE, VIDEO_TAGS_FILE]);
        assert_eq!(
            store.load_vocabulary().into_iter().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store {
            dir: temp.path().join("does/not/exist"),
        };
        let err = store.save_folders(&[]).unwrap_err();
        assert!(matches!(err, StorageError::Write { .. }));
    }

    #[test]
    fn playback_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::new(temp.path());
        let mut states = BTreeMap::new();
        states.insert(
            "/movies/a.mp4".to_string(),
            PlaybackState {
                path: "/movies/a.mp4".to_string(),
                time_ms: 45000,
                volume: 80,
                speed: 1.5,
                playing: false,
            },
        );
        store.save_playback_states(&states).unwrap();
        assert_eq!(store.load_playback_states(), states);
    }
}
