//! Tag vocabulary and per-video tag assignments.
//!
//! Every mutation is written through to the store before returning. A failed
//! save is logged and the affected collection stays dirty; the in-memory state
//! remains authoritative and the next save (or [`TagManager::flush`]) retries.

use crate::models::{VideoEntry, VideoRecord};
use crate::paths;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use storage::Store;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("tag '{0}' already exists")]
    Duplicate(String),
    #[error("tag name is empty")]
    Empty,
}

pub struct TagManager<'s> {
    store: &'s Store,
    vocabulary: BTreeSet<String>,
    records: BTreeMap<String, VideoRecord>,
    vocabulary_dirty: bool,
    records_dirty: bool,
}

fn clean(tag: &str) -> Result<String, TagError> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(TagError::Empty);
    }
    Ok(tag.to_string())
}

impl<'s> TagManager<'s> {
    /// Loads vocabulary and records. Tags found on videos but missing from the
    /// vocabulary are merged into it.
    pub fn load(store: &'s Store) -> Self {
        let records = store.load_video_records();
        let mut vocabulary = store.load_vocabulary();
        let mut merged = 0usize;
        for record in records.values() {
            for tag in &record.tags {
                if vocabulary.insert(tag.clone()) {
                    merged += 1;
                }
            }
        }
        if merged > 0 {
            info!(merged, "added tags used on videos to the vocabulary");
        }
        Self {
            store,
            vocabulary,
            records,
            vocabulary_dirty: merged > 0,
            records_dirty: false,
        }
    }

    /// All known tags, in display order.
    pub fn vocabulary(&self) -> &BTreeSet<String> {
        &self.vocabulary
    }

    pub fn records(&self) -> &BTreeMap<String, VideoRecord> {
        &self.records
    }

    pub fn tags_for(&self, video: &Path) -> Vec<String> {
        self.records
            .get(&paths::record_key(video))
            .map(|r| r.tags.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn entry(&self, video: &Path) -> VideoEntry {
        let path = paths::normalize(video);
        VideoEntry {
            tags: self.tags_for(&path),
            path,
        }
    }

    /// Union of the tags carried by `videos`.
    pub fn tags_in_selection<P: AsRef<Path>>(&self, videos: &[P]) -> BTreeSet<String> {
        videos
            .iter()
            .filter_map(|v| self.records.get(&paths::record_key(v.as_ref())))
            .flat_map(|r| r.tags.iter().cloned())
            .collect()
    }

    pub fn add_tag(&mut self, video: &Path, tag: &str) -> Result<(), TagError> {
        let tag = clean(tag)?;
        self.records
            .entry(paths::record_key(video))
            .or_default()
            .tags
            .insert(tag.clone());
        let new_in_vocabulary = self.vocabulary.insert(tag);
        self.persist(new_in_vocabulary, true);
        Ok(())
    }

    /// Returns whether the video carried the tag.
    pub fn remove_tag(&mut self, video: &Path, tag: &str) -> bool {
        let tag = tag.trim();
        let removed = self
            .records
            .get_mut(&paths::record_key(video))
            .map(|r| r.tags.remove(tag))
            .unwrap_or(false);
        self.persist(false, true);
        removed
    }

    pub fn add_global_tag(&mut self, tag: &str) -> Result<(), TagError> {
        let tag = clean(tag)?;
        if self.vocabulary.contains(&tag) {
            return Err(TagError::Duplicate(tag));
        }
        info!(%tag, "added tag");
        self.vocabulary.insert(tag);
        self.persist(true, false);
        Ok(())
    }

    /// Renames `old` to `new` in the vocabulary and on every video. Returns
    /// the number of videos that were retagged.
    pub fn rename_global_tag(&mut self, old: &str, new: &str) -> Result<usize, TagError> {
        let new = clean(new)?;
        let old = old.trim();
        if new == old {
            return Ok(0);
        }
        if self.vocabulary.contains(&new) {
            return Err(TagError::Duplicate(new));
        }

        self.vocabulary.remove(old);
        self.vocabulary.insert(new.clone());
        let mut retagged = 0;
        for record in self.records.values_mut() {
            if record.tags.remove(old) {
                record.tags.insert(new.clone());
                retagged += 1;
            }
        }
        info!(old, new = %new, retagged, "renamed tag");
        self.persist(true, true);
        Ok(retagged)
    }

    /// Removes `tag` from the vocabulary and from every video. Returns the
    /// number of videos that carried it.
    pub fn delete_global_tag(&mut self, tag: &str) -> usize {
        let tag = tag.trim();
        self.vocabulary.remove(tag);
        let mut affected = 0;
        for record in self.records.values_mut() {
            if record.tags.remove(tag) {
                affected += 1;
            }
        }
        info!(tag, affected, "deleted tag");
        self.persist(true, true);
        affected
    }

    /// Keeps the videos whose tags include every tag in `required`, in their
    /// original order. An empty `required` keeps everything.
    pub fn filter_by_subset<P: AsRef<Path> + Clone>(
        &self,
        videos: &[P],
        required: &BTreeSet<String>,
    ) -> Vec<P> {
        if required.is_empty() {
            return videos.to_vec();
        }
        videos
            .iter()
            .filter(|v| {
                self.records
                    .get(&paths::record_key(v.as_ref()))
                    .map(|r| required.is_subset(&r.tags))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    pub fn batch_add_tags<P: AsRef<Path>>(
        &mut self,
        videos: &[P],
        tags: &[String],
    ) -> Result<(), TagError> {
        let tags = tags
            .iter()
            .map(|t| clean(t))
            .collect::<Result<Vec<_>, _>>()?;
        if videos.is_empty() || tags.is_empty() {
            return Ok(());
        }
        for video in videos {
            self.records
                .entry(paths::record_key(video.as_ref()))
                .or_default()
                .tags
                .extend(tags.iter().cloned());
        }
        let mut new_in_vocabulary = false;
        for tag in tags {
            new_in_vocabulary |= self.vocabulary.insert(tag);
        }
        self.persist(new_in_vocabulary, true);
        Ok(())
    }

    /// Returns how many videos lost at least one tag.
    pub fn batch_remove_tags<P: AsRef<Path>>(&mut self, videos: &[P], tags: &[String]) -> usize {
        if videos.is_empty() || tags.is_empty() {
            return 0;
        }
        let mut changed = 0;
        for video in videos {
            if let Some(record) = self.records.get_mut(&paths::record_key(video.as_ref())) {
                let before = record.tags.len();
                for tag in tags {
                    record.tags.remove(tag.trim());
                }
                if record.tags.len() != before {
                    changed += 1;
                }
            }
        }
        self.persist(false, true);
        changed
    }

    /// True when everything in memory has been saved.
    pub fn is_durable(&self) -> bool {
        !self.vocabulary_dirty && !self.records_dirty
    }

    /// Retries any save that failed earlier.
    pub fn flush(&mut self) -> bool {
        if !self.is_durable() {
            self.persist(false, false);
        }
        self.is_durable()
    }

    fn persist(&mut self, vocabulary: bool, records: bool) {
        let vocabulary = vocabulary || self.vocabulary_dirty;
        let records = records || self.records_dirty;
        let result = match (vocabulary, records) {
            (true, true) => self
                .store
                .save_vocabulary_and_records(&self.vocabulary, &self.records),
            (true, false) => self.store.save_vocabulary(&self.vocabulary),
            (false, true) => self.store.save_video_records(&self.records),
            (false, false) => return,
        };
        match result {
            Ok(()) => {
                self.vocabulary_dirty = false;
                self.records_dirty = false;
            }
            Err(err) => {
                error!(error = %err, "tag change kept in memory only");
                self.vocabulary_dirty = vocabulary;
                self.records_dirty = records;
            }
        }
    }
}
