use crate::scanner::{self, ScanOptions};
use crate::tags::TagManager;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// Navigation state: the folder view when no folder is open, otherwise the
/// video view listing the open folder's videos that pass the tag filter.
#[derive(Debug, Default)]
pub struct Browser {
    current_folder: Option<PathBuf>,
    filter: BTreeSet<String>,
    listed: Vec<PathBuf>,
    visible: Vec<PathBuf>,
}

impl Browser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_folder_view(&self) -> bool {
        self.current_folder.is_none()
    }

    pub fn current_folder(&self) -> Option<&Path> {
        self.current_folder.as_deref()
    }

    pub fn filter(&self) -> &BTreeSet<String> {
        &self.filter
    }

    /// Videos of the open folder that carry every filter tag, sorted by path.
    pub fn videos(&self) -> &[PathBuf] {
        &self.visible
    }

    pub fn open_folder(&mut self, folder: &Path, tags: &TagManager<'_>, scan: &ScanOptions) {
        self.current_folder = Some(folder.to_path_buf());
        self.refresh(tags, scan);
    }

    /// Rescans the open folder.
    pub fn refresh(&mut self, tags: &TagManager<'_>, scan: &ScanOptions) {
        let Some(folder) = self.current_folder.as_deref() else {
            return;
        };
        self.listed = scanner::list_videos(folder, scan);
        self.refilter(tags);
    }

    /// Reapplies the tag filter to the last scan, e.g. after tags changed.
    pub fn refilter(&mut self, tags: &TagManager<'_>) {
        self.visible = tags.filter_by_subset(&self.listed, &self.filter);
        debug!(
            listed = self.listed.len(),
            visible = self.visible.len(),
            filter = ?self.filter,
            "video view updated"
        );
    }

    /// Back to the folder view. The tag filter is cleared.
    pub fn go_back(&mut self) {
        self.current_folder = None;
        self.filter.clear();
        self.listed.clear();
        self.visible.clear();
    }

    pub fn toggle_filter_tag(&mut self, tag: &str, on: bool, tags: &TagManager<'_>) {
        let changed = if on {
            self.filter.insert(tag.to_string())
        } else {
            self.filter.remove(tag)
        };
        if changed {
            self.refilter(tags);
        }
    }

    pub fn adjacent(&self, current: &Path, direction: Direction) -> Option<&Path> {
        let index = self.visible.iter().position(|v| v == current)?;
        let target = match direction {
            Direction::Previous => index.checked_sub(1)?,
            Direction::Next => index + 1,
        };
        self.visible.get(target).map(PathBuf::as_path)
    }
}
