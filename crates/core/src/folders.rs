use crate::paths;
use std::path::{Path, PathBuf};
use storage::Store;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FolderError {
    #[error("folder not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("folder already registered: {}", .0.display())]
    AlreadyRegistered(PathBuf),
    #[error("folder is not registered: {}", .0.display())]
    NotRegistered(PathBuf),
}

/// Ordered list of folders the user registered. Registering or removing a
/// folder never touches the files inside it.
pub struct FolderRegistry<'s> {
    store: &'s Store,
    folders: Vec<PathBuf>,
    dirty: bool,
}

impl<'s> FolderRegistry<'s> {
    /// Loads the saved list. Folders that no longer exist are dropped and the
    /// rest are normalized; the cleaned list is written back if it changed.
    pub fn load(store: &'s Store) -> Self {
        let saved = store.load_folders();
        let mut folders: Vec<PathBuf> = Vec::with_capacity(saved.len());
        for raw in &saved {
            let path = Path::new(raw);
            if !path.is_dir() {
                warn!(folder = %raw, "registered folder is gone, dropping it");
                continue;
            }
            let path = paths::normalize(path);
            if !folders.contains(&path) {
                folders.push(path);
            }
        }
        let changed = folders.len() != saved.len()
            || folders.iter().zip(&saved).any(|(f, s)| paths::key(f) != *s);
        let mut registry = Self {
            store,
            folders,
            dirty: changed,
        };
        if changed {
            registry.persist();
        }
        registry
    }

    pub fn list(&self) -> &[PathBuf] {
        &self.folders
    }

    pub fn contains(&self, folder: &Path) -> bool {
        self.folders.iter().any(|f| f == &paths::normalize(folder))
    }

    /// Registers `folder` and returns its normalized form.
    pub fn add(&mut self, folder: &Path) -> Result<PathBuf, FolderError> {
        if !folder.is_dir() {
            return Err(FolderError::NotFound(folder.to_path_buf()));
        }
        let folder = paths::normalize(folder);
        if self.folders.contains(&folder) {
            return Err(FolderError::AlreadyRegistered(folder));
        }
        info!(folder = %folder.display(), "registered folder");
        self.folders.push(folder.clone());
        self.dirty = true;
        self.persist();
        Ok(folder)
    }

    pub fn remove(&mut self, folder: &Path) -> Result<PathBuf, FolderError> {
        let wanted = paths::normalize(folder);
        let index = self
            .folders
            .iter()
            .position(|f| f == &wanted || f.as_path() == folder)
            .ok_or_else(|| FolderError::NotRegistered(folder.to_path_buf()))?;
        self.remove_at(index)
            .ok_or(FolderError::NotRegistered(wanted))
    }

    /// Removes the folder at `index` in list order. Out-of-range is a no-op.
    pub fn remove_at(&mut self, index: usize) -> Option<PathBuf> {
        if index >= self.folders.len() {
            return None;
        }
        let removed = self.folders.remove(index);
        info!(folder = %removed.display(), "unregistered folder");
        self.dirty = true;
        self.persist();
        Some(removed)
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
        let folders: Vec<String> = self.folders.iter().map(|f| paths::key(f)).collect();
        match self.store.save_folders(&folders) {
            Ok(()) => self.dirty = false,
            Err(err) => error!(error = %err, "folder list kept in memory only"),
        }
    }
}
