//! One object holding every piece of library state, and the table that maps
//! user intents onto it. Front ends build [`Intent`]s and render the
//! [`Outcome`]; they never reach into the components directly for mutation.

use crate::browser::{Browser, Direction};
use crate::config::AppConfig;
use crate::folders::{FolderError, FolderRegistry};
use crate::models::VideoEntry;
use crate::player::{PlayerError, PlayerSession, TimeDisplay};
use crate::playback::PlaybackTracker;
use crate::scanner::{self, ScanOptions};
use crate::tags::{TagError, TagManager};
use engine::MediaEngine;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use storage::Store;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    AddTag { video: PathBuf, tag: String },
    RemoveTag { video: PathBuf, tag: String },
    BatchAddTags { videos: Vec<PathBuf>, tags: Vec<String> },
    BatchRemoveTags { videos: Vec<PathBuf>, tags: Vec<String> },
    AddGlobalTag(String),
    RenameGlobalTag { old: String, new: String },
    DeleteGlobalTag { tag: String, confirmed: bool },
    ToggleFilterTag { tag: String, on: bool },
    AddFolder(PathBuf),
    RemoveFolder(PathBuf),
    OpenFolder(PathBuf),
    GoBack,
    OpenVideo(PathBuf),
    NextVideo,
    PreviousVideo,
    TogglePlayPause,
    Seek(u64),
    SeekRelative(i64),
    SeekForward,
    SeekBackward,
    SetVolume(u8),
    VolumeUp,
    VolumeDown,
    ToggleMute,
    SetSpeed(f64),
    Restart,
    ClosePlayer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Done,
    /// Number of videos whose tags changed.
    Retagged(usize),
    FolderAdded(PathBuf),
    FolderRemoved(PathBuf),
    ViewChanged,
    Opened(PathBuf),
    Playing(bool),
    Position(u64),
    Volume(u8),
    Speed(f64),
    Closed,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Tag(#[from] TagError),
    #[error(transparent)]
    Folder(#[from] FolderError),
    #[error(transparent)]
    Player(#[from] PlayerError),
    #[error("deleting tag '{0}' needs confirmation")]
    Unconfirmed(String),
    #[error("no video before or after the current one")]
    NoAdjacentVideo,
}

pub struct Library<'s> {
    store: &'s Store,
    tags: TagManager<'s>,
    folders: FolderRegistry<'s>,
    playback: PlaybackTracker<'s>,
    browser: Browser,
    player: PlayerSession<Box<dyn MediaEngine>>,
    scan: ScanOptions,
    seek_step_ms: u64,
    volume_step: u8,
}

impl<'s> Library<'s> {
    pub fn load(
        store: &'s Store,
        cfg: &AppConfig,
        engine: Box<dyn MediaEngine>,
    ) -> anyhow::Result<Self> {
        let scan = ScanOptions::from_config(&cfg.scan)?;
        let library = Self {
            store,
            tags: TagManager::load(store),
            folders: FolderRegistry::load(store),
            playback: PlaybackTracker::load(store),
            browser: Browser::new(),
            player: PlayerSession::new(engine),
            scan,
            seek_step_ms: cfg.playback.seek_step_ms,
            volume_step: cfg.playback.volume_step.min(100),
        };
        info!(
            dir = %store.dir().display(),
            folders = library.folders.list().len(),
            tags = library.tags.vocabulary().len(),
            engine = library.player.engine_name(),
            "library loaded"
        );
        Ok(library)
    }

    pub fn store(&self) -> &Store {
        self.store
    }

    pub fn tags(&self) -> &TagManager<'s> {
        &self.tags
    }

    pub fn folders(&self) -> &FolderRegistry<'s> {
        &self.folders
    }

    pub fn playback(&self) -> &PlaybackTracker<'s> {
        &self.playback
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    pub fn player(&self) -> &PlayerSession<Box<dyn MediaEngine>> {
        &self.player
    }

    pub fn scan_options(&self) -> &ScanOptions {
        &self.scan
    }

    /// Videos under `folder` carrying every tag in `required`, with their tags.
    pub fn videos_in(&self, folder: &Path, required: &BTreeSet<String>) -> Vec<VideoEntry> {
        let listed = scanner::list_videos(folder, &self.scan);
        self.tags
            .filter_by_subset(&listed, required)
            .iter()
            .map(|v| self.tags.entry(v))
            .collect()
    }

    /// Records a playback state directly, bypassing the player.
    pub fn record_state(
        &mut self,
        video: &Path,
        elapsed_ms: u64,
        volume: u8,
        speed: f64,
        playing: bool,
    ) {
        self.playback
            .record_state(video, elapsed_ms, volume, speed, playing);
    }

    pub fn dispatch(&mut self, intent: Intent) -> Result<Outcome, DispatchError> {
        debug!(?intent, "dispatch");
        let outcome = match intent {
            Intent::AddTag { video, tag } => {
                self.tags.add_tag(&video, &tag)?;
                self.tags_changed();
                Outcome::Retagged(1)
            }
            Intent::RemoveTag { video, tag } => {
                let removed = self.tags.remove_tag(&video, &tag);
                self.tags_changed();
                Outcome::Retagged(usize::from(removed))
            }
            Intent::BatchAddTags { videos, tags } => {
                self.tags.batch_add_tags(&videos, &tags)?;
                self.tags_changed();
                Outcome::Retagged(videos.len())
            }
            Intent::BatchRemoveTags { videos, tags } => {
                let changed = self.tags.batch_remove_tags(&videos, &tags);
                self.tags_changed();
                Outcome::Retagged(changed)
            }
            Intent::AddGlobalTag(tag) => {
                self.tags.add_global_tag(&tag)?;
                Outcome::Done
            }
            Intent::RenameGlobalTag { old, new } => {
                let retagged = self.tags.rename_global_tag(&old, &new)?;
                if self.browser.filter().contains(old.trim()) {
                    self.browser.toggle_filter_tag(old.trim(), false, &self.tags);
                    self.browser.toggle_filter_tag(new.trim(), true, &self.tags);
                }
                self.tags_changed();
                Outcome::Retagged(retagged)
            }
            Intent::DeleteGlobalTag { tag, confirmed } => {
                if !confirmed {
                    return Err(DispatchError::Unconfirmed(tag));
                }
                let affected = self.tags.delete_global_tag(&tag);
                self.browser.toggle_filter_tag(tag.trim(), false, &self.tags);
                self.tags_changed();
                Outcome::Retagged(affected)
            }
            Intent::ToggleFilterTag { tag, on } => {
                self.browser.toggle_filter_tag(&tag, on, &self.tags);
                Outcome::ViewChanged
            }
            Intent::AddFolder(folder) => Outcome::FolderAdded(self.folders.add(&folder)?),
            Intent::RemoveFolder(folder) => {
                let removed = self.folders.remove(&folder)?;
                if self.browser.current_folder() == Some(removed.as_path()) {
                    self.browser.go_back();
                }
                Outcome::FolderRemoved(removed)
            }
            Intent::OpenFolder(folder) => {
                if !self.folders.contains(&folder) {
                    return Err(FolderError::NotRegistered(folder).into());
                }
                let folder = crate::paths::normalize(&folder);
                self.browser.open_folder(&folder, &self.tags, &self.scan);
                Outcome::ViewChanged
            }
            Intent::GoBack => {
                self.browser.go_back();
                Outcome::ViewChanged
            }
            Intent::OpenVideo(video) => self.open_video(&video)?,
            Intent::NextVideo => self.step_video(Direction::Next)?,
            Intent::PreviousVideo => self.step_video(Direction::Previous)?,
            Intent::TogglePlayPause => Outcome::Playing(self.player.toggle_play_pause()?),
            Intent::Seek(ms) => Outcome::Position(self.player.seek_to(ms)?),
            Intent::SeekRelative(delta) => Outcome::Position(self.player.seek_relative(delta)?),
            Intent::SeekForward => {
                Outcome::Position(self.player.seek_relative(self.seek_delta())?)
            }
            Intent::SeekBackward => {
                Outcome::Position(self.player.seek_relative(-self.seek_delta())?)
            }
            Intent::SetVolume(v) => Outcome::Volume(self.player.set_volume(v)?),
            Intent::VolumeUp => {
                Outcome::Volume(self.player.volume_step(i16::from(self.volume_step))?)
            }
            Intent::VolumeDown => {
                Outcome::Volume(self.player.volume_step(-i16::from(self.volume_step))?)
            }
            Intent::ToggleMute => Outcome::Volume(self.player.toggle_mute()?),
            Intent::SetSpeed(x) => {
                self.player.set_speed(x)?;
                Outcome::Speed(x)
            }
            Intent::Restart => {
                self.player.restart()?;
                Outcome::Position(0)
            }
            Intent::ClosePlayer => {
                self.player.close(&mut self.playback);
                Outcome::Closed
            }
        };
        Ok(outcome)
    }

    /// Polls the player for the time display.
    pub fn tick(&mut self) -> Option<TimeDisplay> {
        self.player.tick()
    }

    /// Records the player's state and retries any failed save. Returns whether
    /// everything reached disk.
    pub fn shutdown(mut self) -> bool {
        self.player.close(&mut self.playback);
        let tags = self.tags.flush();
        let folders = self.folders.flush();
        let playback = self.playback.flush();
        let durable = tags && folders && playback;
        info!(durable, "library closed");
        durable
    }

    fn open_video(&mut self, video: &Path) -> Result<Outcome, DispatchError> {
        self.player.open(video, &mut self.playback)?;
        let opened = self
            .player
            .current()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| video.to_path_buf());
        Ok(Outcome::Opened(opened))
    }

    fn step_video(&mut self, direction: Direction) -> Result<Outcome, DispatchError> {
        let current = self
            .player
            .current()
            .map(Path::to_path_buf)
            .ok_or(PlayerError::NothingLoaded)?;
        let target = self
            .browser
            .adjacent(&current, direction)
            .map(Path::to_path_buf)
            .ok_or(DispatchError::NoAdjacentVideo)?;
        self.open_video(&target)
    }

    fn seek_delta(&self) -> i64 {
        i64::try_from(self.seek_step_ms).unwrap_or(i64::MAX)
    }

    fn tags_changed(&mut self) {
        if !self.browser.is_folder_view() {
            self.browser.refilter(&self.tags);
        }
    }
}
