//! Media playback engine abstractions.
//!
//! The engine owns decoding and rendering; callers only drive it through
//! [`MediaEngine`]. When the requested engine cannot start, [`build_engine`]
//! degrades to [`noop::NoopEngine`] so the rest of the application keeps
//! working without playback.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub mod mpv;
pub mod noop;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("playback engine unavailable: {0}")]
    Unavailable(String),
    #[error("engine request failed: {0}")]
    Ipc(String),
    #[error("no media loaded")]
    NotLoaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Opening,
    Playing,
    Paused,
    Ended,
    Error,
}

/// Capability surface of an external media player.
///
/// Positions and durations are milliseconds. A duration of zero means the
/// engine does not know it yet.
pub trait MediaEngine {
    fn name(&self) -> &'static str;
    fn load(&mut self, path: &Path) -> Result<(), EngineError>;
    fn play(&mut self) -> Result<(), EngineError>;
    fn pause(&mut self) -> Result<(), EngineError>;
    fn stop(&mut self) -> Result<(), EngineError>;
    fn set_time(&mut self, ms: u64) -> Result<(), EngineError>;
    fn time(&mut self) -> Result<u64, EngineError>;
    fn duration(&mut self) -> Result<u64, EngineError>;
    fn set_volume(&mut self, volume: u8) -> Result<(), EngineError>;
    fn set_rate(&mut self, rate: f64) -> Result<(), EngineError>;
    fn state(&mut self) -> EngineState;
}

impl<E: MediaEngine + ?Sized> MediaEngine for Box<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }
    fn load(&mut self, path: &Path) -> Result<(), EngineError> {
        (**self).load(path)
    }
    fn play(&mut self) -> Result<(), EngineError> {
        (**self).play()
    }
    fn pause(&mut self) -> Result<(), EngineError> {
        (**self).pause()
    }
    fn stop(&mut self) -> Result<(), EngineError> {
        (**self).stop()
    }
    fn set_time(&mut self, ms: u64) -> Result<(), EngineError> {
        (**self).set_time(ms)
    }
    fn time(&mut self) -> Result<u64, EngineError> {
        (**self).time()
    }
    fn duration(&mut self) -> Result<u64, EngineError> {
        (**self).duration()
    }
    fn set_volume(&mut self, volume: u8) -> Result<(), EngineError> {
        (**self).set_volume(volume)
    }
    fn set_rate(&mut self, rate: f64) -> Result<(), EngineError> {
        (**self).set_rate(rate)
    }
    fn state(&mut self) -> EngineState {
        (**self).state()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Mpv,
    Noop,
}

impl From<&str> for EngineKind {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "noop" | "none" => EngineKind::Noop,
            _ => EngineKind::Mpv,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub mpv_binary: PathBuf,
    pub socket_path: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            mpv_binary: PathBuf::from("mpv"),
            socket_path: None,
        }
    }
}

/// Starts the requested engine, falling back to the no-op engine when it
/// cannot be initialized.
pub fn build_engine(kind: EngineKind, options: &EngineOptions) -> Box<dyn MediaEngine> {
    let started = match kind {
        EngineKind::Noop => return Box::new(noop::NoopEngine),
        EngineKind::Mpv => open_mpv(options),
    };
    match started {
        Ok(engine) => {
            info!(engine = engine.name(), "playback engine ready");
            engine
        }
        Err(err) => {
            warn!(error = %err, "falling back to no-op player");
            Box::new(noop::NoopEngine)
        }
    }
}

#[cfg(unix)]
fn open_mpv(options: &EngineOptions) -> Result<Box<dyn MediaEngine>, EngineError> {
    let socket_path = options.socket_path.clone().unwrap_or_else(|| {
        std::env::temp_dir().join(format!("vidshelf-mpv-{}.sock", std::process::id()))
    });
    let engine = mpv::MpvEngine::spawn(mpv::MpvConfig {
        binary: options.mpv_binary.clone(),
        socket_path,
        ..mpv::MpvConfig::default()
    })?;
    Ok(Box::new(engine))
}

#[cfg(not(unix))]
fn open_mpv(_options: &EngineOptions) -> Result<Box<dyn MediaEngine>, EngineError> {
    Err(EngineError::Unavailable(
        "mpv IPC needs a unix domain socket on this platform".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_mpv_binary_degrades_to_noop() {
        let temp = tempfile::tempdir().unwrap();
        let options = EngineOptions {
            mpv_binary: temp.path().join("no-such-mpv"),
            socket_path: Some(temp.path().join("mpv.sock")),
        };
        let mut engine = build_engine(EngineKind::Mpv, &options);
        assert_eq!(engine.name(), "noop");
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn engine_kind_parses_loosely() {
        assert_eq!(EngineKind::from("NOOP"), EngineKind::Noop);
        assert_eq!(EngineKind::from("mpv"), EngineKind::Mpv);
        assert_eq!(EngineKind::from("whatever"), EngineKind::Mpv);
    }
}
