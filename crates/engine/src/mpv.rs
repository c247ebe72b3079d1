//! mpv driven over its JSON IPC protocol.
//!
//! Requests are single JSON lines carrying a `request_id`; mpv answers with a
//! line holding the same id plus `error` and `data`. Asynchronous event lines
//! can arrive in between and are skipped.

use crate::{EngineError, EngineState, MediaEngine};
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::trace;

/// Request/response channel to an mpv instance.
pub struct MpvIpc<R, W> {
    reader: BufReader<R>,
    writer: W,
    next_id: u64,
    loaded: bool,
}

impl<R: Read, W: Write> MpvIpc<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            next_id: 0,
            loaded: false,
        }
    }

    pub fn command(&mut self, command: Value) -> Result<Value, EngineError> {
        self.next_id += 1;
        let id = self.next_id;
        let mut line = serde_json::to_string(&json!({ "command": command, "request_id": id }))
            .map_err(|e| EngineError::Ipc(e.to_string()))?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| EngineError::Ipc(e.to_string()))?;

        loop {
            let mut buf = String::new();
            let n = self
                .reader
                .read_line(&mut buf)
                .map_err(|e| EngineError::Ipc(e.to_string()))?;
            if n == 0 {
                return Err(EngineError::Ipc("mpv closed the connection".into()));
            }
            let reply: Value = match serde_json::from_str(buf.trim()) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if let Some(event) = reply.get("event") {
                trace!(%event, "mpv event");
                continue;
            }
            match reply.get("request_id").and_then(Value::as_u64) {
                Some(reply_id) if reply_id != id => continue,
                _ => {}
            }
            return match reply.get("error").and_then(Value::as_str) {
                Some("success") => Ok(reply.get("data").cloned().unwrap_or(Value::Null)),
                Some(err) => Err(EngineError::Ipc(err.to_string())),
                None => Err(EngineError::Ipc("reply without status".into())),
            };
        }
    }

    fn get_property(&mut self, name: &str) -> Result<Value, EngineError> {
        self.command(json!(["get_property", name]))
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), EngineError> {
        self.command(json!(["set_property", name, value]))?;
        Ok(())
    }

    /// Millisecond property; "property unavailable" while a file is still
    /// opening reads as zero.
    fn millis_property(&mut self, name: &str) -> Result<u64, EngineError> {
        if !self.loaded {
            return Ok(0);
        }
        match self.get_property(name) {
            Ok(value) => Ok(value
                .as_f64()
                .map(|secs| (secs.max(0.0) * 1000.0).round() as u64)
                .unwrap_or(0)),
            Err(EngineError::Ipc(msg)) if msg == "property unavailable" => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn flag_property(&mut self, name: &str) -> Result<bool, EngineError> {
        Ok(self.get_property(name)?.as_bool().unwrap_or(false))
    }

    fn query_state(&mut self) -> Result<EngineState, EngineError> {
        if self.flag_property("idle-active")? {
            return Ok(EngineState::Idle);
        }
        if self.flag_property("eof-reached")? {
            return Ok(EngineState::Ended);
        }
        if self.get_property("duration").is_err() {
            return Ok(EngineState::Opening);
        }
        if self.flag_property("pause")? {
            Ok(EngineState::Paused)
        } else {
            Ok(EngineState::Playing)
        }
    }
}

impl<R: Read, W: Write> MediaEngine for MpvIpc<R, W> {
    fn name(&self) -> &'static str {
        "mpv"
    }

    fn load(&mut self, path: &Path) -> Result<(), EngineError> {
        self.command(json!(["loadfile", path.to_string_lossy(), "replace"]))?;
        self.loaded = true;
        Ok(())
    }

    fn play(&mut self) -> Result<(), EngineError> {
        if !self.loaded {
            return Err(EngineError::NotLoaded);
        }
        self.set_property("pause", json!(false))
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        if !self.loaded {
            return Err(EngineError::NotLoaded);
        }
        self.set_property("pause", json!(true))
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.command(json!(["stop"]))?;
        self.loaded = false;
        Ok(())
    }

    fn set_time(&mut self, ms: u64) -> Result<(), EngineError> {
        if !self.loaded {
            return Err(EngineError::NotLoaded);
        }
        self.set_property("time-pos", json!(ms as f64 / 1000.0))
    }

    fn time(&mut self) -> Result<u64, EngineError> {
        self.millis_property("time-pos")
    }

    fn duration(&mut self) -> Result<u64, EngineError> {
        self.millis_property("duration")
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), EngineError> {
        self.set_property("volume", json!(volume.min(100)))
    }

    fn set_rate(&mut self, rate: f64) -> Result<(), EngineError> {
        self.set_property("speed", json!(rate))
    }

    fn state(&mut self) -> EngineState {
        if !self.loaded {
            return EngineState::Idle;
        }
        self.query_state().unwrap_or(EngineState::Error)
    }
}

#[derive(Debug, Clone)]
pub struct MpvConfig {
    pub binary: PathBuf,
    pub socket_path: PathBuf,
    pub startup_timeout: Duration,
    pub reply_timeout: Duration,
    pub extra_args: Vec<String>,
}

impl Default for MpvConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("mpv"),
            socket_path: std::env::temp_dir().join("vidshelf-mpv.sock"),
            startup_timeout: Duration::from_secs(5),
            reply_timeout: Duration::from_millis(500),
            extra_args: Vec::new(),
        }
    }
}

#[cfg(unix)]
pub use process::MpvEngine;

#[cfg(unix)]
mod process {
    use super::{MpvConfig, MpvIpc};
    use crate::{EngineError, EngineState, MediaEngine};
    use serde_json::json;
    use std::os::unix::net::UnixStream;
    use std::path::{Path, PathBuf};
    use std::process::{Child, Command, Stdio};
    use std::time::{Duration, Instant};
    use tracing::{debug, warn};

    /// An mpv child process plus the IPC connection to it.
    pub struct MpvEngine {
        child: Child,
        ipc: MpvIpc<UnixStream, UnixStream>,
        socket_path: PathBuf,
    }

    impl MpvEngine {
        pub fn spawn(cfg: MpvConfig) -> Result<Self, EngineError> {
            let _ = std::fs::remove_file(&cfg.socket_path);
            let mut child = Command::new(&cfg.binary)
                .arg("--idle=yes")
                .arg("--keep-open=yes")
                .arg("--force-window=yes")
                .arg(format!("--input-ipc-server={}", cfg.socket_path.display()))
                .args(&cfg.extra_args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| {
                    EngineError::Unavailable(format!(
                        "could not start {}: {}",
                        cfg.binary.display(),
                        e
                    ))
                })?;

            let stream = match wait_for_socket(&cfg.socket_path, cfg.startup_timeout) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e);
                }
            };
            let connect = || -> std::io::Result<MpvIpc<UnixStream, UnixStream>> {
                stream.set_read_timeout(Some(cfg.reply_timeout))?;
                let reader = stream.try_clone()?;
                Ok(MpvIpc::new(reader, stream.try_clone()?))
            };
            let ipc = match connect() {
                Ok(ipc) => ipc,
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(EngineError::Unavailable(e.to_string()));
                }
            };
            debug!(socket = %cfg.socket_path.display(), "connected to mpv");
            Ok(Self {
                child,
                ipc,
                socket_path: cfg.socket_path,
            })
        }
    }

    fn wait_for_socket(path: &Path, timeout: Duration) -> Result<UnixStream, EngineError> {
        let deadline = Instant::now() + timeout;
        loop {
            match UnixStream::connect(path) {
                Ok(stream) => return Ok(stream),
                Err(e) if Instant::now() >= deadline => {
                    return Err(EngineError::Unavailable(format!(
                        "mpv IPC socket {} never came up: {}",
                        path.display(),
                        e
                    )))
                }
                Err(_) => std::thread::sleep(Duration::from_millis(50)),
            }
        }
    }

    impl Drop for MpvEngine {
        fn drop(&mut self) {
            if let Err(e) = self.ipc.command(json!(["quit"])) {
                warn!(error = %e, "mpv did not accept quit, killing it");
                let _ = self.child.kill();
            }
            let _ = self.child.wait();
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }

    impl MediaEngine for MpvEngine {
        fn name(&self) -> &'static str {
            "mpv"
        }
        fn load(&mut self, path: &Path) -> Result<(), EngineError> {
            self.ipc.load(path)
        }
        fn play(&mut self) -> Result<(), EngineError> {
            self.ipc.play()
        }
        fn pause(&mut self) -> Result<(), EngineError> {
            self.ipc.pause()
        }
        fn stop(&mut self) -> Result<(), EngineError> {
            self.ipc.stop()
        }
        fn set_time(&mut self, ms: u64) -> Result<(), EngineError> {
            self.ipc.set_time(ms)
        }
        fn time(&mut self) -> Result<u64, EngineError> {
            self.ipc.time()
        }
        fn duration(&mut self) -> Result<u64, EngineError> {
            self.ipc.duration()
        }
        fn set_volume(&mut self, volume: u8) -> Result<(), EngineError> {
            self.ipc.set_volume(volume)
        }
        fn set_rate(&mut self, rate: f64) -> Result<(), EngineError> {
            self.ipc.set_rate(rate)
        }
        fn state(&mut self) -> EngineState {
            self.ipc.state()
        }
    }
}
