//! Interactive playback loop: polls the player on a fixed interval and reads
//! one-letter commands from stdin, all on the current thread.

use crate::output;
use anyhow::Result;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use vidshelf_core::library::{Intent, Library};
use vidshelf_core::paths;

pub const HELP: &str = "\
p        play/pause
+ / -    volume up/down
> / <    seek forward/back
g <sec>  jump to second
m        mute/unmute
s <x>    speed (0.5 0.75 1 1.25 1.5 2 3)
n / b    next/previous video in folder
r        restart
t <tag>  tag current video
u <tag>  untag current video
q        quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Intent(Intent),
    Help,
    Quit,
    Nothing,
}

/// Parses one input line. `current` is the video now loaded, needed by the
/// tagging commands.
pub fn parse_command(line: &str, current: Option<&Path>) -> Result<Command, String> {
    let line = line.trim();
    let (head, arg) = match line.split_once(char::is_whitespace) {
        Some((h, a)) => (h, a.trim()),
        None => (line, ""),
    };
    let intent = match head {
        "" => return Ok(Command::Nothing),
        "q" | "quit" => return Ok(Command::Quit),
        "h" | "?" | "help" => return Ok(Command::Help),
        "p" => Intent::TogglePlayPause,
        "+" => Intent::VolumeUp,
        "-" => Intent::VolumeDown,
        ">" => Intent::SeekForward,
        "<" => Intent::SeekBackward,
        "m" => Intent::ToggleMute,
        "n" => Intent::NextVideo,
        "b" => Intent::PreviousVideo,
        "r" => Intent::Restart,
        "g" => {
            let secs: f64 = arg
                .parse()
                .map_err(|_| format!("expected seconds, got '{arg}'"))?;
            if !secs.is_finite() || secs < 0.0 {
                return Err(format!("cannot seek to {arg}"));
            }
            Intent::Seek((secs * 1000.0) as u64)
        }
        "s" => {
            let speed: f64 = arg
                .parse()
                .map_err(|_| format!("expected a speed, got '{arg}'"))?;
            Intent::SetSpeed(speed)
        }
        "t" | "u" => {
            if arg.is_empty() {
                return Err("expected a tag name".to_string());
            }
            let video = current
                .ok_or_else(|| "no video loaded".to_string())?
                .to_path_buf();
            let tag = arg.to_string();
            if head == "t" {
                Intent::AddTag { video, tag }
            } else {
                Intent::RemoveTag { video, tag }
            }
        }
        other => return Err(format!("unknown command '{other}', h for help")),
    };
    Ok(Command::Intent(intent))
}

/// Registered folder containing `video`, if any. The deepest match wins.
fn containing_folder(library: &Library<'_>, video: &Path) -> Option<PathBuf> {
    library
        .folders()
        .list()
        .iter()
        .filter(|f| video.starts_with(f))
        .max_by_key(|f| f.components().count())
        .cloned()
}

/// Forwards lines from `input` over a channel from a detached thread. The
/// thread is never joined, so a read still pending at exit cannot stall
/// runtime shutdown.
pub fn spawn_line_reader<R>(input: R) -> mpsc::Receiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in input.lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    debug!(error = %err, "stdin read failed");
                    break;
                }
            }
        }
    });
    rx
}

pub async fn run(mut library: Library<'_>, video: &Path, poll: Duration) -> Result<()> {
    let video = paths::normalize(video);
    match containing_folder(&library, &video) {
        Some(folder) => {
            if let Err(err) = library.dispatch(Intent::OpenFolder(folder)) {
                warn!(error = %err, "could not open folder for next/previous");
            }
        }
        None => debug!("video is outside registered folders, next/previous disabled"),
    }
    let opened = library.dispatch(Intent::OpenVideo(video))?;
    println!("{}", output::describe(&opened));
    println!("h for help");

    let mut ticker = tokio::time::interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut shown = String::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(display) = library.tick() {
                    let text = display.to_string();
                    if text != shown {
                        print!("\r{text}  ");
                        std::io::stdout().flush()?;
                        shown = text;
                    }
                }
            }
            line = lines.recv() => {
                let Some(line) = line else {
                    debug!("stdin closed");
                    break;
                };
                match parse_command(&line, library.player().current()) {
                    Ok(Command::Quit) => break,
                    Ok(Command::Nothing) => {}
                    Ok(Command::Help) => println!("{HELP}"),
                    Ok(Command::Intent(intent)) => match library.dispatch(intent) {
                        Ok(outcome) => println!("{}", output::describe(&outcome)),
                        Err(err) => eprintln!("{err}"),
                    },
                    Err(msg) => eprintln!("{msg}"),
                }
                shown.clear();
            }
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
        }
    }

    println!();
    if !library.shutdown() {
        warn!("some changes could not be saved");
    }
    Ok(())
}
