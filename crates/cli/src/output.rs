use anyhow::Result;
use serde::Serialize;
use storage::PlaybackState;
use vidshelf_core::library::Outcome;
use vidshelf_core::models::VideoEntry;
use vidshelf_core::player::format_time;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_videos(entries: &[VideoEntry], json: bool) -> Result<()> {
    if json {
        return print_json(entries);
    }
    if entries.is_empty() {
        println!("no videos");
    }
    for entry in entries {
        if entry.tags.is_empty() {
            println!("{}", entry.path.display());
        } else {
            println!("{}  [{}]", entry.path.display(), entry.tags.join(", "));
        }
    }
    Ok(())
}

pub fn state_line(state: &PlaybackState) -> String {
    format!(
        "{}  at {}  volume {}  speed {}x  {}",
        state.path,
        format_time(state.time_ms),
        state.volume,
        state.speed,
        if state.playing { "playing" } else { "paused" }
    )
}

/// One-line summary of a dispatched intent for the terminal.
pub fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Done => "ok".to_string(),
        Outcome::Retagged(1) => "1 video updated".to_string(),
        Outcome::Retagged(n) => format!("{n} videos updated"),
        Outcome::FolderAdded(p) => format!("registered {}", p.display()),
        Outcome::FolderRemoved(p) => format!("unregistered {}", p.display()),
        Outcome::ViewChanged => "view updated".to_string(),
        Outcome::Opened(p) => format!("playing {}", p.display()),
        Outcome::Playing(true) => "playing".to_string(),
        Outcome::Playing(false) => "paused".to_string(),
        Outcome::Position(ms) => format!("at {}", format_time(*ms)),
        Outcome::Volume(0) => "muted".to_string(),
        Outcome::Volume(v) => format!("volume {v}"),
        Outcome::Speed(x) => format!("speed {x}x"),
        Outcome::Closed => "closed".to_string(),
    }
}
