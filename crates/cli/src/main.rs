use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use cli::{output, play};
use engine::noop::NoopEngine;
use engine::{build_engine, EngineKind, EngineOptions};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use storage::Store;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use vidshelf_core::config;
use vidshelf_core::library::{Intent, Library};
use vidshelf_core::paths;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.save_dir {
        cfg.storage.dir = dir.to_string_lossy().into_owned();
    }
    let store = Store::new(&cfg.storage.dir);

    match cli.command {
        Commands::Play { video, engine } => {
            let kind = EngineKind::from(engine.as_deref().unwrap_or(&cfg.playback.engine));
            let mut options = EngineOptions::default();
            if let Some(mpv) = &cfg.playback.mpv_path {
                options.mpv_binary = PathBuf::from(mpv);
            }
            let library = Library::load(&store, &cfg, build_engine(kind, &options))?;
            let poll = Duration::from_millis(cfg.playback.poll_interval_ms.max(10));
            play::run(library, &video, poll).await
        }
        command => {
            let mut library = Library::load(&store, &cfg, Box::new(NoopEngine))?;
            let result = run_command(&mut library, command);
            if !library.shutdown() {
                warn!("some changes could not be saved");
            }
            result
        }
    }
}

#[derive(Parser)]
#[command(name = "vidshelf")]
#[command(about = "Tag, browse and play local video folders", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,

    /// Directory holding the saved library files
    #[arg(long)]
    save_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage registered folders
    Folders {
        #[command(subcommand)]
        action: FolderCommand,
    },
    /// List videos in a folder
    Videos {
        folder: PathBuf,
        /// Only videos carrying all of these tags (comma-separated)
        #[arg(long, value_delimiter = ',', num_args = 1.., default_values_t = Vec::<String>::new())]
        tags: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Manage the tag vocabulary
    Tags {
        #[command(subcommand)]
        action: TagCommand,
    },
    /// Add tags to videos
    Tag {
        #[arg(required = true)]
        tags: Vec<String>,
        #[arg(long, num_args = 1.., required = true)]
        videos: Vec<PathBuf>,
    },
    /// Remove tags from videos
    Untag {
        #[arg(required = true)]
        tags: Vec<String>,
        #[arg(long, num_args = 1.., required = true)]
        videos: Vec<PathBuf>,
    },
    /// Show a video's tags and saved playback state
    Show {
        video: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Inspect or record playback state
    State {
        #[command(subcommand)]
        action: StateCommand,
    },
    /// Play a video interactively
    Play {
        video: PathBuf,
        /// Playback engine: mpv or noop
        #[arg(long)]
        engine: Option<String>,
    },
}

#[derive(Subcommand)]
enum FolderCommand {
    List {
        #[arg(long)]
        json: bool,
    },
    Add {
        dir: PathBuf,
    },
    Remove {
        dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum TagCommand {
    List {
        #[arg(long)]
        json: bool,
    },
    Add {
        tag: String,
    },
    Rename {
        old: String,
        new: String,
    },
    Delete {
        tag: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum StateCommand {
    Record {
        video: PathBuf,
        #[arg(long)]
        time_ms: u64,
        #[arg(long, default_value_t = 100)]
        volume: u8,
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
        #[arg(long)]
        paused: bool,
    },
    Show {
        #[arg(long)]
        json: bool,
    },
}

fn run_command(library: &mut Library<'_>, command: Commands) -> Result<()> {
    match command {
        Commands::Folders { action } => run_folders(library, action),
        Commands::Videos { folder, tags, json } => {
            let required: BTreeSet<String> = tags.into_iter().map(|t| t.trim().to_string()).collect();
            let entries = library.videos_in(&paths::normalize(&folder), &required);
            output::print_videos(&entries, json)
        }
        Commands::Tags { action } => run_tags(library, action),
        Commands::Tag { tags, videos } => {
            let videos = videos.iter().map(|v| paths::normalize(v)).collect();
            let outcome = library.dispatch(Intent::BatchAddTags { videos, tags })?;
            println!("{}", output::describe(&outcome));
            Ok(())
        }
        Commands::Untag { tags, videos } => {
            let videos = videos.iter().map(|v| paths::normalize(v)).collect();
            let outcome = library.dispatch(Intent::BatchRemoveTags { videos, tags })?;
            println!("{}", output::describe(&outcome));
            Ok(())
        }
        Commands::Show { video, json } => {
            let video = paths::normalize(&video);
            let entry = library.tags().entry(&video);
            let state = library.playback().get_state(&video);
            if json {
                return output::print_json(&serde_json::json!({
                    "path": entry.path,
                    "tags": entry.tags,
                    "state": state,
                }));
            }
            println!("{}", entry.path.display());
            println!(
                "tags: {}",
                if entry.tags.is_empty() {
                    "(none)".to_string()
                } else {
                    entry.tags.join(", ")
                }
            );
            println!("state: {}", output::state_line(&state));
            Ok(())
        }
        Commands::State { action } => match action {
            StateCommand::Record {
                video,
                time_ms,
                volume,
                speed,
                paused,
            } => {
                let video = paths::normalize(&video);
                library.record_state(&video, time_ms, volume, speed, !paused);
                println!("{}", output::state_line(&library.playback().get_state(&video)));
                Ok(())
            }
            StateCommand::Show { json } => {
                let states = library.playback().states();
                if json {
                    return output::print_json(states);
                }
                if states.is_empty() {
                    println!("no saved playback state");
                }
                for state in states.values() {
                    println!("{}", output::state_line(state));
                }
                Ok(())
            }
        },
        Commands::Play { .. } => bail!("play runs its own loop"),
    }
}

fn run_folders(library: &mut Library<'_>, action: FolderCommand) -> Result<()> {
    match action {
        FolderCommand::List { json } => {
            let folders = library.folders().list();
            if json {
                return output::print_json(folders);
            }
            if folders.is_empty() {
                println!("no folders registered");
            }
            for (i, folder) in folders.iter().enumerate() {
                println!("{:>3}  {}", i + 1, folder.display());
            }
            Ok(())
        }
        FolderCommand::Add { dir } => {
            let outcome = library.dispatch(Intent::AddFolder(dir))?;
            println!("{}", output::describe(&outcome));
            Ok(())
        }
        FolderCommand::Remove { dir } => {
            let outcome = library.dispatch(Intent::RemoveFolder(dir))?;
            println!("{}", output::describe(&outcome));
            Ok(())
        }
    }
}

fn run_tags(library: &mut Library<'_>, action: TagCommand) -> Result<()> {
    match action {
        TagCommand::List { json } => {
            let mut counts: BTreeMap<&str, usize> = library
                .tags()
                .vocabulary()
                .iter()
                .map(|t| (t.as_str(), 0))
                .collect();
            for record in library.tags().records().values() {
                for tag in &record.tags {
                    if let Some(n) = counts.get_mut(tag.as_str()) {
                        *n += 1;
                    }
                }
            }
            if json {
                return output::print_json(&counts);
            }
            if counts.is_empty() {
                println!("no tags");
            }
            for (tag, n) in counts {
                println!("{tag}  ({n})");
            }
            Ok(())
        }
        TagCommand::Add { tag } => {
            library.dispatch(Intent::AddGlobalTag(tag.clone()))?;
            println!("added tag '{}'", tag.trim());
            Ok(())
        }
        TagCommand::Rename { old, new } => {
            let outcome = library.dispatch(Intent::RenameGlobalTag { old, new })?;
            println!("{}", output::describe(&outcome));
            Ok(())
        }
        TagCommand::Delete { tag, yes } => {
            let confirmed = yes || confirm(&format!("Delete tag '{tag}' from every video?"))?;
            if !confirmed {
                println!("kept tag '{tag}'");
                return Ok(());
            }
            let outcome = library.dispatch(Intent::DeleteGlobalTag { tag, confirmed })?;
            println!("{}", output::describe(&outcome));
            Ok(())
        }
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
