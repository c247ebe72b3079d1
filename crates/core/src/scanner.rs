//! Walks registered folders and lists the video files inside them.

use crate::config::ScanConfig;
use crate::models::VIDEO_EXTENSIONS;
use crate::paths;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub extensions: Vec<String>,
    pub exclude: GlobSet,
    pub follow_links: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: VIDEO_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            exclude: GlobSet::empty(),
            follow_links: true,
        }
    }
}

impl ScanOptions {
    pub fn from_config(cfg: &ScanConfig) -> anyhow::Result<Self> {
        let extensions = cfg
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Ok(Self {
            extensions,
            exclude: build_globset(&cfg.exclude)?,
            follow_links: cfg.follow_links,
        })
    }
}

/// Every video file under `folder`, recursively, as normalized absolute paths
/// sorted by their full path. A missing folder or a plain file yields nothing.
/// Paths that are not valid UTF-8 are skipped, since records are keyed by the
/// path's string form.
///
/// Symbolic links are followed when `follow_links` is set; walkdir reports a
/// link pointing back at one of its ancestors as an error, and that entry is
/// skipped.
pub fn list_videos(folder: &Path, options: &ScanOptions) -> Vec<PathBuf> {
    if !folder.is_dir() {
        debug!(folder = %folder.display(), "not a directory, no videos");
        return Vec::new();
    }

    let mut videos = Vec::new();
    for entry in WalkDir::new(folder)
        .follow_links(options.follow_links)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_excluded(e.path(), &options.exclude))
    {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                if let Some(ancestor) = err.loop_ancestor() {
                    debug!(ancestor = %ancestor.display(), "skipping symlink loop");
                } else {
                    debug!(error = %err, "skipping unreadable entry");
                }
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_video(entry.path(), &options.extensions) {
            continue;
        }
        let video = paths::normalize(entry.path());
        if video.to_str().is_none() {
            debug!(video = %video.display(), "skipping non-UTF-8 path");
            continue;
        }
        videos.push(video);
    }

    videos.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    videos.dedup();
    debug!(folder = %folder.display(), count = videos.len(), "listed videos");
    videos
}

pub fn is_video(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn is_excluded(path: &Path, excludes: &GlobSet) -> bool {
    excludes.is_match(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn extension_match_ignores_case() {
        let exts: Vec<String> = VIDEO_EXTENSIONS.iter().map(|e| e.to_string()).collect();
        assert!(is_video(Path::new("/a/B.MKV"), &exts));
        assert!(is_video(Path::new("/a/clip.m4v"), &exts));
        assert!(!is_video(Path::new("/a/notes.txt"), &exts));
        assert!(!is_video(Path::new("/a/mp4"), &exts));
    }

    #[test]
    fn config_extensions_are_normalized() {
        let cfg = ScanConfig {
            extensions: vec![".MP4".into(), " mkv ".into(), "".into()],
            exclude: vec!["**/trailers/**".into()],
            follow_links: false,
        };
        let options = ScanOptions::from_config(&cfg).unwrap();
        assert_eq!(options.extensions, vec!["mp4".to_string(), "mkv".to_string()]);
        assert!(options.exclude.is_match("/m/trailers/x.mp4"));
        assert!(!options.follow_links);
    }

    #[test]
    fn bad_glob_is_rejected() {
        let cfg = ScanConfig {
            exclude: vec!["a[".into()],
            ..ScanConfig::default()
        };
        assert!(ScanOptions::from_config(&cfg).is_err());
    }

    #[test]
    fn lists_nested_videos_sorted() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("season1")).unwrap();
        fs::write(root.join("b.mkv"), b"").unwrap();
        fs::write(root.join("a.mp4"), b"").unwrap();
        fs::write(root.join("notes.txt"), b"").unwrap();
        fs::write(root.join("season1").join("e01.AVI"), b"").unwrap();

        let videos = list_videos(root, &ScanOptions::default());
        let base = fs::canonicalize(root).unwrap();
        assert_eq!(
            videos,
            vec![
                base.join("a.mp4"),
                base.join("b.mkv"),
                base.join("season1").join("e01.AVI"),
            ]
        );
    }

    #[test]
    fn excluded_directories_are_pruned() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("samples")).unwrap();
        fs::write(root.join("samples").join("s.mp4"), b"").unwrap();
        fs::write(root.join("keep.mp4"), b"").unwrap();

        let options = ScanOptions::from_config(&ScanConfig {
            exclude: vec!["**/samples".into()],
            ..ScanConfig::default()
        })
        .unwrap();
        let videos = list_videos(root, &options);
        assert_eq!(videos.len(), 1);
        assert!(videos[0].ends_with("keep.mp4"));
    }

    #[test]
    fn missing_or_file_input_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("a.mp4");
        fs::write(&file, b"").unwrap();
        assert!(list_videos(&file, &ScanOptions::default()).is_empty());
        assert!(list_videos(&temp.path().join("missing"), &ScanOptions::default()).is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join(OsStr::from_bytes(b"caf\xe9.mp4")), b"").unwrap();
        fs::write(root.join(OsStr::from_bytes(b"caf\xe8.mp4")), b"").unwrap();
        fs::write(root.join("plain.mp4"), b"").unwrap();

        let videos = list_videos(root, &ScanOptions::default());
        assert_eq!(videos.len(), 1);
        assert!(videos[0].ends_with("plain.mp4"));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_terminates() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub").join("x.webm"), b"").unwrap();
        std::os::unix::fs::symlink(root, root.join("sub").join("back")).unwrap();

        let videos = list_videos(root, &ScanOptions::default());
        assert_eq!(videos.len(), 1);
        assert!(videos[0].ends_with("x.webm"));
    }
}
