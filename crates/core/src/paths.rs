use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Absolute, symlink-resolved form of `path`. Paths that cannot be resolved
/// (usually because they no longer exist) are made absolute lexically.
pub fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| lexical_absolute(path))
}

/// String form of an already normalized path. Non-UTF-8 bytes are replaced,
/// so two such paths can share a key; `list_videos` never yields them.
pub fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Key under which a video's records are stored: the normalized path.
pub fn record_key(path: &Path) -> String {
    key(&normalize(path))
}

fn lexical_absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().unwrap_or_default().join(path)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
