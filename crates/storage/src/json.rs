use crate::StorageError;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Reads a JSON document. A missing file is `Ok(None)`.
pub(crate) fn read_json(path: &Path) -> Result<Option<Value>, StorageError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|e| StorageError::read(path, e))?;
    let value = serde_json::from_str(&content).map_err(|e| StorageError::read(path, e))?;
    Ok(Some(value))
}

/// A fully written temp file waiting to be renamed over its target.
pub(crate) struct StagedWrite {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    pub(crate) fn commit(self) -> Result<(), StorageError> {
        let target = self.target;
        self.file
            .persist(&target)
            .map_err(|e| StorageError::write(&target, e.error))?;
        Ok(())
    }
}

pub(crate) fn stage_json<T: Serialize + ?Sized>(
    target: &Path,
    value: &T,
) -> Result<StagedWrite, StorageError> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir).map_err(|e| StorageError::write(target, e))?;
    {
        let mut writer = BufWriter::new(&mut file);
        serde_json::to_writer_pretty(&mut writer, value)
            .map_err(|e| StorageError::write(target, e))?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|e| StorageError::write(target, e))?;
    }
    file.as_file()
        .sync_all()
        .map_err(|e| StorageError::write(target, e))?;
    Ok(StagedWrite {
        file,
        target: target.to_path_buf(),
    })
}

/// Serializes `value` pretty-printed and atomically replaces `target`.
pub(crate) fn write_json<T: Serialize + ?Sized>(
    target: &Path,
    value: &T,
) -> Result<(), StorageError> {
    stage_json(target, value)?.commit()
}
