//! JSONL persistence: one JSON record per line.
//!
//! Blank lines and `#` comments are skipped on read. Saving goes through a
//! sibling temp file that is synced and renamed over the target, so a
//! crash leaves either the old or the new file, never a torn one.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Errors from JSONL operations.
#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: parse error: {message}")]
    Parse { line: usize, message: String },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("corrupted database file {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: &'static str },
}

impl JsonlError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read records from a JSONL reader.
pub fn read_records<T: DeserializeOwned>(reader: impl BufRead) -> Result<Vec<T>, JsonlError> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|source| JsonlError::Read {
            line: line_no,
            source,
        })?;
        let record = line.trim();
        if record.is_empty() || record.starts_with('#') {
            continue;
        }
        records.push(
            serde_json::from_str(record).map_err(|e| JsonlError::Parse {
                line: line_no,
                message: e.to_string(),
            })?,
        );
    }
    Ok(records)
}

/// Write records to a JSONL writer, one per line.
pub fn write_records<T: Serialize>(
    writer: &mut impl Write,
    records: &[T],
) -> Result<(), JsonlError> {
    for record in records {
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n").map_err(serde_json::Error::io)?;
    }
    Ok(())
}

/// Read a JSONL file, refusing files with NUL bytes or invalid UTF-8.
pub fn read_records_from_path<T: DeserializeOwned>(
    path: impl AsRef<Path>,
) -> Result<Vec<T>, JsonlError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(JsonlError::io(path))?;
    let corrupt = |reason| JsonlError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };
    if bytes.contains(&0) {
        return Err(corrupt("contains NUL byte(s)"));
    }
    if std::str::from_utf8(&bytes).is_err() {
        return Err(corrupt("contains non-UTF-8 byte sequence(s)"));
    }
    read_records(bytes.as_slice())
}

/// Replace a JSONL file with `records`.
pub fn write_records_to_path<T: Serialize>(
    path: impl AsRef<Path>,
    records: &[T],
) -> Result<(), JsonlError> {
    let path = path.as_ref();
    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(dir).map_err(JsonlError::io(dir))?;
    }

    let staged = staging_path(path);
    if let Err(err) = stage(&staged, records) {
        let _ = fs::remove_file(&staged);
        return Err(err);
    }
    if let Err(source) = fs::rename(&staged, path) {
        let _ = fs::remove_file(&staged);
        return Err(JsonlError::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    if let Some(dir) = parent {
        File::open(dir)
            .and_then(|handle| handle.sync_all())
            .map_err(JsonlError::io(dir))?;
    }
    Ok(())
}

fn stage<T: Serialize>(staged: &Path, records: &[T]) -> Result<(), JsonlError> {
    let file = File::create(staged).map_err(JsonlError::io(staged))?;
    let mut writer = BufWriter::new(file);
    write_records(&mut writer, records)?;
    let file = writer
        .into_inner()
        .map_err(|e| JsonlError::io(staged)(e.into_error()))?;
    file.sync_all().map_err(JsonlError::io(staged))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".staged.{}", std::process::id()));
    PathBuf::from(name)
}
