//! Advisory lock files: created exclusively, removed on drop.

use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum LockError {
    Busy { lock_path: String },
    Io(String),
}

/// Held for as long as the value lives. The file records the holder's pid.
pub struct FileLock {
    path: PathBuf,
    _handle: File,
}

impl FileLock {
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref().to_path_buf();
        let io_error = |err: io::Error| LockError::Io(format!("{}: {err}", path.display()));

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_error)?;
        }
        let mut handle = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(handle) => handle,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(LockError::Busy {
                    lock_path: path.display().to_string(),
                });
            }
            Err(err) => return Err(io_error(err)),
        };
        // Best effort: an empty lock file still excludes other holders.
        let _ = writeln!(
            handle,
            "pid={} since={}",
            std::process::id(),
            Utc::now().to_rfc3339()
        );

        Ok(Self {
            path,
            _handle: handle,
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
