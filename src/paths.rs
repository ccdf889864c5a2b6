//! Purpose: Resolve the index/data file pair for a named queue in a directory.
//! Exports: `QueuePaths`, `DEFAULT_QUEUE_NAME`, `INDEX_SUFFIX`, `DATA_SUFFIX`.
//! Role: Keep CLI and library path semantics aligned from one source.
//! Invariants: Files are always `<dir>/<name>.index` and `<dir>/<name>.data`.
//! Invariants: Queue names must not contain path separators.

use std::path::{Path, PathBuf};

use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_QUEUE_NAME: &str = "FileQueue";
pub const INDEX_SUFFIX: &str = "index";
pub const DATA_SUFFIX: &str = "data";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueuePaths {
    pub index: PathBuf,
    pub data: PathBuf,
}

impl QueuePaths {
    /// Validates `name` and returns the file pair under `dir`, creating `dir`
    /// if it does not exist yet.
    pub fn resolve(dir: &Path, name: &str) -> Result<Self, Error> {
        let paths = Self::for_name(dir, name)?;
        std::fs::create_dir_all(dir).map_err(|err| {
            Error::new(ErrorKind::Config)
                .with_message("queue directory is not accessible")
                .with_path(dir)
                .with_source(err)
        })?;
        Ok(paths)
    }

    /// Like `resolve`, without touching the filesystem.
    pub fn for_name(dir: &Path, name: &str) -> Result<Self, Error> {
        if dir.as_os_str().is_empty() {
            return Err(Error::new(ErrorKind::Config).with_message("queue directory is empty"));
        }
        if name.trim().is_empty() {
            return Err(Error::new(ErrorKind::Config).with_message("queue name is empty"));
        }
        if name.contains('/') || name.contains(std::path::MAIN_SEPARATOR) {
            return Err(Error::new(ErrorKind::Config)
                .with_message(format!("queue name `{name}` contains a path separator"))
                .with_hint("Pass the directory separately from the queue name."));
        }
        Ok(Self {
            index: dir.join(format!("{name}.{INDEX_SUFFIX}")),
            data: dir.join(format!("{name}.{DATA_SUFFIX}")),
        })
    }
}
