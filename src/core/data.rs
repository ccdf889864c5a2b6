// Growable mapped region holding the framed record stream.
use std::path::{Path, PathBuf};

use crate::core::error::{Error, ErrorKind};
use crate::core::mapping::MappedFile;

pub struct DataStore {
    path: PathBuf,
    // `None` only after a failed recreate in `truncate_to`; the store is then
    // unusable until the queue is reopened.
    mapped: Option<MappedFile>,
}

impl DataStore {
    /// Maps the data file, creating it (or extending a short one) at one page.
    pub fn open(path: impl AsRef<Path>, page_size: u64) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let mapped = MappedFile::open(&path, page_size)?;
        Ok(Self {
            path,
            mapped: Some(mapped),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> u64 {
        self.mapped.as_ref().map_or(0, MappedFile::len)
    }

    pub fn remaining_from(&self, pos: u32) -> u64 {
        self.capacity().saturating_sub(pos as u64)
    }

    pub fn write_at(&mut self, pos: u32, bytes: &[u8]) -> Result<(), Error> {
        let mapped = self.mapped_mut()?;
        let range = checked_range(mapped, pos, bytes.len())?;
        mapped.bytes_mut()[range].copy_from_slice(bytes);
        Ok(())
    }

    pub fn read_at(&self, pos: u32, len: usize) -> Result<&[u8], Error> {
        let mapped = self.mapped()?;
        let range = checked_range(mapped, pos, len)?;
        Ok(&mapped.bytes()[range])
    }

    /// Extends the mapping by `bytes`, keeping `[0, capacity())` intact.
    /// Returns the new capacity.
    pub fn grow_by(&mut self, bytes: u64) -> Result<u64, Error> {
        let mapped = self.mapped_mut()?;
        let new_len = mapped.len().checked_add(bytes).ok_or_else(|| {
            Error::new(ErrorKind::Full).with_message("data region size overflow")
        })?;
        mapped.grow_to(new_len)?;
        Ok(new_len)
    }

    /// Drops all content and returns the region to `page_bytes`.
    ///
    /// At or below one page the mapping is kept as is. Above one page the mapping
    /// is released before the file is recreated, so no stale view keeps the large
    /// file alive.
    pub fn truncate_to(&mut self, page_bytes: u64) -> Result<(), Error> {
        if self.mapped.is_some() && self.capacity() <= page_bytes {
            return Ok(());
        }
        self.mapped = None;
        self.mapped = Some(MappedFile::create(&self.path, page_bytes)?);
        Ok(())
    }

    pub fn flush(&self) -> Result<(), Error> {
        self.mapped()?.flush()
    }

    fn mapped(&self) -> Result<&MappedFile, Error> {
        self.mapped.as_ref().ok_or_else(|| unmapped(&self.path))
    }

    fn mapped_mut(&mut self) -> Result<&mut MappedFile, Error> {
        let path = &self.path;
        self.mapped.as_mut().ok_or_else(|| unmapped(path))
    }
}

fn unmapped(path: &Path) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("data region is not mapped")
        .with_hint("Reopen the queue to recover.")
        .with_path(path)
}

fn checked_range(
    mapped: &MappedFile,
    pos: u32,
    len: usize,
) -> Result<std::ops::Range<usize>, Error> {
    let start = pos as usize;
    match start.checked_add(len) {
        Some(end) if end as u64 <= mapped.len() => Ok(start..end),
        _ => Err(Error::new(ErrorKind::Corrupt)
            .with_message(format!("access of {len} bytes exceeds data region"))
            .with_path(mapped.path())
            .with_offset(pos as u64)),
    }
}
