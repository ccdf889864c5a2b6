// Scoped file mappings: one open file plus one writable mapping, released together.
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::core::error::{Error, ErrorKind};

/// A read/write file mapped in full.
///
/// Dropping a `MappedFile` unmaps the region before the file handle is closed,
/// so a caller that drops it can truncate or recreate the file immediately.
pub struct MappedFile {
    path: PathBuf,
    // Field order matters: the mapping must be released before the file.
    mmap: MmapMut,
    file: File,
}

impl MappedFile {
    /// Opens (creating if needed) `path` and maps it, extending it to `min_len`
    /// when shorter. Existing content and longer lengths are preserved.
    pub fn open(path: impl AsRef<Path>, min_len: u64) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|err| Error::io(&path, err))?;

        let len = file
            .metadata()
            .map(|meta| meta.len())
            .map_err(|err| Error::io(&path, err))?;
        if len < min_len {
            file.set_len(min_len).map_err(|err| Error::io(&path, err))?;
        }

        let mmap = map_file(&file, &path)?;
        Ok(Self { path, mmap, file })
    }

    /// Recreates `path` at zero length, sizes it to `len` and maps it.
    pub fn create(path: impl AsRef<Path>, len: u64) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|err| Error::io(&path, err))?;
        file.set_len(len).map_err(|err| Error::io(&path, err))?;

        let mmap = map_file(&file, &path)?;
        Ok(Self { path, mmap, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    /// Extends the file to `new_len` and re-establishes the mapping over it.
    /// Bytes in `[0, len())` are preserved.
    pub fn grow_to(&mut self, new_len: u64) -> Result<(), Error> {
        if new_len < self.len() {
            return Err(Error::new(ErrorKind::Internal)
                .with_message("grow_to cannot shrink a mapping")
                .with_path(&self.path));
        }
        self.file
            .set_len(new_len)
            .map_err(|err| Error::io(&self.path, err))?;
        self.mmap = map_file(&self.file, &self.path)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), Error> {
        self.mmap.flush().map_err(|err| Error::io(&self.path, err))
    }
}

fn map_file(file: &File, path: &Path) -> Result<MmapMut, Error> {
    // SAFETY: the queue owns its backing files exclusively (see the index lock);
    // no other code truncates them while this mapping is alive.
    unsafe {
        MmapMut::map_mut(file).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to map file")
                .with_path(path)
                .with_source(err)
        })
    }
}
