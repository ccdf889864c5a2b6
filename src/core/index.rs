// Persistent read/write cursors stored in an 8-byte mapped index file.
//
// Layout (little-endian):
//   0..4  read cursor  (u32)
//   4..8  write cursor (u32)
use std::path::Path;

use fs2::FileExt;

use crate::core::error::{io_error_kind, Error, ErrorKind};
use crate::core::mapping::MappedFile;

pub const INDEX_LEN: u64 = 8;
const READ_OFFSET: usize = 0;
const WRITE_OFFSET: usize = 4;

/// Snapshot of both cursors.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Cursors {
    pub read: u32,
    pub write: u32,
}

impl Cursors {
    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }
}

pub struct IndexStore {
    mapped: MappedFile,
}

impl IndexStore {
    /// Opens or creates the index file and takes an exclusive lock on it for as
    /// long as the store lives.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let existing = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => 0,
            Err(err) => return Err(Error::io(path, err)),
        };
        if existing != 0 && existing != INDEX_LEN {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message(format!(
                    "index file must be {INDEX_LEN} bytes, found {existing}"
                ))
                .with_path(path));
        }

        let mapped = MappedFile::open(path, INDEX_LEN)?;
        mapped.file().try_lock_exclusive().map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_message("queue files are locked by another instance")
                .with_path(path)
                .with_source(err)
        })?;
        Ok(Self { mapped })
    }

    pub fn path(&self) -> &Path {
        self.mapped.path()
    }

    pub fn read_cursor(&self) -> u32 {
        self.get(READ_OFFSET)
    }

    pub fn write_cursor(&self) -> u32 {
        self.get(WRITE_OFFSET)
    }

    pub fn set_read_cursor(&mut self, value: u32) {
        self.put(READ_OFFSET, value);
    }

    pub fn set_write_cursor(&mut self, value: u32) {
        self.put(WRITE_OFFSET, value);
    }

    pub fn cursors(&self) -> Cursors {
        Cursors {
            read: self.read_cursor(),
            write: self.write_cursor(),
        }
    }

    pub fn reset(&mut self) {
        self.set_read_cursor(0);
        self.set_write_cursor(0);
    }

    pub fn flush(&self) -> Result<(), Error> {
        self.mapped.flush()
    }

    fn get(&self, offset: usize) -> u32 {
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.mapped.bytes()[offset..offset + 4]);
        u32::from_le_bytes(out)
    }

    fn put(&mut self, offset: usize, value: u32) {
        self.mapped.bytes_mut()[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

impl Drop for IndexStore {
    fn drop(&mut self) {
        let _ = self.mapped.file().unlock();
    }
}
