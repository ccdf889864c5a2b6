//! Purpose: Single-producer/single-consumer FIFO queue over mapped index/data files.
//! Exports: `FileQueue`, `QueueOptions`, `QueueStats`, `Durability`, `DEFAULT_PAGE_SIZE`.
//! Role: Owns both stores, applies growth and reset policy, and calls the codec.
//! Invariants: `read <= write <= capacity` whenever the queue lock is released.
//! Invariants: The write cursor moves once per record, after prefix and payload land.
//! Invariants: Capacity only shrinks through a reset, and only from the empty state.
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::core::codec::Codec;
use crate::core::data::DataStore;
use crate::core::error::{Error, ErrorKind};
use crate::core::frame::{self, LEN_PREFIX};
use crate::core::index::{Cursors, IndexStore};
use crate::paths::{QueuePaths, DEFAULT_QUEUE_NAME};

pub const DEFAULT_PAGE_SIZE: u64 = 64 * 1024 * 1024;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Durability {
    /// Rely on the shared mapping; the OS writes pages back on its own schedule.
    #[default]
    Fast,
    /// Flush the data region, then the index, after every mutation.
    Flush,
}

#[derive(Clone, Debug)]
pub struct QueueOptions {
    pub dir: PathBuf,
    pub name: String,
    pub page_size: u64,
    pub durability: Durability,
}

impl QueueOptions {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            page_size: DEFAULT_PAGE_SIZE,
            durability: Durability::Fast,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    fn validate(&self) -> Result<(), Error> {
        if self.page_size == 0 || self.page_size > u32::MAX as u64 {
            return Err(Error::new(ErrorKind::Config)
                .with_message(format!("page size {} is out of range", self.page_size))
                .with_hint("Use a page size between 1 byte and 4 GiB - 1."));
        }
        Ok(())
    }
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self::new("./", DEFAULT_QUEUE_NAME)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct QueueStats {
    pub read_cursor: u32,
    pub write_cursor: u32,
    pub capacity: u64,
    pub page_size: u64,
    pub pending_bytes: u64,
}

impl QueueStats {
    pub fn is_empty(&self) -> bool {
        self.read_cursor == self.write_cursor
    }
}

// Drop order: the data mapping goes before the index releases its file lock.
struct Storage {
    data: DataStore,
    index: IndexStore,
}

pub struct FileQueue<C> {
    paths: QueuePaths,
    page_size: u64,
    durability: Durability,
    codec: C,
    storage: Mutex<Storage>,
}

impl<C: Codec> FileQueue<C> {
    /// Opens (or creates) the queue described by `options`.
    ///
    /// Fails with `Config` for bad options or paths, `Busy` if another live queue
    /// owns the same files, and `Corrupt` if the persisted cursors do not fit the
    /// data region.
    pub fn open(options: QueueOptions, codec: C) -> Result<Self, Error> {
        options.validate()?;
        let paths = QueuePaths::resolve(&options.dir, &options.name)?;
        let mut index = IndexStore::open(&paths.index)?;
        let data = DataStore::open(&paths.data, options.page_size)?;

        // Equal cursors mean empty at any capacity, including after a reset that
        // shrank the data file but never got to zero the index.
        if index.cursors().is_empty() && index.cursors() != Cursors::default() {
            tracing::info!(
                queue = %paths.data.display(),
                cursor = index.write_cursor(),
                "empty queue with stale cursors; resetting"
            );
            index.reset();
            index.flush()?;
        }
        let cursors = index.cursors();
        check_cursors(cursors, data.capacity()).map_err(|err| err.with_path(&paths.index))?;
        tracing::debug!(
            queue = %paths.data.display(),
            read = cursors.read,
            write = cursors.write,
            capacity = data.capacity(),
            "opened queue"
        );

        Ok(Self {
            paths,
            page_size: options.page_size,
            durability: options.durability,
            codec,
            storage: Mutex::new(Storage { data, index }),
        })
    }

    pub fn paths(&self) -> &QueuePaths {
        &self.paths
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Appends one item. Zero-length payloads are stored like any other record.
    pub fn push(&self, item: &C::Item) -> Result<(), Error> {
        let payload = self.codec.encode(item)?;
        let mut storage = self.lock()?;
        let start = storage.index.write_cursor();
        let end = frame::record_end(start, payload.len())?;
        self.ensure_capacity(&mut storage, start, (end - start) as u64)?;

        let prefix = frame::encode_len(payload.len())?;
        storage.data.write_at(start, &prefix)?;
        storage.data.write_at(start + LEN_PREFIX as u32, &payload)?;
        storage.index.set_write_cursor(end);
        self.sync(&storage)?;

        tracing::debug!(offset = start, len = payload.len(), "pushed record");
        Ok(())
    }

    /// Removes and decodes the oldest item. `Ok(None)` means the queue is empty;
    /// an empty queue is reset to one page on every such call.
    ///
    /// A `Decode` error still consumes the record, so the next call moves on.
    pub fn pull(&self) -> Result<Option<C::Item>, Error> {
        let mut storage = self.lock()?;
        let cursors = storage.index.cursors();
        if cursors.is_empty() {
            self.reset(&mut storage)?;
            return Ok(None);
        }

        let (payload, next) = read_record(&storage.data, cursors)?;
        storage.index.set_read_cursor(next);
        self.sync(&storage)?;
        drop(storage);

        tracing::debug!(offset = cursors.read, len = payload.len(), "pulled record");
        self.codec
            .decode(&payload)
            .map(Some)
            .map_err(|err| err.with_path(&self.paths.data).with_offset(cursors.read as u64))
    }

    /// Drops every queued record and returns the data region to one page.
    pub fn clear(&self) -> Result<(), Error> {
        let mut storage = self.lock()?;
        self.reset(&mut storage)
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.lock()?.index.cursors().is_empty())
    }

    pub fn stats(&self) -> Result<QueueStats, Error> {
        let storage = self.lock()?;
        let cursors = storage.index.cursors();
        Ok(QueueStats {
            read_cursor: cursors.read,
            write_cursor: cursors.write,
            capacity: storage.data.capacity(),
            page_size: self.page_size,
            pending_bytes: cursors.write.saturating_sub(cursors.read) as u64,
        })
    }

    /// Flushes both regions to stable storage regardless of the durability mode.
    pub fn flush(&self) -> Result<(), Error> {
        let storage = self.lock()?;
        storage.data.flush()?;
        storage.index.flush()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Storage>, Error> {
        self.storage.lock().map_err(|_| {
            Error::new(ErrorKind::Internal)
                .with_message("queue lock poisoned")
                .with_path(&self.paths.data)
        })
    }

    // Grows in whole pages until `needed` bytes fit after `start`.
    fn ensure_capacity(&self, storage: &mut Storage, start: u32, needed: u64) -> Result<(), Error> {
        let remaining = storage.data.remaining_from(start);
        if remaining >= needed {
            return Ok(());
        }
        let pages = (needed - remaining).div_ceil(self.page_size);
        let grow = pages.checked_mul(self.page_size).ok_or_else(|| {
            Error::new(ErrorKind::Full).with_message("data region size overflow")
        })?;

        let before = storage.data.capacity();
        let after = storage.data.grow_by(grow)?;
        tracing::info!(
            queue = %self.paths.data.display(),
            from = before,
            to = after,
            pages,
            "data region full; growing"
        );
        Ok(())
    }

    fn reset(&self, storage: &mut Storage) -> Result<(), Error> {
        let capacity = storage.data.capacity();
        if capacity > self.page_size {
            tracing::info!(
                queue = %self.paths.data.display(),
                capacity,
                page_size = self.page_size,
                "resetting queue; shrinking data region"
            );
        } else {
            tracing::debug!(queue = %self.paths.data.display(), "resetting queue cursors");
        }
        // Cursors first: (0, 0) is valid for whatever capacity a crash leaves behind.
        storage.index.reset();
        self.sync(storage)?;
        storage.data.truncate_to(self.page_size)?;
        self.sync(storage)
    }

    fn sync(&self, storage: &Storage) -> Result<(), Error> {
        if self.durability == Durability::Flush {
            storage.data.flush()?;
            storage.index.flush()?;
        }
        Ok(())
    }
}

fn check_cursors(cursors: Cursors, capacity: u64) -> Result<(), Error> {
    if cursors.read > cursors.write {
        return Err(Error::new(ErrorKind::Corrupt)
            .with_message(format!(
                "read cursor {} is past write cursor {}",
                cursors.read, cursors.write
            ))
            .with_hint("Clear the queue or remove its files."));
    }
    if cursors.write as u64 > capacity {
        return Err(Error::new(ErrorKind::Corrupt)
            .with_message(format!(
                "write cursor {} is past data capacity {capacity}",
                cursors.write
            ))
            .with_hint("Clear the queue or remove its files."));
    }
    Ok(())
}

// Copies out the record at the read cursor; returns it with the cursor past it.
fn read_record(data: &DataStore, cursors: Cursors) -> Result<(Vec<u8>, u32), Error> {
    let overrun = || {
        Error::new(ErrorKind::Corrupt)
            .with_message("record overruns the write cursor")
            .with_path(data.path())
            .with_offset(cursors.read as u64)
    };
    if cursors.write.saturating_sub(cursors.read) < LEN_PREFIX as u32 {
        return Err(overrun());
    }
    let len = frame::decode_len(data.read_at(cursors.read, LEN_PREFIX)?)? as usize;
    let next = match frame::record_end(cursors.read, len) {
        Ok(end) if end <= cursors.write => end,
        _ => return Err(overrun()),
    };
    let payload = data.read_at(cursors.read + LEN_PREFIX as u32, len)?.to_vec();
    Ok((payload, next))
}

#[cfg(test)]
mod tests {
    use super::{Durability, FileQueue, QueueOptions};
    use crate::core::codec::{BytesCodec, JsonCodec, Utf8Codec};
    use crate::core::error::ErrorKind;
    use crate::core::frame::LEN_PREFIX;
    use std::collections::BTreeMap;
    use std::path::Path;

    const PAGE: u64 = 64;

    fn options(dir: &Path) -> QueueOptions {
        QueueOptions::new(dir, "test").with_page_size(PAGE)
    }

    fn strings(dir: &Path) -> FileQueue<Utf8Codec> {
        FileQueue::open(options(dir), Utf8Codec).expect("open")
    }

    #[test]
    fn new_queue_pulls_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let queue = strings(temp.path());
        assert!(queue.is_empty().expect("empty"));
        assert_eq!(queue.pull().expect("pull"), None);
        assert_eq!(queue.stats().expect("stats").capacity, PAGE);
    }

    #[test]
    fn items_come_back_in_push_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let queue = strings(temp.path());
        for item in ["a", "b", "c"] {
            queue.push(&item.to_string()).expect("push");
        }
        assert_eq!(queue.pull().expect("pull").as_deref(), Some("a"));
        assert_eq!(queue.pull().expect("pull").as_deref(), Some("b"));
        assert_eq!(queue.pull().expect("pull").as_deref(), Some("c"));
        assert_eq!(queue.pull().expect("pull"), None);
        assert_eq!(queue.stats().expect("stats").capacity, PAGE);
    }

    #[test]
    fn records_are_length_prefixed_on_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let queue = strings(temp.path());
        queue.push(&"hi".to_string()).expect("push");
        queue.flush().expect("flush");

        let data = std::fs::read(&queue.paths().data).expect("data");
        assert_eq!(&data[..6], &[2, 0, 0, 0, b'h', b'i']);
        let stats = queue.stats().expect("stats");
        assert_eq!((stats.read_cursor, stats.write_cursor), (0, 6));
        assert_eq!(stats.pending_bytes, 6);
    }

    #[test]
    fn oversized_payload_grows_by_whole_pages() {
        let temp = tempfile::tempdir().expect("tempdir");
        let queue = FileQueue::open(options(temp.path()), BytesCodec).expect("open");
        let big: Vec<u8> = (0..200u32).map(|i| i as u8).collect();

        queue.push(&big).expect("push");
        let stats = queue.stats().expect("stats");
        assert_eq!(stats.capacity, PAGE * 4);
        assert!(stats.capacity >= (LEN_PREFIX + big.len()) as u64);
        assert_eq!(queue.pull().expect("pull"), Some(big));
    }

    #[test]
    fn growth_keeps_unread_records_intact() {
        let temp = tempfile::tempdir().expect("tempdir");
        let queue = FileQueue::open(options(temp.path()), BytesCodec).expect("open");
        let small = vec![7u8; 40];
        let big = vec![9u8; 100];

        queue.push(&small).expect("push small");
        assert_eq!(queue.stats().expect("stats").capacity, PAGE);
        queue.push(&big).expect("push big");
        // 44 bytes used, 104 needed: one 64-byte page is not enough, two are.
        assert_eq!(queue.stats().expect("stats").capacity, PAGE * 3);

        assert_eq!(queue.pull().expect("pull"), Some(small));
        assert_eq!(queue.pull().expect("pull"), Some(big));
    }

    #[test]
    fn exact_fit_does_not_grow() {
        let temp = tempfile::tempdir().expect("tempdir");
        let queue = FileQueue::open(options(temp.path()), BytesCodec).expect("open");
        queue.push(&vec![1u8; PAGE as usize - LEN_PREFIX]).expect("push");
        let stats = queue.stats().expect("stats");
        assert_eq!(stats.capacity, PAGE);
        assert_eq!(stats.write_cursor as u64, PAGE);
    }

    #[test]
    fn drain_resets_cursors_and_capacity() {
        let temp = tempfile::tempdir().expect("tempdir");
        let queue = FileQueue::open(options(temp.path()), BytesCodec).expect("open");
        queue.push(&vec![1u8; 300]).expect("push");
        queue.push(&vec![2u8; 10]).expect("push");
        assert!(queue.stats().expect("stats").capacity > PAGE);

        assert!(queue.pull().expect("pull").is_some());
        assert!(queue.pull().expect("pull").is_some());
        assert_eq!(queue.pull().expect("pull"), None);

        let stats = queue.stats().expect("stats");
        assert_eq!((stats.read_cursor, stats.write_cursor), (0, 0));
        assert_eq!(stats.capacity, PAGE);
        assert_eq!(std::fs::metadata(&queue.paths().data).expect("meta").len(), PAGE);
    }

    #[test]
    fn clear_discards_pending_records() {
        let temp = tempfile::tempdir().expect("tempdir");
        let queue = strings(temp.path());
        queue.push(&"x".to_string()).expect("push");
        queue.push(&"y".to_string()).expect("push");
        queue.clear().expect("clear");
        assert!(queue.is_empty().expect("empty"));
        assert_eq!(queue.pull().expect("pull"), None);
        queue.push(&"z".to_string()).expect("push after clear");
        assert_eq!(queue.pull().expect("pull").as_deref(), Some("z"));
    }

    #[test]
    fn empty_items_keep_their_place() {
        let temp = tempfile::tempdir().expect("tempdir");
        let queue = strings(temp.path());
        for item in ["a", "", "c"] {
            queue.push(&item.to_string()).expect("push");
        }
        assert_eq!(queue.stats().expect("stats").write_cursor as usize, 3 * LEN_PREFIX + 2);

        let mut pulled = Vec::new();
        while let Some(item) = queue.pull().expect("pull") {
            pulled.push(item);
        }
        assert_eq!(pulled, vec!["a", "", "c"]);
    }

    #[test]
    fn empty_bytes_round_trip() {
        let temp = tempfile::tempdir().expect("tempdir");
        let queue = FileQueue::open(options(temp.path()), BytesCodec).expect("open");
        queue.push(&Vec::new()).expect("push");
        assert!(!queue.is_empty().expect("empty"));
        assert_eq!(queue.pull().expect("pull"), Some(Vec::new()));
        assert_eq!(queue.pull().expect("pull"), None);
    }

    #[test]
    fn reopen_after_interrupted_shrink_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        {
            let queue = FileQueue::open(options(temp.path()), BytesCodec).expect("open");
            queue.push(&vec![5u8; 300]).expect("push");
            assert!(queue.pull().expect("pull").is_some());
            let stats = queue.stats().expect("stats");
            assert_eq!((stats.read_cursor, stats.write_cursor), (304, 304));
        }
        // The data file was shrunk but the cursors were never zeroed.
        let data_path = temp.path().join("test.data");
        std::fs::OpenOptions::new()
            .write(true)
            .open(&data_path)
            .expect("data")
            .set_len(PAGE)
            .expect("shrink");

        let queue = FileQueue::open(options(temp.path()), BytesCodec).expect("reopen");
        let stats = queue.stats().expect("stats");
        assert_eq!((stats.read_cursor, stats.write_cursor), (0, 0));
        assert_eq!(stats.capacity, PAGE);
        assert_eq!(queue.pull().expect("pull"), None);
        queue.push(&b"next".to_vec()).expect("push");
        assert_eq!(queue.pull().expect("pull"), Some(b"next".to_vec()));
    }

    #[test]
    fn clear_zeros_cursors_before_shrinking() {
        let temp = tempfile::tempdir().expect("tempdir");
        let queue = FileQueue::open(options(temp.path()), BytesCodec).expect("open");
        queue.push(&vec![1u8; 200]).expect("push");
        queue.clear().expect("clear");
        let raw = std::fs::read(temp.path().join("test.index")).expect("index");
        assert_eq!(raw, vec![0u8; 8]);
        assert_eq!(std::fs::metadata(temp.path().join("test.data")).expect("meta").len(), PAGE);
    }

    #[test]
    fn encode_failure_leaves_cursors_unchanged() {
        let temp = tempfile::tempdir().expect("tempdir");
        let queue =
            FileQueue::open(options(temp.path()), JsonCodec::<BTreeMap<Vec<u8>, u8>>::new())
                .expect("open");
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], 1u8);
        let err = queue.push(&map).expect_err("non-string keys");
        assert_eq!(err.kind(), ErrorKind::Encode);
        let stats = queue.stats().expect("stats");
        assert_eq!((stats.read_cursor, stats.write_cursor), (0, 0));
    }

    #[test]
    fn decode_failure_consumes_the_bad_record() {
        let temp = tempfile::tempdir().expect("tempdir");
        {
            let raw = FileQueue::open(options(temp.path()), BytesCodec).expect("open");
            raw.push(&vec![0xff, 0xfe]).expect("push bad");
            raw.push(&b"fine".to_vec()).expect("push good");
        }

        let queue = strings(temp.path());
        let err = queue.pull().expect_err("invalid utf-8");
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(err.offset(), Some(0));
        assert_eq!(queue.pull().expect("pull").as_deref(), Some("fine"));
    }

    #[test]
    fn corrupt_cursors_are_rejected_on_open() {
        let temp = tempfile::tempdir().expect("tempdir");
        let index_path = temp.path().join("test.index");
        let mut raw = Vec::new();
        raw.extend_from_slice(&8u32.to_le_bytes());
        raw.extend_from_slice(&4u32.to_le_bytes());
        std::fs::write(&index_path, raw).expect("seed");

        match FileQueue::open(options(temp.path()), Utf8Codec) {
            Ok(_) => panic!("expected corrupt cursors"),
            Err(err) => assert_eq!(err.kind(), ErrorKind::Corrupt),
        }
    }

    #[test]
    fn write_cursor_past_capacity_is_corrupt() {
        let temp = tempfile::tempdir().expect("tempdir");
        let index_path = temp.path().join("test.index");
        let mut raw = Vec::new();
        raw.extend_from_slice(&0u32.to_le_bytes());
        raw.extend_from_slice(&(PAGE as u32 + 1).to_le_bytes());
        std::fs::write(&index_path, raw).expect("seed");

        match FileQueue::open(options(temp.path()), Utf8Codec) {
            Ok(_) => panic!("expected corrupt cursors"),
            Err(err) => assert_eq!(err.kind(), ErrorKind::Corrupt),
        }
    }

    #[test]
    fn torn_length_prefix_is_reported_not_followed() {
        let temp = tempfile::tempdir().expect("tempdir");
        {
            let raw = strings(temp.path());
            raw.push(&"abc".to_string()).expect("push");
        }
        // Claim a payload far longer than the bytes the write cursor covers.
        let data_path = temp.path().join("test.data");
        let mut data = std::fs::read(&data_path).expect("read");
        data[..4].copy_from_slice(&50u32.to_le_bytes());
        std::fs::write(&data_path, data).expect("write");

        let queue = strings(temp.path());
        let err = queue.pull().expect_err("overrun");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        assert_eq!(queue.stats().expect("stats").read_cursor, 0);
    }

    #[test]
    fn invalid_page_size_is_config_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        for page_size in [0, u32::MAX as u64 + 1] {
            let opts = QueueOptions::new(temp.path(), "test").with_page_size(page_size);
            match FileQueue::open(opts, Utf8Codec) {
                Ok(_) => panic!("expected config error"),
                Err(err) => assert_eq!(err.kind(), ErrorKind::Config),
            }
        }
    }

    #[test]
    fn flush_durability_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let opts = options(temp.path()).with_durability(Durability::Flush);
        let queue = FileQueue::open(opts, Utf8Codec).expect("open");
        queue.push(&"durable".to_string()).expect("push");
        assert_eq!(queue.pull().expect("pull").as_deref(), Some("durable"));
        assert_eq!(queue.pull().expect("pull"), None);
    }
}
