//! Purpose: Persistent single-producer/single-consumer FIFO queue over mapped files.
//! Exports: `FileQueue` and its options/stats, the `Codec` capability, errors, paths.
//! Role: Library backing the `mapqueue` CLI; `core` holds the storage layers.
//! Invariants: One live `FileQueue` per index/data file pair (enforced by a file lock).
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod core;
pub mod paths;

pub use crate::core::codec::{BytesCodec, Codec, JsonCodec, Utf8Codec};
pub use crate::core::error::{to_exit_code, Error, ErrorKind};
pub use crate::core::queue::{
    Durability, FileQueue, QueueOptions, QueueStats, DEFAULT_PAGE_SIZE,
};
pub use crate::paths::{QueuePaths, DEFAULT_QUEUE_NAME};
