// Core modules implementing mapped storage, record framing, codecs, and errors.
pub mod codec;
pub mod data;
pub mod error;
pub mod frame;
pub mod index;
pub mod mapping;
pub mod queue;
