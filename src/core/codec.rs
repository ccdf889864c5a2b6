//! Purpose: Payload codecs that turn queued items into record bytes and back.
//! Exports: `Codec`, `BytesCodec`, `Utf8Codec`, `JsonCodec`.
//! Role: The only extension point of the queue; storage never inspects payloads.
//! Invariants: `decode(encode(x)) == x` for every item a codec accepts.
//! Invariants: Failures surface as `ErrorKind::Encode` / `ErrorKind::Decode`.
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::error::{Error, ErrorKind};

pub trait Codec {
    type Item;

    fn encode(&self, item: &Self::Item) -> Result<Vec<u8>, Error>;
    fn decode(&self, bytes: &[u8]) -> Result<Self::Item, Error>;
}

/// Stores raw byte payloads unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesCodec;

impl Codec for BytesCodec {
    type Item = Vec<u8>;

    fn encode(&self, item: &Vec<u8>) -> Result<Vec<u8>, Error> {
        Ok(item.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(bytes.to_vec())
    }
}

/// Stores strings as UTF-8.
#[derive(Clone, Copy, Debug, Default)]
pub struct Utf8Codec;

impl Codec for Utf8Codec {
    type Item = String;

    fn encode(&self, item: &String) -> Result<Vec<u8>, Error> {
        Ok(item.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, Error> {
        String::from_utf8(bytes.to_vec()).map_err(|err| {
            Error::new(ErrorKind::Decode)
                .with_message("payload is not valid UTF-8")
                .with_source(err)
        })
    }
}

/// Stores any serde type as compact JSON.
pub struct JsonCodec<T> {
    _item: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self { _item: PhantomData }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<T: Serialize + DeserializeOwned> Codec for JsonCodec<T> {
    type Item = T;

    fn encode(&self, item: &T) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(item).map_err(|err| {
            Error::new(ErrorKind::Encode)
                .with_message("failed to encode JSON payload")
                .with_source(err)
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, Error> {
        serde_json::from_slice(bytes).map_err(|err| {
            Error::new(ErrorKind::Decode)
                .with_message("failed to decode JSON payload")
                .with_source(err)
        })
    }
}
