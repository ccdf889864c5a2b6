// Record framing: `[len: u32 LE][payload: len bytes]`, laid out back to back.
use crate::core::error::{Error, ErrorKind};

pub const LEN_PREFIX: usize = 4;

pub fn encode_len(payload_len: usize) -> Result<[u8; LEN_PREFIX], Error> {
    let len = u32::try_from(payload_len).map_err(|_| {
        Error::new(ErrorKind::Full).with_message("payload length exceeds u32 range")
    })?;
    Ok(len.to_le_bytes())
}

pub fn decode_len(buf: &[u8]) -> Result<u32, Error> {
    if buf.len() < LEN_PREFIX {
        return Err(Error::new(ErrorKind::Corrupt).with_message("record length prefix truncated"));
    }
    let mut out = [0u8; LEN_PREFIX];
    out.copy_from_slice(&buf[..LEN_PREFIX]);
    Ok(u32::from_le_bytes(out))
}

/// Bytes a record with `payload_len` occupies, or `None` on overflow.
pub fn record_len(payload_len: usize) -> Option<u64> {
    (payload_len as u64).checked_add(LEN_PREFIX as u64)
}

/// Cursor value just past a record starting at `start`, if it still fits in the
/// 32-bit cursor space.
pub fn record_end(start: u32, payload_len: usize) -> Result<u32, Error> {
    record_len(payload_len)
        .and_then(|len| (start as u64).checked_add(len))
        .and_then(|end| u32::try_from(end).ok())
        .ok_or_else(|| {
            Error::new(ErrorKind::Full)
                .with_message("record would overflow the 32-bit cursor range")
                .with_offset(start as u64)
        })
}
