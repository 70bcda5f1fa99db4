//! Binary wire primitives shared by every command.
//!
//! Layout rules:
//! - strings: `u32` LE byte count followed by UTF-8 bytes
//! - blobs: LEB128 varint byte count (at most 5 bytes) followed by the bytes
//! - collection counts: `u32` LE
//! - ticks: `i64` LE, codes: `i32` LE
//! - optional tick: `u8` presence flag (0 or 1), then the tick when present
//!
//! Decoders never read past the end of the input and never pad; any
//! inconsistency is a [`CodecError`].

use bytes::{Buf, BufMut, Bytes};
use thiserror::Error;

use crate::types::Tick;

/// Largest length a varint may describe.
const MAX_VARINT_BYTES: usize = 5;

/// Decoding failure for command bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,
    #[error("varint longer than 5 bytes or overflowing u32")]
    VarintOverflow,
    #[error("invalid presence flag {flag}")]
    InvalidFlag { flag: u8 },
    #[error("{remaining} trailing bytes after command payload")]
    TrailingBytes { remaining: usize },
    #[error("unknown command tag {tag}")]
    UnknownTag { tag: u32 },
    #[error("length {len} exceeds u32 range")]
    Oversized { len: usize },
    #[error("inconsistent payload: {reason}")]
    Inconsistent { reason: String },
}

/// A value with an exact, precomputable binary encoding.
pub trait Wire: Sized {
    /// Exact number of bytes `encode` will write.
    fn encoded_len(&self) -> usize;

    /// Write the value. Writes exactly `encoded_len()` bytes.
    fn encode<B: BufMut>(&self, buf: &mut B);

    /// Read one value from the front of `buf`.
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, CodecError>;

    /// Encode into a fresh buffer sized up front.
    fn to_bytes(&self) -> Bytes {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode(&mut out);
        Bytes::from(out)
    }

    /// Decode a value that must span the whole input.
    fn from_slice(mut input: &[u8]) -> Result<Self, CodecError> {
        let value = Self::decode(&mut input)?;
        if !input.is_empty() {
            return Err(CodecError::TrailingBytes {
                remaining: input.len(),
            });
        }
        Ok(value)
    }
}

fn ensure<B: Buf>(buf: &B, needed: usize) -> Result<(), CodecError> {
    if buf.remaining() < needed {
        return Err(CodecError::Truncated {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

pub fn get_u8<B: Buf>(buf: &mut B) -> Result<u8, CodecError> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

pub fn get_u32<B: Buf>(buf: &mut B) -> Result<u32, CodecError> {
    ensure(buf, 4)?;
    Ok(buf.get_u32_le())
}

pub fn get_i32<B: Buf>(buf: &mut B) -> Result<i32, CodecError> {
    ensure(buf, 4)?;
    Ok(buf.get_i32_le())
}

pub fn get_tick<B: Buf>(buf: &mut B) -> Result<Tick, CodecError> {
    ensure(buf, 8)?;
    Ok(buf.get_i64_le())
}

/// Read a collection count. The count is not trusted for allocation.
pub fn get_count<B: Buf>(buf: &mut B) -> Result<usize, CodecError> {
    get_u32(buf).map(|count| count as usize)
}

pub fn get_string<B: Buf>(buf: &mut B) -> Result<String, CodecError> {
    let len = get_u32(buf)? as usize;
    ensure(buf, len)?;
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
}

pub fn get_varint<B: Buf>(buf: &mut B) -> Result<u32, CodecError> {
    let mut value: u32 = 0;
    for index in 0..MAX_VARINT_BYTES {
        let byte = get_u8(buf)?;
        let bits = u32::from(byte & 0x7f);
        // fifth byte may only carry the top four bits
        if index == MAX_VARINT_BYTES - 1 && bits > 0x0f {
            return Err(CodecError::VarintOverflow);
        }
        value |= bits << (7 * index);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(CodecError::VarintOverflow)
}

pub fn get_blob<B: Buf>(buf: &mut B) -> Result<Bytes, CodecError> {
    let len = get_varint(buf)? as usize;
    ensure(buf, len)?;
    Ok(buf.copy_to_bytes(len))
}

pub fn get_opt_tick<B: Buf>(buf: &mut B) -> Result<Option<Tick>, CodecError> {
    match get_u8(buf)? {
        0 => Ok(None),
        1 => get_tick(buf).map(Some),
        flag => Err(CodecError::InvalidFlag { flag }),
    }
}

pub fn put_string<B: BufMut>(buf: &mut B, value: &str) {
    buf.put_u32_le(value.len() as u32);
    buf.put_slice(value.as_bytes());
}

pub fn put_varint<B: BufMut>(buf: &mut B, mut value: u32) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

pub fn put_blob<B: BufMut>(buf: &mut B, value: &[u8]) {
    put_varint(buf, value.len() as u32);
    buf.put_slice(value);
}

pub fn put_opt_tick<B: BufMut>(buf: &mut B, value: Option<Tick>) {
    match value {
        Some(tick) => {
            buf.put_u8(1);
            buf.put_i64_le(tick);
        }
        None => buf.put_u8(0),
    }
}

pub fn put_count<B: BufMut>(buf: &mut B, count: usize) {
    buf.put_u32_le(count as u32);
}

pub fn string_len(value: &str) -> usize {
    4 + value.len()
}

pub fn varint_len(value: u32) -> usize {
    match value {
        0..=0x7f => 1,
        0x80..=0x3fff => 2,
        0x4000..=0x1f_ffff => 3,
        0x20_0000..=0x0fff_ffff => 4,
        _ => 5,
    }
}

pub fn blob_len(value: &[u8]) -> usize {
    varint_len(value.len() as u32) + value.len()
}

pub fn opt_tick_len(value: Option<Tick>) -> usize {
    if value.is_some() {
        9
    } else {
        1
    }
}

pub fn inconsistent(reason: impl Into<String>) -> CodecError {
    CodecError::Inconsistent {
        reason: reason.into(),
    }
}

/// Reject lengths the `u32` prefixes cannot carry.
pub fn check_len(len: usize) -> Result<(), CodecError> {
    if len > u32::MAX as usize {
        return Err(CodecError::Oversized { len });
    }
    Ok(())
}
