//! Key-value commands.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{self, CodecError, Wire};
use crate::types::Tick;

/// Upsert one key. An expiry also records the companion TTL key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetKeyValue {
    pub key: String,
    pub value: Bytes,
    pub expire_at: Option<Tick>,
}

impl SetKeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expire_at: None,
        }
    }

    pub fn expiring_at(mut self, tick: Tick) -> Self {
        self.expire_at = Some(tick);
        self
    }
}

impl Wire for SetKeyValue {
    fn encoded_len(&self) -> usize {
        codec::string_len(&self.key) + codec::blob_len(&self.value) + codec::opt_tick_len(self.expire_at)
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        codec::put_string(buf, &self.key);
        codec::put_blob(buf, &self.value);
        codec::put_opt_tick(buf, self.expire_at);
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            key: codec::get_string(buf)?,
            value: codec::get_blob(buf)?,
            expire_at: codec::get_opt_tick(buf)?,
        })
    }
}

/// Remove one key and its TTL companion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteKeyValue {
    pub key: String,
}

impl DeleteKeyValue {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Wire for DeleteKeyValue {
    fn encoded_len(&self) -> usize {
        codec::string_len(&self.key)
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        codec::put_string(buf, &self.key);
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            key: codec::get_string(buf)?,
        })
    }
}
