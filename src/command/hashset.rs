//! Hashset commands.

use bytes::{Buf, BufMut, Bytes};
use im::OrdMap;

use crate::codec::{self, CodecError, Wire};
use crate::types::Tick;

/// Merge fields into one hashset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetHashset {
    pub key: String,
    pub fields: OrdMap<String, Bytes>,
    pub expire_at: Option<Tick>,
}

impl SetHashset {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: OrdMap::new(),
            expire_at: None,
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn expiring_at(mut self, tick: Tick) -> Self {
        self.expire_at = Some(tick);
        self
    }
}

impl Wire for SetHashset {
    fn encoded_len(&self) -> usize {
        codec::string_len(&self.key)
            + 4
            + self
                .fields
                .iter()
                .map(|(name, value)| codec::string_len(name) + codec::blob_len(value))
                .sum::<usize>()
            + codec::opt_tick_len(self.expire_at)
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        codec::put_string(buf, &self.key);
        codec::put_count(buf, self.fields.len());
        for (name, value) in self.fields.iter() {
            codec::put_string(buf, name);
            codec::put_blob(buf, value);
        }
        codec::put_opt_tick(buf, self.expire_at);
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, CodecError> {
        let key = codec::get_string(buf)?;
        let count = codec::get_count(buf)?;
        let mut fields = OrdMap::new();
        for _ in 0..count {
            let name = codec::get_string(buf)?;
            let value = codec::get_blob(buf)?;
            fields.insert(name, value);
        }
        Ok(Self {
            key,
            fields,
            expire_at: codec::get_opt_tick(buf)?,
        })
    }
}

/// Remove a whole hashset, or a single field when `field` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteHashset {
    pub key: String,
    pub field: Option<String>,
}

impl DeleteHashset {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            field: None,
        }
    }

    pub fn field(key: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            field: Some(field.into()),
        }
    }
}

// An empty field string on the wire means the whole map.
impl Wire for DeleteHashset {
    fn encoded_len(&self) -> usize {
        codec::string_len(&self.key) + codec::string_len(self.field.as_deref().unwrap_or(""))
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        codec::put_string(buf, &self.key);
        codec::put_string(buf, self.field.as_deref().unwrap_or(""));
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, CodecError> {
        let key = codec::get_string(buf)?;
        let field = codec::get_string(buf)?;
        Ok(Self {
            key,
            field: (!field.is_empty()).then_some(field),
        })
    }
}
