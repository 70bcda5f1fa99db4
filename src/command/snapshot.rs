//! Full-state snapshot command and the element encodings it relies on.

use std::collections::HashSet;

use bytes::{Buf, BufMut, Bytes};
use im::{OrdMap, OrdSet, Vector};

use crate::codec::{self, CodecError, Wire};
use crate::types::{QueueAttempt, QueueElement, State};

/// Replaces the entire state. Produced by compaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub state: State,
}

impl Snapshot {
    pub fn new(state: State) -> Self {
        Self { state }
    }
}

impl Wire for QueueAttempt {
    fn encoded_len(&self) -> usize {
        8 + codec::opt_tick_len(self.end) + 4 + codec::string_len(&self.transaction_id)
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_i64_le(self.start);
        codec::put_opt_tick(buf, self.end);
        buf.put_i32_le(self.outcome);
        codec::put_string(buf, &self.transaction_id);
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            start: codec::get_tick(buf)?,
            end: codec::get_opt_tick(buf)?,
            outcome: codec::get_i32(buf)?,
            transaction_id: codec::get_string(buf)?,
        })
    }
}

impl Wire for QueueElement {
    fn encoded_len(&self) -> usize {
        codec::string_len(&self.id)
            + codec::blob_len(&self.value)
            + 8
            + 8
            + 4
            + 8 * self.timeout_retries.len()
            + 4
            + self.attempts.iter().map(Wire::encoded_len).sum::<usize>()
            + 4
            + 4 * self.retryable_codes.len()
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        codec::put_string(buf, &self.id);
        codec::put_blob(buf, &self.value);
        buf.put_i64_le(self.insert_tick);
        buf.put_i64_le(self.http_timeout);
        codec::put_count(buf, self.timeout_retries.len());
        for retry in self.timeout_retries.iter() {
            buf.put_i64_le(*retry);
        }
        codec::put_count(buf, self.attempts.len());
        for attempt in self.attempts.iter() {
            attempt.encode(buf);
        }
        codec::put_count(buf, self.retryable_codes.len());
        for code in self.retryable_codes.iter() {
            buf.put_i32_le(*code);
        }
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, CodecError> {
        let id = codec::get_string(buf)?;
        let value = codec::get_blob(buf)?;
        let insert_tick = codec::get_tick(buf)?;
        let http_timeout = codec::get_tick(buf)?;

        let mut timeout_retries = Vector::new();
        for _ in 0..codec::get_count(buf)? {
            timeout_retries.push_back(codec::get_tick(buf)?);
        }
        let mut attempts = Vector::new();
        for _ in 0..codec::get_count(buf)? {
            attempts.push_back(QueueAttempt::decode(buf)?);
        }
        let mut retryable_codes = OrdSet::new();
        for _ in 0..codec::get_count(buf)? {
            let code = codec::get_i32(buf)?;
            if retryable_codes.insert(code).is_some() {
                return Err(codec::inconsistent(format!(
                    "element {id} repeats retryable code {code}"
                )));
            }
        }

        let last = attempts.len().saturating_sub(1);
        for (index, attempt) in attempts.iter().enumerate() {
            if !attempt.is_open() {
                continue;
            }
            if index != last {
                return Err(codec::inconsistent(format!(
                    "element {id} has open attempt {index} before its last"
                )));
            }
            if attempt.outcome != 0 {
                return Err(codec::inconsistent(format!(
                    "element {id} has open attempt with outcome {}",
                    attempt.outcome
                )));
            }
        }

        Ok(Self {
            id,
            value,
            insert_tick,
            http_timeout,
            timeout_retries,
            attempts,
            retryable_codes,
        })
    }
}

fn fields_len(fields: &OrdMap<String, Bytes>) -> usize {
    4 + fields
        .iter()
        .map(|(name, value)| codec::string_len(name) + codec::blob_len(value))
        .sum::<usize>()
}

fn put_fields<B: BufMut>(buf: &mut B, fields: &OrdMap<String, Bytes>) {
    codec::put_count(buf, fields.len());
    for (name, value) in fields.iter() {
        codec::put_string(buf, name);
        codec::put_blob(buf, value);
    }
}

fn get_fields<B: Buf>(buf: &mut B) -> Result<OrdMap<String, Bytes>, CodecError> {
    let mut fields = OrdMap::new();
    for _ in 0..codec::get_count(buf)? {
        let name = codec::get_string(buf)?;
        let value = codec::get_blob(buf)?;
        insert_unique(&mut fields, name, value, "field")?;
    }
    Ok(fields)
}

/// Maps are written from ordered maps, so a repeated key is corruption.
fn insert_unique<V: Clone>(
    map: &mut OrdMap<String, V>,
    key: String,
    value: V,
    what: &str,
) -> Result<(), CodecError> {
    if map.contains_key(&key) {
        return Err(codec::inconsistent(format!("duplicate {what} {key:?}")));
    }
    map.insert(key, value);
    Ok(())
}

impl Wire for Snapshot {
    fn encoded_len(&self) -> usize {
        let state = &self.state;
        let hashsets: usize = state
            .hashsets
            .iter()
            .map(|(key, fields)| codec::string_len(key) + fields_len(fields))
            .sum();
        let queues: usize = state
            .queues
            .iter()
            .map(|(key, elements)| {
                codec::string_len(key) + 4 + elements.iter().map(Wire::encoded_len).sum::<usize>()
            })
            .sum();
        fields_len(&state.key_values) + 4 + hashsets + 4 + queues
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        let state = &self.state;
        put_fields(buf, &state.key_values);

        codec::put_count(buf, state.hashsets.len());
        for (key, fields) in state.hashsets.iter() {
            codec::put_string(buf, key);
            put_fields(buf, fields);
        }

        codec::put_count(buf, state.queues.len());
        for (key, elements) in state.queues.iter() {
            codec::put_string(buf, key);
            codec::put_count(buf, elements.len());
            for element in elements.iter() {
                element.encode(buf);
            }
        }
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, CodecError> {
        let key_values = get_fields(buf)?;

        let mut hashsets = OrdMap::new();
        for _ in 0..codec::get_count(buf)? {
            let key = codec::get_string(buf)?;
            let fields = get_fields(buf)?;
            insert_unique(&mut hashsets, key, fields, "hashset")?;
        }

        let mut queues = OrdMap::new();
        for _ in 0..codec::get_count(buf)? {
            let key = codec::get_string(buf)?;
            let mut elements = Vector::new();
            let mut ids = HashSet::new();
            for _ in 0..codec::get_count(buf)? {
                let element = QueueElement::decode(buf)?;
                if !ids.insert(element.id.clone()) {
                    return Err(codec::inconsistent(format!(
                        "queue {key:?} repeats element {:?}",
                        element.id
                    )));
                }
                elements.push_back(element);
            }
            insert_unique(&mut queues, key, elements, "queue")?;
        }

        Ok(Self::new(State {
            key_values,
            hashsets,
            queues,
        }))
    }
}
