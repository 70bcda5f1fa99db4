//! Queue commands: push, lease (pop) and callbacks.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{self, CodecError, Wire};
use crate::types::{QueueElement, Tick};

/// Append an element unless its id is already queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushQueueItem {
    pub key: String,
    pub element_id: String,
    pub value: Bytes,
    pub now: Tick,
    pub http_timeout: Tick,
    pub timeout_retries: Vec<Tick>,
    pub retryable_codes: Vec<i32>,
}

impl PushQueueItem {
    pub fn new(
        key: impl Into<String>,
        element_id: impl Into<String>,
        value: impl Into<Bytes>,
        now: Tick,
        http_timeout: Tick,
    ) -> Self {
        Self {
            key: key.into(),
            element_id: element_id.into(),
            value: value.into(),
            now,
            http_timeout,
            timeout_retries: Vec::new(),
            retryable_codes: Vec::new(),
        }
    }

    pub fn retries(mut self, retries: impl IntoIterator<Item = Tick>) -> Self {
        self.timeout_retries = retries.into_iter().collect();
        self
    }

    pub fn retryable_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.retryable_codes = codes.into_iter().collect();
        self
    }

    /// The element this push creates.
    pub fn to_element(&self) -> QueueElement {
        QueueElement::new(
            self.element_id.clone(),
            self.value.clone(),
            self.now,
            self.http_timeout,
        )
        .with_retries(self.timeout_retries.iter().copied())
        .with_retryable_codes(self.retryable_codes.iter().copied())
    }
}

impl Wire for PushQueueItem {
    fn encoded_len(&self) -> usize {
        codec::string_len(&self.key)
            + codec::string_len(&self.element_id)
            + codec::blob_len(&self.value)
            + 8
            + 8
            + 4
            + 8 * self.timeout_retries.len()
            + 4
            + 4 * self.retryable_codes.len()
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        codec::put_string(buf, &self.key);
        codec::put_string(buf, &self.element_id);
        codec::put_blob(buf, &self.value);
        buf.put_i64_le(self.now);
        buf.put_i64_le(self.http_timeout);
        codec::put_count(buf, self.timeout_retries.len());
        for retry in &self.timeout_retries {
            buf.put_i64_le(*retry);
        }
        codec::put_count(buf, self.retryable_codes.len());
        for code in &self.retryable_codes {
            buf.put_i32_le(*code);
        }
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, CodecError> {
        let key = codec::get_string(buf)?;
        let element_id = codec::get_string(buf)?;
        let value = codec::get_blob(buf)?;
        let now = codec::get_tick(buf)?;
        let http_timeout = codec::get_tick(buf)?;

        let count = codec::get_count(buf)?;
        let mut timeout_retries = Vec::with_capacity(count.min(buf.remaining() / 8));
        for _ in 0..count {
            timeout_retries.push(codec::get_tick(buf)?);
        }

        let count = codec::get_count(buf)?;
        let mut retryable_codes = Vec::with_capacity(count.min(buf.remaining() / 4));
        for _ in 0..count {
            retryable_codes.push(codec::get_i32(buf)?);
        }

        Ok(Self {
            key,
            element_id,
            value,
            now,
            http_timeout,
            timeout_retries,
            retryable_codes,
        })
    }
}

/// Several pushes applied in order as one log entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PushQueueItemBatch {
    pub items: Vec<PushQueueItem>,
}

impl Wire for PushQueueItemBatch {
    fn encoded_len(&self) -> usize {
        4 + self.items.iter().map(Wire::encoded_len).sum::<usize>()
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        codec::put_count(buf, self.items.len());
        for item in &self.items {
            item.encode(buf);
        }
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, CodecError> {
        let count = codec::get_count(buf)?;
        let mut items = Vec::new();
        for _ in 0..count {
            items.push(PushQueueItem::decode(buf)?);
        }
        Ok(Self { items })
    }
}

/// Lease up to `count` available elements for `transaction_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseQueueItems {
    pub key: String,
    pub count: u32,
    pub now: Tick,
    pub transaction_id: String,
}

impl LeaseQueueItems {
    pub fn new(key: impl Into<String>, count: u32, now: Tick, transaction_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            count,
            now,
            transaction_id: transaction_id.into(),
        }
    }
}

impl Wire for LeaseQueueItems {
    fn encoded_len(&self) -> usize {
        codec::string_len(&self.key) + 4 + 8 + codec::string_len(&self.transaction_id)
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        codec::put_string(buf, &self.key);
        buf.put_u32_le(self.count);
        buf.put_i64_le(self.now);
        codec::put_string(buf, &self.transaction_id);
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            key: codec::get_string(buf)?,
            count: codec::get_u32(buf)?,
            now: codec::get_tick(buf)?,
            transaction_id: codec::get_string(buf)?,
        })
    }
}

/// Outcome reported for one leased element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub element_id: String,
    pub code: i32,
}

impl CallbackOutcome {
    pub fn new(element_id: impl Into<String>, code: i32) -> Self {
        Self {
            element_id: element_id.into(),
            code,
        }
    }
}

impl Wire for CallbackOutcome {
    fn encoded_len(&self) -> usize {
        codec::string_len(&self.element_id) + 4
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        codec::put_string(buf, &self.element_id);
        buf.put_i32_le(self.code);
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            element_id: codec::get_string(buf)?,
            code: codec::get_i32(buf)?,
        })
    }
}

/// Close the open attempt of one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordCallback {
    pub key: String,
    pub now: Tick,
    pub outcome: CallbackOutcome,
}

impl RecordCallback {
    pub fn new(key: impl Into<String>, element_id: impl Into<String>, code: i32, now: Tick) -> Self {
        Self {
            key: key.into(),
            now,
            outcome: CallbackOutcome::new(element_id, code),
        }
    }
}

impl Wire for RecordCallback {
    fn encoded_len(&self) -> usize {
        codec::string_len(&self.key) + 8 + self.outcome.encoded_len()
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        codec::put_string(buf, &self.key);
        buf.put_i64_le(self.now);
        self.outcome.encode(buf);
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            key: codec::get_string(buf)?,
            now: codec::get_tick(buf)?,
            outcome: CallbackOutcome::decode(buf)?,
        })
    }
}

/// Several callbacks for one queue sharing one `now`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordCallbackBatch {
    pub key: String,
    pub now: Tick,
    pub outcomes: Vec<CallbackOutcome>,
}

impl Wire for RecordCallbackBatch {
    fn encoded_len(&self) -> usize {
        codec::string_len(&self.key)
            + 8
            + 4
            + self.outcomes.iter().map(Wire::encoded_len).sum::<usize>()
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        codec::put_string(buf, &self.key);
        buf.put_i64_le(self.now);
        codec::put_count(buf, self.outcomes.len());
        for outcome in &self.outcomes {
            outcome.encode(buf);
        }
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self, CodecError> {
        let key = codec::get_string(buf)?;
        let now = codec::get_tick(buf)?;
        let count = codec::get_count(buf)?;
        let mut outcomes = Vec::new();
        for _ in 0..count {
            outcomes.push(CallbackOutcome::decode(buf)?);
        }
        Ok(Self { key, now, outcomes })
    }
}
