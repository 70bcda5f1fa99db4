//! Command catalog
//!
//! Every mutation of the replicated [`State`](crate::types::State) is one
//! [`Command`]. Commands carry their own timestamps so applying them never
//! reads a clock, and each variant has a stable [`CommandTag`] used to frame
//! it inside a [`LogEntry`].
//!
//! # Entry framing
//!
//! ```text
//! [u32 LE tag][u32 LE payload length][payload]
//! ```
//!
//! A zero-length entry is a no-op (consensus engines use these for leader
//! heartbeats) and is skipped by the adapter.

mod hashset;
mod keyvalue;
mod queue;
mod snapshot;

pub use hashset::{DeleteHashset, SetHashset};
pub use keyvalue::{DeleteKeyValue, SetKeyValue};
pub use queue::{
    CallbackOutcome, LeaseQueueItems, PushQueueItem, PushQueueItemBatch, RecordCallback,
    RecordCallbackBatch,
};
pub use snapshot::Snapshot;

use bytes::{Buf, BufMut, Bytes};
use std::fmt;

use crate::codec::{self, CodecError, Wire};

/// Bytes of the entry header (tag + payload length).
pub const ENTRY_HEADER_LEN: usize = 8;

/// Stable type tags. Values are part of the log format and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CommandTag {
    SetHashset = 1,
    SetKeyValue = 2,
    DeleteKeyValue = 3,
    LeaseQueueItems = 4,
    Snapshot = 5,
    PushQueueItem = 13,
    PushQueueItemBatch = 14,
    RecordCallback = 15,
    RecordCallbackBatch = 16,
    DeleteHashset = 17,
}

impl TryFrom<u32> for CommandTag {
    type Error = CodecError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(CommandTag::SetHashset),
            2 => Ok(CommandTag::SetKeyValue),
            3 => Ok(CommandTag::DeleteKeyValue),
            4 => Ok(CommandTag::LeaseQueueItems),
            5 => Ok(CommandTag::Snapshot),
            13 => Ok(CommandTag::PushQueueItem),
            14 => Ok(CommandTag::PushQueueItemBatch),
            15 => Ok(CommandTag::RecordCallback),
            16 => Ok(CommandTag::RecordCallbackBatch),
            17 => Ok(CommandTag::DeleteHashset),
            _ => Err(CodecError::UnknownTag { tag }),
        }
    }
}

/// One replicated mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Merge fields into a hashset
    SetHashset(SetHashset),
    /// Upsert a key
    SetKeyValue(SetKeyValue),
    /// Remove a key
    DeleteKeyValue(DeleteKeyValue),
    /// Lease available queue elements (pop)
    LeaseQueueItems(LeaseQueueItems),
    /// Replace the whole state
    Snapshot(Snapshot),
    /// Append a queue element
    PushQueueItem(PushQueueItem),
    /// Append several queue elements
    PushQueueItemBatch(PushQueueItemBatch),
    /// Close one lease attempt
    RecordCallback(RecordCallback),
    /// Close several lease attempts
    RecordCallbackBatch(RecordCallbackBatch),
    /// Remove a hashset or one of its fields
    DeleteHashset(DeleteHashset),
}

impl Command {
    pub fn tag(&self) -> CommandTag {
        match self {
            Command::SetHashset(_) => CommandTag::SetHashset,
            Command::SetKeyValue(_) => CommandTag::SetKeyValue,
            Command::DeleteKeyValue(_) => CommandTag::DeleteKeyValue,
            Command::LeaseQueueItems(_) => CommandTag::LeaseQueueItems,
            Command::Snapshot(_) => CommandTag::Snapshot,
            Command::PushQueueItem(_) => CommandTag::PushQueueItem,
            Command::PushQueueItemBatch(_) => CommandTag::PushQueueItemBatch,
            Command::RecordCallback(_) => CommandTag::RecordCallback,
            Command::RecordCallbackBatch(_) => CommandTag::RecordCallbackBatch,
            Command::DeleteHashset(_) => CommandTag::DeleteHashset,
        }
    }

    /// Command name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetHashset(_) => "SetHashset",
            Command::SetKeyValue(_) => "SetKeyValue",
            Command::DeleteKeyValue(_) => "DeleteKeyValue",
            Command::LeaseQueueItems(_) => "LeaseQueueItems",
            Command::Snapshot(_) => "Snapshot",
            Command::PushQueueItem(_) => "PushQueueItem",
            Command::PushQueueItemBatch(_) => "PushQueueItemBatch",
            Command::RecordCallback(_) => "RecordCallback",
            Command::RecordCallbackBatch(_) => "RecordCallbackBatch",
            Command::DeleteHashset(_) => "DeleteHashset",
        }
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self, Command::Snapshot(_))
    }

    /// Exact payload length, excluding the entry header.
    pub fn payload_len(&self) -> usize {
        match self {
            Command::SetHashset(c) => c.encoded_len(),
            Command::SetKeyValue(c) => c.encoded_len(),
            Command::DeleteKeyValue(c) => c.encoded_len(),
            Command::LeaseQueueItems(c) => c.encoded_len(),
            Command::Snapshot(c) => c.encoded_len(),
            Command::PushQueueItem(c) => c.encoded_len(),
            Command::PushQueueItemBatch(c) => c.encoded_len(),
            Command::RecordCallback(c) => c.encoded_len(),
            Command::RecordCallbackBatch(c) => c.encoded_len(),
            Command::DeleteHashset(c) => c.encoded_len(),
        }
    }

    pub fn encode_payload<B: BufMut>(&self, buf: &mut B) {
        match self {
            Command::SetHashset(c) => c.encode(buf),
            Command::SetKeyValue(c) => c.encode(buf),
            Command::DeleteKeyValue(c) => c.encode(buf),
            Command::LeaseQueueItems(c) => c.encode(buf),
            Command::Snapshot(c) => c.encode(buf),
            Command::PushQueueItem(c) => c.encode(buf),
            Command::PushQueueItemBatch(c) => c.encode(buf),
            Command::RecordCallback(c) => c.encode(buf),
            Command::RecordCallbackBatch(c) => c.encode(buf),
            Command::DeleteHashset(c) => c.encode(buf),
        }
    }

    /// Decode a payload of the given tag. The payload must be consumed exactly.
    pub fn decode_payload(tag: CommandTag, payload: &[u8]) -> Result<Self, CodecError> {
        Ok(match tag {
            CommandTag::SetHashset => Command::SetHashset(Wire::from_slice(payload)?),
            CommandTag::SetKeyValue => Command::SetKeyValue(Wire::from_slice(payload)?),
            CommandTag::DeleteKeyValue => Command::DeleteKeyValue(Wire::from_slice(payload)?),
            CommandTag::LeaseQueueItems => Command::LeaseQueueItems(Wire::from_slice(payload)?),
            CommandTag::Snapshot => Command::Snapshot(Wire::from_slice(payload)?),
            CommandTag::PushQueueItem => Command::PushQueueItem(Wire::from_slice(payload)?),
            CommandTag::PushQueueItemBatch => {
                Command::PushQueueItemBatch(Wire::from_slice(payload)?)
            }
            CommandTag::RecordCallback => Command::RecordCallback(Wire::from_slice(payload)?),
            CommandTag::RecordCallbackBatch => {
                Command::RecordCallbackBatch(Wire::from_slice(payload)?)
            }
            CommandTag::DeleteHashset => Command::DeleteHashset(Wire::from_slice(payload)?),
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetKeyValue(c) => write!(f, "SetKeyValue({})", c.key),
            Command::DeleteKeyValue(c) => write!(f, "DeleteKeyValue({})", c.key),
            Command::SetHashset(c) => write!(f, "SetHashset({}, {} fields)", c.key, c.fields.len()),
            Command::DeleteHashset(c) => write!(f, "DeleteHashset({})", c.key),
            Command::PushQueueItem(c) => write!(f, "PushQueueItem({}/{})", c.key, c.element_id),
            Command::PushQueueItemBatch(c) => write!(f, "PushQueueItemBatch({} items)", c.items.len()),
            Command::LeaseQueueItems(c) => {
                write!(f, "LeaseQueueItems({}, {} for {})", c.key, c.count, c.transaction_id)
            }
            Command::RecordCallback(c) => {
                write!(f, "RecordCallback({}/{} -> {})", c.key, c.outcome.element_id, c.outcome.code)
            }
            Command::RecordCallbackBatch(c) => {
                write!(f, "RecordCallbackBatch({}, {} outcomes)", c.key, c.outcomes.len())
            }
            Command::Snapshot(c) => write!(f, "Snapshot({})", c.state),
        }
    }
}

macro_rules! impl_from_command {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Command {
                fn from(command: $variant) -> Self {
                    Command::$variant(command)
                }
            }
        )*
    };
}

impl_from_command!(
    SetHashset,
    SetKeyValue,
    DeleteKeyValue,
    LeaseQueueItems,
    Snapshot,
    PushQueueItem,
    PushQueueItemBatch,
    RecordCallback,
    RecordCallbackBatch,
    DeleteHashset,
);

/// A framed command ready for submission to the consensus engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogEntry {
    data: Bytes,
}

impl LogEntry {
    /// Frame `command` (CreateLogEntry). The buffer is sized exactly up front.
    pub fn from_command(command: &Command) -> Result<Self, CodecError> {
        let payload_len = command.payload_len();
        codec::check_len(payload_len)?;
        let mut out = Vec::with_capacity(ENTRY_HEADER_LEN + payload_len);
        out.put_u32_le(command.tag() as u32);
        out.put_u32_le(payload_len as u32);
        command.encode_payload(&mut out);
        Ok(Self { data: Bytes::from(out) })
    }

    /// A no-op entry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap bytes received from the consensus engine.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Decode the framed command. Fails on an empty entry as well.
    pub fn decode(&self) -> Result<Command, CodecError> {
        let mut buf = &self.data[..];
        let tag = CommandTag::try_from(codec::get_u32(&mut buf)?)?;
        let len = codec::get_u32(&mut buf)? as usize;
        if buf.remaining() < len {
            return Err(CodecError::Truncated {
                needed: len,
                remaining: buf.remaining(),
            });
        }
        if buf.remaining() > len {
            return Err(CodecError::TrailingBytes {
                remaining: buf.remaining() - len,
            });
        }
        Command::decode_payload(tag, buf)
    }
}

impl TryFrom<&Command> for LogEntry {
    type Error = CodecError;

    fn try_from(command: &Command) -> Result<Self, Self::Error> {
        LogEntry::from_command(command)
    }
}
