//! Expiration sweep
//!
//! Expiry ticks are stored alongside the data (a companion key for key-values,
//! the `__ttl__` field for hashsets). The sweep only reads a state and returns
//! the delete commands a leader should replicate; nothing expires during apply.

use tracing::warn;

use crate::command::{Command, DeleteHashset, DeleteKeyValue};
use crate::types::{State, Tick, HASHSET_TTL_FIELD, TIME_TO_LIVE_SUFFIX};

fn decode_expiry(raw: &[u8]) -> Option<Tick> {
    let bytes: [u8; 8] = raw.try_into().ok()?;
    Some(Tick::from_le_bytes(bytes))
}

/// Delete commands for every entry whose expiry is at or before `now`.
pub fn expired_commands(state: &State, now: Tick) -> Vec<Command> {
    let mut commands = Vec::new();

    for (key, value) in state.key_values.iter() {
        let Some(base) = key.strip_suffix(TIME_TO_LIVE_SUFFIX) else {
            continue;
        };
        match decode_expiry(value) {
            Some(expire_at) if expire_at <= now => {
                commands.push(DeleteKeyValue::new(base).into());
            }
            Some(_) => {}
            None => warn!(key = %key, len = value.len(), "malformed expiry value skipped"),
        }
    }

    for (key, fields) in state.hashsets.iter() {
        let Some(value) = fields.get(HASHSET_TTL_FIELD) else {
            continue;
        };
        match decode_expiry(value) {
            Some(expire_at) if expire_at <= now => {
                commands.push(DeleteHashset::new(key.clone()).into());
            }
            Some(_) => {}
            None => warn!(hashset = %key, len = value.len(), "malformed hashset expiry skipped"),
        }
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{SetHashset, SetKeyValue};
    use crate::raft::replay;
    use crate::types::time_to_live_key;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    fn state() -> State {
        replay(
            &State::new(),
            &[
                SetKeyValue::new("short", Bytes::from_static(b"1")).expiring_at(10).into(),
                SetKeyValue::new("long", Bytes::from_static(b"2")).expiring_at(1_000).into(),
                SetKeyValue::new("forever", Bytes::from_static(b"3")).into(),
                SetHashset::new("job")
                    .field("cron", Bytes::from_static(b"*"))
                    .expiring_at(10)
                    .into(),
                SetHashset::new("keep").field("a", Bytes::new()).into(),
            ],
        )
    }

    #[test]
    fn sweeps_only_expired_entries() {
        let commands = expired_commands(&state(), 10);
        assert_eq!(
            commands,
            vec![
                DeleteKeyValue::new("short").into(),
                DeleteHashset::new("job").into(),
            ]
        );
    }

    #[test]
    fn applying_sweep_removes_values_and_companions() {
        let state = state();
        let swept = replay(&state, &expired_commands(&state, 2_000));
        let keys: Vec<&String> = swept.key_values.keys().collect();
        assert_eq!(keys, vec!["forever"]);
        assert_eq!(swept.hashsets.len(), 1);
    }

    #[test]
    fn malformed_expiry_is_skipped() {
        let mut state = State::new();
        state
            .key_values
            .insert(time_to_live_key("bad"), Bytes::from_static(b"xyz"));
        assert!(expired_commands(&state, i64::MAX).is_empty());
    }
}
