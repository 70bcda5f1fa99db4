//! Command interpreter
//!
//! [`apply`] is the only way state changes. It is a pure function of the
//! previous state and the command: no clock, no I/O, no failure for missing
//! keys or empty queues. Each handler clones the (structurally shared) state
//! and edits the clone, so the input value stays valid for concurrent readers.

use bytes::Bytes;
use im::Vector;
use tracing::debug;

use crate::command::{
    CallbackOutcome, Command, DeleteHashset, DeleteKeyValue, LeaseQueueItems, PushQueueItem,
    SetHashset, SetKeyValue, Snapshot,
};
use crate::queue::lifecycle::{status, ElementStatus};
use crate::types::{
    time_to_live_key, QueueElement, State, Tick, DELETE_ELEMENT_CODE, HASHSET_TTL_FIELD,
    TIMEOUT_CODE,
};

/// Apply one command to `state`, returning the next state.
pub fn apply(state: &State, command: &Command) -> State {
    debug!(command = command.name(), "applying command");
    match command {
        Command::SetKeyValue(c) => set_key_value(state, c),
        Command::DeleteKeyValue(c) => delete_key_value(state, c),
        Command::SetHashset(c) => set_hashset(state, c),
        Command::DeleteHashset(c) => delete_hashset(state, c),
        Command::PushQueueItem(c) => push_queue_items(state, std::slice::from_ref(c)),
        Command::PushQueueItemBatch(c) => push_queue_items(state, &c.items),
        Command::LeaseQueueItems(c) => lease_queue_items(state, c),
        Command::RecordCallback(c) => record_callbacks(state, &c.key, c.now, std::slice::from_ref(&c.outcome)),
        Command::RecordCallbackBatch(c) => record_callbacks(state, &c.key, c.now, &c.outcomes),
        Command::Snapshot(c) => install_snapshot(c),
    }
}

/// Apply a sequence of commands in order.
pub fn replay(state: &State, commands: &[Command]) -> State {
    commands
        .iter()
        .fold(state.clone(), |current, command| apply(&current, command))
}

fn expiry_bytes(tick: Tick) -> Bytes {
    Bytes::copy_from_slice(&tick.to_le_bytes())
}

fn set_key_value(state: &State, command: &SetKeyValue) -> State {
    let mut next = state.clone();
    next.key_values
        .insert(command.key.clone(), command.value.clone());
    let ttl_key = time_to_live_key(&command.key);
    match command.expire_at {
        Some(tick) => {
            next.key_values.insert(ttl_key, expiry_bytes(tick));
        }
        None => {
            next.key_values.remove(&ttl_key);
        }
    }
    next
}

fn delete_key_value(state: &State, command: &DeleteKeyValue) -> State {
    let ttl_key = time_to_live_key(&command.key);
    if !state.key_values.contains_key(&command.key) && !state.key_values.contains_key(&ttl_key) {
        return state.clone();
    }
    let mut next = state.clone();
    next.key_values.remove(&command.key);
    next.key_values.remove(&ttl_key);
    next
}

fn set_hashset(state: &State, command: &SetHashset) -> State {
    let mut next = state.clone();
    let mut fields = next.hashsets.get(&command.key).cloned().unwrap_or_default();
    for (name, value) in command.fields.iter() {
        fields.insert(name.clone(), value.clone());
    }
    if let Some(tick) = command.expire_at {
        fields.insert(HASHSET_TTL_FIELD.to_string(), expiry_bytes(tick));
    }
    next.hashsets.insert(command.key.clone(), fields);
    next
}

fn delete_hashset(state: &State, command: &DeleteHashset) -> State {
    let Some(fields) = state.hashsets.get(&command.key) else {
        return state.clone();
    };
    let mut next = state.clone();
    match &command.field {
        None => {
            next.hashsets.remove(&command.key);
        }
        Some(field) => {
            let remaining = fields.without(field);
            if remaining.is_empty() {
                next.hashsets.remove(&command.key);
            } else {
                next.hashsets.insert(command.key.clone(), remaining);
            }
        }
    }
    next
}

fn push_queue_items(state: &State, items: &[PushQueueItem]) -> State {
    let mut next = state.clone();
    for item in items {
        let queue = next.queues.entry(item.key.clone()).or_insert_with(Vector::new);
        if queue.iter().any(|element| element.id == item.element_id) {
            debug!(queue = %item.key, element = %item.element_id, "duplicate push ignored");
            continue;
        }
        queue.push_back(item.to_element());
    }
    next
}

fn lease_queue_items(state: &State, command: &LeaseQueueItems) -> State {
    let Some(queue) = state.queues.get(&command.key) else {
        return state.clone();
    };
    let now = command.now;

    if !command.transaction_id.is_empty()
        && queue
            .iter()
            .any(|element| element.has_attempt_by(&command.transaction_id))
    {
        debug!(
            queue = %command.key,
            transaction = %command.transaction_id,
            "lease replay, no new attempts"
        );
        return state.clone();
    }

    let mut leased = 0u32;
    let mut kept = Vector::new();
    for element in queue.iter() {
        let element = close_if_timed_out(element, now);
        match status(&element, now) {
            ElementStatus::Finished => continue,
            ElementStatus::Available if leased < command.count => {
                leased += 1;
                kept.push_back(element.leased(now, &command.transaction_id));
            }
            _ => kept.push_back(element),
        }
    }

    debug!(queue = %command.key, leased, remaining = kept.len(), "leased queue elements");
    let mut next = state.clone();
    next.queues.insert(command.key.clone(), kept);
    next
}

/// Close a timed-out attempt with the synthetic timeout code, ending it at
/// `start + http_timeout`.
fn close_if_timed_out(element: &QueueElement, now: Tick) -> QueueElement {
    match (status(element, now), element.last_attempt()) {
        (ElementStatus::TimedOut, Some(last)) => {
            let end = last.start.saturating_add(element.http_timeout);
            element.with_last_attempt_closed(end, TIMEOUT_CODE)
        }
        _ => element.clone(),
    }
}

fn record_callbacks(state: &State, key: &str, now: Tick, outcomes: &[CallbackOutcome]) -> State {
    let Some(queue) = state.queues.get(key) else {
        return state.clone();
    };
    let mut queue = queue.clone();

    for outcome in outcomes {
        let Some(index) = queue
            .iter()
            .position(|element| element.id == outcome.element_id)
        else {
            continue;
        };

        if outcome.code == DELETE_ELEMENT_CODE {
            queue.remove(index);
            continue;
        }

        let element = &queue[index];
        if !element.last_attempt().is_some_and(|attempt| attempt.is_open()) {
            continue;
        }
        let closed = element.with_last_attempt_closed(now, outcome.code);
        queue.set(index, closed);
    }

    queue.retain(|element| status(element, now) != ElementStatus::Finished);

    let mut next = state.clone();
    next.queues.insert(key.to_string(), queue);
    next
}

fn install_snapshot(command: &Snapshot) -> State {
    debug!(state = %command.state, "installing snapshot");
    command.state.clone()
}
