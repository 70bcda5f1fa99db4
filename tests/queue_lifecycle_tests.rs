//! End-to-end queue lease scenarios driven through the interpreter.

use bytes::Bytes;
use pretty_assertions::assert_eq;
use std::collections::HashSet;

use raft_store::command::{
    CallbackOutcome, Command, LeaseQueueItems, PushQueueItem, PushQueueItemBatch, RecordCallback,
    RecordCallbackBatch,
};
use raft_store::queue::{count_elements, leased_by, status, ElementStatus};
use raft_store::raft::{apply, replay};
use raft_store::types::{State, Tick, DELETE_ELEMENT_CODE, TIMEOUT_CODE};

const QUEUE: &str = "fn-echo";

fn push(id: &str, now: Tick) -> PushQueueItem {
    PushQueueItem::new(QUEUE, id, Bytes::from(format!("body-{id}")), now, 100)
        .retries([50])
        .retryable_codes([500, 504])
}

fn pop(count: u32, now: Tick, transaction_id: &str) -> Command {
    LeaseQueueItems::new(QUEUE, count, now, transaction_id).into()
}

fn with_elements(count: usize) -> State {
    let items = (0..count).map(|i| push(&format!("e{i}"), 0)).collect();
    apply(&State::new(), &PushQueueItemBatch { items }.into())
}

fn leased_ids(state: &State, transaction_id: &str, now: Tick) -> HashSet<String> {
    leased_by(&state.queue(QUEUE), transaction_id, now)
        .into_iter()
        .map(|leased| leased.id)
        .collect()
}

#[test]
fn idempotent_push_keeps_first_payload() {
    let first = push("dup", 0);
    let mut second = push("dup", 5);
    second.value = Bytes::from_static(b"other");

    let state = replay(&State::new(), &[first.into(), second.into()]);
    let queue = state.queue(QUEUE);
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].value, Bytes::from_static(b"body-dup"));
    assert_eq!(queue[0].insert_tick, 0);
}

#[test]
fn lease_exclusivity() {
    let state = with_elements(5);

    let state = apply(&state, &pop(3, 10, "tx-a"));
    let first = leased_ids(&state, "tx-a", 10);
    assert_eq!(first.len(), 3);

    let state = apply(&state, &pop(3, 11, "tx-b"));
    let second = leased_ids(&state, "tx-b", 11);
    assert_eq!(second.len(), 2);
    assert!(first.is_disjoint(&second));

    let running = count_elements(&state.queue(QUEUE), 11, &[ElementStatus::Running], usize::MAX);
    assert_eq!(running, 5);
}

#[test]
fn lease_takes_elements_in_insertion_order() {
    let state = apply(&with_elements(4), &pop(2, 1, "tx"));
    let leased: Vec<String> = leased_by(&state.queue(QUEUE), "tx", 1)
        .into_iter()
        .map(|leased| leased.id)
        .collect();
    assert_eq!(leased, vec!["e0", "e1"]);
}

#[test]
fn idempotent_pop_replay() {
    let state = apply(&with_elements(4), &pop(2, 10, "tx-a"));
    let before = leased_ids(&state, "tx-a", 10);

    let replayed = apply(&state, &pop(2, 12, "tx-a"));
    assert_eq!(replayed, state);
    assert_eq!(leased_ids(&replayed, "tx-a", 12), before);
}

#[test]
fn pop_replay_after_callback_is_still_a_noop() {
    let state = replay(
        &with_elements(2),
        &[pop(1, 0, "tx-a"), RecordCallback::new(QUEUE, "e0", 500, 5).into()],
    );
    // tx-a owns a closed attempt, so a retried pop must not lease e1
    let replayed = apply(&state, &pop(1, 6, "tx-a"));
    assert_eq!(replayed, state);
}

#[test]
fn empty_transaction_id_always_leases() {
    let state = replay(&with_elements(2), &[pop(1, 0, ""), pop(1, 1, "")]);
    let running = count_elements(&state.queue(QUEUE), 1, &[ElementStatus::Running], usize::MAX);
    assert_eq!(running, 2);
}

#[test]
fn timeout_retry_then_finish() {
    let state = apply(&with_elements(1), &pop(1, 0, "tx-1"));
    let element = |state: &State| state.queue(QUEUE)[0].clone();

    assert_eq!(status(&element(&state), 99), ElementStatus::Running);
    assert_eq!(status(&element(&state), 100), ElementStatus::TimedOut);

    // a pop at 120 closes the timed-out attempt at 100 and leases nothing
    let state = apply(&state, &pop(1, 120, "tx-2"));
    let first = element(&state);
    assert_eq!(first.attempts.len(), 1);
    assert_eq!(first.attempts[0].end, Some(100));
    assert_eq!(first.attempts[0].outcome, TIMEOUT_CODE);
    assert_eq!(status(&first, 120), ElementStatus::WaitingForRetry);
    assert_eq!(status(&first, 150), ElementStatus::Available);

    // second lease once the retry window elapsed
    let state = apply(&state, &pop(1, 150, "tx-3"));
    assert_eq!(leased_ids(&state, "tx-3", 150).len(), 1);
    assert_eq!(status(&element(&state), 250), ElementStatus::Finished);

    // the next queue-touching command evicts it
    let state = apply(&state, &pop(1, 250, "tx-4"));
    assert!(state.queue(QUEUE).is_empty());
}

#[test]
fn non_retryable_callback_finishes_immediately() {
    let state = apply(&with_elements(1), &pop(1, 0, "tx"));
    let state = apply(&state, &RecordCallback::new(QUEUE, "e0", 404, 10).into());
    assert!(state.queue(QUEUE).is_empty());
}

#[test]
fn successful_callback_finishes() {
    let state = apply(&with_elements(2), &pop(2, 0, "tx"));
    let state = apply(&state, &RecordCallback::new(QUEUE, "e1", 200, 10).into());
    let ids: Vec<String> = state.queue(QUEUE).iter().map(|e| e.id.clone()).collect();
    assert_eq!(ids, vec!["e0"]);
}

#[test]
fn retryable_callback_waits_then_returns() {
    let state = apply(&with_elements(1), &pop(1, 0, "tx-1"));
    let state = apply(&state, &RecordCallback::new(QUEUE, "e0", 500, 20).into());
    assert_eq!(status(&state.queue(QUEUE)[0], 30), ElementStatus::WaitingForRetry);

    // still waiting at 69, nothing to lease
    let early = apply(&state, &pop(1, 69, "tx-2"));
    assert!(leased_ids(&early, "tx-2", 69).is_empty());

    let late = apply(&state, &pop(1, 70, "tx-2"));
    let leased = leased_by(&late.queue(QUEUE), "tx-2", 70);
    assert_eq!(leased.len(), 1);
    assert_eq!(leased[0].try_number, 2);
    assert!(leased[0].is_last_try);
}

#[test]
fn delete_code_removes_running_element() {
    let state = apply(&with_elements(2), &pop(2, 0, "tx"));
    let state = apply(
        &state,
        &RecordCallbackBatch {
            key: QUEUE.to_string(),
            now: 5,
            outcomes: vec![
                CallbackOutcome::new("e0", DELETE_ELEMENT_CODE),
                CallbackOutcome::new("missing", 200),
            ],
        }
        .into(),
    );
    let ids: Vec<String> = state.queue(QUEUE).iter().map(|e| e.id.clone()).collect();
    assert_eq!(ids, vec!["e1"]);
}

#[test]
fn semantic_noops_leave_state_unchanged() {
    let state = with_elements(1);
    let commands: [Command; 3] = [
        LeaseQueueItems::new("absent", 3, 0, "tx").into(),
        RecordCallback::new("absent", "e0", 200, 0).into(),
        RecordCallback::new(QUEUE, "unknown", 200, 0).into(),
    ];
    for command in &commands {
        assert_eq!(apply(&state, command), state, "{command} changed state");
    }
}

#[test]
fn readers_keep_their_snapshot() {
    let before = apply(&with_elements(1), &pop(1, 0, "tx"));
    let after = apply(&before, &RecordCallback::new(QUEUE, "e0", 500, 10).into());

    // the earlier value still shows the attempt open
    assert!(before.queue(QUEUE)[0].attempts[0].is_open());
    assert!(!after.queue(QUEUE)[0].attempts[0].is_open());
}
