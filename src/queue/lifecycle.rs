//! Derived lifecycle of a queue element.
//!
//! An element's state is never stored. It is recomputed from the attempt
//! history, the retry schedule, the retryable codes and a caller-supplied
//! `now`, so every replica evaluating the same element at the same tick
//! reaches the same answer.

use std::fmt;

use crate::types::{QueueElement, Tick};

/// Logical state of a queue element at a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementStatus {
    /// Can be leased
    Available,
    /// Leased and within its visibility timeout
    Running,
    /// Leased but the visibility timeout elapsed without a callback
    TimedOut,
    /// Failed with a retryable outcome, waiting out its retry delay
    WaitingForRetry,
    /// Done; removed by the next pop or callback on its queue
    Finished,
}

impl fmt::Display for ElementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementStatus::Available => "available",
            ElementStatus::Running => "running",
            ElementStatus::TimedOut => "timed-out",
            ElementStatus::WaitingForRetry => "waiting-for-retry",
            ElementStatus::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Derive the status of `element` at `now`.
///
/// Precedence is Finished, Running, TimedOut, WaitingForRetry, Available.
/// Retries are exhausted once the attempt count exceeds the length of the
/// retry schedule; the delay after attempt `n` is `timeout_retries[n - 1]`,
/// counted from the attempt's end.
pub fn status(element: &QueueElement, now: Tick) -> ElementStatus {
    let Some(last) = element.last_attempt() else {
        return ElementStatus::Available;
    };
    let tries = element.attempts.len();
    let exhausted = tries > element.timeout_retries.len();

    match last.end {
        None => {
            if now.saturating_sub(last.start) < element.http_timeout {
                ElementStatus::Running
            } else if exhausted {
                ElementStatus::Finished
            } else {
                ElementStatus::TimedOut
            }
        }
        Some(end) => {
            if exhausted || !element.retryable_codes.contains(&last.outcome) {
                return ElementStatus::Finished;
            }
            let delay = element.timeout_retries[tries - 1];
            if now.saturating_sub(end) < delay {
                ElementStatus::WaitingForRetry
            } else {
                ElementStatus::Available
            }
        }
    }
}

pub fn is_available(element: &QueueElement, now: Tick) -> bool {
    status(element, now) == ElementStatus::Available
}

pub fn is_running(element: &QueueElement, now: Tick) -> bool {
    status(element, now) == ElementStatus::Running
}

pub fn is_timed_out(element: &QueueElement, now: Tick) -> bool {
    status(element, now) == ElementStatus::TimedOut
}

pub fn is_waiting_for_retry(element: &QueueElement, now: Tick) -> bool {
    status(element, now) == ElementStatus::WaitingForRetry
}

pub fn is_finished(element: &QueueElement, now: Tick) -> bool {
    status(element, now) == ElementStatus::Finished
}

/// Whether the latest attempt is the last one the schedule permits.
pub fn is_last_try(element: &QueueElement) -> bool {
    element.attempts.len() > element.timeout_retries.len()
}
