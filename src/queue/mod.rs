//! Queue element lifecycle and read-side queries
//!
//! [`lifecycle`] derives an element's state from its history. The helpers here
//! answer the questions consumers ask of a queue snapshot: how many elements
//! are in a given state, and which elements a transaction currently holds.

pub mod lifecycle;

pub use lifecycle::{status, ElementStatus};

use bytes::Bytes;
use im::Vector;

use crate::types::{QueueElement, Tick};

/// An element currently leased by a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeasedElement {
    pub id: String,
    pub data: Bytes,
    /// 1-based attempt number
    pub try_number: usize,
    /// No retry will follow this attempt
    pub is_last_try: bool,
}

impl LeasedElement {
    fn from_element(element: &QueueElement) -> Self {
        Self {
            id: element.id.clone(),
            data: element.value.clone(),
            try_number: element.try_count(),
            is_last_try: lifecycle::is_last_try(element),
        }
    }
}

/// Count elements whose status is in `statuses`, stopping at `maximum`.
pub fn count_elements(
    elements: &Vector<QueueElement>,
    now: Tick,
    statuses: &[ElementStatus],
    maximum: usize,
) -> usize {
    elements
        .iter()
        .filter(|element| statuses.contains(&status(element, now)))
        .take(maximum)
        .count()
}

/// Running elements whose current lease belongs to `transaction_id`, in queue order.
pub fn leased_by(elements: &Vector<QueueElement>, transaction_id: &str, now: Tick) -> Vec<LeasedElement> {
    elements
        .iter()
        .filter(|element| element.is_leased_by(transaction_id) && lifecycle::is_running(element, now))
        .map(LeasedElement::from_element)
        .collect()
}

/// Elements in `status` at `now`, in queue order.
pub fn elements_in(elements: &Vector<QueueElement>, wanted: ElementStatus, now: Tick) -> Vec<QueueElement> {
    elements
        .iter()
        .filter(|element| status(element, now) == wanted)
        .cloned()
        .collect()
}
