//! Event calendar: the time-ordered queue of pending transitions.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

use millrace_core::RequestId;

use crate::engine::SimulationError;

/// Maximum number of events that can be pending at once.
const MAX_PENDING_EVENTS: usize = 100_000;

/// The closed set of transitions the engine dispatches on.
///
/// Completion events carry the realized service duration, so releasing a
/// station never has to look anything up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A new request enters the system
    Arrival,
    /// First-stage primary processing finished
    FirstPrimaryDone {
        /// The request leaving the station
        request: RequestId,
        /// Realized service duration
        service: Duration,
    },
    /// First-stage final processing finished; the request completes
    FirstFinalDone {
        /// The request leaving the station
        request: RequestId,
        /// Realized service duration
        service: Duration,
    },
    /// Channel transfer finished; the request reaches the second stage
    ChannelDone {
        /// The request leaving the channel
        request: RequestId,
        /// Realized transfer duration
        service: Duration,
    },
    /// Second-stage primary processing finished
    SecondPrimaryDone {
        /// The request leaving the station
        request: RequestId,
        /// Realized service duration
        service: Duration,
    },
    /// Second-stage final processing finished; the request completes
    SecondFinalDone {
        /// The request leaving the station
        request: RequestId,
        /// Realized service duration
        service: Duration,
    },
}

impl EventKind {
    /// Returns the event label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Arrival => "arrival",
            EventKind::FirstPrimaryDone { .. } => "first-primary-done",
            EventKind::FirstFinalDone { .. } => "first-final-done",
            EventKind::ChannelDone { .. } => "channel-done",
            EventKind::SecondPrimaryDone { .. } => "second-primary-done",
            EventKind::SecondFinalDone { .. } => "second-final-done",
        }
    }
}

/// A scheduled transition.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    /// Insertion sequence number, the tie-break at equal timestamps
    pub seq: u64,
    /// When the transition fires
    pub at: Duration,
    /// What fires
    pub kind: EventKind,
}

impl Eq for Event {}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier timestamp first; equal timestamps replay in insertion
        // order so fixed seeds reproduce exactly.
        match self.at.cmp(&other.at) {
            Ordering::Equal => self.seq.cmp(&other.seq).reverse(),
            ordering => ordering.reverse(), // Reverse for min-heap behavior
        }
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Time-ordered queue of pending events.
///
/// Supports logarithmic insertion and minimum extraction. There is no
/// cancellation: once scheduled, an event always fires; a transition that
/// must not happen is simply never scheduled.
#[derive(Debug, Clone, Default)]
pub struct EventCalendar {
    heap: BinaryHeap<Event>,
    next_seq: u64,
    watermark: Duration,
}

impl EventCalendar {
    /// Creates an empty calendar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Inserts an event firing at `at`.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidSchedule` - `at` lies before the last
    ///   popped timestamp; handlers may never schedule into the past
    /// - `SimulationError::CalendarOverflow` - Too many events pending
    pub fn schedule(&mut self, at: Duration, kind: EventKind) -> Result<(), SimulationError> {
        if at < self.watermark {
            return Err(SimulationError::InvalidSchedule {
                at,
                now: self.watermark,
            });
        }

        if self.heap.len() >= MAX_PENDING_EVENTS {
            return Err(SimulationError::CalendarOverflow {
                pending: self.heap.len(),
            });
        }

        let event = Event {
            seq: self.next_seq,
            at,
            kind,
        };
        self.next_seq += 1;
        self.heap.push(event);

        Ok(())
    }

    /// Removes and returns the earliest pending event.
    pub fn pop_next(&mut self) -> Option<Event> {
        let event = self.heap.pop()?;
        self.watermark = event.at;
        Some(event)
    }
}
