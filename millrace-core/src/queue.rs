//! Waiting buffers feeding the service stations.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::request::RequestId;

/// Every wait point in the network where a request can sit.
///
/// `Q1`-`Q3` are the buffer queues ahead of the primary stations; the
/// remaining variants name the overflow queues owned by the channel and
/// the second-stage final station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueId {
    /// Intake buffer ahead of first-stage primary processing
    Q1,
    /// Buffer ahead of first-stage final processing
    Q2,
    /// Buffer ahead of second-stage primary processing
    Q3,
    /// Overflow queue of the transfer channel
    Channel,
    /// Overflow queue of the second-stage final station
    SecondFinal,
}

impl QueueId {
    /// Every wait point, in snapshot order.
    pub const ALL: [QueueId; 5] = [
        QueueId::Q1,
        QueueId::Q2,
        QueueId::Q3,
        QueueId::Channel,
        QueueId::SecondFinal,
    ];

    /// Returns the queue label used in logs and snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueId::Q1 => "q1",
            QueueId::Q2 => "q2",
            QueueId::Q3 => "q3",
            QueueId::Channel => "channel",
            QueueId::SecondFinal => "second-final",
        }
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// FIFO buffer of waiting requests, optionally capacity-bounded.
///
/// Entries remember when they were enqueued so the realized wait can be
/// recorded at dequeue time. A request appears in at most one queue at any
/// instant; the engine guarantees this by moving ids, never copying them.
#[derive(Debug, Clone)]
pub struct WaitQueue {
    id: QueueId,
    entries: VecDeque<(Duration, RequestId)>,
    capacity: Option<usize>,
}

impl WaitQueue {
    /// Creates an unbounded queue.
    pub fn new(id: QueueId) -> Self {
        Self {
            id,
            entries: VecDeque::new(),
            capacity: None,
        }
    }

    /// Creates a queue that rejects arrivals beyond `capacity`.
    pub fn bounded(id: QueueId, capacity: usize) -> Self {
        Self {
            id,
            entries: VecDeque::new(),
            capacity: Some(capacity),
        }
    }

    /// Returns which wait point this queue is.
    pub fn id(&self) -> QueueId {
        self.id
    }

    /// Current number of waiting requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true when a bounded queue cannot admit another request.
    pub fn is_full(&self) -> bool {
        self.capacity
            .is_some_and(|capacity| self.entries.len() >= capacity)
    }

    /// Appends a request at the tail. The caller checks `is_full` first;
    /// a rejected arrival is counted as a loss, not enqueued.
    pub fn push(&mut self, now: Duration, id: RequestId) {
        debug_assert!(!self.is_full(), "push into full queue {}", self.id);
        self.entries.push_back((now, id));
    }

    /// Removes the head request, returning it with its realized wait.
    pub fn pop(&mut self, now: Duration) -> Option<(RequestId, Duration)> {
        self.entries
            .pop_front()
            .map(|(enqueued_at, id)| (id, now - enqueued_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order_and_wait() {
        let mut queue = WaitQueue::new(QueueId::Q1);
        queue.push(Duration::from_secs(1), RequestId::new(1));
        queue.push(Duration::from_secs(2), RequestId::new(2));

        let (first, wait) = queue.pop(Duration::from_secs(5)).unwrap();
        assert_eq!(first, RequestId::new(1));
        assert_eq!(wait, Duration::from_secs(4));

        let (second, wait) = queue.pop(Duration::from_secs(5)).unwrap();
        assert_eq!(second, RequestId::new(2));
        assert_eq!(wait, Duration::from_secs(3));

        assert!(queue.pop(Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_bounded_queue_reports_full() {
        let mut queue = WaitQueue::bounded(QueueId::Q1, 2);
        assert!(!queue.is_full());

        queue.push(Duration::ZERO, RequestId::new(1));
        queue.push(Duration::ZERO, RequestId::new(2));
        assert!(queue.is_full());

        queue.pop(Duration::from_secs(1));
        assert!(!queue.is_full());
    }

    #[test]
    fn test_unbounded_queue_never_full() {
        let mut queue = WaitQueue::new(QueueId::Q2);
        for i in 0..1000 {
            queue.push(Duration::ZERO, RequestId::new(i));
        }
        assert!(!queue.is_full());
        assert_eq!(queue.len(), 1000);
    }
}
