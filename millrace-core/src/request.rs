//! Request lifecycle record.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::queue::QueueId;

/// Identity of a request, assigned once at creation from a monotone counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestId(u64);

impl RequestId {
    /// Creates a request id from its raw counter value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two mutually exclusive routes a request takes after first-stage
/// primary processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    /// Finished on the first-stage node
    Local,
    /// Transferred over the channel to the second-stage node
    Remote,
}

impl Route {
    /// Returns the route label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Local => "local",
            Route::Remote => "remote",
        }
    }
}

/// A unit of work traversing the network from arrival to completion.
///
/// Timestamps are simulated time measured from run start. The route and
/// the finish stamp are each set at most once; the engine owns the request
/// exclusively while it is in flight and freezes it at completion.
#[derive(Debug, Clone)]
pub struct Request {
    id: RequestId,
    created_at: Duration,
    started_at: Option<Duration>,
    finished_at: Option<Duration>,
    route: Option<Route>,
    queue_waits: HashMap<QueueId, Duration>,
}

impl Request {
    /// Creates a request arriving at the given simulated time.
    pub fn new(id: RequestId, created_at: Duration) -> Self {
        Self {
            id,
            created_at,
            started_at: None,
            finished_at: None,
            route: None,
            queue_waits: HashMap::new(),
        }
    }

    /// Returns this request's identity.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Returns the arrival timestamp.
    pub fn created_at(&self) -> Duration {
        self.created_at
    }

    /// Returns when service first began, if it has.
    pub fn started_at(&self) -> Option<Duration> {
        self.started_at
    }

    /// Returns the completion timestamp, if the request has finished.
    pub fn finished_at(&self) -> Option<Duration> {
        self.finished_at
    }

    /// Returns the assigned route, if the branch point has been passed.
    pub fn route(&self) -> Option<Route> {
        self.route
    }

    /// Returns the wait experienced in each queue this request visited.
    pub fn queue_waits(&self) -> &HashMap<QueueId, Duration> {
        &self.queue_waits
    }

    /// Stamps the first service start; later starts leave the stamp alone.
    pub fn mark_started(&mut self, now: Duration) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    /// Assigns the route drawn at the branch point. Set at most once.
    pub fn assign_route(&mut self, route: Route) {
        debug_assert!(self.route.is_none(), "route assigned twice");
        self.route = Some(route);
    }

    /// Records the realized wait in one queue.
    pub fn record_wait(&mut self, queue: QueueId, wait: Duration) {
        self.queue_waits.insert(queue, wait);
    }

    /// Stamps completion. Set at most once.
    pub fn complete(&mut self, now: Duration) {
        debug_assert!(self.finished_at.is_none(), "request completed twice");
        self.finished_at = Some(now);
    }

    /// Total time in the system, defined only after completion.
    pub fn sojourn(&self) -> Option<Duration> {
        self.finished_at.map(|finished| finished - self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sojourn_undefined_in_flight() {
        let request = Request::new(RequestId::new(1), Duration::from_secs(5));
        assert_eq!(request.sojourn(), None);
    }

    #[test]
    fn test_sojourn_after_completion() {
        let mut request = Request::new(RequestId::new(1), Duration::from_secs(5));
        request.complete(Duration::from_secs(42));
        assert_eq!(request.sojourn(), Some(Duration::from_secs(37)));
    }

    #[test]
    fn test_started_stamp_is_first_start_only() {
        let mut request = Request::new(RequestId::new(2), Duration::ZERO);
        request.mark_started(Duration::from_secs(3));
        request.mark_started(Duration::from_secs(9));
        assert_eq!(request.started_at(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_queue_waits_keyed_per_queue() {
        let mut request = Request::new(RequestId::new(3), Duration::ZERO);
        request.record_wait(QueueId::Q1, Duration::from_secs(4));
        request.record_wait(QueueId::Channel, Duration::from_secs(1));
        assert_eq!(
            request.queue_waits().get(&QueueId::Q1),
            Some(&Duration::from_secs(4))
        );
        assert_eq!(request.queue_waits().len(), 2);
    }
}
