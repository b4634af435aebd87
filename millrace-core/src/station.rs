//! Capacity-limited service stations.
//!
//! A station models one device of the network: a slot counter bounded by
//! its concurrency, a service-time distribution, and cumulative counters
//! feeding the utilization figures. "Parallel" capacity is purely the slot
//! counter; nothing here ever blocks.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::config::{SimulationConfig, TimeRange};
use crate::random::DeterministicRng;
use crate::request::{Request, RequestId};

/// Identity of every service station in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StationId {
    /// First-stage primary processing
    FirstPrimary,
    /// First-stage final processing
    FirstFinal,
    /// Transfer channel between the stages
    Channel,
    /// Second-stage primary processing
    SecondPrimary,
    /// Second-stage final processing
    SecondFinal,
}

impl StationId {
    /// Every station, in snapshot order.
    pub const ALL: [StationId; 5] = [
        StationId::FirstPrimary,
        StationId::FirstFinal,
        StationId::Channel,
        StationId::SecondPrimary,
        StationId::SecondFinal,
    ];

    /// Returns the station label used in logs and snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            StationId::FirstPrimary => "first-primary",
            StationId::FirstFinal => "first-final",
            StationId::Channel => "channel",
            StationId::SecondPrimary => "second-primary",
            StationId::SecondFinal => "second-final",
        }
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service-time distribution of a station.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ServiceTime {
    /// Every service takes exactly this long
    Fixed(Duration),
    /// Service duration sampled uniformly from the range
    Uniform(TimeRange),
}

impl ServiceTime {
    /// Samples one service duration.
    pub fn sample(&self, rng: &mut DeterministicRng) -> Duration {
        match self {
            ServiceTime::Fixed(duration) => *duration,
            ServiceTime::Uniform(range) => rng.duration_in(*range),
        }
    }
}

/// Outcome of admitting a request into a free station slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStart {
    /// When the service completes; the caller schedules this event
    pub ends_at: Duration,
    /// The sampled service duration, carried in the completion event
    pub service_time: Duration,
}

/// Errors raised by station operations.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StationError {
    /// Service was started on a station with no free slot. The caller must
    /// check availability first; hitting this is a programming error.
    #[error("Station {station} is at capacity ({capacity})")]
    CapacityExceeded {
        /// Which station was over-committed
        station: StationId,
        /// Its configured concurrency
        capacity: u32,
    },
}

/// A capacity-limited service station.
#[derive(Debug, Clone)]
pub struct Station {
    id: StationId,
    service: ServiceTime,
    capacity: u32,
    in_service: u32,
    processed: u64,
    busy_time: Duration,
    overflow: VecDeque<(Duration, RequestId)>,
}

impl Station {
    /// Creates a station with the given concurrency and distribution.
    pub fn new(id: StationId, service: ServiceTime, capacity: u32) -> Self {
        Self {
            id,
            service,
            capacity,
            in_service: 0,
            processed: 0,
            busy_time: Duration::ZERO,
            overflow: VecDeque::new(),
        }
    }

    /// Returns this station's identity.
    pub fn id(&self) -> StationId {
        self.id
    }

    /// Returns the configured concurrency.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns how many requests are in service right now.
    pub fn in_service(&self) -> u32 {
        self.in_service
    }

    /// Returns how many services have completed.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Returns the cumulative realized service time.
    pub fn busy_time(&self) -> Duration {
        self.busy_time
    }

    /// Returns true when a slot is free.
    pub fn is_available(&self) -> bool {
        self.in_service < self.capacity
    }

    /// Admits a request into a free slot and samples its service duration.
    ///
    /// Stamps the request's first service start. The returned completion
    /// time is for the caller to schedule; no event is created here.
    ///
    /// # Errors
    ///
    /// - `StationError::CapacityExceeded` - No slot is free; the caller
    ///   failed to check `is_available` first
    pub fn start_service(
        &mut self,
        request: &mut Request,
        now: Duration,
        rng: &mut DeterministicRng,
    ) -> Result<ServiceStart, StationError> {
        if !self.is_available() {
            return Err(StationError::CapacityExceeded {
                station: self.id,
                capacity: self.capacity,
            });
        }

        self.in_service += 1;
        request.mark_started(now);
        let service_time = self.service.sample(rng);

        Ok(ServiceStart {
            ends_at: now + service_time,
            service_time,
        })
    }

    /// Releases a slot after a completed service.
    ///
    /// Busy time accumulates the realized service duration carried by the
    /// completion event, not wall occupancy.
    pub fn finish_service(&mut self, service_time: Duration) {
        debug_assert!(self.in_service > 0, "finish on idle station {}", self.id);
        self.in_service -= 1;
        self.processed += 1;
        self.busy_time += service_time;
    }

    /// Parks a request that found every slot busy at the moment its feeder
    /// queue released it. Released FIFO as slots free up.
    pub fn enqueue_overflow(&mut self, id: RequestId, now: Duration) {
        self.overflow.push_back((now, id));
    }

    /// Takes the longest-waiting parked request, with its realized wait.
    pub fn dequeue_overflow(&mut self, now: Duration) -> Option<(RequestId, Duration)> {
        self.overflow
            .pop_front()
            .map(|(enqueued_at, id)| (id, now - enqueued_at))
    }

    /// Current length of the overflow queue.
    pub fn overflow_len(&self) -> usize {
        self.overflow.len()
    }

    /// Fraction of elapsed simulated time spent servicing requests.
    /// Defined as 0 when no time has elapsed.
    pub fn utilization(&self, elapsed: Duration) -> f64 {
        if elapsed.is_zero() {
            return 0.0;
        }
        self.busy_time.as_secs_f64() / elapsed.as_secs_f64()
    }
}

/// The five stations of the network, owned by the engine.
///
/// An explicit struct of named handles replaces any registry keyed by
/// station name; every lookup is an exhaustive match the compiler checks.
#[derive(Debug, Clone)]
pub struct StationPool {
    first_primary: Station,
    first_final: Station,
    channel: Station,
    second_primary: Station,
    second_final: Station,
}

impl StationPool {
    /// Builds the stations described by the configuration.
    pub fn new(config: &SimulationConfig) -> Self {
        let final_servers = if config.improved { 2 } else { 1 };

        Self {
            first_primary: Station::new(
                StationId::FirstPrimary,
                ServiceTime::Fixed(config.primary_service),
                1,
            ),
            first_final: Station::new(
                StationId::FirstFinal,
                ServiceTime::Uniform(config.final_service),
                final_servers,
            ),
            channel: Station::new(
                StationId::Channel,
                ServiceTime::Fixed(config.channel_transfer),
                1,
            ),
            second_primary: Station::new(
                StationId::SecondPrimary,
                ServiceTime::Fixed(config.primary_service),
                1,
            ),
            second_final: Station::new(
                StationId::SecondFinal,
                ServiceTime::Uniform(config.final_service),
                1,
            ),
        }
    }

    /// Returns the named station.
    pub fn station(&self, id: StationId) -> &Station {
        match id {
            StationId::FirstPrimary => &self.first_primary,
            StationId::FirstFinal => &self.first_final,
            StationId::Channel => &self.channel,
            StationId::SecondPrimary => &self.second_primary,
            StationId::SecondFinal => &self.second_final,
        }
    }

    /// Returns the named station for mutation.
    pub fn station_mut(&mut self, id: StationId) -> &mut Station {
        match id {
            StationId::FirstPrimary => &mut self.first_primary,
            StationId::FirstFinal => &mut self.first_final,
            StationId::Channel => &mut self.channel,
            StationId::SecondPrimary => &mut self.second_primary,
            StationId::SecondFinal => &mut self.second_final,
        }
    }

    /// Iterates the stations in snapshot order.
    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        StationId::ALL.iter().map(|id| self.station(*id))
    }
}
