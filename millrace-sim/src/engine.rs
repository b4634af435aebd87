//! Simulation engine: the run loop over the routing pipeline.
//!
//! One `Simulation` owns everything a run needs: the calendar, the clock,
//! the station pool, the buffer queues, the in-flight requests, and the
//! statistics collector. Nothing is shared across runs.

use std::collections::HashMap;
use std::time::Duration;

use millrace_core::config::ConfigError;
use millrace_core::station::StationError;
use millrace_core::{
    DeterministicRng, QueueId, Request, RequestId, Route, RouteSplit, SimulationConfig,
    SimulationStats, StationId, StationPool, StationReport, StatsCollector, WaitQueue,
};

use crate::calendar::{EventCalendar, EventKind};
use crate::clock::SimClock;

/// Errors that can occur while building or driving a simulation.
///
/// Apart from the configuration wrapper, every variant is a violated
/// engine invariant: none of them can fire on a well-formed run, and any
/// of them firing points at a bug, not at modeled behavior. Rejected
/// admissions are counted losses, never errors.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SimulationError {
    /// The configuration failed validation; no state was built
    #[error("Configuration rejected: {0}")]
    Config(#[from] ConfigError),

    /// A station was over-committed
    #[error("Station fault: {0}")]
    Station(#[from] StationError),

    /// An event was scheduled before the current simulated time
    #[error("Event at {at:?} scheduled before current time {now:?}")]
    InvalidSchedule {
        /// Requested firing time
        at: Duration,
        /// The calendar's current watermark
        now: Duration,
    },

    /// The clock was asked to move backwards
    #[error("Clock cannot move backwards from {from:?} to {to:?}")]
    TimeReversal {
        /// Current simulated time
        from: Duration,
        /// Requested target time
        to: Duration,
    },

    /// Too many events pending at once
    #[error("Event calendar overflow: {pending} events pending")]
    CalendarOverflow {
        /// Number of pending events at the time of the failure
        pending: usize,
    },

    /// A completion event named a request the engine is not tracking
    #[error("Request {id} is not in flight")]
    UnknownRequest {
        /// The id the event carried
        id: RequestId,
    },

    /// The calendar drained while the books do not balance
    #[error(
        "Calendar drained with unexplained shortfall: \
         generated {generated}, processed {processed}, lost {lost}, target {target}"
    )]
    IncompleteRun {
        /// Requests created by the arrival process
        generated: u64,
        /// Requests that completed
        processed: u64,
        /// Requests rejected at admission
        lost: u64,
        /// Configured request target
        target: u64,
    },
}

/// Discrete-event simulation of the two-node processing network.
///
/// Constructed fresh per run from a validated configuration. `run` drives
/// the calendar to completion; `statistics` can be taken at any point and
/// is idempotent between events.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    clock: SimClock,
    rng: DeterministicRng,
    calendar: EventCalendar,
    stations: StationPool,
    q1: WaitQueue,
    q2: WaitQueue,
    q3: WaitQueue,
    in_flight: HashMap<RequestId, Request>,
    finished: Vec<Request>,
    next_request_id: u64,
    generated: u64,
    processed: u64,
    lost: u64,
    local_completed: u64,
    remote_completed: u64,
    stats: StatsCollector,
    last_sample_at: Duration,
}

impl Simulation {
    /// Builds a simulation from the given configuration.
    ///
    /// # Errors
    ///
    /// - `SimulationError::Config` - The configuration failed validation
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let q1 = match config.q1_capacity {
            Some(capacity) => WaitQueue::bounded(QueueId::Q1, capacity),
            None => WaitQueue::new(QueueId::Q1),
        };

        Ok(Self {
            stations: StationPool::new(&config),
            rng: DeterministicRng::from_seed(config.seed),
            config,
            clock: SimClock::new(),
            calendar: EventCalendar::new(),
            q1,
            q2: WaitQueue::new(QueueId::Q2),
            q3: WaitQueue::new(QueueId::Q3),
            in_flight: HashMap::new(),
            finished: Vec::new(),
            next_request_id: 1,
            generated: 0,
            processed: 0,
            lost: 0,
            local_completed: 0,
            remote_completed: 0,
            stats: StatsCollector::new(),
            last_sample_at: Duration::ZERO,
        })
    }

    /// Returns the configuration this run was built from.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Returns current simulated time.
    pub fn current_time(&self) -> Duration {
        self.clock.now()
    }

    /// Completed requests, frozen at completion, in completion order.
    pub fn finished_requests(&self) -> &[Request] {
        &self.finished
    }

    /// Drives the run until the processed target is met or the calendar
    /// drains, then returns the statistics snapshot.
    ///
    /// # Errors
    ///
    /// - `SimulationError::IncompleteRun` - The calendar drained while the
    ///   accounting identity `processed + lost == generated` is broken or
    ///   arrivals never reached the target; this flags an engine bug
    /// - Any other variant - A violated engine invariant, see [`SimulationError`]
    pub fn run(&mut self) -> Result<SimulationStats, SimulationError> {
        let target = u64::from(self.config.total_requests);

        tracing::info!(
            target_requests = target,
            seed = self.rng.seed(),
            improved = self.config.improved,
            q1_capacity = ?self.config.q1_capacity,
            "starting simulation run"
        );

        if self.generated == 0 && self.calendar.is_empty() {
            let first = self.rng.duration_in(self.config.interarrival);
            self.calendar.schedule(first, EventKind::Arrival)?;
        }

        while self.processed < target {
            let Some(event) = self.calendar.pop_next() else {
                break;
            };

            self.clock.advance_to(event.at)?;
            self.stats.record_event();
            tracing::trace!(at = ?event.at, kind = event.kind.as_str(), "dispatching event");

            match event.kind {
                EventKind::Arrival => self.handle_arrival()?,
                EventKind::FirstPrimaryDone { request, service } => {
                    self.handle_first_primary_done(request, service)?;
                }
                EventKind::FirstFinalDone { request, service } => {
                    self.handle_first_final_done(request, service)?;
                }
                EventKind::ChannelDone { request, service } => {
                    self.handle_channel_done(request, service)?;
                }
                EventKind::SecondPrimaryDone { request, service } => {
                    self.handle_second_primary_done(request, service)?;
                }
                EventKind::SecondFinalDone { request, service } => {
                    self.handle_second_final_done(request, service)?;
                }
            }

            self.sample_periodically();
        }

        self.sample_queue_lengths();

        tracing::info!(
            elapsed = ?self.clock.now(),
            generated = self.generated,
            processed = self.processed,
            lost = self.lost,
            events = self.stats.events_processed(),
            "simulation run finished"
        );

        if self.generated < target || self.processed + self.lost != self.generated {
            return Err(SimulationError::IncompleteRun {
                generated: self.generated,
                processed: self.processed,
                lost: self.lost,
                target,
            });
        }

        Ok(self.statistics())
    }

    /// Builds the read-only statistics snapshot from the running
    /// aggregates. Station utilization is computed here, once, from
    /// cumulative busy time over elapsed simulated time.
    pub fn statistics(&self) -> SimulationStats {
        let elapsed = self.clock.now();
        let attempted = self.processed + self.lost;

        let loss_probability = if attempted == 0 {
            0.0
        } else {
            self.lost as f64 / attempted as f64
        };

        let local_percent = if self.processed == 0 {
            0.0
        } else {
            self.local_completed as f64 / self.processed as f64 * 100.0
        };

        let stations = self
            .stations
            .iter()
            .map(|station| {
                (
                    station.id(),
                    StationReport {
                        processed: station.processed(),
                        busy_time: station.busy_time(),
                        utilization: station.utilization(elapsed),
                    },
                )
            })
            .collect();

        SimulationStats {
            seed: self.rng.seed(),
            total_time: elapsed,
            generated: self.generated,
            processed: self.processed,
            lost: self.lost,
            loss_probability,
            events_processed: self.stats.events_processed(),
            queues: self.stats.queue_reports(),
            sojourn: self.stats.sojourn_summary(),
            routes: RouteSplit {
                local: self.local_completed,
                remote: self.remote_completed,
                local_percent,
            },
            stations,
        }
    }

    /// A new request enters the system and the next arrival is scheduled.
    fn handle_arrival(&mut self) -> Result<(), SimulationError> {
        let now = self.clock.now();
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        self.generated += 1;

        if self.q1.is_full() {
            // Counted outcome, not an error; the request never enters
            // the in-flight set.
            self.lost += 1;
            tracing::warn!(request = %id, "intake queue full, request lost");
        } else {
            self.in_flight.insert(id, Request::new(id, now));
            self.q1.push(now, id);
            self.sample_queue_lengths();
            self.try_dispatch_first_primary()?;
        }

        if self.generated < u64::from(self.config.total_requests) {
            let spacing = self.rng.duration_in(self.config.interarrival);
            self.calendar.schedule(now + spacing, EventKind::Arrival)?;
        }

        Ok(())
    }

    /// The branch point: the primary station is released and the route is
    /// drawn; local requests queue for first-stage final processing,
    /// remote requests head for the channel.
    fn handle_first_primary_done(
        &mut self,
        id: RequestId,
        service: Duration,
    ) -> Result<(), SimulationError> {
        let now = self.clock.now();
        self.stations
            .station_mut(StationId::FirstPrimary)
            .finish_service(service);

        let route = if self.rng.sample_probability(self.config.p_local) {
            Route::Local
        } else {
            Route::Remote
        };

        let request = self
            .in_flight
            .get_mut(&id)
            .ok_or(SimulationError::UnknownRequest { id })?;
        request.assign_route(route);
        tracing::debug!(request = %id, route = route.as_str(), "routed after first-stage primary");

        match route {
            Route::Local => {
                self.q2.push(now, id);
                self.sample_queue_lengths();
                self.try_dispatch_first_final()?;
            }
            Route::Remote => {
                if self.stations.station(StationId::Channel).is_available() {
                    self.start_channel_transfer(id)?;
                } else {
                    self.stations
                        .station_mut(StationId::Channel)
                        .enqueue_overflow(id, now);
                }
            }
        }

        self.try_dispatch_first_primary()
    }

    /// First-stage final processing finished: the request completes and
    /// the freed slot is offered to the next waiter.
    fn handle_first_final_done(
        &mut self,
        id: RequestId,
        service: Duration,
    ) -> Result<(), SimulationError> {
        self.stations
            .station_mut(StationId::FirstFinal)
            .finish_service(service);
        self.complete_request(id)?;
        self.try_dispatch_first_final()
    }

    /// The channel frees: the next queued transfer starts and the carried
    /// request joins the second-stage intake queue.
    fn handle_channel_done(
        &mut self,
        id: RequestId,
        service: Duration,
    ) -> Result<(), SimulationError> {
        let now = self.clock.now();
        self.stations
            .station_mut(StationId::Channel)
            .finish_service(service);

        if let Some((next, wait)) = self
            .stations
            .station_mut(StationId::Channel)
            .dequeue_overflow(now)
        {
            self.stats.record_wait(QueueId::Channel, wait);
            self.in_flight
                .get_mut(&next)
                .ok_or(SimulationError::UnknownRequest { id: next })?
                .record_wait(QueueId::Channel, wait);
            self.start_channel_transfer(next)?;
        }

        self.q3.push(now, id);
        self.sample_queue_lengths();
        self.try_dispatch_second_primary()
    }

    /// Second-stage primary processing finished: the request moves to the
    /// final station, parking in its overflow queue when both paths are
    /// capacity-constrained at once.
    fn handle_second_primary_done(
        &mut self,
        id: RequestId,
        service: Duration,
    ) -> Result<(), SimulationError> {
        let now = self.clock.now();
        self.stations
            .station_mut(StationId::SecondPrimary)
            .finish_service(service);

        if self.stations.station(StationId::SecondFinal).is_available() {
            self.start_second_final(id)?;
        } else {
            self.stations
                .station_mut(StationId::SecondFinal)
                .enqueue_overflow(id, now);
        }

        self.try_dispatch_second_primary()
    }

    /// Second-stage final processing finished: the request completes and
    /// the freed slot takes the longest-parked waiter.
    fn handle_second_final_done(
        &mut self,
        id: RequestId,
        service: Duration,
    ) -> Result<(), SimulationError> {
        let now = self.clock.now();
        self.stations
            .station_mut(StationId::SecondFinal)
            .finish_service(service);
        self.complete_request(id)?;

        if let Some((next, wait)) = self
            .stations
            .station_mut(StationId::SecondFinal)
            .dequeue_overflow(now)
        {
            self.stats.record_wait(QueueId::SecondFinal, wait);
            self.in_flight
                .get_mut(&next)
                .ok_or(SimulationError::UnknownRequest { id: next })?
                .record_wait(QueueId::SecondFinal, wait);
            self.start_second_final(next)?;
        }

        Ok(())
    }

    /// Greedy dispatch from the intake queue into first-stage primary.
    fn try_dispatch_first_primary(&mut self) -> Result<(), SimulationError> {
        let now = self.clock.now();

        while self
            .stations
            .station(StationId::FirstPrimary)
            .is_available()
        {
            let Some((id, wait)) = self.q1.pop(now) else {
                break;
            };

            self.stats.record_wait(QueueId::Q1, wait);
            let request = self
                .in_flight
                .get_mut(&id)
                .ok_or(SimulationError::UnknownRequest { id })?;
            request.record_wait(QueueId::Q1, wait);

            let start = self
                .stations
                .station_mut(StationId::FirstPrimary)
                .start_service(request, now, &mut self.rng)?;
            self.calendar.schedule(
                start.ends_at,
                EventKind::FirstPrimaryDone {
                    request: id,
                    service: start.service_time,
                },
            )?;
            self.sample_queue_lengths();
        }

        Ok(())
    }

    /// Greedy dispatch from Q2 into first-stage final processing. Fills
    /// every free slot, so the two-server configuration never idles a
    /// server while the queue is nonempty.
    fn try_dispatch_first_final(&mut self) -> Result<(), SimulationError> {
        let now = self.clock.now();

        while self.stations.station(StationId::FirstFinal).is_available() {
            let Some((id, wait)) = self.q2.pop(now) else {
                break;
            };

            self.stats.record_wait(QueueId::Q2, wait);
            let request = self
                .in_flight
                .get_mut(&id)
                .ok_or(SimulationError::UnknownRequest { id })?;
            request.record_wait(QueueId::Q2, wait);

            let start = self
                .stations
                .station_mut(StationId::FirstFinal)
                .start_service(request, now, &mut self.rng)?;
            self.calendar.schedule(
                start.ends_at,
                EventKind::FirstFinalDone {
                    request: id,
                    service: start.service_time,
                },
            )?;
            self.sample_queue_lengths();
        }

        Ok(())
    }

    /// Greedy dispatch from Q3 into second-stage primary.
    fn try_dispatch_second_primary(&mut self) -> Result<(), SimulationError> {
        let now = self.clock.now();

        while self
            .stations
            .station(StationId::SecondPrimary)
            .is_available()
        {
            let Some((id, wait)) = self.q3.pop(now) else {
                break;
            };

            self.stats.record_wait(QueueId::Q3, wait);
            let request = self
                .in_flight
                .get_mut(&id)
                .ok_or(SimulationError::UnknownRequest { id })?;
            request.record_wait(QueueId::Q3, wait);

            let start = self
                .stations
                .station_mut(StationId::SecondPrimary)
                .start_service(request, now, &mut self.rng)?;
            self.calendar.schedule(
                start.ends_at,
                EventKind::SecondPrimaryDone {
                    request: id,
                    service: start.service_time,
                },
            )?;
            self.sample_queue_lengths();
        }

        Ok(())
    }

    /// Admits a request onto the channel and schedules the transfer end.
    fn start_channel_transfer(&mut self, id: RequestId) -> Result<(), SimulationError> {
        let now = self.clock.now();
        let request = self
            .in_flight
            .get_mut(&id)
            .ok_or(SimulationError::UnknownRequest { id })?;

        let start = self
            .stations
            .station_mut(StationId::Channel)
            .start_service(request, now, &mut self.rng)?;
        self.calendar.schedule(
            start.ends_at,
            EventKind::ChannelDone {
                request: id,
                service: start.service_time,
            },
        )
    }

    /// Admits a request into second-stage final processing.
    fn start_second_final(&mut self, id: RequestId) -> Result<(), SimulationError> {
        let now = self.clock.now();
        let request = self
            .in_flight
            .get_mut(&id)
            .ok_or(SimulationError::UnknownRequest { id })?;

        let start = self
            .stations
            .station_mut(StationId::SecondFinal)
            .start_service(request, now, &mut self.rng)?;
        self.calendar.schedule(
            start.ends_at,
            EventKind::SecondFinalDone {
                request: id,
                service: start.service_time,
            },
        )
    }

    /// Finalizes a request: finish stamp, route tally, sojourn sample,
    /// move from the in-flight set to the finished list.
    fn complete_request(&mut self, id: RequestId) -> Result<(), SimulationError> {
        let now = self.clock.now();
        let mut request = self
            .in_flight
            .remove(&id)
            .ok_or(SimulationError::UnknownRequest { id })?;

        request.complete(now);
        let sojourn = now - request.created_at();
        self.stats.record_sojourn(sojourn);

        match request.route() {
            Some(Route::Local) => self.local_completed += 1,
            Some(Route::Remote) => self.remote_completed += 1,
            None => {}
        }

        self.processed += 1;
        tracing::debug!(request = %id, sojourn = ?sojourn, "request completed");
        self.finished.push(request);

        Ok(())
    }

    /// Samples the length of every buffer queue.
    fn sample_queue_lengths(&mut self) {
        self.stats.record_queue_length(QueueId::Q1, self.q1.len());
        self.stats.record_queue_length(QueueId::Q2, self.q2.len());
        self.stats.record_queue_length(QueueId::Q3, self.q3.len());
    }

    /// Takes the wall-clock-of-simulation sample once per configured
    /// interval, independent of queue activity.
    fn sample_periodically(&mut self) {
        let now = self.clock.now();
        if now - self.last_sample_at >= self.config.sample_interval {
            self.sample_queue_lengths();
            self.last_sample_at = now;
        }
    }
}
