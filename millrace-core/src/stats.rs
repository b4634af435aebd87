//! Online statistics and the end-of-run snapshot.
//!
//! The collector keeps only running aggregates while the run is live:
//! incremental per-queue means, running maxima, and flat sample lists for
//! the distributions summarized at the end. No per-event history is kept.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::queue::QueueId;
use crate::station::StationId;

/// Running aggregates for one queue.
#[derive(Debug, Clone, Default)]
struct QueueAccumulator {
    max_len: usize,
    mean_len: f64,
    samples: u64,
    waits: Vec<Duration>,
}

impl QueueAccumulator {
    /// Folds one length observation into the running mean and maximum.
    fn record_length(&mut self, len: usize) {
        if len > self.max_len {
            self.max_len = len;
        }
        let n = self.samples as f64;
        self.mean_len = (self.mean_len * n + len as f64) / (n + 1.0);
        self.samples += 1;
    }

    fn record_wait(&mut self, wait: Duration) {
        self.waits.push(wait);
    }
}

/// Collects running statistics over one simulation run.
#[derive(Debug, Clone)]
pub struct StatsCollector {
    queues: BTreeMap<QueueId, QueueAccumulator>,
    sojourn_times: Vec<Duration>,
    events_processed: u64,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector {
    /// Creates a collector with an accumulator for every wait point.
    pub fn new() -> Self {
        Self {
            queues: QueueId::ALL
                .iter()
                .map(|id| (*id, QueueAccumulator::default()))
                .collect(),
            sojourn_times: Vec::new(),
            events_processed: 0,
        }
    }

    /// Records one length observation for a queue.
    pub fn record_queue_length(&mut self, queue: QueueId, len: usize) {
        self.queues
            .entry(queue)
            .or_default()
            .record_length(len);
    }

    /// Records the realized wait of one dequeue.
    pub fn record_wait(&mut self, queue: QueueId, wait: Duration) {
        self.queues.entry(queue).or_default().record_wait(wait);
    }

    /// Records the total system time of one completed request.
    pub fn record_sojourn(&mut self, sojourn: Duration) {
        self.sojourn_times.push(sojourn);
    }

    /// Counts one processed calendar event.
    pub fn record_event(&mut self) {
        self.events_processed += 1;
    }

    /// Returns how many calendar events have been processed.
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Builds the per-queue reports for the snapshot.
    pub fn queue_reports(&self) -> BTreeMap<QueueId, QueueReport> {
        self.queues
            .iter()
            .map(|(id, acc)| {
                (
                    *id,
                    QueueReport {
                        max_len: acc.max_len,
                        mean_len: acc.mean_len,
                        samples: acc.samples,
                        wait: DurationSummary::from_samples(&acc.waits),
                    },
                )
            })
            .collect()
    }

    /// Summarizes the sojourn-time distribution.
    pub fn sojourn_summary(&self) -> DurationSummary {
        DurationSummary::from_samples(&self.sojourn_times)
    }
}

/// Five-number-free summary of a duration sample: min, max, mean, and
/// population standard deviation. All zero when the sample is empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DurationSummary {
    /// Smallest sample
    pub min: Duration,
    /// Largest sample
    pub max: Duration,
    /// Arithmetic mean
    pub mean: Duration,
    /// Population standard deviation
    pub std_dev: Duration,
    /// Number of samples summarized
    pub count: u64,
}

impl DurationSummary {
    /// Summarizes a flat sample list.
    pub fn from_samples(samples: &[Duration]) -> Self {
        if samples.is_empty() {
            return Self {
                min: Duration::ZERO,
                max: Duration::ZERO,
                mean: Duration::ZERO,
                std_dev: Duration::ZERO,
                count: 0,
            };
        }

        let min = *samples.iter().min().unwrap_or(&Duration::ZERO);
        let max = *samples.iter().max().unwrap_or(&Duration::ZERO);

        let n = samples.len() as f64;
        let mean_secs = samples.iter().map(Duration::as_secs_f64).sum::<f64>() / n;
        let variance = samples
            .iter()
            .map(|sample| {
                let delta = sample.as_secs_f64() - mean_secs;
                delta * delta
            })
            .sum::<f64>()
            / n;

        Self {
            min,
            max,
            mean: Duration::from_secs_f64(mean_secs),
            std_dev: Duration::from_secs_f64(variance.sqrt()),
            count: samples.len() as u64,
        }
    }
}

/// End-of-run figures for one queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueReport {
    /// Largest observed length
    pub max_len: usize,
    /// Mean of the discrete length samples
    pub mean_len: f64,
    /// How many length samples were taken
    pub samples: u64,
    /// Distribution of realized waits in this queue
    pub wait: DurationSummary,
}

/// End-of-run figures for one station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationReport {
    /// Completed services
    pub processed: u64,
    /// Cumulative realized service time
    pub busy_time: Duration,
    /// busy_time over total elapsed simulated time
    pub utilization: f64,
}

/// How completed requests split across the two routes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteSplit {
    /// Requests finished on the first-stage node
    pub local: u64,
    /// Requests transferred to the second-stage node
    pub remote: u64,
    /// Local share of completions, in percent; 0 with no completions
    pub local_percent: f64,
}

/// Read-only statistics snapshot of a simulation run.
///
/// Built on demand from the engine's running aggregates; taking the
/// snapshot twice without further events yields identical values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationStats {
    /// Seed the run was driven by
    pub seed: u64,
    /// Total elapsed simulated time
    pub total_time: Duration,
    /// Requests created by the arrival process
    pub generated: u64,
    /// Requests that completed service
    pub processed: u64,
    /// Requests rejected at admission
    pub lost: u64,
    /// lost / (processed + lost); 0 when nothing was generated
    pub loss_probability: f64,
    /// Calendar events dispatched
    pub events_processed: u64,
    /// Per-queue length and wait figures
    pub queues: BTreeMap<QueueId, QueueReport>,
    /// Distribution of total time in system
    pub sojourn: DurationSummary,
    /// Local/remote completion split
    pub routes: RouteSplit,
    /// Per-station service figures
    pub stations: BTreeMap<StationId, StationReport>,
}
