//! Millrace Core - model vocabulary for a distributed data-processing network.
//!
//! This crate provides the building blocks the simulation engine is driven
//! by: run configuration and validation, the request lifecycle record,
//! capacity-limited service stations, waiting buffers, deterministic random
//! sampling, and online statistics with a serializable snapshot.
//!
//! The modeled network is a two-node system: requests arrive at the
//! first-stage node, receive primary processing, and are then either
//! finished locally or transferred over a single channel to the
//! second-stage node for the same primary/final treatment.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]

pub mod config;
pub mod queue;
pub mod random;
pub mod request;
pub mod station;
pub mod stats;

// Re-export main types for convenient access
pub use config::{ConfigError, SimulationConfig, TimeRange};
pub use queue::{QueueId, WaitQueue};
pub use random::DeterministicRng;
pub use request::{Request, RequestId, Route};
pub use station::{ServiceStart, ServiceTime, Station, StationError, StationId, StationPool};
pub use stats::{
    DurationSummary, QueueReport, RouteSplit, SimulationStats, StationReport, StatsCollector,
};
