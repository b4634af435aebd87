//! Millrace Sim - discrete-event engine for the data-processing network.
//!
//! This crate drives the model defined in `millrace-core`: a time-ordered
//! event calendar, a monotone simulated clock, and the routing pipeline
//! that carries every request from arrival to completion across shared,
//! capacity-limited stations.
//!
//! # Example
//!
//! ```rust
//! use millrace_core::SimulationConfig;
//! use millrace_sim::Simulation;
//!
//! # fn main() -> Result<(), millrace_sim::SimulationError> {
//! let config = SimulationConfig {
//!     total_requests: 50,
//!     seed: 7,
//!     ..Default::default()
//! };
//!
//! let mut sim = Simulation::new(config)?;
//! let stats = sim.run()?;
//! assert_eq!(stats.processed + stats.lost, stats.generated);
//! # Ok(())
//! # }
//! ```
//!
//! The engine is strictly sequential: all state mutations for one event
//! finish before the next event is popped, and every run owns its clock,
//! stations, queues, and random stream, so independent runs can be farmed
//! out across threads or processes by an outer driver.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]

pub mod calendar;
pub mod clock;
pub mod engine;

// Re-export core types for public API
pub use calendar::{Event, EventCalendar, EventKind};
pub use clock::SimClock;
pub use engine::{Simulation, SimulationError};
