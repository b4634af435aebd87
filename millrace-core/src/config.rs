//! Centralized configuration for a simulation run.
//!
//! All tunable model parameters are defined here to avoid hard-coded
//! values scattered throughout the engine. A configuration is validated
//! once, before any run state is built.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Closed interval of durations sampled uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Lower bound of the interval
    pub min: Duration,
    /// Upper bound of the interval
    pub max: Duration,
}

impl TimeRange {
    /// Creates a range between two durations.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Creates a range between whole-second bounds.
    pub fn from_secs(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_secs(min),
            max: Duration::from_secs(max),
        }
    }

    /// Returns true when the bounds are in order.
    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

/// Errors detected while validating a configuration.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    /// A sampling range has its bounds out of order
    #[error("Invalid {name} range: min {min:?} exceeds max {max:?}")]
    InvalidRange {
        /// Which configuration field is malformed
        name: &'static str,
        /// Lower bound as configured
        min: Duration,
        /// Upper bound as configured
        max: Duration,
    },

    /// Branch probability outside the unit interval
    #[error("Local-route probability {value} is outside [0, 1]")]
    InvalidProbability {
        /// Probability as configured
        value: f64,
    },

    /// A run must generate at least one request
    #[error("Total request target must be greater than zero")]
    ZeroRequestTarget,

    /// A bounded intake buffer must hold at least one request
    #[error("Bounded intake queue capacity must be greater than zero")]
    ZeroQueueCapacity,

    /// Periodic sampling cannot run with a zero period
    #[error("Statistics sample interval must be greater than zero")]
    ZeroSampleInterval,
}

/// Parameters of one simulation run.
///
/// Defaults describe the base system: requests every 7-13 s, 2 s primary
/// processing, 16-20 s final processing, a 3 s transfer channel, and an
/// even local/remote split over 400 requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Spacing between consecutive arrivals, sampled uniformly
    pub interarrival: TimeRange,
    /// Fixed duration of primary processing on both nodes
    pub primary_service: Duration,
    /// Final-processing duration on both nodes, sampled uniformly
    pub final_service: TimeRange,
    /// Fixed duration of a channel transfer
    pub channel_transfer: Duration,
    /// Probability that a request stays on the first-stage node
    pub p_local: f64,
    /// Number of requests to generate before arrivals stop
    pub total_requests: u32,
    /// Runs the first-stage final station with two parallel servers
    pub improved: bool,
    /// Bound on the intake queue; `None` admits every arrival
    pub q1_capacity: Option<usize>,
    /// Seed for the deterministic random stream
    pub seed: u64,
    /// Period of the wall-clock-of-simulation queue-length samples
    pub sample_interval: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            interarrival: TimeRange::from_secs(7, 13),
            primary_service: Duration::from_secs(2),
            final_service: TimeRange::from_secs(16, 20),
            channel_transfer: Duration::from_secs(3),
            p_local: 0.5,
            total_requests: 400,
            improved: false,
            q1_capacity: None,
            seed: 42,
            sample_interval: Duration::from_secs(100),
        }
    }
}

impl SimulationConfig {
    /// Checks every parameter before a run is allowed to start.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidRange` - A sampling range has min above max
    /// - `ConfigError::InvalidProbability` - `p_local` outside [0, 1]
    /// - `ConfigError::ZeroRequestTarget` - No requests would be generated
    /// - `ConfigError::ZeroQueueCapacity` - Bounded intake queue of size zero
    /// - `ConfigError::ZeroSampleInterval` - Periodic sampling would not advance
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.interarrival.is_ordered() {
            return Err(ConfigError::InvalidRange {
                name: "interarrival",
                min: self.interarrival.min,
                max: self.interarrival.max,
            });
        }

        if !self.final_service.is_ordered() {
            return Err(ConfigError::InvalidRange {
                name: "final-service",
                min: self.final_service.min,
                max: self.final_service.max,
            });
        }

        // NaN fails the containment check as well.
        if !(0.0..=1.0).contains(&self.p_local) {
            return Err(ConfigError::InvalidProbability {
                value: self.p_local,
            });
        }

        if self.total_requests == 0 {
            return Err(ConfigError::ZeroRequestTarget);
        }

        if self.q1_capacity == Some(0) {
            return Err(ConfigError::ZeroQueueCapacity);
        }

        if self.sample_interval.is_zero() {
            return Err(ConfigError::ZeroSampleInterval);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(SimulationConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_zero_width_interarrival_is_valid() {
        // A burst of simultaneous arrivals is a legitimate scenario.
        let config = SimulationConfig {
            interarrival: TimeRange::from_secs(0, 0),
            ..Default::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_reversed_range_rejected() {
        let config = SimulationConfig {
            final_service: TimeRange::from_secs(20, 16),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRange {
                name: "final-service",
                ..
            })
        ));
    }

    #[test]
    fn test_probability_bounds_rejected() {
        for p in [-0.1, 1.5, f64::NAN] {
            let config = SimulationConfig {
                p_local: p,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidProbability { .. })
            ));
        }
    }

    #[test]
    fn test_zero_request_target_rejected() {
        let config = SimulationConfig {
            total_requests: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroRequestTarget));
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let config = SimulationConfig {
            q1_capacity: Some(0),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroQueueCapacity));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = SimulationConfig {
            q1_capacity: Some(12),
            seed: 7,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: SimulationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
