//! Simulated time for deterministic runs.

use std::time::Duration;

use crate::engine::SimulationError;

/// Monotone simulated clock, measured from run start.
///
/// Time only moves when the engine advances to the next calendar event;
/// it is completely independent of wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimClock {
    now: Duration,
}

impl SimClock {
    /// Creates a clock at simulation time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns current simulation time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Advances simulation time to the given instant.
    ///
    /// # Errors
    ///
    /// - `SimulationError::TimeReversal` - The target lies in the past
    pub fn advance_to(&mut self, target: Duration) -> Result<(), SimulationError> {
        if target < self.now {
            return Err(SimulationError::TimeReversal {
                from: self.now,
                to: target,
            });
        }
        self.now = target;
        Ok(())
    }
}
