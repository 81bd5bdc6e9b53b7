//! Shake neighborhoods and run results.

use std::fmt;
use std::time::Duration;

use crate::engine::{SearchOutcome, StopReason};
use crate::solution::Solution;

/// The shaking neighborhoods, in the order they are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Shake {
    /// Admission day moved by -2, -1, +1 or +2, same ward.
    ShiftDay,
    /// Another compatible ward, same day.
    ChangeWard,
    /// Two patients, each moved to a random day or a random ward.
    MovePair,
    /// Two patients exchange placements.
    Swap,
}

impl Shake {
    pub const ALL: [Shake; 4] = [
        Shake::ShiftDay,
        Shake::ChangeWard,
        Shake::MovePair,
        Shake::Swap,
    ];

    /// Position in [`Shake::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Shake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Shake::ShiftDay => "shift-day",
            Shake::ChangeWard => "change-ward",
            Shake::MovePair => "move-pair",
            Shake::Swap => "swap",
        };
        f.write_str(s)
    }
}

/// Result of a VNS run.
#[derive(Debug, Clone)]
pub struct VnsResult {
    /// Best solution found.
    pub best: Solution,
    /// Cost of the best solution.
    pub best_cost: f64,
    /// Total shake-and-descend iterations executed.
    pub iterations: usize,
    /// Iteration at which the best solution was found (0 = initial descent).
    pub best_iteration: usize,
    /// New bests credited to each neighborhood, indexed as [`Shake::ALL`].
    pub improvements: [usize; 4],
    /// Shakes that found no admissible perturbation.
    pub empty_shakes: usize,
    pub stop_reason: StopReason,
    pub elapsed: Duration,
    /// Best cost at regular intervals.
    pub cost_history: Vec<f64>,
}

impl From<VnsResult> for SearchOutcome {
    fn from(r: VnsResult) -> Self {
        SearchOutcome {
            engine: super::ENGINE_NAME,
            best: r.best,
            best_cost: r.best_cost,
            iterations: r.iterations,
            best_iteration: r.best_iteration,
            elapsed: r.elapsed,
            stop_reason: r.stop_reason,
            cost_history: r.cost_history,
        }
    }
}
