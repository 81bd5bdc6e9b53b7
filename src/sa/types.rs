//! Result of a simulated annealing run.

use std::time::Duration;

use crate::engine::{SearchOutcome, StopReason};
use crate::solution::Solution;

/// Result of a Simulated Annealing run.
#[derive(Debug, Clone)]
pub struct SaResult {
    /// The best solution found.
    pub best: Solution,

    /// Cost of the best solution.
    pub best_cost: f64,

    /// Total number of iterations (sampled moves).
    pub iterations: usize,

    /// Iteration at which the best solution was found (0 = initial).
    pub best_iteration: usize,

    /// Final temperature when the algorithm stopped.
    pub final_temperature: f64,

    /// Number of accepted moves (including improvements).
    pub accepted_moves: usize,

    /// Number of strictly improving moves.
    pub improving_moves: usize,

    /// Whether cancelled externally.
    pub cancelled: bool,

    pub stop_reason: StopReason,

    pub elapsed: Duration,

    /// Best cost sampled at regular intervals for history tracking.
    pub cost_history: Vec<f64>,
}

impl SaResult {
    /// Fraction of sampled moves that were accepted.
    pub fn acceptance_ratio(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.accepted_moves as f64 / self.iterations as f64
        }
    }
}

impl From<SaResult> for SearchOutcome {
    fn from(r: SaResult) -> Self {
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
