//! Result of an iterated local search run.

use std::time::Duration;

use crate::engine::{SearchOutcome, StopReason};
use crate::solution::Solution;

/// Result of an Iterated Local Search run.
#[derive(Debug, Clone)]
pub struct IlsResult {
    /// Best solution found.
    pub best: Solution,
    /// Cost of the best solution.
    pub best_cost: f64,
    /// Perturb-and-descend iterations executed.
    pub iterations: usize,
    /// Iteration at which the best solution was found (0 = initial descent).
    pub best_iteration: usize,
    /// Times the walk was reset to the best solution.
    pub restarts: usize,
    pub stop_reason: StopReason,
    pub elapsed: Duration,
    /// Best cost at regular intervals.
    pub cost_history: Vec<f64>,
}

impl From<IlsResult> for SearchOutcome {
    fn from(r: IlsResult) -> Self {
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
