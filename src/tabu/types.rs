//! Tabu step outcomes and run results.

use std::time::Duration;

use crate::engine::{SearchOutcome, StopReason};
use crate::solution::{Move, Solution};

/// What one tabu iteration did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TabuStep {
    /// `mv` was applied, producing `cost`. `aspiration` is set when the
    /// move was tabu and admitted only because `cost` beat the best.
    Applied {
        mv: Move,
        cost: f64,
        aspiration: bool,
    },
    /// Every candidate was tabu and none aspirated; nothing changed.
    Idle,
    /// The neighborhood produced no candidate.
    Exhausted,
}

/// Result of a Tabu Search run.
#[derive(Debug, Clone)]
pub struct TabuResult {
    /// Best solution found.
    pub best: Solution,
    /// Cost of the best solution.
    pub best_cost: f64,
    /// Total iterations executed.
    pub iterations: usize,
    /// Iteration at which the best solution was found.
    pub best_iteration: usize,
    /// Tabu moves admitted by aspiration.
    pub aspiration_moves: usize,
    /// Idle iterations where every candidate was tabu.
    pub blocked_iterations: usize,
    pub stop_reason: StopReason,
    pub elapsed: Duration,
    /// Best cost sampled over the run.
    pub cost_history: Vec<f64>,
}

impl From<TabuResult> for SearchOutcome {
    fn from(r: TabuResult) -> Self {
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
