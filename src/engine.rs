//! Shared engine plumbing: stop conditions, outcomes and the
//! [`SearchEngine`] capability the hybrid orchestrator drives.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AdmissionConfig;
use crate::descent::DescentEngine;
use crate::error::Result;
use crate::ils::IlsEngine;
use crate::model::Instance;
use crate::sa::SaEngine;
use crate::solution::Solution;
use crate::tabu::TabuEngine;
use crate::vns::VnsEngine;

/// Why a search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopReason {
    MaxIterations,
    /// Annealing temperature fell below `min_temperature`.
    MinTemperature,
    TimeLimit,
    Cancelled,
    /// `max_no_improve` iterations without a new best.
    Stagnation,
    /// No admissible move exists, or none could be sampled.
    NeighborhoodExhausted,
    /// Local optimum reached (descent only).
    LocalOptimum,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::MaxIterations => "max iterations",
            StopReason::MinTemperature => "min temperature",
            StopReason::TimeLimit => "time limit",
            StopReason::Cancelled => "cancelled",
            StopReason::Stagnation => "stagnation",
            StopReason::NeighborhoodExhausted => "neighborhood exhausted",
            StopReason::LocalOptimum => "local optimum",
        };
        f.write_str(s)
    }
}

/// Wall-clock budget and cancellation, polled at iteration boundaries.
#[derive(Debug, Clone)]
pub(crate) struct Budget {
    started: Instant,
    limit: Option<Duration>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Budget {
    pub(crate) fn start(limit: Option<Duration>, cancel: Option<Arc<AtomicBool>>) -> Self {
        Self {
            started: Instant::now(),
            limit,
            cancel,
        }
    }

    #[inline]
    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The reason to stop now, if any. Cancellation wins over the clock.
    pub(crate) fn exhausted(&self) -> Option<StopReason> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return Some(StopReason::Cancelled);
        }
        match self.limit {
            Some(limit) if self.started.elapsed() >= limit => Some(StopReason::TimeLimit),
            _ => None,
        }
    }
}

/// Engine-independent summary of one metaheuristic run.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Name of the engine that produced the run.
    pub engine: &'static str,
    /// Best solution found.
    pub best: Solution,
    /// Cost of the best solution.
    pub best_cost: f64,
    /// Iterations executed.
    pub iterations: usize,
    /// Iteration at which the best solution was found (0 = initial).
    pub best_iteration: usize,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
    pub stop_reason: StopReason,
    /// Best cost sampled over the run.
    pub cost_history: Vec<f64>,
}

/// A metaheuristic that turns an instance into a best-found solution.
///
/// Object safe, so the hybrid orchestrator can hold any engine as
/// `&mut dyn SearchEngine`.
pub trait SearchEngine {
    /// Short engine name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Runs one search from a freshly constructed initial solution.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::InfeasibleInstance`](crate::AdmissionError::InfeasibleInstance)
    /// when the instance admits no solution in the configured capacity mode.
    fn search(&mut self, instance: &Instance) -> Result<SearchOutcome>;
}

/// The built-in engines, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EngineKind {
    #[default]
    Annealing,
    Tabu,
    Descent,
    /// Variable neighborhood search.
    Vns,
    /// Iterated local search.
    Ils,
}

impl EngineKind {
    /// Builds the engine, seeded from `config.random_seed`.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::Configuration`](crate::AdmissionError::Configuration)
    /// when `config` fails validation.
    pub fn build(self, config: &AdmissionConfig) -> Result<Box<dyn SearchEngine + Send>> {
        Ok(match self {
            EngineKind::Annealing => Box::new(SaEngine::from_seed(config.clone())?),
            EngineKind::Tabu => Box::new(TabuEngine::from_seed(config.clone())?),
            EngineKind::Descent => Box::new(DescentEngine::new(config.clone())?),
            EngineKind::Vns => Box::new(VnsEngine::from_seed(config.clone())?),
            EngineKind::Ils => Box::new(IlsEngine::from_seed(config.clone())?),
        })
    }

    /// Every built-in engine, in declaration order.
    pub const ALL: [EngineKind; 5] = [
        EngineKind::Annealing,
        EngineKind::Tabu,
        EngineKind::Descent,
        EngineKind::Vns,
        EngineKind::Ils,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EngineKind::Annealing => "simulated-annealing",
            EngineKind::Tabu => "tabu-search",
            EngineKind::Descent => "steepest-descent",
            EngineKind::Vns => "variable-neighborhood-search",
            EngineKind::Ils => "iterated-local-search",
        }
    }
}

/// Records the best cost every `interval` iterations.
#[derive(Debug, Clone)]
pub(crate) struct History {
    interval: usize,
    values: Vec<f64>,
}

impl History {
    pub(crate) fn new(interval: usize, initial: f64) -> Self {
        Self {
            interval: interval.max(1),
            values: vec![initial],
        }
    }

    #[inline]
    pub(crate) fn record(&mut self, iteration: usize, best: f64) {
        if iteration % self.interval == 0 {
            self.values.push(best);
        }
    }

    /// Appends the final best unless it is already the last entry.
    pub(crate) fn finish(mut self, best: f64) -> Vec<f64> {
        if self.values.last().is_none_or(|&last| last != best) {
            self.values.push(best);
        }
        self.values
    }
}
