//! Hybrid run reports and per-method run records.

use std::fmt;
use std::time::Duration;

use crate::error::AdmissionError;
use crate::solution::{Assignment, Solution};
use crate::solver::SolveStatus;

/// How much is known about a reported solution's optimality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OptimalityStatus {
    /// Proven optimal by an exact solver.
    CertifiedOptimal,
    /// Found by an exact solver without proof.
    Feasible,
    /// Produced by a metaheuristic alone; unverified.
    HeuristicOnly,
    /// The method returned no solution.
    NoSolution,
}

impl fmt::Display for OptimalityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptimalityStatus::CertifiedOptimal => "certified optimal",
            OptimalityStatus::Feasible => "feasible",
            OptimalityStatus::HeuristicOnly => "heuristic only",
            OptimalityStatus::NoSolution => "no solution",
        })
    }
}

/// Everything a hybrid run observed, phase by phase.
#[derive(Debug, Clone)]
pub struct HybridReport {
    /// Engine that ran phase 1.
    pub engine: &'static str,
    /// Exact solver that ran phase 2.
    pub solver: String,

    pub phase1_cost: f64,
    pub phase1_elapsed: Duration,
    pub phase1_iterations: usize,

    pub phase2_status: SolveStatus,
    /// Solver answer's cost as re-evaluated locally, when it decoded.
    pub phase2_cost: Option<f64>,
    /// Solver's lower bound, when reported.
    pub phase2_bound: Option<f64>,
    pub phase2_elapsed: Duration,

    pub final_cost: f64,
    /// Set only when an OPTIMAL answer was adopted.
    pub certified_optimal: bool,
    /// Set when the final solution is the phase-1 solution.
    pub heuristic_only: bool,
    /// Relative gap `(final - bound) / |final|`, when a bound is known.
    pub gap: Option<f64>,
    /// Set when the solver broke its contract; the phase-1 solution was kept.
    pub contract_violation: Option<AdmissionError>,

    pub solution: Solution,
}

impl HybridReport {
    pub fn optimality_status(&self) -> OptimalityStatus {
        if self.certified_optimal {
            OptimalityStatus::CertifiedOptimal
        } else if self.heuristic_only {
            OptimalityStatus::HeuristicOnly
        } else {
            OptimalityStatus::Feasible
        }
    }

    /// Total wall-clock time of both phases.
    pub fn elapsed(&self) -> Duration {
        self.phase1_elapsed + self.phase2_elapsed
    }

    /// Condenses the report into a run record.
    pub fn to_record(&self, method_name: impl Into<String>) -> RunRecord {
        RunRecord {
            method_name: method_name.into(),
            elapsed: self.elapsed(),
            objective_value: self.final_cost,
            optimality_status: self.optimality_status(),
            solution: self.solution.assignments().to_vec(),
        }
    }
}

/// One method's result, as handed to a reporting layer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunRecord {
    pub method_name: String,
    pub elapsed: Duration,
    /// Objective value; infinite when the method found no solution.
    pub objective_value: f64,
    pub optimality_status: OptimalityStatus,
    /// Assignment list, indexed by patient; empty without a solution.
    pub solution: Vec<Assignment>,
}

/// Relative optimality gap, clamped at zero.
pub(crate) fn relative_gap(cost: f64, bound: f64) -> f64 {
    if cost == 0.0 {
        return 0.0;
    }
    ((cost - bound) / cost.abs()).max(0.0)
}
