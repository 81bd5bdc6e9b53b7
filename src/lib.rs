//! Patient admission scheduling with metaheuristics and exact hand-off.
//!
//! Assigns every patient to a hospital ward and an admission day, subject
//! to ward specializations, admission windows, bed capacity and daily
//! operating time, minimizing `lambda1 * f1 + lambda2 * f2`: operational
//! cost (delay, overtime, undertime) plus workload-balance cost (variance
//! of ward and day loads).
//!
//! - **Model** ([`model`]): immutable wards, patients and horizon.
//! - **Solution** ([`solution`]): assignments with cached occupancy,
//!   operating time and exact integer cost components.
//! - **Objective** ([`objective`]): full evaluation and exact incremental
//!   deltas.
//! - **Neighborhood** ([`neighborhood`]): reassign and swap moves,
//!   enumerated or sampled.
//! - **Simulated Annealing** ([`sa`]), **Tabu Search** ([`tabu`]),
//!   **Variable Neighborhood Search** ([`vns`]), **Iterated Local Search**
//!   ([`ils`]) and **Steepest Descent** ([`descent`]) behind one
//!   [`SearchEngine`] trait.
//! - **Exact solver interface** ([`solver`]) with a warm-start encoding
//!   and an exhaustive reference back-end.
//! - **Hybrid orchestration** ([`hybrid`]): metaheuristic, exact solve,
//!   and a merge that never returns a worse solution.
//!
//! # Example
//!
//! ```
//! use u_admission::{
//!     AdmissionConfig, EngineKind, ExhaustiveSolver, HybridSolver, Instance, Patient, Ward,
//! };
//!
//! let wards = vec![
//!     Ward::new("cardiology", 2).with_specializations([0]),
//!     Ward::new("general", 2).with_specializations([0, 1]),
//! ];
//! let patients = vec![
//!     Patient::new("p1", 0).with_window(0, 1),
//!     Patient::new("p2", 1).with_window(0, 1).with_length_of_stay(2),
//!     Patient::new("p3", 0).with_window(1, 1),
//! ];
//! let instance = Instance::new(2, wards, patients).unwrap();
//!
//! let config = AdmissionConfig::default().with_max_iterations(500).with_seed(1);
//! let mut hybrid = HybridSolver::new(config, ExhaustiveSolver::new())
//!     .unwrap()
//!     .with_engine(EngineKind::Tabu);
//! let report = hybrid.run(&instance).unwrap();
//!
//! assert!(report.final_cost <= report.phase1_cost);
//! assert!(report.solution.within_capacity());
//! ```

pub mod config;
pub mod descent;
pub mod engine;
pub mod error;
pub mod hybrid;
pub mod ils;
pub mod model;
pub mod neighborhood;
pub mod objective;
pub mod restart;
pub mod sa;
pub mod solution;
pub mod solver;
pub mod tabu;
pub mod vns;

#[cfg(test)]
mod fixtures;

pub use config::{AdmissionConfig, CapacityMode, Construction};
pub use descent::DescentEngine;
pub use engine::{EngineKind, SearchEngine, SearchOutcome, StopReason};
pub use error::{AdmissionError, Result};
pub use hybrid::{compare_methods, HybridReport, HybridSolver, OptimalityStatus, RunRecord};
pub use ils::{IlsEngine, IlsResult};
pub use model::{Instance, Patient, PlacementOptions, Ward};
pub use neighborhood::Neighborhood;
pub use objective::{Components, Evaluator};
pub use restart::multi_start;
pub use sa::{SaEngine, SaResult};
pub use solution::{Assignment, Move, Solution};
pub use solver::{
    ExactSolver, ExhaustiveSolver, SolveRequest, SolveResponse, SolveStatus, WarmStart,
};
pub use tabu::{TabuEngine, TabuResult, TabuState};
pub use vns::{Shake, VnsEngine, VnsResult};
