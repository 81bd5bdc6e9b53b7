//! Hybrid metaheuristic + exact orchestration.
//!
//! A metaheuristic produces a good solution quickly; an exact solver,
//! warm-started from it, tries to improve it and prove optimality. The
//! merge step re-evaluates whatever the solver returns and never accepts
//! a result worse than the metaheuristic's.

mod compare;
mod report;
mod runner;

pub use compare::compare_methods;
pub use report::{HybridReport, OptimalityStatus, RunRecord};
pub use runner::HybridSolver;
