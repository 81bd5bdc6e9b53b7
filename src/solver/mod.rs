//! Exact-solver interface.
//!
//! The hybrid orchestrator talks to exact optimizers only through the
//! [`ExactSolver`] trait: a [`SolveRequest`] carrying the shared evaluator,
//! the capacity mode, a time limit and an optional [`WarmStart`] goes in,
//! and a [`SolveResponse`] with a [`SolveStatus`] comes back.
//! [`ExhaustiveSolver`] is a complete enumeration back-end for small
//! instances.

mod exhaustive;
mod types;

pub use exhaustive::ExhaustiveSolver;
pub use types::{ExactSolver, SolveRequest, SolveResponse, SolveStatus, WarmStart};
