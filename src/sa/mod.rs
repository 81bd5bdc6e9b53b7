//! Simulated Annealing (SA).
//!
//! A single-solution trajectory metaheuristic inspired by the physical
//! annealing process. Improving and sideways moves are always accepted; a
//! worsening move of cost `delta` is accepted with probability
//! `exp(-delta / T)`. The temperature `T` cools geometrically once per
//! epoch, allowing the search to escape local optima early and settle late.
//!
//! # References
//!
//! - Kirkpatrick, Gelatt & Vecchi (1983), "Optimization by Simulated Annealing"
//! - Cerny (1985), "Thermodynamical Approach to the Travelling Salesman Problem"

mod runner;
mod types;

pub use runner::SaEngine;
pub use types::SaResult;

pub(crate) const ENGINE_NAME: &str = "simulated-annealing";
