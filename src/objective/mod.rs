//! Objective evaluation.
//!
//! A solution's cost is kept as exact integer [`Components`] and turned
//! into a scalar by the [`Evaluator`]. Moves are evaluated incrementally
//! from the handful of ward-day cells they touch.

mod components;
mod evaluator;

pub use components::Components;
pub use evaluator::{Assessment, CostBreakdown, Evaluator};
