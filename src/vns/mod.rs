//! Variable Neighborhood Search (VNS).
//!
//! Alternates a random *shake* in neighborhood `N_k` with a steepest
//! descent. An improving local optimum replaces the incumbent and resets
//! `k` to the first neighborhood; otherwise `k` advances, wrapping after
//! the last one. The four neighborhoods grow in disruption:
//!
//! 1. shift one patient's admission day by one or two days,
//! 2. move one patient to another compatible ward,
//! 3. reassign two patients, each on its day or its ward,
//! 4. swap the placements of two patients.
//!
//! # Reference
//!
//! Mladenović, N. & Hansen, P. (1997). "Variable neighborhood search",
//! *Computers & Operations Research* 24(11), 1097-1100.

mod runner;
mod types;

pub use runner::VnsEngine;
pub use types::{Shake, VnsResult};

pub(crate) const ENGINE_NAME: &str = "variable-neighborhood-search";
