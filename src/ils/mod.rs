//! Iterated Local Search (ILS).
//!
//! Descends to a local optimum, then repeatedly perturbs the current
//! optimum and descends again. The perturbation reassigns a share of the
//! patients: half picked at random and half the most delayed ones. The
//! share grows with the number of iterations since the last new best, and
//! after every [`STAGNATION_LIMIT`] such iterations the walk restarts from
//! the best solution.
//!
//! # Reference
//!
//! Lourenço, H. R., Martin, O. C. & Stützle, T. (2003). "Iterated Local
//! Search", *Handbook of Metaheuristics*, 320-353.

mod runner;
mod types;

pub use runner::IlsEngine;
pub use types::IlsResult;

pub(crate) const ENGINE_NAME: &str = "iterated-local-search";

/// Non-improving iterations between restarts from the best solution.
pub const STAGNATION_LIMIT: usize = 20;
/// Share of patients perturbed right after a new best.
pub const BASE_INTENSITY: f64 = 0.10;
/// Largest share of patients perturbed at once.
pub const MAX_INTENSITY: f64 = 0.25;
