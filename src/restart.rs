//! Independent multi-start runs.
//!
//! Restart `k` runs a fresh engine seeded with `random_seed + k`; the runs
//! share nothing. With the `parallel` feature they execute on the rayon
//! thread pool, otherwise one after another. Results are identical either
//! way.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::info;

use crate::config::AdmissionConfig;
use crate::engine::{EngineKind, SearchOutcome};
use crate::error::{AdmissionError, Result};
use crate::model::Instance;

/// Runs `restarts` seeded searches and returns the best outcome.
///
/// Ties go to the lowest restart index.
///
/// # Errors
///
/// [`AdmissionError::Configuration`] when `restarts` is zero or `config`
/// is invalid; the first search error otherwise.
pub fn multi_start(
    instance: &Instance,
    config: &AdmissionConfig,
    kind: EngineKind,
    restarts: usize,
) -> Result<SearchOutcome> {
    if restarts == 0 {
        return Err(AdmissionError::Configuration(
            "restarts must be positive".into(),
        ));
    }
    config.validate()?;
    instance.check_feasible(config.capacity_mode)?;

    let run = |k: usize| -> Result<SearchOutcome> {
        let seeded = config
            .clone()
            .with_seed(config.random_seed.wrapping_add(k as u64));
        kind.build(&seeded)?.search(instance)
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<Result<SearchOutcome>> = (0..restarts).into_par_iter().map(run).collect();
    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<Result<SearchOutcome>> = (0..restarts).map(run).collect();

    let mut best: Option<SearchOutcome> = None;
    for outcome in outcomes {
        let outcome = outcome?;
        if best.as_ref().is_none_or(|b| outcome.best_cost < b.best_cost) {
            best = Some(outcome);
        }
    }
    let best = best.ok_or_else(|| AdmissionError::Configuration("no restart ran".into()))?;

    info!(
        event = "multi_start_end",
        engine = best.engine,
        restarts = restarts as u64,
        score = best.best_cost,
    );
    Ok(best)
}
