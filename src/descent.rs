//! Steepest descent.
//!
//! Applies the best strictly improving move of the full neighborhood until
//! none is left. Cheap, deterministic and a useful baseline or polishing
//! pass after a stochastic engine.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::config::AdmissionConfig;
use crate::engine::{Budget, History, SearchEngine, SearchOutcome, StopReason};
use crate::error::Result;
use crate::model::Instance;
use crate::neighborhood::Neighborhood;
use crate::objective::Evaluator;
use crate::solution::{construct, Move, Solution};

const ENGINE_NAME: &str = "steepest-descent";

/// Best-improvement local search. Ties go to the first move enumerated.
#[derive(Debug, Clone)]
pub struct DescentEngine {
    config: AdmissionConfig,
    rng: ChaCha8Rng,
    cancel: Option<Arc<AtomicBool>>,
}

impl DescentEngine {
    /// # Errors
    ///
    /// [`AdmissionError::Configuration`](crate::AdmissionError::Configuration)
    /// when `config` fails validation.
    pub fn new(config: AdmissionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.random_seed),
            config,
            cancel: None,
        })
    }

    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Descends from `initial` to a local optimum or the first limit hit.
    pub fn improve(&self, instance: &Instance, initial: Solution) -> SearchOutcome {
        let evaluator = Evaluator::from_config(&self.config);
        let neighborhood = Neighborhood::from_config(instance, &self.config);
        let budget = Budget::start(self.config.time_limit_phase1, self.cancel.clone());

        let mut current = initial;
        let initial_cost = evaluator.cost(&current);
        let mut history = History::new(10, initial_cost);

        info!(event = "phase_start", phase = ENGINE_NAME, initial_cost = initial_cost);

        let descent = descend(
            instance,
            &evaluator,
            &neighborhood,
            &mut current,
            initial_cost,
            self.config.max_iterations,
            &budget,
            |step, cost| history.record(step, cost),
        );

        let elapsed = budget.elapsed();
        info!(
            event = "phase_end",
            phase = ENGINE_NAME,
            duration_ms = elapsed.as_millis() as u64,
            steps = descent.steps as u64,
            score = descent.cost,
            stop = %descent.stop,
        );

        SearchOutcome {
            engine: ENGINE_NAME,
            best: current,
            best_cost: descent.cost,
            iterations: descent.steps,
            best_iteration: descent.steps,
            elapsed,
            stop_reason: descent.stop,
            cost_history: history.finish(descent.cost),
        }
    }
}

/// Where one descent pass ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Descent {
    /// Cost of the solution descended in place.
    pub(crate) cost: f64,
    /// Improving moves applied.
    pub(crate) steps: usize,
    /// `LocalOptimum`, `MaxIterations` for the step cap, or a budget reason.
    pub(crate) stop: StopReason,
}

/// The best strictly improving move of the full neighborhood and its cost.
pub(crate) fn best_improvement(
    instance: &Instance,
    evaluator: &Evaluator,
    neighborhood: &Neighborhood<'_>,
    current: &Solution,
    cost: f64,
) -> Option<(Move, f64)> {
    let mut chosen = None;
    let mut chosen_cost = cost;
    for mv in neighborhood.moves(current) {
        let candidate = evaluator.assess(instance, current, &mv).cost;
        if candidate < chosen_cost {
            chosen = Some(mv);
            chosen_cost = candidate;
        }
    }
    chosen.map(|mv| (mv, chosen_cost))
}

/// Steepest descent on `current` in place, from a known `cost`.
///
/// Stops after `max_steps` applied moves, when the budget runs out, or at
/// a local optimum. `on_step` sees each step number and the cost after it.
#[allow(clippy::too_many_arguments)]
pub(crate) fn descend(
    instance: &Instance,
    evaluator: &Evaluator,
    neighborhood: &Neighborhood<'_>,
    current: &mut Solution,
    cost: f64,
    max_steps: usize,
    budget: &Budget,
    mut on_step: impl FnMut(usize, f64),
) -> Descent {
    let mut cost = cost;
    let mut steps = 0usize;
    let stop = loop {
        if steps >= max_steps {
            break StopReason::MaxIterations;
        }
        if let Some(reason) = budget.exhausted() {
            break reason;
        }
        let Some((mv, next_cost)) =
            best_improvement(instance, evaluator, neighborhood, current, cost)
        else {
            break StopReason::LocalOptimum;
        };
        current.apply(instance, &mv);
        cost = next_cost;
        steps += 1;
        on_step(steps, cost);
    };
    Descent { cost, steps, stop }
}

impl SearchEngine for DescentEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn search(&mut self, instance: &Instance) -> Result<SearchOutcome> {
        instance.check_feasible(self.config.capacity_mode)?;
        let initial = construct(
            instance,
            self.config.construction,
            self.config.capacity_mode,
            &mut self.rng,
        )?;
        Ok(self.improve(instance, initial))
    }
}
