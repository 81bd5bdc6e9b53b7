//! ILS execution loop and perturbation.

use std::cmp::Reverse;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use super::types::IlsResult;
use super::{BASE_INTENSITY, ENGINE_NAME, MAX_INTENSITY, STAGNATION_LIMIT};
use crate::config::AdmissionConfig;
use crate::descent::descend;
use crate::engine::{Budget, History, SearchEngine, SearchOutcome, StopReason};
use crate::error::Result;
use crate::model::Instance;
use crate::neighborhood::Neighborhood;
use crate::objective::Evaluator;
use crate::solution::{construct, Move, Solution};

/// Random placements tried per perturbed patient.
const PERTURB_ATTEMPTS: usize = 8;

/// Iterated local search with steepest descent as local search.
///
/// Each iteration perturbs the current local optimum and descends from the
/// result, which becomes the new current solution whether or not it is
/// better. A strictly better optimum replaces the best. Perturbations
/// respect hard-mode capacity.
///
/// Stops at an iteration boundary on `max_iterations`, `max_no_improve`
/// iterations without a new best (when positive), the phase-1 time limit
/// or cancellation.
#[derive(Debug, Clone)]
pub struct IlsEngine<R: Rng = ChaCha8Rng> {
    config: AdmissionConfig,
    rng: R,
    cancel: Option<Arc<AtomicBool>>,
}

impl IlsEngine<ChaCha8Rng> {
    /// Engine seeded from `config.random_seed`.
    pub fn from_seed(config: AdmissionConfig) -> Result<Self> {
        let rng = ChaCha8Rng::seed_from_u64(config.random_seed);
        Self::new(config, rng)
    }
}

impl<R: Rng> IlsEngine<R> {
    /// # Errors
    ///
    /// [`AdmissionError::Configuration`](crate::AdmissionError::Configuration)
    /// when `config` fails validation.
    pub fn new(config: AdmissionConfig, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rng,
            cancel: None,
        })
    }

    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Checks feasibility, constructs an initial solution and searches.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::InfeasibleInstance`](crate::AdmissionError::InfeasibleInstance)
    /// from the pre-search check or from hard-mode construction.
    pub fn run(&mut self, instance: &Instance) -> Result<IlsResult> {
        instance.check_feasible(self.config.capacity_mode)?;
        let initial = construct(
            instance,
            self.config.construction,
            self.config.capacity_mode,
            &mut self.rng,
        )?;
        Ok(self.run_from(instance, initial))
    }

    /// Searches from a given solution, descending from it first.
    pub fn run_from(&mut self, instance: &Instance, initial: Solution) -> IlsResult {
        let config = &self.config;
        let evaluator = Evaluator::from_config(config);
        let neighborhood = Neighborhood::from_config(instance, config);
        let budget = Budget::start(config.time_limit_phase1, self.cancel.clone());

        let mut current = initial;
        let initial_cost = evaluator.cost(&current);
        info!(event = "phase_start", phase = ENGINE_NAME, initial_cost = initial_cost);

        let local_search = |solution: &mut Solution, cost: f64| {
            descend(
                instance,
                &evaluator,
                &neighborhood,
                solution,
                cost,
                usize::MAX,
                &budget,
                |_, _| {},
            )
            .cost
        };

        let mut current_cost = local_search(&mut current, initial_cost);
        let mut best = current.clone();
        let mut best_cost = current_cost;
        let mut best_iteration = 0;
        let mut history = History::new(10, best_cost);
        let mut iterations = 0usize;
        let mut no_improve = 0usize;
        let mut restarts = 0usize;

        let stop_reason = loop {
            if iterations >= config.max_iterations {
                break StopReason::MaxIterations;
            }
            if let Some(reason) = budget.exhausted() {
                break reason;
            }
            iterations += 1;

            let count = perturbation_size(instance.num_patients(), no_improve);
            perturb(&neighborhood, &mut current, count, &mut self.rng);
            let perturbed_cost = evaluator.cost(&current);
            current_cost = local_search(&mut current, perturbed_cost);

            if current_cost < best_cost {
                best = current.clone();
                best_cost = current_cost;
                best_iteration = iterations;
                no_improve = 0;
                debug!(
                    event = "new_best",
                    phase = ENGINE_NAME,
                    iteration = iterations,
                    cost = best_cost,
                    perturbed = count as u64,
                );
            } else {
                no_improve += 1;
                if no_improve % STAGNATION_LIMIT == 0 {
                    current = best.clone();
                    current_cost = best_cost;
                    restarts += 1;
                    debug!(
                        event = "restart",
                        phase = ENGINE_NAME,
                        iteration = iterations,
                        no_improve = no_improve as u64,
                    );
                }
            }
            history.record(iterations, best_cost);

            if config.max_no_improve > 0 && no_improve >= config.max_no_improve {
                break StopReason::Stagnation;
            }
        };

        let elapsed = budget.elapsed();
        info!(
            event = "phase_end",
            phase = ENGINE_NAME,
            duration_ms = elapsed.as_millis() as u64,
            steps = iterations as u64,
            restarts = restarts as u64,
            score = best_cost,
            current = current_cost,
            stop = %stop_reason,
        );

        IlsResult {
            best,
            best_cost,
            iterations,
            best_iteration,
            restarts,
            stop_reason,
            elapsed,
            cost_history: history.finish(best_cost),
        }
    }
}

impl<R: Rng> SearchEngine for IlsEngine<R> {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn search(&mut self, instance: &Instance) -> Result<SearchOutcome> {
        self.run(instance).map(SearchOutcome::from)
    }
}

/// Patients to perturb after `no_improve` iterations without a new best:
/// `min(0.25, 0.10 * (1 + no_improve / 20))` of `patients`, at least one.
pub(crate) fn perturbation_size(patients: usize, no_improve: usize) -> usize {
    let growth = 1.0 + no_improve as f64 / STAGNATION_LIMIT as f64;
    let intensity = (BASE_INTENSITY * growth).min(MAX_INTENSITY);
    ((patients as f64 * intensity) as usize).max(1).min(patients)
}

/// Reassigns `count` patients to random admissible placements.
///
/// `count / 2` patients are the most delayed ones (ties to the lower
/// index); the rest are drawn at random from the others. A patient with no
/// admissible placement among its attempts stays put. Returns the number
/// of patients moved.
pub(crate) fn perturb<R: Rng>(
    neighborhood: &Neighborhood<'_>,
    solution: &mut Solution,
    count: usize,
    rng: &mut R,
) -> usize {
    let instance = neighborhood.instance();
    let n = solution.num_patients();
    let count = count.min(n);

    let mut by_delay: Vec<usize> = (0..n).collect();
    by_delay.sort_by_key(|&p| {
        let delay = solution
            .assignment(p)
            .day
            .saturating_sub(instance.patient(p).earliest);
        (Reverse(delay), p)
    });
    let (worst, rest) = by_delay.split_at_mut(count / 2);
    rest.shuffle(rng);
    let chosen: Vec<usize> = worst
        .iter()
        .chain(rest.iter().take(count - count / 2))
        .copied()
        .collect();

    let mut moved = 0;
    for patient in chosen {
        let options = instance.options(patient);
        if options.wards.is_empty() || options.first_day > options.last_day {
            continue;
        }
        for _ in 0..PERTURB_ATTEMPTS {
            let mv = Move::Reassign {
                patient,
                ward: options.wards[rng.random_range(0..options.wards.len())],
                day: rng.random_range(options.first_day..=options.last_day),
            };
            if neighborhood.is_admissible(solution, &mv) {
                solution.apply(instance, &mv);
                moved += 1;
                break;
            }
        }
    }
    moved
}
