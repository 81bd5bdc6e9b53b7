//! Basic VNS loop.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use super::types::{Shake, VnsResult};
use super::ENGINE_NAME;
use crate::config::AdmissionConfig;
use crate::descent::descend;
use crate::engine::{Budget, History, SearchEngine, SearchOutcome, StopReason};
use crate::error::Result;
use crate::model::Instance;
use crate::neighborhood::Neighborhood;
use crate::objective::Evaluator;
use crate::solution::{construct, Move, Solution};

/// Random proposals per shake before it gives up.
const SHAKE_ATTEMPTS: usize = 16;

/// Day offsets of [`Shake::ShiftDay`].
const SHIFTS: [isize; 4] = [-2, -1, 1, 2];

/// Variable neighborhood search with steepest descent as local search.
///
/// Every iteration shakes a copy of the incumbent in `N_k` and descends
/// from it to a local optimum. A strictly better optimum becomes the
/// incumbent and `k` returns to the first neighborhood; otherwise `k`
/// advances cyclically. Shakes keep hard-mode solutions within capacity.
///
/// Stops at an iteration boundary on `max_iterations`, `max_no_improve`
/// non-improving iterations (when positive), the phase-1 time limit or
/// cancellation.
#[derive(Debug, Clone)]
pub struct VnsEngine<R: Rng = ChaCha8Rng> {
    config: AdmissionConfig,
    rng: R,
    cancel: Option<Arc<AtomicBool>>,
}

impl VnsEngine<ChaCha8Rng> {
    /// Engine seeded from `config.random_seed`.
    pub fn from_seed(config: AdmissionConfig) -> Result<Self> {
        let rng = ChaCha8Rng::seed_from_u64(config.random_seed);
        Self::new(config, rng)
    }
}

impl<R: Rng> VnsEngine<R> {
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
    pub fn run(&mut self, instance: &Instance) -> Result<VnsResult> {
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
    pub fn run_from(&mut self, instance: &Instance, initial: Solution) -> VnsResult {
        let config = &self.config;
        let evaluator = Evaluator::from_config(config);
        let neighborhood = Neighborhood::from_config(instance, config);
        let budget = Budget::start(config.time_limit_phase1, self.cancel.clone());

        let mut best = initial;
        let initial_cost = evaluator.cost(&best);
        info!(
            event = "phase_start",
            phase = ENGINE_NAME,
            initial_cost = initial_cost,
            neighborhoods = Shake::ALL.len() as u64,
        );

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

        let mut best_cost = local_search(&mut best, initial_cost);
        let mut best_iteration = 0;
        let mut history = History::new(10, best_cost);
        let mut iterations = 0usize;
        let mut no_improve = 0usize;
        let mut improvements = [0usize; 4];
        let mut empty_shakes = 0usize;
        let mut k = 0usize;

        let stop_reason = loop {
            if iterations >= config.max_iterations {
                break StopReason::MaxIterations;
            }
            if let Some(reason) = budget.exhausted() {
                break reason;
            }
            iterations += 1;

            let kind = Shake::ALL[k];
            let mut candidate = best.clone();
            let cost = if shake(&neighborhood, &mut candidate, kind, &mut self.rng) {
                let shaken_cost = evaluator.cost(&candidate);
                local_search(&mut candidate, shaken_cost)
            } else {
                empty_shakes += 1;
                best_cost
            };

            if cost < best_cost {
                best = candidate;
                best_cost = cost;
                best_iteration = iterations;
                improvements[kind.index()] += 1;
                no_improve = 0;
                k = 0;
                debug!(
                    event = "new_best",
                    phase = ENGINE_NAME,
                    iteration = iterations,
                    cost = best_cost,
                    shake = %kind,
                );
            } else {
                no_improve += 1;
                k = (k + 1) % Shake::ALL.len();
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
            empty_shakes = empty_shakes as u64,
            score = best_cost,
            stop = %stop_reason,
        );

        VnsResult {
            best,
            best_cost,
            iterations,
            best_iteration,
            improvements,
            empty_shakes,
            stop_reason,
            elapsed,
            cost_history: history.finish(best_cost),
        }
    }
}

impl<R: Rng> SearchEngine for VnsEngine<R> {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn search(&mut self, instance: &Instance) -> Result<SearchOutcome> {
        self.run(instance).map(SearchOutcome::from)
    }
}

/// Applies one random admissible perturbation of kind `kind` to `solution`.
///
/// Returns `false`, leaving `solution` untouched, when no admissible
/// proposal turned up within the attempt limit. [`Shake::MovePair`]
/// succeeds when at least one of its two patients moved.
pub(crate) fn shake<R: Rng>(
    neighborhood: &Neighborhood<'_>,
    solution: &mut Solution,
    kind: Shake,
    rng: &mut R,
) -> bool {
    let instance = neighborhood.instance();
    let n = solution.num_patients();
    if n == 0 || (n < 2 && matches!(kind, Shake::MovePair | Shake::Swap)) {
        return false;
    }

    match kind {
        Shake::ShiftDay => (0..SHAKE_ATTEMPTS).any(|_| {
            let patient = rng.random_range(0..n);
            match shifted_day(solution, patient, rng) {
                Some(mv) => apply_admissible(neighborhood, solution, &mv),
                None => false,
            }
        }),
        Shake::ChangeWard => (0..SHAKE_ATTEMPTS).any(|_| {
            let patient = rng.random_range(0..n);
            match random_ward(instance, solution, patient, rng) {
                Some(mv) => apply_admissible(neighborhood, solution, &mv),
                None => false,
            }
        }),
        Shake::MovePair => {
            let first = rng.random_range(0..n);
            let second = (first + rng.random_range(1..n)) % n;
            let mut moved = false;
            for patient in [first, second] {
                moved |= (0..SHAKE_ATTEMPTS).any(|_| {
                    let mv = if rng.random_bool(0.5) {
                        random_day(instance, solution, patient, rng)
                    } else {
                        random_ward(instance, solution, patient, rng)
                    };
                    match mv {
                        Some(mv) => apply_admissible(neighborhood, solution, &mv),
                        None => false,
                    }
                });
            }
            moved
        }
        Shake::Swap => (0..SHAKE_ATTEMPTS).any(|_| {
            let first = rng.random_range(0..n);
            let second = (first + rng.random_range(1..n)) % n;
            apply_admissible(neighborhood, solution, &Move::Swap { first, second })
        }),
    }
}

fn apply_admissible(neighborhood: &Neighborhood<'_>, solution: &mut Solution, mv: &Move) -> bool {
    let admissible = neighborhood.is_admissible(solution, mv);
    if admissible {
        solution.apply(neighborhood.instance(), mv);
    }
    admissible
}

fn shifted_day<R: Rng>(solution: &Solution, patient: usize, rng: &mut R) -> Option<Move> {
    let current = solution.assignment(patient);
    let shift = SHIFTS[rng.random_range(0..SHIFTS.len())];
    let day = current.day.checked_add_signed(shift)?;
    Some(Move::Reassign {
        patient,
        ward: current.ward,
        day,
    })
}

fn random_day<R: Rng>(
    instance: &Instance,
    solution: &Solution,
    patient: usize,
    rng: &mut R,
) -> Option<Move> {
    let options = instance.options(patient);
    if options.first_day > options.last_day {
        return None;
    }
    Some(Move::Reassign {
        patient,
        ward: solution.assignment(patient).ward,
        day: rng.random_range(options.first_day..=options.last_day),
    })
}

fn random_ward<R: Rng>(
    instance: &Instance,
    solution: &Solution,
    patient: usize,
    rng: &mut R,
) -> Option<Move> {
    let wards = &instance.options(patient).wards;
    if wards.is_empty() {
        return None;
    }
    Some(Move::Reassign {
        patient,
        ward: wards[rng.random_range(0..wards.len())],
        day: solution.assignment(patient).day,
    })
}
