//! Tabu Search execution engine.
//!
//! # Algorithm
//!
//! 1. Construct an initial solution
//! 2. At each iteration:
//!    a. Enumerate the neighborhood (or sample `tabu_sample_size` moves)
//!    b. Select the lowest-cost non-tabu move, or a tabu move whose cost
//!       beats the best found (aspiration); ties go to the first candidate
//!    c. Apply it and record the placements it abandoned as tabu
//!    d. Update the global best if strictly improved
//! 3. Terminate on max iterations, time limit, cancellation, an empty
//!    neighborhood or stagnation
//!
//! When every candidate is tabu and none aspirates the iteration is idle.
//!
//! # Reference
//!
//! Glover, F. (1989). "Tabu Search - Part I", *ORSA Journal on Computing* 1(3), 190-206.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use smallvec::SmallVec;
use tracing::{debug, info, trace};

use super::memory::{TabuAttribute, TabuMemory};
use super::types::{TabuResult, TabuStep};
use super::ENGINE_NAME;
use crate::config::AdmissionConfig;
use crate::engine::{Budget, History, SearchEngine, SearchOutcome, StopReason};
use crate::error::Result;
use crate::model::Instance;
use crate::neighborhood::Neighborhood;
use crate::objective::Evaluator;
use crate::solution::{construct, Move, Solution};

/// A scored candidate as seen by the selection rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Scored {
    pub cost: f64,
    pub tabu: bool,
}

/// Index of the admissible candidate with the lowest cost.
///
/// A tabu candidate is admissible only when its cost is strictly below
/// `best_cost`. Ties keep the earliest candidate.
pub(crate) fn select(candidates: &[Scored], best_cost: f64) -> Option<usize> {
    let mut chosen: Option<usize> = None;
    for (i, c) in candidates.iter().enumerate() {
        if c.tabu && c.cost >= best_cost {
            continue;
        }
        if chosen.is_none_or(|j| c.cost < candidates[j].cost) {
            chosen = Some(i);
        }
    }
    chosen
}

/// Search state of one tabu trajectory, advanced one iteration at a time.
#[derive(Debug, Clone)]
pub struct TabuState<'a> {
    instance: &'a Instance,
    evaluator: Evaluator,
    neighborhood: Neighborhood<'a>,
    memory: TabuMemory,
    sample_size: usize,

    current: Solution,
    current_cost: f64,
    best: Solution,
    best_cost: f64,
    best_iteration: usize,

    iteration: usize,
    aspiration_moves: usize,
    blocked_iterations: usize,
    /// Set once the full neighborhood of `current` is known to be non-empty.
    has_moves: bool,
}

impl<'a> TabuState<'a> {
    /// # Errors
    ///
    /// [`AdmissionError::Configuration`](crate::AdmissionError::Configuration)
    /// when `config` fails validation.
    pub fn new(
        instance: &'a Instance,
        config: &AdmissionConfig,
        initial: Solution,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::start(instance, config, initial))
    }

    /// State for an already validated `config`.
    fn start(instance: &'a Instance, config: &AdmissionConfig, initial: Solution) -> Self {
        let evaluator = Evaluator::from_config(config);
        let cost = evaluator.cost(&initial);
        Self {
            instance,
            evaluator,
            neighborhood: Neighborhood::from_config(instance, config),
            memory: TabuMemory::new(config.tabu_tenure),
            sample_size: config.tabu_sample_size,
            best: initial.clone(),
            current: initial,
            current_cost: cost,
            best_cost: cost,
            best_iteration: 0,
            iteration: 0,
            aspiration_moves: 0,
            blocked_iterations: 0,
            has_moves: false,
        }
    }

    /// Runs one iteration.
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> TabuStep {
        self.iteration += 1;
        let iteration = self.iteration;

        let candidates: Vec<Move> = if self.sample_size == 0 {
            self.neighborhood.moves(&self.current).collect()
        } else {
            self.neighborhood
                .sample_many(&self.current, self.sample_size, rng)
        };
        if candidates.is_empty() {
            if !self.has_moves {
                if self.neighborhood.moves(&self.current).next().is_none() {
                    return TabuStep::Exhausted;
                }
                self.has_moves = true;
            }
            self.blocked_iterations += 1;
            return TabuStep::Idle;
        }

        let scored: Vec<Scored> = candidates
            .iter()
            .map(|mv| Scored {
                cost: self.evaluator.assess(self.instance, &self.current, mv).cost,
                tabu: self.is_tabu_at(mv, iteration),
            })
            .collect();

        let Some(index) = select(&scored, self.best_cost) else {
            self.blocked_iterations += 1;
            trace!(event = "idle", phase = ENGINE_NAME, iteration = iteration);
            return TabuStep::Idle;
        };

        let mv = candidates[index];
        let Scored { cost, tabu } = scored[index];
        let abandoned: SmallVec<[TabuAttribute; 2]> = mv
            .relocations(&self.current)
            .iter()
            .map(|(from, _)| TabuAttribute::from(*from))
            .collect();

        self.current.apply(self.instance, &mv);
        self.current_cost = cost;
        self.has_moves = false;
        for attribute in abandoned {
            self.memory.forbid(attribute, iteration);
        }
        if tabu {
            self.aspiration_moves += 1;
        }
        if cost < self.best_cost {
            self.best = self.current.clone();
            self.best_cost = cost;
            self.best_iteration = iteration;
        }
        if iteration % self.memory.tenure() == 0 {
            self.memory.purge(iteration);
        }

        TabuStep::Applied {
            mv,
            cost,
            aspiration: tabu,
        }
    }

    /// Whether `mv` would re-enter a tabu placement on the next iteration.
    pub fn is_tabu(&self, mv: &Move) -> bool {
        self.is_tabu_at(mv, self.iteration + 1)
    }

    fn is_tabu_at(&self, mv: &Move, iteration: usize) -> bool {
        mv.relocations(&self.current)
            .iter()
            .any(|(_, to)| self.memory.is_tabu(&TabuAttribute::from(*to), iteration))
    }

    #[inline]
    pub fn current(&self) -> &Solution {
        &self.current
    }

    #[inline]
    pub fn current_cost(&self) -> f64 {
        self.current_cost
    }

    #[inline]
    pub fn best(&self) -> &Solution {
        &self.best
    }

    #[inline]
    pub fn best_cost(&self) -> f64 {
        self.best_cost
    }

    /// Iterations run so far.
    #[inline]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    #[inline]
    pub fn memory(&self) -> &TabuMemory {
        &self.memory
    }
}

/// Tabu search over reassign and swap moves.
#[derive(Debug, Clone)]
pub struct TabuEngine<R: Rng = ChaCha8Rng> {
    config: AdmissionConfig,
    rng: R,
    cancel: Option<Arc<AtomicBool>>,
}

impl TabuEngine<ChaCha8Rng> {
    /// Engine seeded from `config.random_seed`.
    pub fn from_seed(config: AdmissionConfig) -> Result<Self> {
        let rng = ChaCha8Rng::seed_from_u64(config.random_seed);
        Self::new(config, rng)
    }
}

impl<R: Rng> TabuEngine<R> {
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
    pub fn run(&mut self, instance: &Instance) -> Result<TabuResult> {
        instance.check_feasible(self.config.capacity_mode)?;
        let initial = construct(
            instance,
            self.config.construction,
            self.config.capacity_mode,
            &mut self.rng,
        )?;
        Ok(self.run_from(instance, initial))
    }

    /// Searches from a given solution.
    pub fn run_from(&mut self, instance: &Instance, initial: Solution) -> TabuResult {
        let config = &self.config;
        let budget = Budget::start(config.time_limit_phase1, self.cancel.clone());
        let mut state = TabuState::start(instance, config, initial);
        let mut history = History::new(100, state.best_cost());
        let mut no_improve = 0usize;

        info!(
            event = "phase_start",
            phase = ENGINE_NAME,
            initial_cost = state.best_cost(),
            tenure = config.tabu_tenure,
        );

        let stop_reason = loop {
            if state.iteration() >= config.max_iterations {
                break StopReason::MaxIterations;
            }
            if let Some(reason) = budget.exhausted() {
                break reason;
            }

            let best_before = state.best_cost();
            if state.step(&mut self.rng) == TabuStep::Exhausted {
                break StopReason::NeighborhoodExhausted;
            }

            if state.best_cost() < best_before {
                no_improve = 0;
                debug!(
                    event = "new_best",
                    phase = ENGINE_NAME,
                    iteration = state.iteration(),
                    cost = state.best_cost(),
                );
            } else {
                no_improve += 1;
            }
            history.record(state.iteration(), state.best_cost());

            if config.max_no_improve > 0 && no_improve >= config.max_no_improve {
                break StopReason::Stagnation;
            }
        };

        let elapsed = budget.elapsed();
        info!(
            event = "phase_end",
            phase = ENGINE_NAME,
            duration_ms = elapsed.as_millis() as u64,
            steps = state.iteration() as u64,
            aspirations = state.aspiration_moves as u64,
            blocked = state.blocked_iterations as u64,
            score = state.best_cost(),
            stop = %stop_reason,
        );

        TabuResult {
            best_cost: state.best_cost,
            iterations: state.iteration,
            best_iteration: state.best_iteration,
            aspiration_moves: state.aspiration_moves,
            blocked_iterations: state.blocked_iterations,
            stop_reason,
            elapsed,
            cost_history: history.finish(state.best_cost),
            best: state.best,
        }
    }
}

impl<R: Rng> SearchEngine for TabuEngine<R> {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn search(&mut self, instance: &Instance) -> Result<SearchOutcome> {
        self.run(instance).map(SearchOutcome::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CapacityMode;
    use crate::fixtures;
    use crate::model::{Patient, Ward};
    use crate::solution::greedy;
    use std::collections::HashMap;

    fn scored(cost: f64, tabu: bool) -> Scored {
        Scored { cost, tabu }
    }

    #[test]
    fn test_select_lowest_non_tabu() {
        let c = [scored(5.0, false), scored(3.0, false), scored(4.0, false)];
        assert_eq!(select(&c, 1.0), Some(1));
    }

    #[test]
    fn test_select_ties_keep_first() {
        let c = [scored(5.0, false), scored(3.0, false), scored(3.0, false)];
        assert_eq!(select(&c, 1.0), Some(1));
    }

    #[test]
    fn test_select_skips_tabu_without_aspiration() {
        let c = [scored(2.0, true), scored(6.0, false)];
        assert_eq!(select(&c, 2.0), Some(1));
    }

    #[test]
    fn test_select_aspiration_overrides_tabu() {
        let c = [scored(6.0, false), scored(1.5, true)];
        assert_eq!(select(&c, 2.0), Some(1));
    }

    #[test]
    fn test_select_all_tabu_is_idle() {
        let c = [scored(3.0, true), scored(2.0, true)];
        assert_eq!(select(&c, 2.0), None);
        assert_eq!(select(&[], 2.0), None);
    }

    /// Replays a trajectory with an independent record of abandoned
    /// placements and checks every applied move against it.
    fn check_tabu_rule(config: AdmissionConfig, steps: usize) {
        let inst = fixtures::week();
        let initial = greedy(&inst, config.capacity_mode).unwrap();
        let mut state = TabuState::new(&inst, &config, initial).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(config.random_seed);
        let mut abandoned_at: HashMap<TabuAttribute, usize> = HashMap::new();

        for _ in 0..steps {
            let before = state.current().clone();
            let best_before = state.best_cost();
            let step = state.step(&mut rng);
            let iteration = state.iteration();

            if let TabuStep::Applied {
                mv,
                cost,
                aspiration,
            } = step
            {
                let relocations = mv.relocations(&before);
                let re_enters_tabu = relocations.iter().any(|(_, to)| {
                    abandoned_at
                        .get(&TabuAttribute::from(*to))
                        .is_some_and(|&k| iteration <= k + config.tabu_tenure)
                });
                assert_eq!(re_enters_tabu, aspiration, "iteration {iteration}");
                if re_enters_tabu {
                    assert!(cost < best_before, "tabu move without aspiration");
                }
                for (from, _) in &relocations {
                    abandoned_at.insert(TabuAttribute::from(*from), iteration);
                }
            }
        }
    }

    #[test]
    fn test_tabu_rule_full_enumeration() {
        let config = AdmissionConfig::default().with_tabu_tenure(7).with_seed(1);
        check_tabu_rule(config, 150);
    }

    #[test]
    fn test_tabu_rule_sampled_soft() {
        for seed in 0..4 {
            let config = AdmissionConfig::default()
                .with_tabu_tenure(3)
                .with_tabu_sample_size(12)
                .with_capacity_mode(CapacityMode::Soft)
                .with_seed(seed);
            check_tabu_rule(config, 300);
        }
    }

    #[test]
    fn test_state_rejects_zero_tenure() {
        let inst = fixtures::three_wards();
        let initial = greedy(&inst, CapacityMode::Hard).unwrap();
        let config = AdmissionConfig::default().with_tabu_tenure(0);
        assert!(matches!(
            TabuState::new(&inst, &config, initial),
            Err(crate::error::AdmissionError::Configuration(_))
        ));
    }

    #[test]
    fn test_sampled_idle_when_sampling_stalls() {
        // One bed, two one-day patients on separate days: the only moves
        // are swaps, which a reassign-only sampler never proposes.
        let wards = vec![Ward::new("A", 1).with_specializations([0])];
        let patients = vec![
            Patient::new("p0", 0).with_window(0, 1),
            Patient::new("p1", 0).with_window(0, 1),
        ];
        let inst = Instance::new(2, wards, patients).unwrap();
        let config = AdmissionConfig::default()
            .with_tabu_sample_size(4)
            .with_swap_probability(0.0);
        let initial = greedy(&inst, CapacityMode::Hard).unwrap();
        let mut state = TabuState::new(&inst, &config, initial).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        for _ in 0..3 {
            assert_eq!(state.step(&mut rng), TabuStep::Idle);
        }
        assert_eq!(state.iteration(), 3);
    }

    #[test]
    fn test_tabu_three_wards_feasible() {
        let inst = fixtures::three_wards();
        let config = AdmissionConfig::default().with_max_iterations(200);
        let result = TabuEngine::from_seed(config).unwrap().run(&inst).unwrap();
        assert!(result.best.within_capacity());
        assert_eq!(
            result.best_cost,
            Evaluator::new(0.5, 0.5).evaluate(&inst, &result.best)
        );
    }

    #[test]
    fn test_tabu_improves_on_construction() {
        let inst = fixtures::week();
        let config = AdmissionConfig::default()
            .with_max_iterations(300)
            .with_tabu_tenure(10);
        let initial = greedy(&inst, CapacityMode::Hard).unwrap();
        let initial_cost = Evaluator::from_config(&config).cost(&initial);
        let result = TabuEngine::from_seed(config).unwrap().run_from(&inst, initial);

        assert!(result.best_cost < initial_cost);
        assert!(result.best_iteration > 0);
        assert!(result.best.within_capacity());
        for window in result.cost_history.windows(2) {
            assert!(window[1] <= window[0]);
        }
    }

    #[test]
    fn test_tabu_stagnation_stops_early() {
        let inst = fixtures::three_wards();
        let config = AdmissionConfig::default()
            .with_max_iterations(10_000)
            .with_max_no_improve(20);
        let result = TabuEngine::from_seed(config).unwrap().run(&inst).unwrap();
        assert_eq!(result.stop_reason, StopReason::Stagnation);
        assert!(result.iterations < 10_000);
        assert!(result.iterations >= 20);
    }

    #[test]
    fn test_tabu_cancellation() {
        let inst = fixtures::week();
        let cancel = Arc::new(AtomicBool::new(true));
        let result = TabuEngine::from_seed(AdmissionConfig::default())
            .unwrap()
            .with_cancel(cancel)
            .run(&inst)
            .unwrap();
        assert_eq!(result.stop_reason, StopReason::Cancelled);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_tabu_deterministic() {
        let inst = fixtures::week();
        let config = AdmissionConfig::default()
            .with_max_iterations(200)
            .with_tabu_sample_size(25)
            .with_seed(11);
        let a = TabuEngine::from_seed(config.clone()).unwrap().run(&inst).unwrap();
        let b = TabuEngine::from_seed(config).unwrap().run(&inst).unwrap();
        assert_eq!(a.best.assignments(), b.best.assignments());
        assert_eq!(a.iterations, b.iterations);
    }
}
