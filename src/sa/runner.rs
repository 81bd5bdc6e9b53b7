//! SA execution loop.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use super::types::SaResult;
use super::ENGINE_NAME;
use crate::config::AdmissionConfig;
use crate::engine::{Budget, History, SearchEngine, SearchOutcome, StopReason};
use crate::error::Result;
use crate::model::Instance;
use crate::neighborhood::Neighborhood;
use crate::objective::Evaluator;
use crate::solution::{construct, Solution};

/// Simulated annealing over reassign and swap moves.
///
/// Each iteration samples one admissible move and computes its exact
/// delta. The move is accepted when `delta <= 0`; otherwise a uniform
/// `u` in `[0, 1)` is drawn from the engine's random source and the move
/// is accepted iff `u < exp(-delta / T)`. No random number is drawn for
/// non-worsening moves. After every `epoch_length` iterations `T` is
/// multiplied by `cooling_rate`.
///
/// The run stops at an iteration boundary on `max_iterations`,
/// `T < min_temperature`, the phase-1 time limit or cancellation, and
/// returns the best solution seen.
///
/// The engine owns its configuration and random source and is `Clone`,
/// so independent restarts need no shared state.
#[derive(Debug, Clone)]
pub struct SaEngine<R: Rng = ChaCha8Rng> {
    config: AdmissionConfig,
    rng: R,
    cancel: Option<Arc<AtomicBool>>,
}

impl SaEngine<ChaCha8Rng> {
    /// Engine seeded from `config.random_seed`.
    pub fn from_seed(config: AdmissionConfig) -> Result<Self> {
        let rng = ChaCha8Rng::seed_from_u64(config.random_seed);
        Self::new(config, rng)
    }
}

impl<R: Rng> SaEngine<R> {
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

    /// Checks `flag` at every iteration boundary and stops once it is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Checks feasibility, constructs an initial solution and anneals it.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::InfeasibleInstance`](crate::AdmissionError::InfeasibleInstance)
    /// from the pre-search check or from hard-mode construction.
    pub fn run(&mut self, instance: &Instance) -> Result<SaResult> {
        instance.check_feasible(self.config.capacity_mode)?;
        let initial = construct(
            instance,
            self.config.construction,
            self.config.capacity_mode,
            &mut self.rng,
        )?;
        Ok(self.run_from(instance, initial))
    }

    /// Anneals from a given solution.
    pub fn run_from(&mut self, instance: &Instance, initial: Solution) -> SaResult {
        let config = &self.config;
        let evaluator = Evaluator::from_config(config);
        let neighborhood = Neighborhood::from_config(instance, config);
        let budget = Budget::start(config.time_limit_phase1, self.cancel.clone());

        let mut current = initial;
        let mut best = current.clone();
        let mut best_cost = evaluator.cost(&current);
        let mut best_iteration = 0;

        let mut temperature = config.initial_temperature;
        let mut iterations = 0usize;
        let mut accepted_moves = 0usize;
        let mut improving_moves = 0usize;
        let mut history = History::new(100.max(config.epoch_length), best_cost);
        // Known non-empty neighborhood of `current`; reset by every applied move.
        let mut has_moves = false;

        info!(
            event = "phase_start",
            phase = ENGINE_NAME,
            initial_cost = best_cost,
            temperature = temperature,
        );

        let stop_reason = loop {
            if iterations >= config.max_iterations {
                break StopReason::MaxIterations;
            }
            if temperature < config.min_temperature {
                break StopReason::MinTemperature;
            }
            if let Some(reason) = budget.exhausted() {
                break reason;
            }

            iterations += 1;
            match neighborhood.sample(&current, &mut self.rng) {
                Some(mv) => {
                    let assessment = evaluator.assess(instance, &current, &mv);
                    // Metropolis acceptance criterion
                    let accept = assessment.delta <= 0.0
                        || self.rng.random::<f64>() < (-assessment.delta / temperature).exp();

                    if accept {
                        current.apply(instance, &mv);
                        has_moves = false;
                        accepted_moves += 1;
                        if assessment.delta < 0.0 {
                            improving_moves += 1;
                        }
                        if assessment.cost < best_cost {
                            best = current.clone();
                            best_cost = assessment.cost;
                            best_iteration = iterations;
                            debug!(
                                event = "new_best",
                                phase = ENGINE_NAME,
                                iteration = iterations,
                                cost = best_cost,
                                temperature = temperature,
                            );
                        }
                    }
                }
                None if !has_moves => {
                    if neighborhood.moves(&current).next().is_none() {
                        break StopReason::NeighborhoodExhausted;
                    }
                    has_moves = true;
                }
                // Sampling missed a sparse neighborhood; the iteration idles.
                None => {}
            }

            history.record(iterations, best_cost);
            if iterations % config.epoch_length == 0 {
                temperature *= config.cooling_rate;
            }
        };

        let elapsed = budget.elapsed();
        info!(
            event = "phase_end",
            phase = ENGINE_NAME,
            duration_ms = elapsed.as_millis() as u64,
            steps = iterations as u64,
            accepted = accepted_moves as u64,
            score = best_cost,
            stop = %stop_reason,
        );

        SaResult {
            best,
            best_cost,
            iterations,
            best_iteration,
            final_temperature: temperature,
            accepted_moves,
            improving_moves,
            cancelled: stop_reason == StopReason::Cancelled,
            stop_reason,
            elapsed,
            cost_history: history.finish(best_cost),
        }
    }
}

impl<R: Rng> SearchEngine for SaEngine<R> {
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
    use crate::config::{CapacityMode, Construction};
    use crate::error::AdmissionError;
    use crate::fixtures;
    use crate::model::{Patient, Ward};
    use crate::solution::Assignment;
    use std::sync::atomic::Ordering;

    fn assert_feasible(instance: &Instance, solution: &Solution) {
        assert!(solution.within_capacity());
        for a in solution.assignments() {
            assert!(instance.options(a.patient).admits(a.ward, a.day), "{a:?}");
        }
        for w in 0..instance.num_wards() {
            for d in 0..instance.horizon() {
                let ward = instance.ward(w);
                assert!(solution.occupancy(w, d) <= i64::from(ward.capacity));
                assert!(solution.operating_time_used(w, d) <= i64::from(ward.operating_time[d]));
            }
        }
    }

    #[test]
    fn test_sa_three_wards_feasible() {
        let inst = fixtures::three_wards();
        let config = AdmissionConfig::default().with_max_iterations(2_000).with_seed(42);
        let result = SaEngine::from_seed(config).unwrap().run(&inst).unwrap();

        assert_feasible(&inst, &result.best);
        let eval = Evaluator::new(0.5, 0.5);
        assert_eq!(result.best_cost, eval.evaluate(&inst, &result.best));
        assert!(result.iterations <= 2_000);
    }

    #[test]
    fn test_sa_improves_on_construction() {
        let inst = fixtures::week();
        let config = AdmissionConfig::default()
            .with_max_iterations(5_000)
            .with_temperature(50.0, 0.95)
            .with_epoch_length(50)
            .with_seed(7);
        let eval = Evaluator::from_config(&config);
        let initial = crate::solution::greedy(&inst, CapacityMode::Hard).unwrap();
        let initial_cost = eval.cost(&initial);

        let result = SaEngine::from_seed(config).unwrap().run_from(&inst, initial);
        assert!(result.best_cost <= initial_cost);
        assert!(result.improving_moves > 0);
        assert!(result.accepted_moves >= result.improving_moves);
        assert_feasible(&inst, &result.best);
    }

    #[test]
    fn test_sa_same_seed_same_result() {
        let inst = fixtures::week();
        let config = AdmissionConfig::default()
            .with_max_iterations(1_000)
            .with_construction(Construction::Random)
            .with_seed(3);
        let a = SaEngine::from_seed(config.clone()).unwrap().run(&inst).unwrap();
        let b = SaEngine::from_seed(config).unwrap().run(&inst).unwrap();
        assert_eq!(a.best.assignments(), b.best.assignments());
        assert_eq!(a.best_cost, b.best_cost);
        assert_eq!(a.accepted_moves, b.accepted_moves);
    }

    #[test]
    fn test_sa_max_iterations_limit() {
        let inst = fixtures::week();
        let config = AdmissionConfig::default()
            .with_max_iterations(100)
            .with_temperature(1e10, 1.0)
            .with_min_temperature(1e-15);
        let result = SaEngine::from_seed(config).unwrap().run(&inst).unwrap();
        assert_eq!(result.iterations, 100);
        assert_eq!(result.stop_reason, StopReason::MaxIterations);
    }

    #[test]
    fn test_sa_stops_below_min_temperature() {
        let inst = fixtures::week();
        let config = AdmissionConfig::default()
            .with_max_iterations(1_000_000)
            .with_temperature(10.0, 0.5)
            .with_min_temperature(1.0)
            .with_epoch_length(10);
        let result = SaEngine::from_seed(config).unwrap().run(&inst).unwrap();
        // 10 → 5 → 2.5 → 1.25 → 0.625 after four epochs.
        assert_eq!(result.stop_reason, StopReason::MinTemperature);
        assert_eq!(result.iterations, 40);
        assert!(result.final_temperature < 1.0);
    }

    #[test]
    fn test_sa_cancellation() {
        let inst = fixtures::week();
        // Set before running so cancellation is deterministic.
        let cancel = Arc::new(AtomicBool::new(true));
        let mut engine = SaEngine::from_seed(AdmissionConfig::default())
            .unwrap()
            .with_cancel(cancel.clone());
        let result = engine.run(&inst).unwrap();
        assert!(result.cancelled);
        assert_eq!(result.iterations, 0);
        assert!(cancel.load(Ordering::Relaxed));
    }

    #[test]
    fn test_sa_cost_history_non_increasing() {
        let inst = fixtures::week();
        let config = AdmissionConfig::default().with_max_iterations(3_000);
        let result = SaEngine::from_seed(config).unwrap().run(&inst).unwrap();
        for window in result.cost_history.windows(2) {
            assert!(window[1] <= window[0]);
        }
        assert_eq!(result.cost_history.last(), Some(&result.best_cost));
    }

    #[test]
    fn test_sa_metropolis_accepts_uphill_when_hot() {
        let inst = fixtures::week();
        let config = AdmissionConfig::default()
            .with_max_iterations(2_000)
            .with_temperature(1e9, 1.0)
            .with_min_temperature(1.0);
        let result = SaEngine::from_seed(config).unwrap().run(&inst).unwrap();
        assert!(
            result.acceptance_ratio() > 0.9,
            "expected high acceptance at high temp, got {}",
            result.acceptance_ratio()
        );
    }

    #[test]
    fn test_sa_rejects_invalid_config() {
        let config = AdmissionConfig::default().with_temperature(10.0, 0.0);
        assert!(matches!(
            SaEngine::from_seed(config),
            Err(AdmissionError::Configuration(_))
        ));
    }

    #[test]
    fn test_sa_reports_infeasible_instance() {
        let wards = vec![Ward::new("A", 1).with_specializations([0])];
        let patients = vec![Patient::new("orphan", 9).with_window(0, 0)];
        let inst = Instance::new(1, wards, patients).unwrap();
        let mut engine = SaEngine::from_seed(AdmissionConfig::default()).unwrap();
        assert!(matches!(
            engine.run(&inst),
            Err(AdmissionError::InfeasibleInstance { .. })
        ));
    }

    #[test]
    fn test_sa_idles_when_sampler_misses_swaps() {
        // The only admissible move is a swap; with swaps disabled in the
        // sampler every iteration idles instead of stopping the run.
        let wards = vec![Ward::new("A", 1).with_specializations([0])];
        let patients = vec![
            Patient::new("p0", 0).with_window(0, 1),
            Patient::new("p1", 0).with_window(0, 1),
        ];
        let inst = Instance::new(2, wards, patients).unwrap();
        let config = AdmissionConfig::default()
            .with_max_iterations(50)
            .with_swap_probability(0.0);
        let result = SaEngine::from_seed(config).unwrap().run(&inst).unwrap();
        assert_eq!(result.stop_reason, StopReason::MaxIterations);
        assert_eq!(result.iterations, 50);
        assert_eq!(result.accepted_moves, 0);
    }

    #[test]
    fn test_sa_runs_when_first_fit_blocks_a_patient() {
        // First fit puts p0 into the shared ward and leaves p1 nowhere;
        // construction must repair rather than give up.
        let wards = vec![
            Ward::new("A", 1).with_specializations([0, 1]),
            Ward::new("B", 1).with_specializations([0]),
        ];
        let patients = vec![
            Patient::new("p0", 0).with_window(0, 0),
            Patient::new("p1", 1).with_window(0, 0),
        ];
        let inst = Instance::new(1, wards, patients).unwrap();
        let result = SaEngine::from_seed(AdmissionConfig::default())
            .unwrap()
            .run(&inst)
            .unwrap();
        assert_feasible(&inst, &result.best);
        assert_eq!(result.best.assignment(0), Assignment::new(0, 1, 0));
        assert_eq!(result.best.assignment(1), Assignment::new(1, 0, 0));
    }

    #[test]
    fn test_sa_single_placement_exhausts_neighborhood() {
        let wards = vec![Ward::new("A", 1).with_specializations([0])];
        let patients = vec![Patient::new("p", 0).with_window(0, 0)];
        let inst = Instance::new(1, wards, patients).unwrap();
        let initial = Solution::from_assignments(&inst, vec![Assignment::new(0, 0, 0)]).unwrap();
        let mut engine = SaEngine::from_seed(AdmissionConfig::default()).unwrap();
        let result = engine.run_from(&inst, initial);
        assert_eq!(result.stop_reason, StopReason::NeighborhoodExhausted);
        assert_eq!(result.iterations, 1);
    }
}
