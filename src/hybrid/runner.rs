//! Three-phase hybrid run: metaheuristic, exact solve, merge.

use std::time::Instant;

use tracing::{info, warn};

use super::report::{relative_gap, HybridReport};
use crate::config::{AdmissionConfig, CapacityMode};
use crate::engine::{EngineKind, SearchEngine};
use crate::error::{AdmissionError, Result};
use crate::model::Instance;
use crate::objective::Evaluator;
use crate::solution::Solution;
use crate::solver::{ExactSolver, SolveRequest, SolveResponse, SolveStatus, WarmStart};

/// Outcome of reconciling a solver answer with the phase-1 solution.
#[derive(Debug)]
struct Merge {
    /// The solver's solution, when adopted.
    adopted: Option<Solution>,
    certified: bool,
    phase2_cost: Option<f64>,
    violation: Option<AdmissionError>,
}

impl Merge {
    fn keep(phase2_cost: Option<f64>) -> Self {
        Self {
            adopted: None,
            certified: false,
            phase2_cost,
            violation: None,
        }
    }

    fn violation(phase2_cost: Option<f64>, message: String) -> Self {
        Self {
            violation: Some(AdmissionError::SolverContractViolation(message)),
            ..Self::keep(phase2_cost)
        }
    }
}

/// Metaheuristic warm start followed by an exact solve.
///
/// Phase 1 runs a [`SearchEngine`] under `time_limit_phase1` and yields
/// `S0`. Phase 2 hands `S0` to the exact solver as a [`WarmStart`] under
/// `time_limit_phase2`, with the same objective. Phase 3 decodes and
/// re-evaluates the answer locally:
///
/// | status | answer | result |
/// |---|---|---|
/// | OPTIMAL | valid, cost ≤ S0 | adopted, certified optimal |
/// | FEASIBLE | valid, cost < S0 | adopted, not certified |
/// | FEASIBLE | valid, cost ≥ S0 | `S0` kept, heuristic only |
/// | TIMEOUT_NO_SOLUTION | none | `S0` kept, heuristic only |
/// | INFEASIBLE, or any invalid answer, or OPTIMAL worse than S0 | | contract violation recorded, `S0` kept |
///
/// The final cost therefore never exceeds the phase-1 cost.
#[derive(Debug)]
pub struct HybridSolver<S: ExactSolver> {
    config: AdmissionConfig,
    engine: EngineKind,
    solver: S,
}

impl<S: ExactSolver> HybridSolver<S> {
    /// # Errors
    ///
    /// [`AdmissionError::Configuration`] when `config` fails validation.
    pub fn new(config: AdmissionConfig, solver: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            engine: EngineKind::default(),
            solver,
        })
    }

    /// Selects the phase-1 engine used by [`run`](Self::run).
    pub fn with_engine(mut self, engine: EngineKind) -> Self {
        self.engine = engine;
        self
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }

    /// Runs all three phases with the configured engine.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::InfeasibleInstance`] before any phase runs when
    /// the instance cannot be solved. Solver failures are not errors; they
    /// are recorded in the report.
    pub fn run(&mut self, instance: &Instance) -> Result<HybridReport> {
        let mut engine = self.engine.build(&self.config)?;
        self.run_with(engine.as_mut(), instance)
    }

    /// Runs all three phases with a caller-supplied phase-1 engine.
    ///
    /// The engine may be configured differently from the hybrid: `S0` is
    /// re-evaluated with the hybrid's objective, and that cost is what
    /// phase 3 compares against.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::InfeasibleInstance`] as for [`run`](Self::run),
    /// and [`AdmissionError::Configuration`] when the hybrid runs in hard
    /// mode but the engine returns a solution over capacity.
    pub fn run_with(
        &mut self,
        engine: &mut dyn SearchEngine,
        instance: &Instance,
    ) -> Result<HybridReport> {
        instance.check_feasible(self.config.capacity_mode)?;
        let evaluator = Evaluator::from_config(&self.config);

        info!(event = "phase_start", phase = "hybrid-phase1", engine = engine.name());
        let phase1 = engine.search(instance)?;
        let s0 = phase1.best;
        if self.config.capacity_mode == CapacityMode::Hard && !s0.within_capacity() {
            return Err(AdmissionError::Configuration(format!(
                "phase-1 engine {} returned a solution over capacity in hard mode",
                phase1.engine
            )));
        }
        let s0_cost = evaluator.cost(&s0);
        info!(
            event = "phase_end",
            phase = "hybrid-phase1",
            duration_ms = phase1.elapsed.as_millis() as u64,
            steps = phase1.iterations as u64,
            score = s0_cost,
        );

        let warm_start = WarmStart::from_solution(&s0);
        let request = SolveRequest {
            evaluator: &evaluator,
            capacity_mode: self.config.capacity_mode,
            time_limit: self.config.time_limit_phase2,
            warm_start: Some(&warm_start),
        };
        info!(
            event = "phase_start",
            phase = "hybrid-phase2",
            solver = self.solver.name(),
            warm_start_cost = s0_cost,
        );
        let started = Instant::now();
        let response = self.solver.solve(instance, &request);
        let phase2_elapsed = started.elapsed();
        info!(
            event = "phase_end",
            phase = "hybrid-phase2",
            duration_ms = phase2_elapsed.as_millis() as u64,
            status = %response.status,
        );

        let merge = merge(
            instance,
            &evaluator,
            self.config.capacity_mode,
            s0_cost,
            &response,
        );
        if let Some(violation) = &merge.violation {
            warn!(
                event = "solver_contract_violation",
                solver = self.solver.name(),
                status = %response.status,
                error = %violation,
            );
        }

        let certified = merge.certified;
        let heuristic_only = merge.adopted.is_none();
        let (solution, final_cost) = match merge.adopted {
            Some(solution) => {
                let cost = evaluator.cost(&solution);
                (solution, cost)
            }
            None => (s0, s0_cost),
        };
        let gap = response.bound.map(|bound| relative_gap(final_cost, bound));

        info!(
            event = "solve_end",
            phase = "hybrid",
            score = final_cost,
            certified = certified,
            heuristic_only = heuristic_only,
        );

        Ok(HybridReport {
            engine: phase1.engine,
            solver: self.solver.name().to_string(),
            phase1_cost: s0_cost,
            phase1_elapsed: phase1.elapsed,
            phase1_iterations: phase1.iterations,
            phase2_status: response.status,
            phase2_cost: merge.phase2_cost,
            phase2_bound: response.bound,
            phase2_elapsed,
            final_cost,
            certified_optimal: certified,
            heuristic_only,
            gap,
            contract_violation: merge.violation,
            solution,
        })
    }
}

/// Decodes and checks a solver answer against `S0`.
fn merge(
    instance: &Instance,
    evaluator: &Evaluator,
    mode: CapacityMode,
    s0_cost: f64,
    response: &SolveResponse,
) -> Merge {
    let status = response.status;
    match status {
        SolveStatus::TimeoutNoSolution => return Merge::keep(None),
        SolveStatus::Infeasible => {
            return Merge::violation(
                None,
                "solver reported INFEASIBLE although a feasible warm start was supplied".into(),
            )
        }
        SolveStatus::Optimal | SolveStatus::Feasible => {}
    }

    let Some(assignments) = response.assignments.clone() else {
        return Merge::violation(None, format!("{status} answer carries no solution"));
    };
    let solution = match Solution::from_assignments(instance, assignments) {
        Ok(solution) => solution,
        Err(e) => return Merge::violation(None, format!("{status} answer does not decode: {e}")),
    };
    let cost = evaluator.cost(&solution);
    if mode == CapacityMode::Hard && !solution.within_capacity() {
        return Merge::violation(
            Some(cost),
            format!("{status} answer exceeds bed or operating-time capacity"),
        );
    }

    match status {
        SolveStatus::Optimal if cost <= s0_cost => Merge {
            adopted: Some(solution),
            certified: true,
            phase2_cost: Some(cost),
            violation: None,
        },
        SolveStatus::Optimal => Merge::violation(
            Some(cost),
            format!("OPTIMAL answer costs {cost}, more than the warm start's {s0_cost}"),
        ),
        _ if cost < s0_cost => Merge {
            adopted: Some(solution),
            certified: false,
            phase2_cost: Some(cost),
            violation: None,
        },
        _ => Merge::keep(Some(cost)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::hybrid::OptimalityStatus;
    use crate::engine::{SearchOutcome, StopReason};
    use crate::model::{Patient, Ward};
    use crate::sa::SaEngine;
    use crate::solution::{greedy, Assignment};
    use crate::solver::ExhaustiveSolver;
    use std::time::Duration;

    /// Replies with a fixed response, whatever the request.
    struct Scripted {
        response: SolveResponse,
        calls: usize,
    }

    impl Scripted {
        fn new(response: SolveResponse) -> Self {
            Self { response, calls: 0 }
        }
    }

    impl ExactSolver for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn solve(&mut self, _: &Instance, _: &SolveRequest<'_>) -> SolveResponse {
            self.calls += 1;
            self.response.clone()
        }
    }

    fn config() -> AdmissionConfig {
        AdmissionConfig::default()
            .with_max_iterations(1_000)
            .with_time_limits(None, Some(Duration::from_secs(30)))
            .with_seed(42)
    }

    fn phase1(inst: &Instance) -> (Solution, f64) {
        let result = SaEngine::from_seed(config()).unwrap().run(inst).unwrap();
        (result.best, result.best_cost)
    }

    fn hybrid_with(response: SolveResponse) -> HybridSolver<Scripted> {
        HybridSolver::new(config(), Scripted::new(response)).unwrap()
    }

    #[test]
    fn test_three_wards_hybrid_not_worse_than_sa() {
        let inst = fixtures::three_wards();
        let (sa_best, sa_cost) = phase1(&inst);
        assert!(sa_best.within_capacity());

        let mut hybrid = HybridSolver::new(config(), ExhaustiveSolver::new()).unwrap();
        let report = hybrid.run(&inst).unwrap();

        assert_eq!(report.phase1_cost, sa_cost);
        assert!(report.final_cost <= sa_cost);
        assert_eq!(report.phase2_status, SolveStatus::Optimal);
        assert!(report.certified_optimal);
        assert!(!report.heuristic_only);
        assert_eq!(report.gap, Some(0.0));
        assert!(report.contract_violation.is_none());
        assert!(report.solution.within_capacity());
        assert_eq!(report.optimality_status(), OptimalityStatus::CertifiedOptimal);
    }

    #[test]
    fn test_orphan_specialization_fails_before_any_phase() {
        let wards = vec![Ward::new("A", 3).with_specializations([0])];
        let patients = vec![
            Patient::new("p0", 0).with_window(0, 1),
            Patient::new("p1", 7).with_window(0, 1),
        ];
        let inst = Instance::new(2, wards, patients).unwrap();
        let mut hybrid = hybrid_with(SolveResponse::timeout(Duration::ZERO));
        assert!(matches!(
            hybrid.run(&inst),
            Err(AdmissionError::InfeasibleInstance { .. })
        ));
        assert_eq!(hybrid.solver_mut().calls, 0);
    }

    #[test]
    fn test_timeout_keeps_phase1() {
        let inst = fixtures::three_wards();
        let (s0, s0_cost) = phase1(&inst);
        let report = hybrid_with(SolveResponse::timeout(Duration::from_millis(5)))
            .run(&inst)
            .unwrap();
        assert_eq!(report.final_cost, s0_cost);
        assert_eq!(report.solution.assignments(), s0.assignments());
        assert!(report.heuristic_only);
        assert!(!report.certified_optimal);
        assert!(report.contract_violation.is_none());
        assert_eq!(report.optimality_status(), OptimalityStatus::HeuristicOnly);
    }

    #[test]
    fn test_infeasible_status_is_contract_violation() {
        let inst = fixtures::three_wards();
        let (_, s0_cost) = phase1(&inst);
        let report = hybrid_with(SolveResponse::infeasible(Duration::ZERO))
            .run(&inst)
            .unwrap();
        assert_eq!(report.final_cost, s0_cost);
        assert!(report.heuristic_only);
        assert!(matches!(
            report.contract_violation,
            Some(AdmissionError::SolverContractViolation(_))
        ));
    }

    #[test]
    fn test_feasible_improvement_adopted_uncertified() {
        let inst = fixtures::three_wards();
        let (_, s0_cost) = phase1(&inst);
        let optimum = ExhaustiveSolver::new().solve(
            &inst,
            &SolveRequest {
                evaluator: &Evaluator::from_config(&config()),
                capacity_mode: CapacityMode::Hard,
                time_limit: None,
                warm_start: None,
            },
        );
        let best = optimum.assignments.clone().unwrap();
        let best_cost = optimum.objective.unwrap();

        let report = hybrid_with(
            SolveResponse::feasible(best.clone(), best_cost, Duration::ZERO).with_bound(0.0),
        )
        .run(&inst)
        .unwrap();

        assert!(report.final_cost <= s0_cost);
        assert!(!report.certified_optimal);
        if best_cost < s0_cost {
            assert!(!report.heuristic_only);
            assert_eq!(report.solution.assignments(), &best[..]);
            assert_eq!(report.optimality_status(), OptimalityStatus::Feasible);
        } else {
            assert!(report.heuristic_only);
        }
        assert!(report.gap.is_some());
    }

    #[test]
    fn test_feasible_worse_answer_is_ignored() {
        let inst = fixtures::three_wards();
        let (s0, s0_cost) = phase1(&inst);
        // Everyone on day 1 in the first wards: delayed and unbalanced.
        let worse: Vec<Assignment> = (0..5)
            .map(|p| Assignment::new(p, [0, 0, 1, 1, 2][p], 1))
            .collect();
        let report = hybrid_with(SolveResponse::feasible(worse, 0.0, Duration::ZERO))
            .run(&inst)
            .unwrap();
        assert_eq!(report.final_cost, s0_cost);
        assert_eq!(report.solution.assignments(), s0.assignments());
        assert!(report.heuristic_only);
        assert!(report.contract_violation.is_none());
        // The solver's own objective is not trusted.
        assert!(report.phase2_cost.unwrap() >= s0_cost);
    }

    #[test]
    fn test_optimal_worse_than_warm_start_is_violation() {
        let inst = fixtures::three_wards();
        let (_, s0_cost) = phase1(&inst);
        let worse: Vec<Assignment> = (0..5)
            .map(|p| Assignment::new(p, [0, 0, 1, 1, 2][p], 1))
            .collect();
        let report = hybrid_with(SolveResponse::optimal(worse, 0.0, Duration::ZERO))
            .run(&inst)
            .unwrap();
        assert_eq!(report.final_cost, s0_cost);
        assert!(!report.certified_optimal);
        assert!(report.contract_violation.is_some());
    }

    #[test]
    fn test_undecodable_and_over_capacity_answers_are_violations() {
        let inst = fixtures::three_wards();
        let (_, s0_cost) = phase1(&inst);

        let missing = vec![Assignment::new(0, 0, 0)];
        let report = hybrid_with(SolveResponse::optimal(missing, 0.0, Duration::ZERO))
            .run(&inst)
            .unwrap();
        assert!(report.contract_violation.is_some());
        assert_eq!(report.final_cost, s0_cost);

        let crowded: Vec<Assignment> = (0..5).map(|p| Assignment::new(p, 2, 0)).collect();
        let report = hybrid_with(SolveResponse::feasible(crowded, 0.0, Duration::ZERO))
            .run(&inst)
            .unwrap();
        assert!(report.contract_violation.is_some());
        assert_eq!(report.final_cost, s0_cost);

        let mut empty = SolveResponse::optimal(vec![], 0.0, Duration::ZERO);
        empty.assignments = None;
        let report = hybrid_with(empty).run(&inst).unwrap();
        assert!(report.contract_violation.is_some());
    }

    #[test]
    fn test_final_never_worse_than_phase1_across_seeds_and_engines() {
        let inst = fixtures::week();
        for seed in 0..3 {
            for kind in EngineKind::ALL {
                let cfg = config().with_max_iterations(200).with_seed(seed);
                let responses = [
                    SolveResponse::timeout(Duration::ZERO),
                    SolveResponse::infeasible(Duration::ZERO),
                    SolveResponse::feasible(
                        greedy(&inst, CapacityMode::Hard).unwrap().assignments().to_vec(),
                        0.0,
                        Duration::ZERO,
                    ),
                ];
                for response in responses {
                    let mut hybrid = HybridSolver::new(cfg.clone(), Scripted::new(response))
                        .unwrap()
                        .with_engine(kind);
                    let report = hybrid.run(&inst).unwrap();
                    assert!(report.final_cost <= report.phase1_cost);
                    assert_eq!(
                        report.final_cost,
                        Evaluator::from_config(&cfg).evaluate(&inst, &report.solution)
                    );
                }
            }
        }
    }

    /// Returns a fixed solution as its best, whatever the instance.
    struct Fixed(Solution);

    impl SearchEngine for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn search(&mut self, _: &Instance) -> Result<SearchOutcome> {
            Ok(SearchOutcome {
                engine: "fixed",
                best: self.0.clone(),
                best_cost: 0.0,
                iterations: 0,
                best_iteration: 0,
                elapsed: Duration::ZERO,
                stop_reason: StopReason::MaxIterations,
                cost_history: vec![0.0],
            })
        }
    }

    #[test]
    fn test_run_with_rescores_phase1_under_hybrid_objective() {
        let inst = fixtures::three_wards();
        let engine_config = config()
            .with_lambdas(0.0, 1.0)
            .with_capacity_penalty(0.0)
            .with_max_iterations(300);
        let alone = SaEngine::from_seed(engine_config.clone())
            .unwrap()
            .run(&inst)
            .unwrap();

        let mut engine = SaEngine::from_seed(engine_config).unwrap();
        let mut hybrid = hybrid_with(SolveResponse::timeout(Duration::ZERO));
        let report = hybrid.run_with(&mut engine, &inst).unwrap();

        let expected = Evaluator::from_config(&config()).cost(&alone.best);
        assert_eq!(report.solution.assignments(), alone.best.assignments());
        assert_eq!(report.phase1_cost, expected);
        assert_eq!(report.final_cost, expected);
        assert_ne!(report.phase1_cost, alone.best_cost);
    }

    #[test]
    fn test_run_with_uses_hybrid_cost_not_engine_cost() {
        let inst = fixtures::three_wards();
        let s0 = greedy(&inst, CapacityMode::Hard).unwrap();
        let expected = Evaluator::from_config(&config()).cost(&s0);
        assert!(expected > 0.0);

        let mut hybrid = hybrid_with(SolveResponse::timeout(Duration::ZERO));
        let report = hybrid.run_with(&mut Fixed(s0.clone()), &inst).unwrap();
        assert_eq!(report.phase1_cost, expected);
        assert_eq!(report.final_cost, expected);
        assert_eq!(report.solution.assignments(), s0.assignments());

        // A FEASIBLE answer equal to S0 must not pass for an improvement.
        let same = SolveResponse::feasible(s0.assignments().to_vec(), 0.0, Duration::ZERO);
        let report = hybrid_with(same)
            .run_with(&mut Fixed(s0.clone()), &inst)
            .unwrap();
        assert!(report.heuristic_only);
        assert_eq!(report.final_cost, expected);
    }

    #[test]
    fn test_run_with_rejects_over_capacity_phase1_in_hard_mode() {
        let inst = fixtures::three_wards();
        let crowded: Vec<Assignment> = (0..5).map(|p| Assignment::new(p, 2, 0)).collect();
        let crowded = Solution::from_assignments(&inst, crowded).unwrap();
        assert!(!crowded.within_capacity());

        let mut hybrid = hybrid_with(SolveResponse::timeout(Duration::ZERO));
        assert!(matches!(
            hybrid.run_with(&mut Fixed(crowded.clone()), &inst),
            Err(AdmissionError::Configuration(_))
        ));
        assert_eq!(hybrid.solver_mut().calls, 0);

        let soft = config().with_capacity_mode(CapacityMode::Soft);
        let solver = Scripted::new(SolveResponse::timeout(Duration::ZERO));
        let mut hybrid = HybridSolver::new(soft, solver).unwrap();
        let report = hybrid.run_with(&mut Fixed(crowded), &inst).unwrap();
        assert!(report.final_cost > 0.0);
        assert_eq!(hybrid.solver_mut().calls, 1);
    }

    #[test]
    fn test_exact_phase_twice_is_idempotent() {
        let inst = fixtures::three_wards();
        let mut hybrid = HybridSolver::new(config(), ExhaustiveSolver::new()).unwrap();
        let first = hybrid.run(&inst).unwrap();

        let evaluator = Evaluator::from_config(&config());
        let ws = WarmStart::from_solution(&first.solution);
        let request = SolveRequest {
            evaluator: &evaluator,
            capacity_mode: CapacityMode::Hard,
            time_limit: Some(Duration::from_secs(30)),
            warm_start: Some(&ws),
        };
        let again = hybrid.solver_mut().solve(&inst, &request);
        let again = Solution::from_assignments(&inst, again.assignments.unwrap()).unwrap();
        assert!(evaluator.cost(&again) <= first.final_cost);
    }
}
