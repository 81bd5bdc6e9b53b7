//! Side-by-side comparison of the solution methods on one instance.

use std::time::Instant;

use tracing::info;

use super::report::{OptimalityStatus, RunRecord};
use super::runner::HybridSolver;
use crate::config::AdmissionConfig;
use crate::engine::{EngineKind, SearchOutcome};
use crate::error::Result;
use crate::model::Instance;
use crate::objective::Evaluator;
use crate::solution::Solution;
use crate::solver::{ExactSolver, SolveRequest, SolveStatus};

/// Runs simulated annealing, tabu search, variable neighborhood search,
/// iterated local search, the exact solver alone and the SA-warm-started
/// hybrid, returning one [`RunRecord`] per method in that order.
///
/// The stand-alone exact run gets `time_limit_phase2` and no warm start.
///
/// # Errors
///
/// [`AdmissionError::Configuration`](crate::AdmissionError::Configuration)
/// or [`AdmissionError::InfeasibleInstance`](crate::AdmissionError::InfeasibleInstance),
/// raised before any method runs.
pub fn compare_methods<S: ExactSolver>(
    instance: &Instance,
    config: &AdmissionConfig,
    solver: &mut S,
) -> Result<Vec<RunRecord>> {
    config.validate()?;
    instance.check_feasible(config.capacity_mode)?;

    let mut records = Vec::with_capacity(6);
    for (method, kind) in [
        ("Simulated Annealing", EngineKind::Annealing),
        ("Tabu Search", EngineKind::Tabu),
        ("Variable Neighborhood Search", EngineKind::Vns),
        ("Iterated Local Search", EngineKind::Ils),
    ] {
        let outcome = kind.build(config)?.search(instance)?;
        records.push(heuristic_record(method, &outcome));
    }

    records.push(exact_record(instance, config, &mut *solver));

    let report = HybridSolver::new(config.clone(), &mut *solver)?
        .with_engine(EngineKind::Annealing)
        .run(instance)?;
    records.push(report.to_record("Hybrid (SA + exact)"));

    for r in &records {
        info!(
            event = "method_result",
            method = %r.method_name,
            objective = r.objective_value,
            status = %r.optimality_status,
            duration_ms = r.elapsed.as_millis() as u64,
        );
    }
    Ok(records)
}

fn heuristic_record(method: &str, outcome: &SearchOutcome) -> RunRecord {
    RunRecord {
        method_name: method.to_string(),
        elapsed: outcome.elapsed,
        objective_value: outcome.best_cost,
        optimality_status: OptimalityStatus::HeuristicOnly,
        solution: outcome.best.assignments().to_vec(),
    }
}

fn exact_record<S: ExactSolver>(
    instance: &Instance,
    config: &AdmissionConfig,
    solver: &mut S,
) -> RunRecord {
    let evaluator = Evaluator::from_config(config);
    let request = SolveRequest {
        evaluator: &evaluator,
        capacity_mode: config.capacity_mode,
        time_limit: config.time_limit_phase2,
        warm_start: None,
    };
    let started = Instant::now();
    let response = solver.solve(instance, &request);
    let elapsed = started.elapsed();

    let solution = response
        .assignments
        .and_then(|a| Solution::from_assignments(instance, a).ok());
    let status = match (&solution, response.status) {
        (Some(_), SolveStatus::Optimal) => OptimalityStatus::CertifiedOptimal,
        (Some(_), _) => OptimalityStatus::Feasible,
        (None, _) => OptimalityStatus::NoSolution,
    };
    RunRecord {
        method_name: format!("Exact ({})", solver.name()),
        elapsed,
        objective_value: solution
            .as_ref()
            .map_or(f64::INFINITY, |s| evaluator.cost(s)),
        optimality_status: status,
        solution: solution.map(|s| s.assignments().to_vec()).unwrap_or_default(),
    }
}
