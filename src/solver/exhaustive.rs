//! Complete enumeration solver for small instances.

use std::time::Instant;

use tracing::debug;

use super::types::{ExactSolver, SolveRequest, SolveResponse};
use crate::config::CapacityMode;
use crate::model::Instance;
use crate::solution::{Assignment, Move, Solution};

/// Leaves between two clock checks.
const CLOCK_STRIDE: u64 = 1024;

/// Enumerates every combination of admissible placements.
///
/// The search walks the placement options of all patients like an
/// odometer, moving one solution along with reassignments so each leaf is
/// costed incrementally. A finished walk proves optimality; hitting the
/// node limit or the time limit returns the incumbent as
/// [`Feasible`](super::SolveStatus::Feasible), or
/// [`TimeoutNoSolution`](super::SolveStatus::TimeoutNoSolution) when none
/// was found. A valid warm start seeds the incumbent, and ties keep the
/// earlier incumbent, so re-solving from the returned solution never
/// yields a worse one.
///
/// Only practical for a handful of patients; production back-ends plug
/// into the same [`ExactSolver`] trait.
#[derive(Debug, Clone)]
pub struct ExhaustiveSolver {
    node_limit: Option<u64>,
}

impl Default for ExhaustiveSolver {
    fn default() -> Self {
        Self {
            node_limit: Some(50_000_000),
        }
    }
}

impl ExhaustiveSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of leaves visited. `None` removes the cap.
    pub fn with_node_limit(mut self, limit: Option<u64>) -> Self {
        self.node_limit = limit;
        self
    }
}

impl ExactSolver for ExhaustiveSolver {
    fn name(&self) -> &str {
        "exhaustive"
    }

    fn solve(&mut self, instance: &Instance, request: &SolveRequest<'_>) -> SolveResponse {
        let started = Instant::now();
        let evaluator = request.evaluator;
        let hard = request.capacity_mode == CapacityMode::Hard;
        let admissible = |s: &Solution| !hard || s.within_capacity();

        let options: Vec<Vec<(usize, usize)>> = (0..instance.num_patients())
            .map(|p| {
                let o = instance.options(p);
                o.wards
                    .iter()
                    .flat_map(|&w| o.days().map(move |d| (w, d)))
                    .collect()
            })
            .collect();
        if options.iter().any(Vec::is_empty) {
            return SolveResponse::infeasible(started.elapsed());
        }

        let mut incumbent: Option<(Vec<Assignment>, f64)> = request
            .warm_start
            .and_then(|ws| ws.decode(instance).ok())
            .and_then(|assignments| Solution::from_assignments(instance, assignments).ok())
            .filter(|s| admissible(s))
            .map(|s| (s.assignments().to_vec(), evaluator.cost(&s)));

        let first: Vec<Assignment> = options
            .iter()
            .enumerate()
            .map(|(p, o)| Assignment::new(p, o[0].0, o[0].1))
            .collect();
        let Ok(mut current) = Solution::from_assignments(instance, first) else {
            return SolveResponse::infeasible(started.elapsed());
        };
        let mut digits = vec![0usize; options.len()];
        let mut leaves = 0u64;

        let completed = loop {
            leaves += 1;
            if admissible(&current) {
                let cost = evaluator.cost(&current);
                if incumbent.as_ref().is_none_or(|(_, best)| cost < *best) {
                    incumbent = Some((current.assignments().to_vec(), cost));
                }
            }

            // Advance the odometer; a full carry means every leaf was seen.
            let mut p = 0;
            loop {
                if p == digits.len() {
                    break;
                }
                digits[p] += 1;
                if digits[p] == options[p].len() {
                    digits[p] = 0;
                }
                let (ward, day) = options[p][digits[p]];
                let mv = Move::Reassign {
                    patient: p,
                    ward,
                    day,
                };
                current.apply(instance, &mv);
                if digits[p] != 0 {
                    break;
                }
                p += 1;
            }
            if p == digits.len() {
                break true;
            }

            if self.node_limit.is_some_and(|limit| leaves >= limit) {
                break false;
            }
            if leaves % CLOCK_STRIDE == 0
                && request
                    .time_limit
                    .is_some_and(|limit| started.elapsed() >= limit)
            {
                break false;
            }
        };

        let elapsed = started.elapsed();
        debug!(
            event = "exhaustive_done",
            leaves = leaves,
            completed = completed,
            duration_ms = elapsed.as_millis() as u64,
        );

        match (incumbent, completed) {
            (Some((assignments, cost)), true) => SolveResponse::optimal(assignments, cost, elapsed),
            (Some((assignments, cost)), false) => {
                SolveResponse::feasible(assignments, cost, elapsed)
            }
            (None, true) => SolveResponse::infeasible(elapsed),
            (None, false) => SolveResponse::timeout(elapsed),
        }
    }
}
