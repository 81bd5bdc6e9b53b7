//! Exact-solver contract: request, response, status and warm start.

use std::fmt;
use std::time::Duration;

use crate::config::CapacityMode;
use crate::error::{AdmissionError, Result};
use crate::model::Instance;
use crate::objective::Evaluator;
use crate::solution::{Assignment, Solution};

/// Outcome class of an exact solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolveStatus {
    /// Proven optimal.
    Optimal,
    /// A solution without optimality proof.
    Feasible,
    /// Budget exhausted before any solution was found.
    TimeoutNoSolution,
    /// Proven infeasible.
    Infeasible,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SolveStatus::Optimal => "OPTIMAL",
            SolveStatus::Feasible => "FEASIBLE",
            SolveStatus::TimeoutNoSolution => "TIMEOUT_NO_SOLUTION",
            SolveStatus::Infeasible => "INFEASIBLE",
        })
    }
}

/// Binary assignment `y[p][w][d]`, one bit per patient, ward and day.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WarmStart {
    patients: usize,
    wards: usize,
    horizon: usize,
    bits: Vec<u64>,
}

impl WarmStart {
    /// All-zero encoding for the given dimensions.
    pub fn empty(patients: usize, wards: usize, horizon: usize) -> Self {
        let len = patients * wards * horizon;
        Self {
            patients,
            wards,
            horizon,
            bits: vec![0; len.div_ceil(64)],
        }
    }

    pub fn from_solution(solution: &Solution) -> Self {
        let mut ws = Self::empty(solution.num_patients(), solution.num_wards(), solution.horizon());
        for a in solution.assignments() {
            ws.set(a.patient, a.ward, a.day, true);
        }
        ws
    }

    #[inline]
    fn index(&self, patient: usize, ward: usize, day: usize) -> usize {
        (patient * self.wards + ward) * self.horizon + day
    }

    /// `y[patient][ward][day]`; false outside the encoded dimensions.
    pub fn value(&self, patient: usize, ward: usize, day: usize) -> bool {
        if patient >= self.patients || ward >= self.wards || day >= self.horizon {
            return false;
        }
        let i = self.index(patient, ward, day);
        (self.bits[i / 64] >> (i % 64)) & 1 == 1
    }

    /// Sets `y[patient][ward][day]`. Out-of-range indices are ignored.
    pub fn set(&mut self, patient: usize, ward: usize, day: usize, on: bool) {
        if patient >= self.patients || ward >= self.wards || day >= self.horizon {
            return;
        }
        let i = self.index(patient, ward, day);
        if on {
            self.bits[i / 64] |= 1 << (i % 64);
        } else {
            self.bits[i / 64] &= !(1 << (i % 64));
        }
    }

    /// Number of variables set to one.
    pub fn count_ones(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Dimensions `(patients, wards, horizon)`.
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.patients, self.wards, self.horizon)
    }

    /// Decodes into one assignment per patient.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::InvalidModel`] when the dimensions do not match
    /// `instance`; [`AdmissionError::InvalidAssignment`] when a patient has
    /// no or several variables set.
    pub fn decode(&self, instance: &Instance) -> Result<Vec<Assignment>> {
        if self.dims() != (instance.num_patients(), instance.num_wards(), instance.horizon()) {
            return Err(AdmissionError::InvalidModel(format!(
                "warm start has dimensions {:?}, instance needs {:?}",
                self.dims(),
                (instance.num_patients(), instance.num_wards(), instance.horizon())
            )));
        }
        let mut out = Vec::with_capacity(self.patients);
        for p in 0..self.patients {
            let mut found = None;
            for w in 0..self.wards {
                for d in 0..self.horizon {
                    if self.value(p, w, d) {
                        if found.is_some() {
                            return Err(AdmissionError::InvalidAssignment {
                                patient: p,
                                reason: "several placements set in warm start".into(),
                            });
                        }
                        found = Some(Assignment::new(p, w, d));
                    }
                }
            }
            out.push(found.ok_or_else(|| AdmissionError::InvalidAssignment {
                patient: p,
                reason: "no placement set in warm start".into(),
            })?);
        }
        Ok(out)
    }
}

/// Inputs of one exact solve.
#[derive(Debug, Clone, Copy)]
pub struct SolveRequest<'a> {
    /// The objective to minimize, identical to the metaheuristics'.
    pub evaluator: &'a Evaluator,
    /// Whether bed and operating-time limits are constraints.
    pub capacity_mode: CapacityMode,
    pub time_limit: Option<Duration>,
    pub warm_start: Option<&'a WarmStart>,
}

/// Answer of an exact solver.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResponse {
    pub status: SolveStatus,
    /// The solution found, when the status carries one.
    pub assignments: Option<Vec<Assignment>>,
    /// Objective as computed by the solver.
    pub objective: Option<f64>,
    /// Lower bound on the optimum, when known.
    pub bound: Option<f64>,
    pub elapsed: Duration,
}

impl SolveResponse {
    pub fn optimal(assignments: Vec<Assignment>, objective: f64, elapsed: Duration) -> Self {
        Self {
            status: SolveStatus::Optimal,
            assignments: Some(assignments),
            objective: Some(objective),
            bound: Some(objective),
            elapsed,
        }
    }

    pub fn feasible(assignments: Vec<Assignment>, objective: f64, elapsed: Duration) -> Self {
        Self {
            status: SolveStatus::Feasible,
            assignments: Some(assignments),
            objective: Some(objective),
            bound: None,
            elapsed,
        }
    }

    pub fn timeout(elapsed: Duration) -> Self {
        Self::empty(SolveStatus::TimeoutNoSolution, elapsed)
    }

    pub fn infeasible(elapsed: Duration) -> Self {
        Self::empty(SolveStatus::Infeasible, elapsed)
    }

    fn empty(status: SolveStatus, elapsed: Duration) -> Self {
        Self {
            status,
            assignments: None,
            objective: None,
            bound: None,
            elapsed,
        }
    }

    pub fn with_bound(mut self, bound: f64) -> Self {
        self.bound = Some(bound);
        self
    }
}

/// An exact optimizer for the admission model.
///
/// Implementations minimize `request.evaluator`'s objective over the
/// instance, may use `request.warm_start` as an initial incumbent, and
/// must return by `request.time_limit`. Their internal strategy is opaque
/// to the orchestrator, which re-evaluates every answer itself.
pub trait ExactSolver {
    fn name(&self) -> &str;

    fn solve(&mut self, instance: &Instance, request: &SolveRequest<'_>) -> SolveResponse;
}

impl<S: ExactSolver + ?Sized> ExactSolver for &mut S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn solve(&mut self, instance: &Instance, request: &SolveRequest<'_>) -> SolveResponse {
        (**self).solve(instance, request)
    }
}
