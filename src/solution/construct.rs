//! Constructive heuristics for the initial solution.

use std::cmp::Reverse;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::state::{Assignment, Grids, Solution};
use crate::config::{AdmissionConfig, CapacityMode, Construction};
use crate::error::{AdmissionError, Result};
use crate::model::Instance;
use crate::tabu::{TabuState, TabuStep};

/// Tenure of the repair search.
const REPAIR_TENURE: usize = 7;
/// Minimum iteration budget of the repair search.
const REPAIR_MIN_ITERATIONS: usize = 200;

/// Builds an initial solution with the configured heuristic.
pub fn construct<R: Rng>(
    instance: &Instance,
    construction: Construction,
    mode: CapacityMode,
    rng: &mut R,
) -> Result<Solution> {
    match construction {
        Construction::Greedy => greedy(instance, mode),
        Construction::Random => random(instance, mode, rng),
    }
}

/// Greedy construction by window tightness.
///
/// Patients are placed tightest window first (then earliest day, then
/// longest stay) at the earliest day and first compatible ward with room.
/// A patient that fits nowhere goes to the placement adding the least
/// overflow. In hard mode the result is then [`repair`]ed.
///
/// # Errors
///
/// [`AdmissionError::InfeasibleInstance`] in hard mode when the repair
/// cannot remove every capacity violation.
pub fn greedy(instance: &Instance, mode: CapacityMode) -> Result<Solution> {
    let mut order: Vec<usize> = (0..instance.num_patients()).collect();
    order.sort_by_key(|&p| {
        let patient = instance.patient(p);
        (
            patient.latest - patient.earliest,
            patient.earliest,
            Reverse(patient.length_of_stay),
            p,
        )
    });

    let mut grids = Grids::empty(instance);
    let mut assignments = Vec::with_capacity(order.len());

    for p in order {
        let options = instance.options(p);
        let fitting = options
            .days()
            .flat_map(|d| options.wards.iter().map(move |&w| (w, d)))
            .find(|&(w, d)| grids.fits(instance, p, w, d));

        let (ward, day) = match fitting {
            Some(place) => place,
            None => least_excess(instance, &grids, p)?,
        };
        grids.place(instance, p, ward, day);
        assignments.push(Assignment::new(p, ward, day));
    }

    debug!(event = "construction", method = "greedy", patients = assignments.len());
    finish(instance, assignments, mode)
}

/// Random construction: random patient order, uniformly random fitting
/// placement, or a uniformly random admissible placement when nothing
/// fits. In hard mode the result is then [`repair`]ed.
///
/// # Errors
///
/// [`AdmissionError::InfeasibleInstance`] when a patient has no admissible
/// placement, or in hard mode when the repair fails.
pub fn random<R: Rng>(instance: &Instance, mode: CapacityMode, rng: &mut R) -> Result<Solution> {
    let mut order: Vec<usize> = (0..instance.num_patients()).collect();
    order.shuffle(rng);

    let mut grids = Grids::empty(instance);
    let mut assignments = Vec::with_capacity(order.len());

    for p in order {
        let options = instance.options(p);
        let all: Vec<(usize, usize)> = options
            .days()
            .flat_map(|d| options.wards.iter().map(move |&w| (w, d)))
            .collect();
        let fitting: Vec<(usize, usize)> = all
            .iter()
            .copied()
            .filter(|&(w, d)| grids.fits(instance, p, w, d))
            .collect();

        let pool = if fitting.is_empty() { &all } else { &fitting };
        if pool.is_empty() {
            return Err(AdmissionError::infeasible(format!(
                "patient {} has no admissible ward-day",
                instance.patient(p).id
            )));
        }
        let (ward, day) = pool[rng.random_range(0..pool.len())];
        grids.place(instance, p, ward, day);
        assignments.push(Assignment::new(p, ward, day));
    }

    debug!(event = "construction", method = "random", patients = assignments.len());
    finish(instance, assignments, mode)
}

fn finish(
    instance: &Instance,
    assignments: Vec<Assignment>,
    mode: CapacityMode,
) -> Result<Solution> {
    let solution = Solution::from_assignments(instance, assignments)?;
    match mode {
        CapacityMode::Hard if !solution.within_capacity() => repair(instance, solution),
        _ => Ok(solution),
    }
}

/// Drives a solution to zero bed overflow and zero overtime.
///
/// Runs a soft-mode tabu search whose objective is the violation alone
/// (`bed overflow + overtime`), so plateau moves and swaps can untangle
/// placements a first-fit pass blocked. Returns the first violation-free
/// solution found; a solution already within capacity is returned as is.
///
/// # Errors
///
/// [`AdmissionError::InfeasibleInstance`] when the iteration budget runs
/// out, or the neighborhood empties, with violations left.
pub fn repair(instance: &Instance, solution: Solution) -> Result<Solution> {
    if solution.within_capacity() {
        return Ok(solution);
    }
    let initial_violation = violation(&solution);

    let config = AdmissionConfig::default()
        .with_lambdas(0.0, 0.0)
        .with_capacity_penalty(1.0)
        .with_capacity_mode(CapacityMode::Soft)
        .with_tabu_tenure(REPAIR_TENURE);
    let budget = REPAIR_MIN_ITERATIONS.max(4 * instance.num_patients());
    let mut state = TabuState::new(instance, &config, solution)?;
    // Full enumeration never consults the random source.
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    while state.best_cost() > 0.0 && state.iteration() < budget {
        if state.step(&mut rng) == TabuStep::Exhausted {
            break;
        }
    }

    let left = violation(state.best());
    debug!(
        event = "repair",
        iterations = state.iteration() as u64,
        violation_before = initial_violation,
        violation_after = left,
    );
    if left > 0 {
        return Err(AdmissionError::infeasible(format!(
            "construction left {left} unit(s) of bed or operating-time overflow after repair"
        )));
    }
    Ok(state.best().clone())
}

fn violation(solution: &Solution) -> i64 {
    let c = solution.components();
    c.bed_overflow + c.overtime
}

fn least_excess(instance: &Instance, grids: &Grids, patient: usize) -> Result<(usize, usize)> {
    let options = instance.options(patient);
    options
        .days()
        .flat_map(|d| options.wards.iter().map(move |&w| (w, d)))
        .min_by_key(|&(w, d)| grids.excess_if_placed(instance, patient, w, d))
        .ok_or_else(|| {
            AdmissionError::infeasible(format!(
                "patient {} has no admissible ward-day",
                instance.patient(patient).id
            ))
        })
}
