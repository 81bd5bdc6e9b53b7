//! Reassign and swap neighborhoods.
//!
//! Structurally invalid moves (wrong specialization, day outside the
//! window, no-ops) are never produced. Capacity violations are filtered in
//! [`CapacityMode::Hard`] and passed through in [`CapacityMode::Soft`],
//! where the evaluator prices them.

use rand::Rng;

use crate::config::{AdmissionConfig, CapacityMode};
use crate::model::Instance;
use crate::solution::{Footprint, Move, Solution};

const DEFAULT_MAX_ATTEMPTS: usize = 64;

/// Move generator over a fixed instance.
#[derive(Debug, Clone, Copy)]
pub struct Neighborhood<'a> {
    instance: &'a Instance,
    mode: CapacityMode,
    swap_probability: f64,
    max_attempts: usize,
}

impl<'a> Neighborhood<'a> {
    pub fn new(instance: &'a Instance, mode: CapacityMode) -> Self {
        Self {
            instance,
            mode,
            swap_probability: AdmissionConfig::default().swap_probability,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn from_config(instance: &'a Instance, config: &AdmissionConfig) -> Self {
        Self::new(instance, config.capacity_mode).with_swap_probability(config.swap_probability)
    }

    /// Probability that [`sample`](Self::sample) proposes a swap.
    pub fn with_swap_probability(mut self, p: f64) -> Self {
        self.swap_probability = p;
        self
    }

    /// Proposals tried by [`sample`](Self::sample) before giving up.
    pub fn with_max_attempts(mut self, n: usize) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    #[inline]
    pub fn mode(&self) -> CapacityMode {
        self.mode
    }

    #[inline]
    pub fn instance(&self) -> &'a Instance {
        self.instance
    }

    /// Every admissible move, lazily, in a fixed order: reassignments by
    /// patient, ward and day, then swaps `(i, j)` with `i < j`.
    pub fn moves<'s>(&'s self, solution: &'s Solution) -> impl Iterator<Item = Move> + 's {
        let n = solution.num_patients();
        let reassigns = (0..n).flat_map(move |patient| {
            let options = self.instance.options(patient);
            let current = solution.assignment(patient);
            options
                .wards
                .iter()
                .flat_map(move |&ward| options.days().map(move |day| (ward, day)))
                .filter(move |&(ward, day)| (ward, day) != (current.ward, current.day))
                .map(move |(ward, day)| Move::Reassign { patient, ward, day })
        });
        let swaps = (0..n)
            .flat_map(move |first| (first + 1..n).map(move |second| Move::Swap { first, second }))
            .filter(move |mv| self.is_structural(solution, mv));

        reassigns
            .chain(swaps)
            .filter(move |mv| self.respects_mode(solution, mv))
    }

    /// One random admissible move, or `None` when `max_attempts` proposals
    /// were all rejected.
    pub fn sample<R: Rng>(&self, solution: &Solution, rng: &mut R) -> Option<Move> {
        let n = solution.num_patients();
        if n == 0 {
            return None;
        }
        for _ in 0..self.max_attempts {
            let mv = if n > 1 && rng.random::<f64>() < self.swap_probability {
                let first = rng.random_range(0..n);
                let second = (first + rng.random_range(1..n)) % n;
                Move::Swap { first, second }
            } else {
                let patient = rng.random_range(0..n);
                let options = self.instance.options(patient);
                if options.wards.is_empty() || options.first_day > options.last_day {
                    continue;
                }
                Move::Reassign {
                    patient,
                    ward: options.wards[rng.random_range(0..options.wards.len())],
                    day: rng.random_range(options.first_day..=options.last_day),
                }
            };
            if self.is_admissible(solution, &mv) {
                return Some(mv);
            }
        }
        None
    }

    /// Up to `count` random admissible moves; fewer when sampling stalls.
    pub fn sample_many<R: Rng>(&self, solution: &Solution, count: usize, rng: &mut R) -> Vec<Move> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            match self.sample(solution, rng) {
                Some(mv) => out.push(mv),
                None => break,
            }
        }
        out
    }

    /// Whether `mv` could be produced by this neighborhood for `solution`.
    pub fn is_admissible(&self, solution: &Solution, mv: &Move) -> bool {
        self.is_structural(solution, mv) && self.respects_mode(solution, mv)
    }

    fn is_structural(&self, solution: &Solution, mv: &Move) -> bool {
        let n = solution.num_patients();
        match *mv {
            Move::Reassign { patient, ward, day } => {
                patient < n
                    && self.instance.options(patient).admits(ward, day)
                    && {
                        let current = solution.assignment(patient);
                        (current.ward, current.day) != (ward, day)
                    }
            }
            Move::Swap { first, second } => {
                if first >= n || second >= n || first == second {
                    return false;
                }
                let a = solution.assignment(first);
                let b = solution.assignment(second);
                (a.ward, a.day) != (b.ward, b.day)
                    && self.instance.options(first).admits(b.ward, b.day)
                    && self.instance.options(second).admits(a.ward, a.day)
            }
        }
    }

    fn respects_mode(&self, solution: &Solution, mv: &Move) -> bool {
        match self.mode {
            CapacityMode::Soft => true,
            CapacityMode::Hard => {
                Footprint::of(self.instance, solution, mv).within_capacity(self.instance, solution)
            }
        }
    }
}
