//! Moves and their effect on ward-day cells.

use smallvec::SmallVec;

use super::state::{Assignment, Solution};
use crate::model::Instance;

/// A proposed transformation of a [`Solution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Move {
    /// Place `patient` at a new `(ward, day)`.
    Reassign {
        patient: usize,
        ward: usize,
        day: usize,
    },
    /// Exchange the `(ward, day)` pairs of two patients.
    Swap { first: usize, second: usize },
}

impl Move {
    /// Placements before and after the move, one pair per relocated patient.
    ///
    /// Patients whose placement does not change are left out.
    pub fn relocations(&self, solution: &Solution) -> SmallVec<[(Assignment, Assignment); 2]> {
        let mut out = SmallVec::new();
        match *self {
            Move::Reassign { patient, ward, day } => {
                let from = solution.assignment(patient);
                let to = Assignment::new(patient, ward, day);
                if from != to {
                    out.push((from, to));
                }
            }
            Move::Swap { first, second } => {
                let a = solution.assignment(first);
                let b = solution.assignment(second);
                if (a.ward, a.day) != (b.ward, b.day) {
                    out.push((a, Assignment::new(first, b.ward, b.day)));
                    out.push((b, Assignment::new(second, a.ward, a.day)));
                }
            }
        }
        out
    }
}

/// Change applied to one ward-day cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CellChange {
    pub ward: usize,
    pub day: usize,
    pub beds: i64,
    pub minutes: i64,
}

/// Every cell a move touches, merged per `(ward, day)`, plus the change in
/// total admission delay.
#[derive(Debug, Clone)]
pub(crate) struct Footprint {
    cells: SmallVec<[CellChange; 16]>,
    relocations: SmallVec<[(Assignment, Assignment); 2]>,
    delay: i64,
}

impl Footprint {
    pub(crate) fn of(instance: &Instance, solution: &Solution, mv: &Move) -> Self {
        let relocations = mv.relocations(solution);
        let mut footprint = Self {
            cells: SmallVec::new(),
            relocations: SmallVec::new(),
            delay: 0,
        };
        for (from, to) in &relocations {
            let minutes = i64::from(instance.patient(from.patient).operating_time);
            for d in instance.stay(from.patient, from.day) {
                footprint.touch(from.ward, d, -1, 0);
            }
            for d in instance.stay(to.patient, to.day) {
                footprint.touch(to.ward, d, 1, 0);
            }
            footprint.touch(from.ward, from.day, 0, -minutes);
            footprint.touch(to.ward, to.day, 0, minutes);
            footprint.delay += to.day as i64 - from.day as i64;
        }
        footprint.relocations = relocations;
        footprint
    }

    fn touch(&mut self, ward: usize, day: usize, beds: i64, minutes: i64) {
        if let Some(cell) = self
            .cells
            .iter_mut()
            .find(|c| c.ward == ward && c.day == day)
        {
            cell.beds += beds;
            cell.minutes += minutes;
        } else {
            self.cells.push(CellChange {
                ward,
                day,
                beds,
                minutes,
            });
        }
    }

    #[inline]
    pub(crate) fn cells(&self) -> &[CellChange] {
        &self.cells
    }

    #[inline]
    pub(crate) fn relocations(&self) -> &[(Assignment, Assignment)] {
        &self.relocations
    }

    #[inline]
    pub(crate) fn delay(&self) -> i64 {
        self.delay
    }

    /// Whether no cell whose beds or minutes grow ends above its limit.
    pub(crate) fn within_capacity(&self, instance: &Instance, solution: &Solution) -> bool {
        let grids = solution.grids();
        self.cells.iter().all(|c| {
            let ward = instance.ward(c.ward);
            let beds_ok = c.beds <= 0
                || grids.occupancy(c.ward, c.day) + c.beds <= i64::from(ward.capacity);
            let minutes_ok = c.minutes <= 0
                || grids.operating(c.ward, c.day) + c.minutes
                    <= i64::from(ward.operating_time[c.day]);
            beds_ok && minutes_ok
        })
    }
}
