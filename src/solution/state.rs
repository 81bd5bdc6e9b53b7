//! Mutable assignment with cached per-ward-per-day aggregates.

use super::moves::{Footprint, Move};
use crate::error::{AdmissionError, Result};
use crate::model::Instance;
use crate::objective::Components;

/// Placement of one patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Assignment {
    pub patient: usize,
    pub ward: usize,
    pub day: usize,
}

impl Assignment {
    #[inline]
    pub fn new(patient: usize, ward: usize, day: usize) -> Self {
        Self { patient, ward, day }
    }
}

/// Per-ward-per-day aggregates, stored ward-major (`ward * horizon + day`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Grids {
    horizon: usize,
    occupancy: Vec<i64>,
    operating: Vec<i64>,
    ward_load: Vec<i64>,
    day_load: Vec<i64>,
}

impl Grids {
    /// Grids holding only the carry-over patients.
    pub(crate) fn empty(instance: &Instance) -> Self {
        let horizon = instance.horizon();
        let wards = instance.num_wards();
        let mut grids = Self {
            horizon,
            occupancy: vec![0; wards * horizon],
            operating: vec![0; wards * horizon],
            ward_load: vec![0; wards],
            day_load: vec![0; horizon],
        };
        for (w, ward) in instance.wards().iter().enumerate() {
            for (d, &beds) in ward.carryover.iter().enumerate() {
                grids.add_beds(w, d, i64::from(beds));
            }
        }
        grids
    }

    pub(crate) fn build(instance: &Instance, assignments: &[Assignment]) -> Self {
        let mut grids = Self::empty(instance);
        for a in assignments {
            grids.place(instance, a.patient, a.ward, a.day);
        }
        grids
    }

    #[inline]
    fn cell(&self, ward: usize, day: usize) -> usize {
        ward * self.horizon + day
    }

    #[inline]
    pub(crate) fn horizon(&self) -> usize {
        self.horizon
    }

    #[inline]
    pub(crate) fn num_wards(&self) -> usize {
        self.ward_load.len()
    }

    #[inline]
    pub(crate) fn occupancy(&self, ward: usize, day: usize) -> i64 {
        self.occupancy[self.cell(ward, day)]
    }

    #[inline]
    pub(crate) fn operating(&self, ward: usize, day: usize) -> i64 {
        self.operating[self.cell(ward, day)]
    }

    #[inline]
    pub(crate) fn ward_load(&self, ward: usize) -> i64 {
        self.ward_load[ward]
    }

    #[inline]
    pub(crate) fn day_load(&self, day: usize) -> i64 {
        self.day_load[day]
    }

    #[inline]
    pub(crate) fn ward_loads(&self) -> &[i64] {
        &self.ward_load
    }

    #[inline]
    pub(crate) fn day_loads(&self) -> &[i64] {
        &self.day_load
    }

    fn add_beds(&mut self, ward: usize, day: usize, beds: i64) {
        let cell = self.cell(ward, day);
        self.occupancy[cell] += beds;
        self.ward_load[ward] += beds;
        self.day_load[day] += beds;
    }

    fn add_minutes(&mut self, ward: usize, day: usize, minutes: i64) {
        let cell = self.cell(ward, day);
        self.operating[cell] += minutes;
    }

    pub(crate) fn place(&mut self, instance: &Instance, patient: usize, ward: usize, day: usize) {
        for d in instance.stay(patient, day) {
            self.add_beds(ward, d, 1);
        }
        self.add_minutes(ward, day, i64::from(instance.patient(patient).operating_time));
    }

    /// Whether placing `patient` at `(ward, day)` keeps beds and operating
    /// time within limits.
    pub(crate) fn fits(
        &self,
        instance: &Instance,
        patient: usize,
        ward: usize,
        day: usize,
    ) -> bool {
        let w = instance.ward(ward);
        let capacity = i64::from(w.capacity);
        let minutes = i64::from(instance.patient(patient).operating_time);
        instance
            .stay(patient, day)
            .all(|d| self.occupancy(ward, d) < capacity)
            && self.operating(ward, day) + minutes <= i64::from(w.operating_time[day])
    }

    /// Bed overflow plus overtime added by placing `patient` at `(ward, day)`.
    pub(crate) fn excess_if_placed(
        &self,
        instance: &Instance,
        patient: usize,
        ward: usize,
        day: usize,
    ) -> i64 {
        let w = instance.ward(ward);
        let capacity = i64::from(w.capacity);
        let beds: i64 = instance
            .stay(patient, day)
            .filter(|&d| self.occupancy(ward, d) >= capacity)
            .count() as i64;
        let available = i64::from(w.operating_time[day]);
        let used = self.operating(ward, day);
        let minutes = i64::from(instance.patient(patient).operating_time);
        let overtime = (used + minutes - available).max(0) - (used - available).max(0);
        beds + overtime
    }

    pub(crate) fn commit(&mut self, footprint: &Footprint) {
        for change in footprint.cells() {
            self.add_beds(change.ward, change.day, change.beds);
            self.add_minutes(change.ward, change.day, change.minutes);
        }
    }
}

/// A complete assignment of every patient to a (ward, day).
///
/// Owns the derived aggregates (occupancy, operating time, loads) and the
/// exact integer cost components, all kept current by [`Solution::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    assignments: Vec<Assignment>,
    grids: Grids,
    components: Components,
}

impl Solution {
    /// Decodes an assignment list, in any order, into a solution.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::InvalidAssignment`] when a patient is missing,
    /// assigned twice, or placed outside its window or in a ward that does
    /// not support its specialization.
    pub fn from_assignments(instance: &Instance, assignments: Vec<Assignment>) -> Result<Self> {
        let n = instance.num_patients();
        let mut slots: Vec<Option<Assignment>> = vec![None; n];

        for a in assignments {
            if a.patient >= n {
                return Err(AdmissionError::InvalidAssignment {
                    patient: a.patient,
                    reason: format!("instance has only {n} patients"),
                });
            }
            if a.ward >= instance.num_wards() {
                return Err(AdmissionError::InvalidAssignment {
                    patient: a.patient,
                    reason: format!("unknown ward {}", a.ward),
                });
            }
            let options = instance.options(a.patient);
            if !options.has_day(a.day) {
                return Err(AdmissionError::InvalidAssignment {
                    patient: a.patient,
                    reason: format!("day {} outside admission window", a.day),
                });
            }
            if !options.has_ward(a.ward) {
                return Err(AdmissionError::InvalidAssignment {
                    patient: a.patient,
                    reason: format!("ward {} does not support its specialization", a.ward),
                });
            }
            if slots[a.patient].replace(a).is_some() {
                return Err(AdmissionError::InvalidAssignment {
                    patient: a.patient,
                    reason: "assigned more than once".into(),
                });
            }
        }

        let assignments = slots
            .into_iter()
            .enumerate()
            .map(|(patient, slot)| {
                slot.ok_or_else(|| AdmissionError::InvalidAssignment {
                    patient,
                    reason: "not assigned".into(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let grids = Grids::build(instance, &assignments);
        let components = Components::tally(instance, &assignments, &grids);
        Ok(Self {
            assignments,
            grids,
            components,
        })
    }

    /// Assignments indexed by patient.
    #[inline]
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    #[inline]
    pub fn assignment(&self, patient: usize) -> Assignment {
        self.assignments[patient]
    }

    #[inline]
    pub fn num_patients(&self) -> usize {
        self.assignments.len()
    }

    #[inline]
    pub fn num_wards(&self) -> usize {
        self.grids.num_wards()
    }

    #[inline]
    pub fn horizon(&self) -> usize {
        self.grids.horizon()
    }

    /// Beds occupied on `(ward, day)`, carry-over included.
    #[inline]
    pub fn occupancy(&self, ward: usize, day: usize) -> i64 {
        self.grids.occupancy(ward, day)
    }

    /// Operating minutes used on `(ward, day)`.
    #[inline]
    pub fn operating_time_used(&self, ward: usize, day: usize) -> i64 {
        self.grids.operating(ward, day)
    }

    /// Occupied bed-days per ward.
    #[inline]
    pub fn ward_loads(&self) -> &[i64] {
        self.grids.ward_loads()
    }

    /// Occupied beds per day, over all wards.
    #[inline]
    pub fn day_loads(&self) -> &[i64] {
        self.grids.day_loads()
    }

    /// Cached cost components.
    #[inline]
    pub fn components(&self) -> &Components {
        &self.components
    }

    #[inline]
    pub(crate) fn grids(&self) -> &Grids {
        &self.grids
    }

    /// Whether every ward-day respects beds and operating time.
    #[inline]
    pub fn within_capacity(&self) -> bool {
        self.components.bed_overflow == 0 && self.components.overtime == 0
    }

    /// Applies a move, updating assignments, aggregates and components.
    ///
    /// The move must be structurally admissible (see
    /// [`Neighborhood::is_admissible`](crate::neighborhood::Neighborhood::is_admissible)).
    pub fn apply(&mut self, instance: &Instance, mv: &Move) {
        let footprint = Footprint::of(instance, self, mv);
        let next = self.components.after(instance, &self.grids, &footprint);
        self.grids.commit(&footprint);
        for (_, to) in footprint.relocations() {
            self.assignments[to.patient] = *to;
        }
        self.components = next;
    }
}
