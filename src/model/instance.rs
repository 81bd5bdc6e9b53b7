//! Immutable problem instance.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use super::types::{Patient, Ward};
use crate::config::CapacityMode;
use crate::error::{AdmissionError, Result};

/// Structurally admissible placements of one patient: the wards that
/// support its specialization and its window clipped to the horizon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementOptions {
    /// Compatible ward indices, ascending.
    pub wards: Vec<usize>,
    /// First admissible day.
    pub first_day: usize,
    /// Last admissible day, already clipped to the horizon.
    pub last_day: usize,
}

impl PlacementOptions {
    /// Admissible days, empty when the window misses the horizon.
    #[inline]
    pub fn days(&self) -> RangeInclusive<usize> {
        self.first_day..=self.last_day
    }

    #[inline]
    pub fn has_day(&self, day: usize) -> bool {
        self.first_day <= day && day <= self.last_day
    }

    #[inline]
    pub fn has_ward(&self, ward: usize) -> bool {
        self.wards.binary_search(&ward).is_ok()
    }

    /// Whether `(ward, day)` is structurally admissible.
    #[inline]
    pub fn admits(&self, ward: usize, day: usize) -> bool {
        self.has_day(day) && self.has_ward(ward)
    }

    /// Number of admissible `(ward, day)` pairs.
    pub fn count(&self) -> usize {
        self.wards.len() * self.days().count()
    }
}

/// A patient admission instance: wards, patients and a planning horizon.
///
/// Built once and never mutated. Per-day ward vectors are normalized to the
/// horizon length and placement options are precomputed on construction.
#[derive(Debug, Clone)]
pub struct Instance {
    horizon: usize,
    wards: Vec<Ward>,
    patients: Vec<Patient>,
    options: Vec<PlacementOptions>,
}

impl Instance {
    /// Builds an instance, rejecting malformed data.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::InvalidModel`] when the horizon is zero, a per-day
    /// vector has the wrong length, a window is inverted or a length of stay
    /// is zero.
    pub fn new(horizon: usize, wards: Vec<Ward>, patients: Vec<Patient>) -> Result<Self> {
        if horizon == 0 {
            return Err(AdmissionError::InvalidModel(
                "horizon must be at least one day".into(),
            ));
        }

        let mut wards = wards;
        for ward in &mut wards {
            normalize_daily(&mut ward.operating_time, horizon, &ward.id, "operating_time")?;
            normalize_daily(&mut ward.carryover, horizon, &ward.id, "carryover")?;
        }

        for patient in &patients {
            if patient.earliest > patient.latest {
                return Err(AdmissionError::InvalidModel(format!(
                    "patient {}: earliest day {} is after latest day {}",
                    patient.id, patient.earliest, patient.latest
                )));
            }
            if patient.length_of_stay == 0 {
                return Err(AdmissionError::InvalidModel(format!(
                    "patient {}: length of stay must be positive",
                    patient.id
                )));
            }
        }

        let options = patients
            .iter()
            .map(|p| PlacementOptions {
                wards: wards
                    .iter()
                    .enumerate()
                    .filter(|(_, w)| w.supports(p.specialization))
                    .map(|(i, _)| i)
                    .collect(),
                first_day: p.earliest,
                last_day: p.latest.min(horizon - 1),
            })
            .collect();

        Ok(Self {
            horizon,
            wards,
            patients,
            options,
        })
    }

    #[inline]
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    #[inline]
    pub fn wards(&self) -> &[Ward] {
        &self.wards
    }

    #[inline]
    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    #[inline]
    pub fn ward(&self, index: usize) -> &Ward {
        &self.wards[index]
    }

    #[inline]
    pub fn patient(&self, index: usize) -> &Patient {
        &self.patients[index]
    }

    #[inline]
    pub fn num_wards(&self) -> usize {
        self.wards.len()
    }

    #[inline]
    pub fn num_patients(&self) -> usize {
        self.patients.len()
    }

    /// Admissible placements of a patient.
    #[inline]
    pub fn options(&self, patient: usize) -> &PlacementOptions {
        &self.options[patient]
    }

    /// Days a patient admitted on `day` occupies a bed, clipped to the horizon.
    #[inline]
    pub fn stay(&self, patient: usize, day: usize) -> std::ops::Range<usize> {
        let end = (day + self.patients[patient].length_of_stay).min(self.horizon);
        day..end
    }

    /// Beds left on `(ward, day)` after carry-over patients.
    #[inline]
    pub fn free_beds(&self, ward: usize, day: usize) -> u32 {
        let w = &self.wards[ward];
        w.capacity.saturating_sub(w.carryover[day])
    }

    /// Checks the necessary conditions for a feasible assignment to exist.
    ///
    /// Every patient needs a compatible ward and a window inside the
    /// horizon. In hard mode each patient must also fit some ward-day on
    /// operating time, and the admissions of each specialization must not
    /// exceed the free beds of the wards supporting it.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::InfeasibleInstance`] naming the first violated
    /// condition.
    pub fn check_feasible(&self, mode: CapacityMode) -> Result<()> {
        for (index, patient) in self.patients.iter().enumerate() {
            let options = &self.options[index];
            if options.wards.is_empty() {
                return Err(AdmissionError::infeasible(format!(
                    "patient {} requires specialization {} which no ward supports",
                    patient.id, patient.specialization
                )));
            }
            if options.first_day > options.last_day {
                return Err(AdmissionError::infeasible(format!(
                    "admission window [{}, {}] of patient {} lies outside the {}-day horizon",
                    patient.earliest, patient.latest, patient.id, self.horizon
                )));
            }
        }

        if mode == CapacityMode::Soft {
            return Ok(());
        }

        for (index, patient) in self.patients.iter().enumerate() {
            let options = &self.options[index];
            let fits = options.wards.iter().any(|&w| {
                options.days().any(|d| {
                    self.free_beds(w, d) > 0
                        && self.wards[w].operating_time[d] >= patient.operating_time
                })
            });
            if !fits {
                return Err(AdmissionError::infeasible(format!(
                    "patient {} fits no compatible ward-day on beds and operating time",
                    patient.id
                )));
            }
        }

        let mut demand: BTreeMap<u32, u64> = BTreeMap::new();
        for patient in &self.patients {
            *demand.entry(patient.specialization).or_default() += 1;
        }
        for (&specialization, &admissions) in &demand {
            let supply: u64 = (0..self.wards.len())
                .filter(|&w| self.wards[w].supports(specialization))
                .flat_map(|w| (0..self.horizon).map(move |d| (w, d)))
                .map(|(w, d)| u64::from(self.free_beds(w, d)))
                .sum();
            if admissions > supply {
                return Err(AdmissionError::infeasible(format!(
                    "{admissions} patients need specialization {specialization} \
                     but its wards offer {supply} free bed-days"
                )));
            }
        }

        Ok(())
    }
}

fn normalize_daily(values: &mut Vec<u32>, horizon: usize, ward: &str, field: &str) -> Result<()> {
    if values.is_empty() {
        values.resize(horizon, 0);
        return Ok(());
    }
    if values.len() != horizon {
        return Err(AdmissionError::InvalidModel(format!(
            "ward {ward}: {field} has {} entries, expected {horizon}",
            values.len()
        )));
    }
    Ok(())
}
