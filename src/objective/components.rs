//! Exact integer cost components.
//!
//! Every term of the objective is an integer sum, so incremental updates
//! reproduce a from-scratch tally exactly. Variances are carried as
//! `Σx²` plus `Σx`; the division happens only at scalarization.

use smallvec::SmallVec;

use crate::model::Instance;
use crate::solution::{Assignment, Footprint, Grids};

/// Integer cost components of a solution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Components {
    /// Σ (admission day − earliest day).
    pub delay: i64,
    /// Σ over ward-days of operating minutes above availability.
    pub overtime: i64,
    /// Σ over ward-days of idle operating minutes.
    pub undertime: i64,
    /// Σ over ward-days of beds above capacity.
    pub bed_overflow: i64,
    /// Σ over wards of (occupied bed-days)².
    pub ward_load_sq: i64,
    /// Σ over days of (occupied beds)².
    pub day_load_sq: i64,
    /// Total occupied bed-days.
    pub total_load: i64,
}

#[inline]
fn excess(value: i64, limit: i64) -> i64 {
    (value - limit).max(0)
}

impl Components {
    /// Full tally from assignments and matching grids.
    pub(crate) fn tally(instance: &Instance, assignments: &[Assignment], grids: &Grids) -> Self {
        let mut c = Components::default();

        for a in assignments {
            c.delay += a.day as i64 - instance.patient(a.patient).earliest as i64;
        }

        for (w, ward) in instance.wards().iter().enumerate() {
            let capacity = i64::from(ward.capacity);
            for d in 0..instance.horizon() {
                let available = i64::from(ward.operating_time[d]);
                let used = grids.operating(w, d);
                c.bed_overflow += excess(grids.occupancy(w, d), capacity);
                c.overtime += excess(used, available);
                c.undertime += excess(available, used);
            }
        }

        for &load in grids.ward_loads() {
            c.ward_load_sq += load * load;
            c.total_load += load;
        }
        for &load in grids.day_loads() {
            c.day_load_sq += load * load;
        }
        c
    }

    /// Components after applying `footprint` to the state held in `grids`.
    ///
    /// Touches only the cells, wards and days in the footprint.
    pub(crate) fn after(&self, instance: &Instance, grids: &Grids, footprint: &Footprint) -> Self {
        let mut next = *self;
        next.delay += footprint.delay();

        let mut ward_shift: SmallVec<[(usize, i64); 4]> = SmallVec::new();
        let mut day_shift: SmallVec<[(usize, i64); 16]> = SmallVec::new();

        for change in footprint.cells() {
            let ward = instance.ward(change.ward);
            let capacity = i64::from(ward.capacity);
            let available = i64::from(ward.operating_time[change.day]);
            let occupancy = grids.occupancy(change.ward, change.day);
            let used = grids.operating(change.ward, change.day);

            next.bed_overflow +=
                excess(occupancy + change.beds, capacity) - excess(occupancy, capacity);
            next.overtime +=
                excess(used + change.minutes, available) - excess(used, available);
            next.undertime +=
                excess(available, used + change.minutes) - excess(available, used);

            if change.beds != 0 {
                accumulate(&mut ward_shift, change.ward, change.beds);
                accumulate(&mut day_shift, change.day, change.beds);
                next.total_load += change.beds;
            }
        }

        for &(w, shift) in &ward_shift {
            let load = grids.ward_load(w);
            next.ward_load_sq += (load + shift) * (load + shift) - load * load;
        }
        for &(d, shift) in &day_shift {
            let load = grids.day_load(d);
            next.day_load_sq += (load + shift) * (load + shift) - load * load;
        }
        next
    }

    /// `n·Σx² − (Σx)²` for the per-ward loads; `n²` times their variance.
    #[inline]
    pub fn ward_dispersion(&self, wards: usize) -> i64 {
        wards as i64 * self.ward_load_sq - self.total_load * self.total_load
    }

    /// `n·Σx² − (Σx)²` for the per-day loads; `n²` times their variance.
    #[inline]
    pub fn day_dispersion(&self, horizon: usize) -> i64 {
        horizon as i64 * self.day_load_sq - self.total_load * self.total_load
    }
}

fn accumulate<const N: usize>(shifts: &mut SmallVec<[(usize, i64); N]>, key: usize, value: i64)
where
    [(usize, i64); N]: smallvec::Array<Item = (usize, i64)>,
{
    match shifts.iter_mut().find(|(k, _)| *k == key) {
        Some((_, v)) => *v += value,
        None => shifts.push((key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CapacityMode;
    use crate::model::{Patient, Ward};
    use crate::neighborhood::Neighborhood;
    use crate::solution::{Move, Solution};

    fn instance() -> Instance {
        let wards = vec![
            Ward::new("A", 1)
                .with_specializations([0])
                .with_operating_time([60, 0, 60]),
            Ward::new("B", 2)
                .with_specializations([0])
                .with_operating_time([0, 90, 0])
                .with_carryover([1, 1, 0]),
        ];
        let patients = vec![
            Patient::new("p0", 0)
                .with_window(0, 2)
                .with_length_of_stay(2)
                .with_operating_time(45),
            Patient::new("p1", 0).with_window(1, 2).with_operating_time(100),
            Patient::new("p2", 0).with_window(0, 1),
        ];
        Instance::new(3, wards, patients).unwrap()
    }

    #[test]
    fn test_tally_by_hand() {
        let inst = instance();
        let sol = Solution::from_assignments(
            &inst,
            vec![
                Assignment::new(0, 0, 0),
                Assignment::new(1, 1, 1),
                Assignment::new(2, 0, 1),
            ],
        )
        .unwrap();
        let c = sol.components();

        // p1 one day after earliest 1 → 0, p2 one day late.
        assert_eq!(c.delay, 1);
        // A: day0 60-45 idle, day2 60 idle. B: day1 100 > 90.
        assert_eq!(c.undertime, 15 + 60);
        assert_eq!(c.overtime, 10);
        // A day1 holds p0 and p2 on one bed.
        assert_eq!(c.bed_overflow, 1);
        // Loads: A = 1 + 2 = 3, B = 1 + 2 = 3; days = [2, 4, 0].
        assert_eq!(c.total_load, 6);
        assert_eq!(c.ward_load_sq, 18);
        assert_eq!(c.day_load_sq, 20);
        assert_eq!(c.ward_dispersion(2), 0);
        assert_eq!(c.day_dispersion(3), 3 * 20 - 36);
    }

    #[test]
    fn test_after_matches_tally() {
        let inst = instance();
        let base = Solution::from_assignments(
            &inst,
            vec![
                Assignment::new(0, 0, 0),
                Assignment::new(1, 1, 1),
                Assignment::new(2, 1, 0),
            ],
        )
        .unwrap();

        let moves = [
            Move::Reassign {
                patient: 0,
                ward: 1,
                day: 2,
            },
            Move::Reassign {
                patient: 1,
                ward: 0,
                day: 2,
            },
            Move::Reassign {
                patient: 2,
                ward: 0,
                day: 1,
            },
            Move::Swap {
                first: 0,
                second: 2,
            },
        ];
        let neighborhood = Neighborhood::new(&inst, CapacityMode::Soft);
        for mv in moves {
            assert!(neighborhood.is_admissible(&base, &mv), "{mv:?}");
            let mut moved = base.clone();
            moved.apply(&inst, &mv);
            let fresh = Solution::from_assignments(&inst, moved.assignments().to_vec()).unwrap();
            assert_eq!(moved.components(), fresh.components(), "{mv:?}");
        }
    }
}
