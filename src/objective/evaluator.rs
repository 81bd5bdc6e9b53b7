//! Scalarization of cost components and move evaluation.

use super::components::Components;
use crate::config::AdmissionConfig;
use crate::model::Instance;
use crate::solution::{Footprint, Grids, Move, Solution};

/// The weighted objective `lambda1 * f1 + lambda2 * f2 + penalty`.
///
/// `f1` is the operational cost (weighted delay, overtime and undertime),
/// `f2` the population variance of per-ward load plus that of per-day
/// load, and the penalty prices bed overflow and overtime. The penalty is
/// zero for every solution within capacity, so it only shapes the search
/// in soft capacity mode.
///
/// Both [`evaluate`](Self::evaluate) and [`delta`](Self::delta) scalarize
/// exact integer [`Components`] through the same function, which makes
/// `delta(s, m) == evaluate(apply(s, m)) - evaluate(s)` hold exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Evaluator {
    lambda1: f64,
    lambda2: f64,
    weight_delay: f64,
    weight_overtime: f64,
    weight_undertime: f64,
    capacity_penalty: f64,
}

/// The three parts of a solution's cost.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostBreakdown {
    /// Operational cost `f1`, unweighted by `lambda1`.
    pub operational: f64,
    /// Workload-balance cost `f2`, unweighted by `lambda2`.
    pub balance: f64,
    /// Capacity penalty, already multiplied by its price.
    pub penalty: f64,
    /// The scalarized objective.
    pub total: f64,
}

/// Evaluation of one candidate move against the current solution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    /// Components the solution would have after the move.
    pub components: Components,
    /// Objective after the move.
    pub cost: f64,
    /// Objective change, `cost - current cost`.
    pub delta: f64,
}

impl Evaluator {
    /// An evaluator with unit cost weights and the default capacity penalty.
    pub fn new(lambda1: f64, lambda2: f64) -> Self {
        Self::from_config(&AdmissionConfig::default().with_lambdas(lambda1, lambda2))
    }

    pub fn from_config(config: &AdmissionConfig) -> Self {
        Self {
            lambda1: config.lambda1,
            lambda2: config.lambda2,
            weight_delay: config.weight_delay,
            weight_overtime: config.weight_overtime,
            weight_undertime: config.weight_undertime,
            capacity_penalty: config.capacity_penalty,
        }
    }

    #[inline]
    pub fn lambda1(&self) -> f64 {
        self.lambda1
    }

    #[inline]
    pub fn lambda2(&self) -> f64 {
        self.lambda2
    }

    /// Recomputes the objective from the assignment list alone, ignoring
    /// every cached aggregate of `solution`.
    pub fn evaluate(&self, instance: &Instance, solution: &Solution) -> f64 {
        let grids = Grids::build(instance, solution.assignments());
        let components = Components::tally(instance, solution.assignments(), &grids);
        self.scalarize(&components, instance.num_wards(), instance.horizon())
    }

    /// Objective from the solution's cached components.
    #[inline]
    pub fn cost(&self, solution: &Solution) -> f64 {
        self.scalarize(solution.components(), solution.num_wards(), solution.horizon())
    }

    /// Objective change caused by `mv`, computed from the affected cells only.
    pub fn delta(&self, instance: &Instance, solution: &Solution, mv: &Move) -> f64 {
        self.assess(instance, solution, mv).delta
    }

    /// Components, cost and delta of the solution `mv` would produce.
    pub fn assess(&self, instance: &Instance, solution: &Solution, mv: &Move) -> Assessment {
        let footprint = Footprint::of(instance, solution, mv);
        let components = solution
            .components()
            .after(instance, solution.grids(), &footprint);
        let wards = solution.num_wards();
        let horizon = solution.horizon();
        let cost = self.scalarize(&components, wards, horizon);
        Assessment {
            components,
            cost,
            delta: cost - self.scalarize(solution.components(), wards, horizon),
        }
    }

    /// Operational, balance and penalty parts of the cached cost.
    pub fn breakdown(&self, solution: &Solution) -> CostBreakdown {
        let c = solution.components();
        let operational = self.operational(c);
        let balance = balance(c, solution.num_wards(), solution.horizon());
        let penalty = self.penalty(c);
        CostBreakdown {
            operational,
            balance,
            penalty,
            total: self.lambda1 * operational + self.lambda2 * balance + penalty,
        }
    }

    /// Maps integer components to the scalar objective.
    pub fn scalarize(&self, c: &Components, wards: usize, horizon: usize) -> f64 {
        self.lambda1 * self.operational(c)
            + self.lambda2 * balance(c, wards, horizon)
            + self.penalty(c)
    }

    #[inline]
    fn operational(&self, c: &Components) -> f64 {
        self.weight_delay * c.delay as f64
            + self.weight_overtime * c.overtime as f64
            + self.weight_undertime * c.undertime as f64
    }

    #[inline]
    fn penalty(&self, c: &Components) -> f64 {
        self.capacity_penalty * (c.bed_overflow + c.overtime) as f64
    }
}

#[inline]
fn balance(c: &Components, wards: usize, horizon: usize) -> f64 {
    variance(c.ward_dispersion(wards), wards) + variance(c.day_dispersion(horizon), horizon)
}

#[inline]
fn variance(dispersion: i64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    dispersion as f64 / (n as f64 * n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CapacityMode;
    use crate::model::{Patient, Ward};
    use crate::solution::{random, Assignment};
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn two_wards() -> Instance {
        let wards = vec![
            Ward::new("A", 2)
                .with_specializations([0])
                .with_operating_time([60, 60]),
            Ward::new("B", 2)
                .with_specializations([0])
                .with_operating_time([60, 60]),
        ];
        let patients = vec![
            Patient::new("p0", 0).with_window(0, 1).with_operating_time(60),
            Patient::new("p1", 0).with_window(0, 1).with_operating_time(60),
        ];
        Instance::new(2, wards, patients).unwrap()
    }

    #[test]
    fn test_balanced_plan_has_zero_balance_cost() {
        let inst = two_wards();
        let sol = Solution::from_assignments(
            &inst,
            vec![Assignment::new(0, 0, 0), Assignment::new(1, 1, 1)],
        )
        .unwrap();
        let eval = Evaluator::new(1.0, 1.0);
        let b = eval.breakdown(&sol);

        // Ward loads [1, 1], day loads [1, 1]: both variances vanish.
        assert_eq!(b.balance, 0.0);
        // One day of delay; each ward idles 60 minutes on one day.
        assert_eq!(b.operational, 1.0 + 120.0);
        assert_eq!(b.penalty, 0.0);
        assert_eq!(b.total, eval.cost(&sol));
        assert_eq!(eval.evaluate(&inst, &sol), eval.cost(&sol));
    }

    #[test]
    fn test_variance_of_unbalanced_plan() {
        let inst = two_wards();
        let sol = Solution::from_assignments(
            &inst,
            vec![Assignment::new(0, 0, 0), Assignment::new(1, 0, 0)],
        )
        .unwrap();
        let eval = Evaluator::from_config(
            &AdmissionConfig::default()
                .with_lambdas(0.0, 1.0)
                .with_capacity_penalty(0.0),
        );
        // Ward loads [2, 0] and day loads [2, 0]: variance 1 each.
        assert_eq!(eval.cost(&sol), 2.0);
    }

    #[test]
    fn test_penalty_prices_overflow_and_overtime() {
        let inst = two_wards();
        let tight = AdmissionConfig::default()
            .with_lambdas(0.0, 0.0)
            .with_capacity_penalty(10.0);
        let eval = Evaluator::from_config(&tight);
        let sol = Solution::from_assignments(
            &inst,
            vec![Assignment::new(0, 0, 0), Assignment::new(1, 0, 0)],
        )
        .unwrap();
        // Two beds fit; 120 minutes against 60 available.
        assert_eq!(sol.components().bed_overflow, 0);
        assert_eq!(sol.components().overtime, 60);
        assert_eq!(eval.cost(&sol), 600.0);
    }

    #[test]
    fn test_delta_of_noop_is_zero() {
        let inst = two_wards();
        let sol = Solution::from_assignments(
            &inst,
            vec![Assignment::new(0, 0, 0), Assignment::new(1, 0, 1)],
        )
        .unwrap();
        let eval = Evaluator::new(0.5, 0.5);
        let mv = Move::Reassign {
            patient: 0,
            ward: 0,
            day: 0,
        };
        assert_eq!(eval.delta(&inst, &sol, &mv), 0.0);
        let same_cell = Move::Swap {
            first: 0,
            second: 0,
        };
        assert_eq!(eval.delta(&inst, &sol, &same_cell), 0.0);
    }

    #[test]
    fn test_assess_reports_cost_after_move() {
        let inst = two_wards();
        let sol = Solution::from_assignments(
            &inst,
            vec![Assignment::new(0, 0, 0), Assignment::new(1, 0, 0)],
        )
        .unwrap();
        let eval = Evaluator::new(0.5, 0.5);
        let mv = Move::Reassign {
            patient: 1,
            ward: 1,
            day: 1,
        };
        let a = eval.assess(&inst, &sol, &mv);
        let mut moved = sol.clone();
        moved.apply(&inst, &mv);
        assert_eq!(a.cost, eval.cost(&moved));
        assert_eq!(a.components, *moved.components());
        assert!(a.delta < 0.0);
    }

    /// Random soft-mode instance; every ward supports specialization 0 so
    /// every patient has a compatible ward.
    fn random_instance(rng: &mut ChaCha8Rng) -> Instance {
        let horizon = rng.random_range(1..6usize);
        let num_wards = rng.random_range(1..4usize);
        let wards = (0..num_wards)
            .map(|w| {
                let mut specs = vec![0];
                if rng.random_bool(0.5) {
                    specs.push(1);
                }
                Ward::new(format!("w{w}"), rng.random_range(0..3))
                    .with_specializations(specs)
                    .with_operating_time(
                        (0..horizon)
                            .map(|_| rng.random_range(0..120))
                            .collect::<Vec<u32>>(),
                    )
                    .with_carryover(
                        (0..horizon)
                            .map(|_| rng.random_range(0..2))
                            .collect::<Vec<u32>>(),
                    )
            })
            .collect::<Vec<_>>();
        let has_spec1 = wards.iter().any(|w| w.supports(1));
        let num_patients = rng.random_range(1..8usize);
        let patients = (0..num_patients)
            .map(|p| {
                let spec = if has_spec1 { rng.random_range(0..2) } else { 0 };
                let earliest = rng.random_range(0..horizon);
                let latest = rng.random_range(earliest..horizon + 2);
                Patient::new(format!("p{p}"), spec)
                    .with_window(earliest, latest)
                    .with_length_of_stay(rng.random_range(1..4))
                    .with_operating_time(rng.random_range(0..90))
            })
            .collect();
        Instance::new(horizon, wards, patients).unwrap()
    }

    fn random_move(inst: &Instance, sol: &Solution, rng: &mut ChaCha8Rng) -> Move {
        let n = inst.num_patients();
        if n > 1 && rng.random_bool(0.4) {
            let first = rng.random_range(0..n);
            let second = rng.random_range(0..n);
            let a = sol.assignment(first);
            let b = sol.assignment(second);
            if inst.options(first).admits(b.ward, b.day)
                && inst.options(second).admits(a.ward, a.day)
            {
                return Move::Swap { first, second };
            }
        }
        let patient = rng.random_range(0..n);
        let options = inst.options(patient);
        let ward = options.wards[rng.random_range(0..options.wards.len())];
        let day = rng.random_range(options.first_day..=options.last_day);
        Move::Reassign { patient, ward, day }
    }

    proptest! {
        #[test]
        fn prop_delta_matches_full_evaluation(
            seed in any::<u64>(),
            steps in 1usize..40,
            lambda1 in 0.0f64..5.0,
            lambda2 in 0.0f64..5.0,
        ) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let inst = random_instance(&mut rng);
            let eval = Evaluator::new(lambda1, lambda2);
            let mut sol = random(&inst, CapacityMode::Soft, &mut rng).unwrap();

            for _ in 0..steps {
                let mv = random_move(&inst, &sol, &mut rng);
                let before = eval.evaluate(&inst, &sol);
                let delta = eval.delta(&inst, &sol, &mv);
                sol.apply(&inst, &mv);
                let after = eval.evaluate(&inst, &sol);

                prop_assert_eq!(delta, after - before);
                prop_assert_eq!(eval.cost(&sol), after);
            }
        }
    }
}
