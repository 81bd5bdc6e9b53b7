//! Run configuration.

use std::time::Duration;

use crate::error::{AdmissionError, Result};

/// How bed capacity and operating-time limits are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CapacityMode {
    /// Violating moves are never generated; every solution stays feasible.
    #[default]
    Hard,
    /// Violations are allowed and priced by `capacity_penalty`.
    Soft,
}

/// How the initial solution of a metaheuristic run is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Construction {
    /// Tightest window first, earliest day, first ward with room.
    #[default]
    Greedy,
    /// Random order, random fitting (ward, day).
    Random,
}

/// Configuration shared by every engine and the hybrid orchestrator.
///
/// Validated once by the constructors that consume it; no engine state
/// exists for an invalid configuration.
///
/// # Examples
///
/// ```
/// use u_admission::{AdmissionConfig, CapacityMode};
///
/// let config = AdmissionConfig::default()
///     .with_lambdas(0.7, 0.3)
///     .with_max_iterations(20_000)
///     .with_temperature(500.0, 0.97)
///     .with_tabu_tenure(15)
///     .with_capacity_mode(CapacityMode::Soft)
///     .with_seed(7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdmissionConfig {
    /// Weight on operational cost (delay, overtime, undertime).
    pub lambda1: f64,
    /// Weight on workload-balance cost.
    pub lambda2: f64,

    /// Iteration budget of a metaheuristic run.
    pub max_iterations: usize,

    /// Starting temperature of simulated annealing.
    pub initial_temperature: f64,
    /// Annealing stops once the temperature falls below this.
    pub min_temperature: f64,
    /// Geometric factor applied after each epoch, in (0, 1].
    pub cooling_rate: f64,
    /// Iterations per temperature level.
    pub epoch_length: usize,

    /// Iterations a reversing placement stays forbidden.
    pub tabu_tenure: usize,
    /// Candidates sampled per tabu iteration. 0 enumerates the full neighborhood.
    pub tabu_sample_size: usize,
    /// Stop tabu search after this many non-improving iterations. 0 = never.
    pub max_no_improve: usize,

    /// Probability that a sampled move is a swap rather than a reassignment.
    pub swap_probability: f64,
    /// Initial solution construction.
    pub construction: Construction,
    /// Hard filter or soft penalty for capacity and operating time.
    pub capacity_mode: CapacityMode,

    /// Cost per day of admission delay.
    pub weight_delay: f64,
    /// Cost per minute of operating overtime.
    pub weight_overtime: f64,
    /// Cost per minute of idle operating time.
    pub weight_undertime: f64,
    /// Price of one unit of capacity violation (soft mode).
    pub capacity_penalty: f64,

    /// Wall-clock budget of the metaheuristic phase.
    pub time_limit_phase1: Option<Duration>,
    /// Wall-clock budget handed to the exact solver.
    pub time_limit_phase2: Option<Duration>,

    /// Seed of the deterministic random source.
    pub random_seed: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            lambda1: 0.5,
            lambda2: 0.5,
            max_iterations: 10_000,
            initial_temperature: 1000.0,
            min_temperature: 0.01,
            cooling_rate: 0.95,
            epoch_length: 100,
            tabu_tenure: 50,
            tabu_sample_size: 0,
            max_no_improve: 0,
            swap_probability: 0.3,
            construction: Construction::Greedy,
            capacity_mode: CapacityMode::Hard,
            weight_delay: 1.0,
            weight_overtime: 1.0,
            weight_undertime: 1.0,
            capacity_penalty: 1000.0,
            time_limit_phase1: None,
            time_limit_phase2: Some(Duration::from_secs(300)),
            random_seed: 42,
        }
    }
}

impl AdmissionConfig {
    pub fn with_lambdas(mut self, lambda1: f64, lambda2: f64) -> Self {
        self.lambda1 = lambda1;
        self.lambda2 = lambda2;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_temperature(mut self, initial: f64, cooling_rate: f64) -> Self {
        self.initial_temperature = initial;
        self.cooling_rate = cooling_rate;
        self
    }

    pub fn with_min_temperature(mut self, t: f64) -> Self {
        self.min_temperature = t;
        self
    }

    pub fn with_epoch_length(mut self, n: usize) -> Self {
        self.epoch_length = n;
        self
    }

    pub fn with_tabu_tenure(mut self, tenure: usize) -> Self {
        self.tabu_tenure = tenure;
        self
    }

    pub fn with_tabu_sample_size(mut self, n: usize) -> Self {
        self.tabu_sample_size = n;
        self
    }

    pub fn with_max_no_improve(mut self, n: usize) -> Self {
        self.max_no_improve = n;
        self
    }

    pub fn with_swap_probability(mut self, p: f64) -> Self {
        self.swap_probability = p;
        self
    }

    pub fn with_construction(mut self, construction: Construction) -> Self {
        self.construction = construction;
        self
    }

    pub fn with_capacity_mode(mut self, mode: CapacityMode) -> Self {
        self.capacity_mode = mode;
        self
    }

    pub fn with_weights(mut self, delay: f64, overtime: f64, undertime: f64) -> Self {
        self.weight_delay = delay;
        self.weight_overtime = overtime;
        self.weight_undertime = undertime;
        self
    }

    pub fn with_capacity_penalty(mut self, penalty: f64) -> Self {
        self.capacity_penalty = penalty;
        self
    }

    pub fn with_time_limits(mut self, phase1: Option<Duration>, phase2: Option<Duration>) -> Self {
        self.time_limit_phase1 = phase1;
        self.time_limit_phase2 = phase2;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("lambda1", self.lambda1),
            ("lambda2", self.lambda2),
            ("weight_delay", self.weight_delay),
            ("weight_overtime", self.weight_overtime),
            ("weight_undertime", self.weight_undertime),
            ("capacity_penalty", self.capacity_penalty),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be positive"));
        }
        if self.epoch_length == 0 {
            return Err(invalid("epoch_length must be positive"));
        }
        if self.initial_temperature.is_nan() || self.initial_temperature <= 0.0 {
            return Err(invalid("initial_temperature must be positive"));
        }
        if self.min_temperature.is_nan() || self.min_temperature <= 0.0 {
            return Err(invalid("min_temperature must be positive"));
        }
        if self.min_temperature >= self.initial_temperature {
            return Err(invalid(
                "min_temperature must be less than initial_temperature",
            ));
        }
        if self.cooling_rate.is_nan() || self.cooling_rate <= 0.0 || self.cooling_rate > 1.0 {
            return Err(invalid(format!(
                "cooling_rate must be in (0, 1], got {}",
                self.cooling_rate
            )));
        }
        if self.tabu_tenure == 0 {
            return Err(invalid("tabu_tenure must be positive"));
        }
        if !(0.0..=1.0).contains(&self.swap_probability) {
            return Err(invalid(format!(
                "swap_probability must be in [0, 1], got {}",
                self.swap_probability
            )));
        }
        for (name, limit) in [
            ("time_limit_phase1", self.time_limit_phase1),
            ("time_limit_phase2", self.time_limit_phase2),
        ] {
            if limit.is_some_and(|d| d.is_zero()) {
                return Err(invalid(format!("{name} must be positive when set")));
            }
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> AdmissionError {
    AdmissionError::Configuration(message.into())
}
