//! # Simulation Config
//!
//! $$
//! \Delta t = \frac{1}{252},\qquad N_{\text{steps}} = 252\,h
//! $$
//!

use std::time::Duration;

/// Trading days per year used to discretize the horizon.
pub const TRADING_DAYS_PER_YEAR: usize = 252;
/// Default number of Monte Carlo trials.
pub const DEFAULT_SIMULATIONS: usize = 10_000;

/// How the Cholesky-correlated shock enters the daily exponent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShockScale {
  /// `exp(L z + drift)` with `L` the factor of the covariance as supplied.
  #[default]
  AsSupplied,
  /// `exp(sqrt(Δt) L z + drift)`, so the shock variance matches the `-σ²Δt/2` correction
  /// for an annualized covariance.
  PerStep,
}

/// Runtime configuration for [`crate::simulation::simulate`].
#[derive(Clone, Debug)]
pub struct SimulationConfig {
  /// Number of independent trials.
  pub num_simulations: usize,
  /// Steps per simulated year.
  pub trading_days_per_year: usize,
  /// Base seed; `None` draws one from the thread RNG and records it in the result.
  pub seed: Option<u64>,
  pub shock_scale: ShockScale,
  /// Wall-clock budget for one call.
  pub deadline: Option<Duration>,
}

impl Default for SimulationConfig {
  fn default() -> Self {
    Self {
      num_simulations: DEFAULT_SIMULATIONS,
      trading_days_per_year: TRADING_DAYS_PER_YEAR,
      seed: None,
      shock_scale: ShockScale::AsSupplied,
      deadline: None,
    }
  }
}

impl SimulationConfig {
  pub fn with_num_simulations(mut self, num_simulations: usize) -> Self {
    self.num_simulations = num_simulations;
    self
  }

  pub fn with_trading_days_per_year(mut self, days: usize) -> Self {
    self.trading_days_per_year = days;
    self
  }

  pub fn with_seed(mut self, seed: u64) -> Self {
    self.seed = Some(seed);
    self
  }

  pub fn with_shock_scale(mut self, shock_scale: ShockScale) -> Self {
    self.shock_scale = shock_scale;
    self
  }

  pub fn with_deadline(mut self, deadline: Duration) -> Self {
    self.deadline = Some(deadline);
    self
  }
}

/// Independent stream seed for the `index`-th trial (or goal) under `seed`.
pub(crate) fn stream_seed(seed: u64, index: usize) -> u64 {
  seed.wrapping_add(0xD134_2543_DE82_EF95_u64.wrapping_mul((index as u64).wrapping_add(1)))
}
