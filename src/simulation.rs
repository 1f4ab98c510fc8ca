//! # Correlated Monte Carlo
//!
//! $$
//! V_{t+1} = V_t \sum_i w_i \exp\!\Big((L z_t)_i + \frac{\mu_i}{252} - \frac{\Sigma_{ii}}{2\cdot 252}\Big),
//! \qquad z_t \sim \mathcal N(0, I),\ LL^\top = \Sigma
//! $$
//!
//! Daily portfolio paths with Cholesky-correlated shocks. Each trial owns an
//! RNG stream derived from the base seed and its index, so results do not
//! depend on thread scheduling or on the number of trials requested.

pub mod config;
pub mod probability;
pub mod result;

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Instant;

use ndarray::Array1;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use tracing::debug;

pub use config::DEFAULT_SIMULATIONS;
pub use config::ShockScale;
pub use config::SimulationConfig;
pub use config::TRADING_DAYS_PER_YEAR;
pub use probability::success_probability;
pub use result::SimulationResult;
pub use result::SimulationSummary;

use crate::error::Error;
use crate::error::Result;
use crate::linalg::CholeskyFactor;
use crate::linalg::diagonal;
use crate::universe::AssetUniverse;
use crate::universe::equal_weights;

/// Tolerance on `|sum(w) - 1|` for caller-supplied weights.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;
/// Rounding slack below zero accepted for a long-only weight.
const NEGATIVE_WEIGHT_TOLERANCE: f64 = 1e-12;

pub(crate) use config::stream_seed;

/// Validated per-step model shared by all trials.
struct DailyModel {
  factor: CholeskyFactor,
  drift: Vec<f64>,
  weights: Vec<f64>,
  shock_scale: f64,
  steps: usize,
}

impl DailyModel {
  fn run_trial(&self, initial_investment: f64, rng: &mut StdRng) -> f64 {
    let n = self.drift.len();
    let mut z = vec![0.0; n];
    let mut shock = vec![0.0; n];
    let mut value = initial_investment;

    for _ in 0..self.steps {
      for zi in z.iter_mut() {
        *zi = StandardNormal.sample(rng);
      }
      self.factor.transform(&z, &mut shock);

      let growth: f64 = self
        .weights
        .iter()
        .zip(shock.iter())
        .zip(self.drift.iter())
        .map(|((w, s), d)| w * (self.shock_scale * s + d).exp())
        .sum();
      value *= growth;
    }

    value
  }
}

/// Simulate `config.num_simulations` daily portfolio paths over `horizon_years`.
///
/// `weights` defaults to equal weights. All validation (including the
/// covariance factorization) happens before the first trial runs.
pub fn simulate(
  mu: &[f64],
  cov: &[Vec<f64>],
  initial_investment: f64,
  horizon_years: u32,
  weights: Option<&[f64]>,
  config: &SimulationConfig,
) -> Result<SimulationResult> {
  let n = mu.len();
  if n == 0 {
    return Err(Error::InvalidInput("asset universe is empty".into()));
  }
  if mu.iter().any(|m| !m.is_finite()) {
    return Err(Error::InvalidInput("expected returns must be finite".into()));
  }
  if cov.len() != n {
    return Err(Error::InvalidInput(format!(
      "covariance has {} rows but there are {n} assets",
      cov.len()
    )));
  }

  let factor = CholeskyFactor::new(cov)?;

  if !initial_investment.is_finite() || initial_investment <= 0.0 {
    return Err(Error::InvalidInput(format!(
      "initial investment must be positive, got {initial_investment}"
    )));
  }
  if horizon_years == 0 {
    return Err(Error::InvalidGoal("horizon must be at least one year".into()));
  }
  if config.num_simulations == 0 {
    return Err(Error::InvalidInput("num_simulations must be positive".into()));
  }
  if config.trading_days_per_year == 0 {
    return Err(Error::InvalidInput(
      "trading_days_per_year must be positive".into(),
    ));
  }

  let weights = match weights {
    Some(w) => validate_weights(w, n)?,
    None => equal_weights(n),
  };

  let days = config.trading_days_per_year as f64;
  let drift = mu
    .iter()
    .zip(diagonal(cov))
    .map(|(m, var)| m / days - 0.5 * var / days)
    .collect();
  let shock_scale = match config.shock_scale {
    ShockScale::AsSupplied => 1.0,
    ShockScale::PerStep => (1.0 / days).sqrt(),
  };
  let model = DailyModel {
    factor,
    drift,
    weights,
    shock_scale,
    steps: horizon_years as usize * config.trading_days_per_year,
  };

  let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
  let requested = config.num_simulations;
  debug!(
    seed,
    trials = requested,
    steps = model.steps,
    assets = n,
    "running monte carlo simulation"
  );

  let started = Instant::now();
  let completed = AtomicUsize::new(0);
  let values = (0..requested)
    .into_par_iter()
    .map(|k| {
      if let Some(limit) = config.deadline {
        if started.elapsed() >= limit {
          return Err(Error::DeadlineExceeded {
            completed: completed.load(Ordering::Relaxed),
            requested,
          });
        }
      }
      let mut rng = StdRng::seed_from_u64(stream_seed(seed, k));
      let v = model.run_trial(initial_investment, &mut rng);
      completed.fetch_add(1, Ordering::Relaxed);
      Ok(v)
    })
    .collect::<Result<Vec<f64>>>()?;

  debug!(
    elapsed_ms = started.elapsed().as_millis() as u64,
    "simulation finished"
  );

  Ok(SimulationResult::new(
    Array1::from_vec(values),
    seed,
    initial_investment,
    horizon_years,
  ))
}

/// [`simulate`] over an [`AssetUniverse`].
pub fn simulate_universe(
  universe: &AssetUniverse,
  initial_investment: f64,
  horizon_years: u32,
  weights: Option<&[f64]>,
  config: &SimulationConfig,
) -> Result<SimulationResult> {
  simulate(
    universe.expected_returns(),
    universe.covariance(),
    initial_investment,
    horizon_years,
    weights,
    config,
  )
}

fn validate_weights(weights: &[f64], n: usize) -> Result<Vec<f64>> {
  if weights.len() != n {
    return Err(Error::InvalidInput(format!(
      "got {} weights for {n} assets",
      weights.len()
    )));
  }
  if weights.iter().any(|w| !w.is_finite()) {
    return Err(Error::InvalidInput("weights must be finite".into()));
  }
  if let Some((i, w)) = weights
    .iter()
    .enumerate()
    .find(|(_, w)| **w < -NEGATIVE_WEIGHT_TOLERANCE)
  {
    return Err(Error::InvalidInput(format!(
      "weight {i} is negative ({w})"
    )));
  }
  let sum: f64 = weights.iter().sum();
  if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
    return Err(Error::InvalidInput(format!(
      "weights must sum to one, got {sum}"
    )));
  }
  Ok(weights.to_vec())
}
