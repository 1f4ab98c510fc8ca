//! # Simulation Result
//!
//! $$
//! \{V_T^{(k)}\}_{k=1}^{M},\qquad \hat q_\tau = F_M^{-1}(\tau)
//! $$
//!

use ndarray::Array1;
use ndarray_stats::QuantileExt;
use statrs::statistics::Data;
use statrs::statistics::Distribution;
use statrs::statistics::OrderStatistics;

use crate::error::Error;
use crate::error::Result;

use super::probability::success_probability;

/// Final portfolio values of one simulation call, one per trial in trial order.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationResult {
  final_values: Array1<f64>,
  seed: u64,
  initial_investment: f64,
  horizon_years: u32,
}

/// Distribution summary of the final values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationSummary {
  pub mean: f64,
  pub std_dev: f64,
  pub min: f64,
  pub max: f64,
  pub p05: f64,
  pub p25: f64,
  pub median: f64,
  pub p75: f64,
  pub p95: f64,
}

impl SimulationResult {
  pub(crate) fn new(
    final_values: Array1<f64>,
    seed: u64,
    initial_investment: f64,
    horizon_years: u32,
  ) -> Self {
    Self {
      final_values,
      seed,
      initial_investment,
      horizon_years,
    }
  }

  pub fn final_values(&self) -> &Array1<f64> {
    &self.final_values
  }

  pub fn into_final_values(self) -> Array1<f64> {
    self.final_values
  }

  pub fn len(&self) -> usize {
    self.final_values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.final_values.is_empty()
  }

  /// Base seed the trials were derived from; re-running with it reproduces the values.
  pub fn seed(&self) -> u64 {
    self.seed
  }

  pub fn initial_investment(&self) -> f64 {
    self.initial_investment
  }

  pub fn horizon_years(&self) -> u32 {
    self.horizon_years
  }

  pub fn success_probability(&self, target_amount: f64) -> Result<f64> {
    success_probability(&self.final_values, target_amount)
  }

  pub fn summary(&self) -> Result<SimulationSummary> {
    if self.final_values.is_empty() {
      return Err(Error::EmptyInput);
    }

    let min = *self
      .final_values
      .min()
      .map_err(|e| Error::InvalidInput(format!("final values have no minimum: {e}")))?;
    let max = *self
      .final_values
      .max()
      .map_err(|e| Error::InvalidInput(format!("final values have no maximum: {e}")))?;

    let mut data = Data::new(self.final_values.to_vec());
    let mean = data.mean().ok_or(Error::EmptyInput)?;
    // a single trial has no sample spread
    let std_dev = data.std_dev().filter(|s| s.is_finite()).unwrap_or(0.0);

    Ok(SimulationSummary {
      mean,
      std_dev,
      min,
      max,
      p05: data.quantile(0.05),
      p25: data.quantile(0.25),
      median: data.quantile(0.5),
      p75: data.quantile(0.75),
      p95: data.quantile(0.95),
    })
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn summary_orders_quantiles() {
    let values = Array1::from_iter((1..=101).map(|v| v as f64));
    let result = SimulationResult::new(values, 7, 1.0, 1);
    let s = result.summary().unwrap();

    assert_abs_diff_eq!(s.mean, 51.0, epsilon = 1e-12);
    assert_eq!(s.min, 1.0);
    assert_eq!(s.max, 101.0);
    assert_abs_diff_eq!(s.median, 51.0, epsilon = 1e-9);
    assert!(s.min <= s.p05 && s.p05 <= s.p25 && s.p25 <= s.median);
    assert!(s.median <= s.p75 && s.p75 <= s.p95 && s.p95 <= s.max);
    assert!(s.std_dev > 0.0);
  }

  #[test]
  fn single_trial_has_zero_spread() {
    let result = SimulationResult::new(array![5.0], 1, 5.0, 1);
    let s = result.summary().unwrap();
    assert_eq!(s.mean, 5.0);
    assert_eq!(s.std_dev, 0.0);
    assert_eq!(s.min, 5.0);
    assert_eq!(s.max, 5.0);
  }

  #[test]
  fn probability_delegates_to_estimator() {
    let result = SimulationResult::new(array![1.0, 2.0, 3.0, 4.0], 0, 1.0, 1);
    assert_eq!(result.success_probability(2.5).unwrap(), 0.5);
    assert_eq!(result.len(), 4);
    assert_eq!(result.seed(), 0);
  }

  #[test]
  fn empty_result_has_no_summary() {
    let result = SimulationResult::new(Array1::zeros(0), 0, 1.0, 1);
    assert!(result.is_empty());
    assert_eq!(result.summary(), Err(Error::EmptyInput));
  }
}
