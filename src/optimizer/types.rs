//! # Optimizer Types
//!
//! $$
//! \mathrm{SR} = \frac{\boldsymbol\mu^\top \mathbf{w}}{\sqrt{\mathbf{w}^\top \Sigma \mathbf{w}}}
//! $$
//!
//! Constraint inputs, solver settings and the allocation result.

use crate::linalg::dot;
use crate::linalg::quad_form;

/// Optional per-asset bounds applied on top of `w >= 0` and `sum(w) = 1`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AllocationConstraints {
  /// Lower bound per asset, in asset order.
  pub min_weights: Option<Vec<f64>>,
  /// Upper bound per asset, in asset order.
  pub max_weights: Option<Vec<f64>>,
}

impl AllocationConstraints {
  pub fn new(min_weights: Option<Vec<f64>>, max_weights: Option<Vec<f64>>) -> Self {
    Self {
      min_weights,
      max_weights,
    }
  }

  /// Same `[min, max]` band on each of `n` assets.
  pub fn uniform(n: usize, min_weight: f64, max_weight: f64) -> Self {
    Self {
      min_weights: Some(vec![min_weight; n]),
      max_weights: Some(vec![max_weight; n]),
    }
  }
}

/// Stopping rules for the projected-gradient solver.
#[derive(Clone, Copy, Debug)]
pub struct OptimizerConfig {
  /// Iteration cap; hitting it is reported as a failure.
  pub max_iters: usize,
  /// Fixed-point residual `max_i |w - P(w + s ∇f(w))|_i` accepted as optimal.
  pub tolerance: f64,
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self {
      max_iters: 20_000,
      tolerance: 1e-10,
    }
  }
}

/// Optimal weights and their model metrics.
#[derive(Clone, Debug, PartialEq)]
pub struct Allocation {
  /// Portfolio weights, non-negative and summing to one.
  pub weights: Vec<f64>,
  /// `mu . w`, annualized when the inputs are.
  pub expected_return: f64,
  /// `sqrt(w' Σ w)`.
  pub volatility: f64,
  /// `expected_return / volatility`, zero for a riskless portfolio.
  pub sharpe_ratio: f64,
}

impl Allocation {
  /// Derive return, volatility and Sharpe ratio for fixed weights.
  pub fn from_weights(mu: &[f64], cov: &[Vec<f64>], weights: Vec<f64>) -> Self {
    let expected_return = dot(&weights, mu);
    let volatility = quad_form(cov, &weights).max(0.0).sqrt();
    let sharpe_ratio = if volatility > 1e-15 {
      expected_return / volatility
    } else {
      0.0
    };

    Self {
      weights,
      expected_return,
      volatility,
      sharpe_ratio,
    }
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn metrics_for_two_uncorrelated_assets() {
    let alloc = Allocation::from_weights(
      &[0.08, 0.04],
      &[vec![0.04, 0.0], vec![0.0, 0.01]],
      vec![0.5, 0.5],
    );
    assert_abs_diff_eq!(alloc.expected_return, 0.06, epsilon = 1e-15);
    assert_abs_diff_eq!(alloc.volatility, 0.0125_f64.sqrt(), epsilon = 1e-15);
    assert_abs_diff_eq!(
      alloc.sharpe_ratio,
      0.06 / 0.0125_f64.sqrt(),
      epsilon = 1e-12
    );
  }

  #[test]
  fn sharpe_is_zero_without_risk() {
    let alloc = Allocation::from_weights(&[0.03], &[vec![0.0]], vec![1.0]);
    assert_eq!(alloc.volatility, 0.0);
    assert_eq!(alloc.sharpe_ratio, 0.0);
  }
}
