//! # Risk-Adjusted Optimizer
//!
//! $$
//! \max_{\mathbf{w}} \ \boldsymbol\mu^\top \mathbf{w} - \lambda\, \mathbf{w}^\top \Sigma \mathbf{w}
//! \quad \text{s.t.}\quad \mathbf{1}^\top\mathbf{w} = 1,\ \mathbf{l} \le \mathbf{w} \le \mathbf{u},\ \mathbf{w} \ge 0
//! $$
//!
//! Concave quadratic program over a box-capped simplex, solved with
//! accelerated projected gradient ascent (FISTA with adaptive restart).
//! A point is accepted only when it is a fixed point of the projected gradient
//! map, `w = P(w + s ∇f(w))`, which is exactly the KKT condition of the
//! program; otherwise the call fails.

pub mod projection;
pub mod types;

use tracing::debug;

use crate::error::Error;
use crate::error::Result;
use crate::linalg::dot;
use crate::linalg::eigenvalue_bounds;
use crate::linalg::mat_vec_mul;
use crate::linalg::quad_form;
use crate::linalg::validate_covariance;
use crate::universe::equal_weights;

pub use projection::BoxSimplex;
pub use types::Allocation;
pub use types::AllocationConstraints;
pub use types::OptimizerConfig;

/// Step-size floor for near-linear objectives; any step is admissible there.
const MIN_LIPSCHITZ: f64 = 1e-2;
/// Relative size of a negative eigenvalue tolerated as rounding noise.
const EIGEN_TOLERANCE: f64 = 1e-10;

/// Optimize with the default solver settings.
pub fn optimize(
  mu: &[f64],
  cov: &[Vec<f64>],
  risk_aversion: f64,
  constraints: Option<&AllocationConstraints>,
) -> Result<Allocation> {
  optimize_with_config(
    mu,
    cov,
    risk_aversion,
    constraints,
    &OptimizerConfig::default(),
  )
}

/// Maximize `mu.w - risk_aversion * w'Σw` over the feasible weights.
pub fn optimize_with_config(
  mu: &[f64],
  cov: &[Vec<f64>],
  risk_aversion: f64,
  constraints: Option<&AllocationConstraints>,
  config: &OptimizerConfig,
) -> Result<Allocation> {
  let n = mu.len();
  if n == 0 {
    return Err(Error::InvalidInput(
      "expected returns must not be empty".into(),
    ));
  }
  if mu.iter().any(|m| !m.is_finite()) {
    return Err(Error::InvalidInput(
      "expected returns contain a non-finite entry".into(),
    ));
  }
  validate_covariance(cov, n)?;
  if !risk_aversion.is_finite() || risk_aversion < 0.0 {
    return Err(Error::Optimization(format!(
      "risk aversion must be finite and non-negative, got {risk_aversion}"
    )));
  }

  let feasible = BoxSimplex::new(n, constraints)?;

  let (min_eig, max_eig) = eigenvalue_bounds(cov);
  if risk_aversion > 0.0 && min_eig < -EIGEN_TOLERANCE * max_eig.abs().max(1.0) {
    return Err(Error::Optimization(format!(
      "covariance has negative eigenvalue {min_eig}, objective is not concave"
    )));
  }

  let problem = Problem {
    mu,
    cov,
    risk_aversion,
  };
  let lipschitz = (2.0 * risk_aversion * max_eig.max(0.0)).max(MIN_LIPSCHITZ);
  let step = 1.0 / lipschitz;

  let weights = problem.solve(&feasible, step, config)?;
  let allocation = Allocation::from_weights(mu, cov, weights);

  if !allocation.expected_return.is_finite() || !allocation.volatility.is_finite() {
    return Err(Error::Optimization(
      "solution metrics are not finite".into(),
    ));
  }

  Ok(allocation)
}

struct Problem<'a> {
  mu: &'a [f64],
  cov: &'a [Vec<f64>],
  risk_aversion: f64,
}

impl Problem<'_> {
  fn objective(&self, w: &[f64]) -> f64 {
    dot(self.mu, w) - self.risk_aversion * quad_form(self.cov, w)
  }

  fn gradient(&self, w: &[f64]) -> Vec<f64> {
    let sigma_w = mat_vec_mul(self.cov, w);
    self
      .mu
      .iter()
      .zip(sigma_w.iter())
      .map(|(m, s)| m - 2.0 * self.risk_aversion * s)
      .collect()
  }

  fn ascent(&self, feasible: &BoxSimplex, w: &[f64], step: f64) -> Vec<f64> {
    let g = self.gradient(w);
    let candidate: Vec<f64> = w.iter().zip(g.iter()).map(|(x, gi)| x + step * gi).collect();
    feasible.project(&candidate)
  }

  fn residual(&self, feasible: &BoxSimplex, w: &[f64], step: f64) -> f64 {
    self
      .ascent(feasible, w, step)
      .iter()
      .zip(w.iter())
      .map(|(a, b)| (a - b).abs())
      .fold(0.0, f64::max)
  }

  fn solve(&self, feasible: &BoxSimplex, step: f64, config: &OptimizerConfig) -> Result<Vec<f64>> {
    let n = self.mu.len();
    let mut w = feasible.project(&equal_weights(n));
    let mut f_w = self.objective(&w);
    let mut y = w.clone();
    let mut t = 1.0_f64;
    let mut residual = f64::INFINITY;

    for iter in 0..config.max_iters {
      let next = self.ascent(feasible, &y, step);
      let f_next = self.objective(&next);

      residual = self.residual(feasible, &next, step);
      if residual <= config.tolerance {
        debug!(iterations = iter + 1, residual, "optimizer converged");
        return Ok(next);
      }

      if f_next < f_w {
        // Momentum overshot: restart from the new iterate.
        t = 1.0;
        y = next.clone();
      } else {
        let t_next = 0.5 * (1.0 + (1.0 + 4.0 * t * t).sqrt());
        let beta = (t - 1.0) / t_next;
        y = next
          .iter()
          .zip(w.iter())
          .map(|(a, b)| a + beta * (a - b))
          .collect();
        t = t_next;
      }

      w = next;
      f_w = f_next;
    }

    Err(Error::Optimization(format!(
      "no optimal point within {} iterations (residual {residual:e})",
      config.max_iters
    )))
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn four_asset_universe() -> (Vec<f64>, Vec<Vec<f64>>) {
    let mu = vec![0.07, 0.03, 0.02, 0.09];
    let vols = [0.15, 0.08, 0.12, 0.20];
    let corr = [
      [1.0, 0.2, 0.1, 0.3],
      [0.2, 1.0, 0.05, 0.1],
      [0.1, 0.05, 1.0, 0.15],
      [0.3, 0.1, 0.15, 1.0],
    ];
    let cov = (0..4)
      .map(|i| (0..4).map(|j| vols[i] * vols[j] * corr[i][j]).collect())
      .collect();
    (mu, cov)
  }

  fn assert_valid_weights(w: &[f64]) {
    assert!(w.iter().all(|x| x.is_finite() && *x >= 0.0));
    assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
  }

  #[test]
  fn unconstrained_weights_are_on_the_simplex() {
    let (mu, cov) = four_asset_universe();
    for lambda in [0.0, 0.05, 0.5, 5.0, 50.0] {
      let alloc = optimize(&mu, &cov, lambda, None).unwrap();
      assert_valid_weights(&alloc.weights);
    }
  }

  #[test]
  fn zero_risk_aversion_picks_the_best_asset() {
    let (mu, cov) = four_asset_universe();
    let alloc = optimize(&mu, &cov, 0.0, None).unwrap();
    assert_abs_diff_eq!(alloc.weights[3], 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(alloc.expected_return, 0.09, epsilon = 1e-9);
  }

  #[test]
  fn bounded_weights_stay_in_band() {
    let (mu, cov) = four_asset_universe();
    let constraints = AllocationConstraints::uniform(4, 0.05, 0.60);
    for lambda in [0.0, 0.1, 1.0, 10.0] {
      let alloc = optimize(&mu, &cov, lambda, Some(&constraints)).unwrap();
      assert_valid_weights(&alloc.weights);
      for w in &alloc.weights {
        assert!(*w >= 0.05 - 1e-9 && *w <= 0.60 + 1e-9, "w={w}");
      }
    }
  }

  #[test]
  fn twenty_assets_with_default_band() {
    let n = 20;
    let mu: Vec<f64> = (0..n).map(|i| 0.02 + 0.004 * i as f64).collect();
    let cov: Vec<Vec<f64>> = (0..n)
      .map(|i| {
        (0..n)
          .map(|j| if i == j { 0.01 + 0.002 * i as f64 } else { 0.002 })
          .collect()
      })
      .collect();
    let constraints = AllocationConstraints::uniform(n, 0.05, 0.60);
    let alloc = optimize(&mu, &cov, 0.3, Some(&constraints)).unwrap();
    assert_valid_weights(&alloc.weights);
    for w in &alloc.weights {
      assert!(*w >= 0.05 - 1e-9 && *w <= 0.60 + 1e-9);
    }
  }

  #[test]
  fn matches_closed_form_for_two_uncorrelated_assets() {
    // Interior optimum: 2λ(σ1² w − σ2² (1−w)) = μ1 − μ2.
    let mu = [0.10, 0.05];
    let cov = vec![vec![0.04, 0.0], vec![0.0, 0.01]];
    let lambda = 2.0;
    let w1 = (mu[0] - mu[1] + 2.0 * lambda * 0.01) / (2.0 * lambda * (0.04 + 0.01));
    let alloc = optimize(&mu, &cov, lambda, None).unwrap();
    assert_abs_diff_eq!(alloc.weights[0], w1, epsilon = 1e-8);
    assert_abs_diff_eq!(alloc.weights[1], 1.0 - w1, epsilon = 1e-8);
  }

  #[test]
  fn higher_risk_aversion_lowers_volatility() {
    let (mu, cov) = four_asset_universe();
    let aggressive = optimize(&mu, &cov, 0.1, None).unwrap();
    let cautious = optimize(&mu, &cov, 10.0, None).unwrap();
    assert!(cautious.volatility <= aggressive.volatility + 1e-12);
  }

  #[test]
  fn metrics_are_derived_from_weights() {
    let (mu, cov) = four_asset_universe();
    let alloc = optimize(&mu, &cov, 1.0, None).unwrap();
    assert_abs_diff_eq!(alloc.expected_return, dot(&mu, &alloc.weights), epsilon = 1e-15);
    assert_abs_diff_eq!(
      alloc.volatility,
      quad_form(&cov, &alloc.weights).sqrt(),
      epsilon = 1e-15
    );
    assert_abs_diff_eq!(
      alloc.sharpe_ratio,
      alloc.expected_return / alloc.volatility,
      epsilon = 1e-12
    );
  }

  #[test]
  fn single_riskless_asset_has_zero_sharpe() {
    let alloc = optimize(&[0.03], &[vec![0.0]], 1.0, None).unwrap();
    assert_eq!(alloc.weights, vec![1.0]);
    assert_eq!(alloc.sharpe_ratio, 0.0);
  }

  #[test]
  fn infeasible_bounds_fail() {
    let (mu, cov) = four_asset_universe();
    let constraints = AllocationConstraints::uniform(4, 0.30, 0.60);
    assert!(matches!(
      optimize(&mu, &cov, 1.0, Some(&constraints)),
      Err(Error::Optimization(_))
    ));
  }

  #[test]
  fn indefinite_covariance_fails() {
    let cov = vec![vec![0.04, 0.05], vec![0.05, 0.04]];
    assert!(matches!(
      optimize(&[0.05, 0.06], &cov, 1.0, None),
      Err(Error::Optimization(_))
    ));
  }

  #[test]
  fn negative_risk_aversion_fails() {
    let (mu, cov) = four_asset_universe();
    assert!(matches!(
      optimize(&mu, &cov, -1.0, None),
      Err(Error::Optimization(_))
    ));
  }

  #[test]
  fn iteration_cap_is_reported_as_failure() {
    let (mu, cov) = four_asset_universe();
    let config = OptimizerConfig {
      max_iters: 1,
      tolerance: 0.0,
    };
    assert!(matches!(
      optimize_with_config(&mu, &cov, 1.0, None, &config),
      Err(Error::Optimization(_))
    ));
  }

  #[test]
  fn shape_mismatch_is_invalid_input() {
    assert!(matches!(
      optimize(&[0.05, 0.06], &[vec![0.04]], 1.0, None),
      Err(Error::InvalidInput(_))
    ));
  }
}
