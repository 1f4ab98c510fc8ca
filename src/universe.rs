//! # Asset Universe
//!
//! $$
//! \Sigma_{ij} = \sigma_i \sigma_j \rho_{ij}
//! $$
//!
//! Ordered assets with annualized expected returns and covariance, as handed
//! over by an external market-data provider.

use crate::error::Error;
use crate::error::Result;
use crate::linalg::negative_diagonal;
use crate::linalg::validate_covariance;
use crate::linalg::validate_shape;

/// Read-only market inputs for a fixed, ordered list of assets.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetUniverse {
  names: Vec<String>,
  expected_returns: Vec<f64>,
  covariance: Vec<Vec<f64>>,
}

impl AssetUniverse {
  /// Build a universe, checking that dimensions agree, entries are finite,
  /// the covariance is symmetric and its diagonal is non-negative.
  pub fn new(
    names: Vec<String>,
    expected_returns: Vec<f64>,
    covariance: Vec<Vec<f64>>,
  ) -> Result<Self> {
    let n = expected_returns.len();
    if n == 0 {
      return Err(Error::InvalidInput(
        "asset universe must contain at least one asset".into(),
      ));
    }
    if names.len() != n {
      return Err(Error::InvalidInput(format!(
        "{} asset names for {n} expected returns",
        names.len()
      )));
    }
    if expected_returns.iter().any(|r| !r.is_finite()) {
      return Err(Error::InvalidInput(
        "expected returns contain a non-finite entry".into(),
      ));
    }
    validate_shape(&covariance, n)?;
    if let Some((i, v)) = negative_diagonal(&covariance) {
      return Err(Error::NonPositiveDefinite(format!(
        "variance of {} is negative ({v})",
        names[i]
      )));
    }
    validate_covariance(&covariance, n)?;

    Ok(Self {
      names,
      expected_returns,
      covariance,
    })
  }

  /// Build a universe from per-asset volatilities and a correlation matrix.
  pub fn from_volatilities(
    names: Vec<String>,
    expected_returns: Vec<f64>,
    volatilities: &[f64],
    correlation: &[Vec<f64>],
  ) -> Result<Self> {
    let n = volatilities.len();
    if correlation.len() != n || correlation.iter().any(|row| row.len() != n) {
      return Err(Error::InvalidInput(format!(
        "correlation must be {n}x{n} to match {n} volatilities"
      )));
    }
    if let Some(v) = volatilities.iter().find(|v| !v.is_finite() || **v < 0.0) {
      return Err(Error::InvalidInput(format!(
        "volatility {v} must be finite and non-negative"
      )));
    }

    let mut covariance = vec![vec![0.0; n]; n];
    for i in 0..n {
      for j in 0..n {
        covariance[i][j] = volatilities[i] * volatilities[j] * correlation[i][j];
      }
    }

    Self::new(names, expected_returns, covariance)
  }

  pub fn len(&self) -> usize {
    self.expected_returns.len()
  }

  pub fn is_empty(&self) -> bool {
    self.expected_returns.is_empty()
  }

  pub fn names(&self) -> &[String] {
    &self.names
  }

  pub fn expected_returns(&self) -> &[f64] {
    &self.expected_returns
  }

  pub fn covariance(&self) -> &[Vec<f64>] {
    &self.covariance
  }

  /// Annualized volatility of each asset.
  pub fn volatilities(&self) -> Vec<f64> {
    (0..self.len())
      .map(|i| self.covariance[i][i].max(0.0).sqrt())
      .collect()
  }

  /// `1/n` on every asset.
  pub fn equal_weights(&self) -> Vec<f64> {
    equal_weights(self.len())
  }
}

pub(crate) fn equal_weights(n: usize) -> Vec<f64> {
  if n == 0 {
    return Vec::new();
  }
  vec![1.0 / n as f64; n]
}
