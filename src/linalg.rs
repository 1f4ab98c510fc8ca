//! # Linear Algebra Helpers
//!
//! $$
//! \Sigma = L L^\top,\qquad \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Dense helpers over row-major `Vec<Vec<f64>>` matrices and the Cholesky
//! factor used to correlate independent normal shocks.

use nalgebra::DMatrix;

use crate::error::Error;
use crate::error::Result;

/// Relative tolerance for a zero pivot in the semidefinite factorization.
const PIVOT_TOLERANCE: f64 = 1e-12;
/// Relative tolerance for `|a_ij - a_ji|`.
const SYMMETRY_TOLERANCE: f64 = 1e-10;

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
  a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn mat_vec_mul(mat: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
  mat
    .iter()
    .map(|row| row.iter().zip(v.iter()).map(|(a, b)| a * b).sum())
    .collect()
}

/// `w^T A w`.
pub fn quad_form(mat: &[Vec<f64>], w: &[f64]) -> f64 {
  dot(w, &mat_vec_mul(mat, w))
}

pub fn diagonal(mat: &[Vec<f64>]) -> Vec<f64> {
  mat.iter().enumerate().map(|(i, row)| row[i]).collect()
}

fn to_dmatrix(mat: &[Vec<f64>]) -> DMatrix<f64> {
  let n = mat.len();
  DMatrix::from_fn(n, n, |i, j| mat[i][j])
}

fn diagonal_scale(mat: &[Vec<f64>]) -> f64 {
  mat
    .iter()
    .enumerate()
    .map(|(i, row)| row[i].abs())
    .fold(0.0, f64::max)
}

/// Reject a matrix that is not `n x n`.
pub fn validate_shape(mat: &[Vec<f64>], n: usize) -> Result<()> {
  if mat.len() != n || mat.iter().any(|row| row.len() != n) {
    return Err(Error::InvalidInput(format!(
      "covariance must be {n}x{n} to match {n} assets"
    )));
  }
  Ok(())
}

/// First negative diagonal entry of a square matrix.
pub fn negative_diagonal(mat: &[Vec<f64>]) -> Option<(usize, f64)> {
  mat
    .iter()
    .enumerate()
    .map(|(i, row)| (i, row[i]))
    .find(|(_, v)| *v < 0.0)
}

/// Validate that `mat` is a finite, symmetric `n x n` matrix.
pub fn validate_covariance(mat: &[Vec<f64>], n: usize) -> Result<()> {
  validate_shape(mat, n)?;

  if mat.iter().flatten().any(|v| !v.is_finite()) {
    return Err(Error::InvalidInput(
      "covariance contains a non-finite entry".into(),
    ));
  }

  let tol = SYMMETRY_TOLERANCE * diagonal_scale(mat).max(1.0);
  for i in 0..n {
    for j in (i + 1)..n {
      if (mat[i][j] - mat[j][i]).abs() > tol {
        return Err(Error::InvalidInput(format!(
          "covariance is not symmetric at ({i}, {j})"
        )));
      }
    }
  }

  Ok(())
}

/// Smallest and largest eigenvalue of a symmetric matrix.
pub fn eigenvalue_bounds(mat: &[Vec<f64>]) -> (f64, f64) {
  let eigen = to_dmatrix(mat).symmetric_eigen();
  (eigen.eigenvalues.min(), eigen.eigenvalues.max())
}

/// Lower-triangular factor `L` with `L L^T = Σ`, stored row-wise with `row[i].len() == i + 1`.
#[derive(Clone, Debug)]
pub struct CholeskyFactor {
  rows: Vec<Vec<f64>>,
}

impl CholeskyFactor {
  /// Factor a covariance matrix.
  ///
  /// Strictly positive-definite inputs go through nalgebra. Semidefinite inputs
  /// (a zero pivot whose remaining column is also zero, e.g. a riskless asset)
  /// are factored exactly with zero columns. A negative diagonal entry or a
  /// negative pivot is reported as [`Error::NonPositiveDefinite`]; the matrix is
  /// never perturbed.
  pub fn new(cov: &[Vec<f64>]) -> Result<Self> {
    let n = cov.len();
    if n == 0 {
      return Err(Error::InvalidInput("covariance matrix is empty".into()));
    }
    validate_shape(cov, n)?;
    if let Some((i, v)) = negative_diagonal(cov) {
      return Err(Error::NonPositiveDefinite(format!(
        "diagonal entry {i} is negative ({v})"
      )));
    }
    validate_covariance(cov, n)?;

    if let Some(chol) = to_dmatrix(cov).cholesky() {
      let l = chol.l();
      let rows = (0..n)
        .map(|i| (0..=i).map(|j| l[(i, j)]).collect())
        .collect();
      return Ok(Self { rows });
    }

    Self::semidefinite(cov)
  }

  fn semidefinite(cov: &[Vec<f64>]) -> Result<Self> {
    let n = cov.len();
    let tol = PIVOT_TOLERANCE * diagonal_scale(cov).max(f64::MIN_POSITIVE);
    let mut rows: Vec<Vec<f64>> = (0..n).map(|i| vec![0.0; i + 1]).collect();

    for j in 0..n {
      let pivot = cov[j][j] - rows[j][..j].iter().map(|l| l * l).sum::<f64>();

      if pivot > tol {
        let d = pivot.sqrt();
        rows[j][j] = d;
        for i in (j + 1)..n {
          let acc = dot(&rows[i][..j], &rows[j][..j]);
          rows[i][j] = (cov[i][j] - acc) / d;
        }
      } else if pivot >= -tol {
        for i in (j + 1)..n {
          let residual = cov[i][j] - dot(&rows[i][..j], &rows[j][..j]);
          if residual.abs() > tol {
            return Err(Error::NonPositiveDefinite(format!(
              "zero pivot at {j} with non-zero coupling to asset {i}"
            )));
          }
        }
      } else {
        return Err(Error::NonPositiveDefinite(format!(
          "negative pivot {pivot} at {j}"
        )));
      }
    }

    Ok(Self { rows })
  }

  pub fn dim(&self) -> usize {
    self.rows.len()
  }

  /// `out = L z`.
  pub fn transform(&self, z: &[f64], out: &mut [f64]) {
    debug_assert_eq!(z.len(), self.dim());
    debug_assert_eq!(out.len(), self.dim());
    for (row, o) in self.rows.iter().zip(out.iter_mut()) {
      *o = dot(row, z);
    }
  }

  /// Dense copy of `L`.
  pub fn lower(&self) -> Vec<Vec<f64>> {
    let n = self.dim();
    self
      .rows
      .iter()
      .map(|row| {
        let mut full = row.clone();
        full.resize(n, 0.0);
        full
      })
      .collect()
  }
}
