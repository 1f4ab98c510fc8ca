//! # Capped Simplex Projection
//!
//! $$
//! P(\mathbf{v}) = \arg\min_{\mathbf{l} \le \mathbf{w} \le \mathbf{u},\ \mathbf{1}^\top\mathbf{w} = 1} \|\mathbf{w}-\mathbf{v}\|_2
//! $$
//!
//! The solution is `w_i = clamp(v_i - θ, l_i, u_i)` for the unique shift `θ`
//! that restores unit mass. The mass is piecewise linear in `θ` with kinks at
//! `v_i - u_i` and `v_i - l_i`, so `θ` is found exactly by scanning the sorted
//! kinks and interpolating inside the bracketing segment.

use crate::error::Error;
use crate::error::Result;
use crate::optimizer::types::AllocationConstraints;

/// Slack accepted when checking `sum(l) <= 1 <= sum(u)`.
const FEASIBILITY_SLACK: f64 = 1e-12;

/// Feasible set `{ w : l <= w <= u, sum(w) = 1 }` with `0 <= l` and `u <= 1`.
#[derive(Clone, Debug)]
pub struct BoxSimplex {
  lower: Vec<f64>,
  upper: Vec<f64>,
}

impl BoxSimplex {
  /// Resolve optional constraints for `n` assets into a non-empty feasible set.
  pub fn new(n: usize, constraints: Option<&AllocationConstraints>) -> Result<Self> {
    let resolve = |bounds: Option<&Vec<f64>>, default: f64, label: &str| -> Result<Vec<f64>> {
      match bounds {
        None => Ok(vec![default; n]),
        Some(b) if b.len() != n => Err(Error::InvalidInput(format!(
          "{} {label} weights for {n} assets",
          b.len()
        ))),
        Some(b) if b.iter().any(|x| x.is_nan()) => {
          Err(Error::InvalidInput(format!("{label} weights contain NaN")))
        }
        Some(b) => Ok(b.clone()),
      }
    };

    let constraints = constraints.cloned().unwrap_or_default();
    let lower: Vec<f64> = resolve(constraints.min_weights.as_ref(), 0.0, "min")?
      .into_iter()
      .map(|l| l.max(0.0))
      .collect();
    let upper: Vec<f64> = resolve(constraints.max_weights.as_ref(), 1.0, "max")?
      .into_iter()
      .map(|u| u.min(1.0))
      .collect();

    if let Some(i) = (0..n).find(|&i| lower[i] > upper[i]) {
      return Err(Error::Optimization(format!(
        "infeasible bounds for asset {i}: min {} exceeds max {}",
        lower[i], upper[i]
      )));
    }

    let lower_mass: f64 = lower.iter().sum();
    let upper_mass: f64 = upper.iter().sum();
    if lower_mass > 1.0 + FEASIBILITY_SLACK {
      return Err(Error::Optimization(format!(
        "infeasible bounds: minimum weights sum to {lower_mass} > 1"
      )));
    }
    if upper_mass < 1.0 - FEASIBILITY_SLACK {
      return Err(Error::Optimization(format!(
        "infeasible bounds: maximum weights sum to {upper_mass} < 1"
      )));
    }

    Ok(Self { lower, upper })
  }

  pub fn lower(&self) -> &[f64] {
    &self.lower
  }

  pub fn upper(&self) -> &[f64] {
    &self.upper
  }

  fn mass(&self, v: &[f64], theta: f64) -> f64 {
    v.iter()
      .zip(self.lower.iter().zip(self.upper.iter()))
      .map(|(x, (l, u))| (x - theta).clamp(*l, *u))
      .sum()
  }

  /// Euclidean projection of `v` onto the feasible set.
  pub fn project(&self, v: &[f64]) -> Vec<f64> {
    debug_assert_eq!(v.len(), self.lower.len());

    let mut kinks: Vec<f64> = v
      .iter()
      .zip(self.lower.iter().zip(self.upper.iter()))
      .flat_map(|(x, (l, u))| [x - u, x - l])
      .collect();
    kinks.sort_by(|a, b| a.total_cmp(b));
    kinks.dedup();

    // mass(kinks[0]) = sum(u) >= 1 and mass(last) = sum(l) <= 1.
    let mut theta = kinks[kinks.len() - 1];
    let mut prev = (kinks[0], self.mass(v, kinks[0]));
    if prev.1 <= 1.0 {
      theta = prev.0;
    } else {
      for &k in &kinks[1..] {
        let m = self.mass(v, k);
        if m <= 1.0 {
          let drop = prev.1 - m;
          theta = if drop > 0.0 {
            prev.0 + (prev.1 - 1.0) / drop * (k - prev.0)
          } else {
            k
          };
          break;
        }
        prev = (k, m);
      }
    }

    v.iter()
      .zip(self.lower.iter().zip(self.upper.iter()))
      .map(|(x, (l, u))| (x - theta).clamp(*l, *u))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn assert_feasible(w: &[f64], set: &BoxSimplex) {
    assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    for (i, x) in w.iter().enumerate() {
      assert!(*x >= set.lower()[i] - 1e-15 && *x <= set.upper()[i] + 1e-15);
    }
  }

  #[test]
  fn plain_simplex_projection() {
    let set = BoxSimplex::new(3, None).unwrap();
    let w = set.project(&[0.5, 0.5, 0.5]);
    for x in &w {
      assert_abs_diff_eq!(*x, 1.0 / 3.0, epsilon = 1e-15);
    }

    let w = set.project(&[2.0, 0.0, 0.0]);
    assert_eq!(w, vec![1.0, 0.0, 0.0]);
  }

  #[test]
  fn projection_respects_caps() {
    let set = BoxSimplex::new(4, Some(&AllocationConstraints::uniform(4, 0.05, 0.6))).unwrap();
    let w = set.project(&[10.0, -3.0, 0.2, 0.1]);
    assert_feasible(&w, &set);
    assert_abs_diff_eq!(w[0], 0.6, epsilon = 1e-15);
    assert_abs_diff_eq!(w[1], 0.05, epsilon = 1e-15);
  }

  #[test]
  fn feasible_point_is_fixed() {
    let set = BoxSimplex::new(3, Some(&AllocationConstraints::uniform(3, 0.1, 0.7))).unwrap();
    let v = [0.2, 0.3, 0.5];
    let w = set.project(&v);
    for (a, b) in w.iter().zip(v.iter()) {
      assert_abs_diff_eq!(*a, *b, epsilon = 1e-15);
    }
  }

  #[test]
  fn tight_bounds_pin_the_solution() {
    let constraints = AllocationConstraints::new(Some(vec![0.5, 0.5]), Some(vec![0.5, 0.5]));
    let set = BoxSimplex::new(2, Some(&constraints)).unwrap();
    assert_eq!(set.project(&[3.0, -1.0]), vec![0.5, 0.5]);
  }

  #[test]
  fn infeasible_bounds_are_rejected() {
    let too_tight = AllocationConstraints::uniform(2, 0.0, 0.4);
    assert!(matches!(
      BoxSimplex::new(2, Some(&too_tight)),
      Err(Error::Optimization(_))
    ));

    let too_loose = AllocationConstraints::uniform(25, 0.05, 0.6);
    assert!(matches!(
      BoxSimplex::new(25, Some(&too_loose)),
      Err(Error::Optimization(_))
    ));

    let crossed = AllocationConstraints::new(Some(vec![0.6, 0.0]), Some(vec![0.4, 1.0]));
    assert!(matches!(
      BoxSimplex::new(2, Some(&crossed)),
      Err(Error::Optimization(_))
    ));
  }

  #[test]
  fn bound_length_mismatch_is_invalid_input() {
    let constraints = AllocationConstraints::new(Some(vec![0.1]), None);
    assert!(matches!(
      BoxSimplex::new(3, Some(&constraints)),
      Err(Error::InvalidInput(_))
    ));
  }
}
