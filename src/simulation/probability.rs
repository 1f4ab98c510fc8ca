//! # Success Probability
//!
//! $$
//! \hat p = \frac{1}{M}\sum_{k=1}^{M} \mathbf{1}\{V_T^{(k)} \ge T\}
//! $$
//!

use crate::error::Error;
use crate::error::Result;

/// Fraction of final values at or above `target_amount`.
pub fn success_probability<'a, I>(final_values: I, target_amount: f64) -> Result<f64>
where
  I: IntoIterator<Item = &'a f64>,
{
  if target_amount.is_nan() {
    return Err(Error::InvalidInput("target amount is NaN".into()));
  }

  let mut total = 0usize;
  let mut hits = 0usize;
  for v in final_values {
    if v.is_nan() {
      return Err(Error::InvalidInput("final values contain NaN".into()));
    }
    total += 1;
    if *v >= target_amount {
      hits += 1;
    }
  }

  if total == 0 {
    return Err(Error::EmptyInput);
  }

  Ok(hits as f64 / total as f64)
}
