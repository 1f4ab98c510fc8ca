//! # Error
//!
//! $$
//! \text{fail fast: } f(\text{inputs}) \in \{\text{value}\} \cup \{\text{explicit error}\}
//! $$
//!
//! Error taxonomy shared by the optimizer, the allocator and the simulator.

use thiserror::Error;

/// Errors raised by the allocation and simulation engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
  /// The quadratic program has no provably optimal feasible point.
  #[error("optimization failed: {0}")]
  Optimization(String),
  /// The covariance matrix cannot be factored as `L L^T`.
  #[error("covariance matrix is not positive definite: {0}")]
  NonPositiveDefinite(String),
  /// The success estimator received no simulated values.
  #[error("cannot estimate a probability from an empty set of final values")]
  EmptyInput,
  /// A goal (or the goal list) cannot be allocated.
  #[error("invalid goal: {0}")]
  InvalidGoal(String),
  /// Malformed numeric input: shape mismatch, non-finite value, bad budget.
  #[error("invalid input: {0}")]
  InvalidInput(String),
  /// The simulation ran past its configured wall-clock deadline.
  #[error("simulation deadline exceeded after {completed} of {requested} trials")]
  DeadlineExceeded { completed: usize, requested: usize },
  /// A failure attributed to one goal of a multi-goal call.
  #[error("{goal}: {source}")]
  Goal { goal: String, source: Box<Error> },
}

pub type Result<T> = std::result::Result<T, Error>;
