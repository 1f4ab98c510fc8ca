//! # Budget Allocator
//!
//! $$
//! B_g = B\,\frac{T_g}{\sum_k T_k},\qquad \lambda_g = \frac{\rho_g}{\sqrt{h_g}}
//! $$
//!
//! Splits a total budget across goals in proportion to their targets and runs
//! the risk-adjusted optimizer once per goal with a horizon-adjusted risk
//! aversion. Optimizer failures stay local to their goal.

use std::collections::BTreeMap;
use std::fmt;

use impl_new_derive::ImplNew;
use tracing::debug;
use tracing::warn;

use crate::error::Error;
use crate::error::Result;
use crate::linalg::validate_covariance;
use crate::optimizer::Allocation;
use crate::optimizer::AllocationConstraints;
use crate::optimizer::OptimizerConfig;
use crate::optimizer::optimize_with_config;

/// A target amount to reach within a horizon, at a given risk tolerance.
#[derive(ImplNew, Clone, Copy, Debug, PartialEq)]
pub struct Goal {
  /// Amount to reach, in currency units.
  pub target_amount: f64,
  /// Whole years until the target date.
  pub horizon_years: u32,
  /// Base risk-aversion coefficient before the horizon adjustment.
  pub risk_tolerance: f64,
}

impl Goal {
  /// Target check; the budget split is undefined without a positive target.
  pub fn validate_target(&self) -> Result<()> {
    if !self.target_amount.is_finite() || self.target_amount <= 0.0 {
      return Err(Error::InvalidGoal(format!(
        "target amount must be positive, got {}",
        self.target_amount
      )));
    }
    Ok(())
  }

  /// Horizon and risk tolerance checks; these only affect the goal itself.
  pub fn validate_profile(&self) -> Result<()> {
    if self.horizon_years == 0 {
      return Err(Error::InvalidGoal("horizon must be at least one year".into()));
    }
    if !self.risk_tolerance.is_finite() || self.risk_tolerance <= 0.0 {
      return Err(Error::InvalidGoal(format!(
        "risk tolerance must be positive, got {}",
        self.risk_tolerance
      )));
    }
    Ok(())
  }

  /// Horizon-adjusted risk aversion; longer horizons tolerate more variance.
  pub fn risk_aversion(&self) -> f64 {
    self.risk_tolerance / (self.horizon_years as f64).sqrt()
  }
}

/// Position of a goal in the caller's list; displayed as `goal_1, goal_2, ...`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GoalId(usize);

impl GoalId {
  /// Id of the goal at zero-based `index`.
  pub fn from_index(index: usize) -> Self {
    Self(index)
  }

  pub fn index(&self) -> usize {
    self.0
  }
}

impl fmt::Display for GoalId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "goal_{}", self.0 + 1)
  }
}

/// A goal with its budget and optimized allocation.
#[derive(Clone, Debug, PartialEq)]
pub struct GoalAllocation {
  pub id: GoalId,
  pub goal: Goal,
  pub allocation: Allocation,
  pub budget: f64,
  pub target: f64,
}

/// Runtime configuration for [`BudgetAllocator`].
#[derive(Clone, Debug)]
pub struct AllocatorConfig {
  /// Per-asset floor applied to every goal.
  pub min_weight: f64,
  /// Per-asset cap applied to every goal.
  pub max_weight: f64,
  /// Replaces the uniform `[min_weight, max_weight]` band when set.
  pub constraints: Option<AllocationConstraints>,
  pub optimizer: OptimizerConfig,
}

impl Default for AllocatorConfig {
  fn default() -> Self {
    Self {
      min_weight: 0.05,
      max_weight: 0.60,
      constraints: None,
      optimizer: OptimizerConfig::default(),
    }
  }
}

impl AllocatorConfig {
  pub fn with_bounds(mut self, min_weight: f64, max_weight: f64) -> Self {
    self.min_weight = min_weight;
    self.max_weight = max_weight;
    self
  }

  pub fn with_constraints(mut self, constraints: AllocationConstraints) -> Self {
    self.constraints = Some(constraints);
    self
  }

  /// Constraints applied to a universe of `n` assets.
  pub fn constraints_for(&self, n: usize) -> AllocationConstraints {
    self
      .constraints
      .clone()
      .unwrap_or_else(|| AllocationConstraints::uniform(n, self.min_weight, self.max_weight))
  }
}

/// Per-goal outcome of an allocation run, in input order.
#[derive(Clone, Debug)]
pub struct AllocationPlan {
  entries: BTreeMap<GoalId, Result<GoalAllocation>>,
}

impl AllocationPlan {
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn get(&self, id: GoalId) -> Option<&Result<GoalAllocation>> {
    self.entries.get(&id)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&GoalId, &Result<GoalAllocation>)> {
    self.entries.iter()
  }

  /// Goals that were allocated successfully.
  pub fn allocations(&self) -> impl Iterator<Item = &GoalAllocation> {
    self.entries.values().filter_map(|r| r.as_ref().ok())
  }

  /// Goals whose optimization failed, with the reason.
  pub fn failures(&self) -> impl Iterator<Item = (GoalId, &Error)> {
    self
      .entries
      .iter()
      .filter_map(|(id, r)| r.as_ref().err().map(|e| (*id, e)))
  }

  pub fn is_complete(&self) -> bool {
    self.entries.values().all(|r| r.is_ok())
  }

  /// All-or-nothing view: the first failing goal becomes the error.
  pub fn into_complete(self) -> Result<BTreeMap<GoalId, GoalAllocation>> {
    self
      .entries
      .into_iter()
      .map(|(id, r)| match r {
        Ok(alloc) => Ok((id, alloc)),
        Err(err) => Err(Error::Goal {
          goal: id.to_string(),
          source: Box::new(err),
        }),
      })
      .collect()
  }
}

impl IntoIterator for AllocationPlan {
  type Item = (GoalId, Result<GoalAllocation>);
  type IntoIter = std::collections::btree_map::IntoIter<GoalId, Result<GoalAllocation>>;

  fn into_iter(self) -> Self::IntoIter {
    self.entries.into_iter()
  }
}

/// Validate targets and split `total_budget` in proportion to them.
pub fn budget_shares(goals: &[Goal], total_budget: f64) -> Result<Vec<f64>> {
  if goals.is_empty() {
    return Err(Error::InvalidGoal("no goals to allocate".into()));
  }
  if !total_budget.is_finite() || total_budget <= 0.0 {
    return Err(Error::InvalidInput(format!(
      "total budget must be positive, got {total_budget}"
    )));
  }

  let total_target: f64 = goals.iter().map(|g| g.target_amount).sum();
  if !total_target.is_finite() || total_target <= 0.0 {
    return Err(Error::InvalidGoal(format!(
      "target amounts sum to {total_target}"
    )));
  }

  for (i, goal) in goals.iter().enumerate() {
    goal.validate_target().map_err(|err| Error::Goal {
      goal: GoalId::from_index(i).to_string(),
      source: Box::new(err),
    })?;
  }

  Ok(
    goals
      .iter()
      .map(|g| total_budget * (g.target_amount / total_target))
      .collect(),
  )
}

/// Goal-based allocator over a fixed asset universe.
#[derive(Clone, Debug, Default)]
pub struct BudgetAllocator {
  config: AllocatorConfig,
}

impl BudgetAllocator {
  pub fn new(config: AllocatorConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &AllocatorConfig {
    &self.config
  }

  /// Allocate every goal.
  ///
  /// Fails as a whole only when the budget split itself is undefined (no goals,
  /// a non-positive target, a non-positive budget) or the market inputs are
  /// malformed. A bad horizon or risk tolerance and any optimizer failure are
  /// recorded against their goal and the remaining goals are still attempted.
  pub fn allocate(
    &self,
    goals: &[Goal],
    mu: &[f64],
    cov: &[Vec<f64>],
    total_budget: f64,
  ) -> Result<AllocationPlan> {
    let n = mu.len();
    if n == 0 {
      return Err(Error::InvalidInput(
        "expected returns must not be empty".into(),
      ));
    }
    validate_covariance(cov, n)?;

    let budgets = budget_shares(goals, total_budget)?;
    let constraints = self.config.constraints_for(n);

    let entries = goals
      .iter()
      .zip(budgets)
      .enumerate()
      .map(|(i, (goal, budget))| {
        let id = GoalId::from_index(i);
        if let Err(err) = goal.validate_profile() {
          warn!(goal = %id, error = %err, "goal rejected");
          return (id, Err(err));
        }

        let risk_aversion = goal.risk_aversion();
        debug!(goal = %id, budget, risk_aversion, "allocating goal");

        let result = optimize_with_config(
          mu,
          cov,
          risk_aversion,
          Some(&constraints),
          &self.config.optimizer,
        )
        .map(|allocation| GoalAllocation {
          id,
          goal: *goal,
          allocation,
          budget,
          target: goal.target_amount,
        });

        if let Err(err) = &result {
          warn!(goal = %id, error = %err, "goal optimization failed");
        }

        (id, result)
      })
      .collect();

    Ok(AllocationPlan { entries })
  }
}

/// Allocate with the default `[0.05, 0.60]` band.
pub fn allocate(
  goals: &[Goal],
  mu: &[f64],
  cov: &[Vec<f64>],
  total_budget: f64,
) -> Result<AllocationPlan> {
  BudgetAllocator::default().allocate(goals, mu, cov, total_budget)
}
