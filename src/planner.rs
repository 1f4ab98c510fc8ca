//! # Goal Planner
//!
//! $$
//! \hat p_g = \mathbb P\big(V_{h_g}^{(g)} \ge T_g\big),\qquad V_0^{(g)} = B_g,\ \mathbf w = \mathbf w_g^\star
//! $$
//!
//! End-to-end pipeline: allocate every goal, simulate its optimized portfolio
//! from its budget over its horizon, and estimate the probability of reaching
//! its target.

use std::collections::BTreeMap;

use rand::Rng;
use rayon::prelude::*;
use tracing::info;
use tracing::warn;

use crate::allocator::AllocatorConfig;
use crate::allocator::BudgetAllocator;
use crate::allocator::Goal;
use crate::allocator::GoalAllocation;
use crate::allocator::GoalId;
use crate::allocator::budget_shares;
use crate::error::Error;
use crate::error::Result;
use crate::optimizer::Allocation;
use crate::simulation::SimulationConfig;
use crate::simulation::SimulationResult;
use crate::simulation::simulate;
use crate::simulation::stream_seed;
use crate::universe::AssetUniverse;

#[derive(Clone, Debug, Default)]
pub struct PlannerConfig {
  pub allocator: AllocatorConfig,
  pub simulation: SimulationConfig,
}

/// A goal's allocation together with its simulated outcome.
#[derive(Clone, Debug)]
pub struct GoalOutcome {
  pub id: GoalId,
  pub allocation: GoalAllocation,
  pub simulation: SimulationResult,
  pub success_probability: f64,
}

/// Per-goal outcomes of a planning run, in input order.
#[derive(Clone, Debug)]
pub struct PlanReport {
  seed: u64,
  entries: BTreeMap<GoalId, Result<GoalOutcome>>,
}

impl PlanReport {
  /// Base seed the per-goal simulation seeds were derived from.
  pub fn seed(&self) -> u64 {
    self.seed
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn get(&self, id: GoalId) -> Option<&Result<GoalOutcome>> {
    self.entries.get(&id)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&GoalId, &Result<GoalOutcome>)> {
    self.entries.iter()
  }

  pub fn outcomes(&self) -> impl Iterator<Item = &GoalOutcome> {
    self.entries.values().filter_map(|r| r.as_ref().ok())
  }

  pub fn failures(&self) -> impl Iterator<Item = (GoalId, &Error)> {
    self
      .entries
      .iter()
      .filter_map(|(id, r)| r.as_ref().err().map(|e| (*id, e)))
  }

  pub fn is_complete(&self) -> bool {
    self.entries.values().all(|r| r.is_ok())
  }

  /// Success probability per goal; `None` for goals that failed.
  pub fn probabilities(&self) -> BTreeMap<GoalId, Option<f64>> {
    self
      .entries
      .iter()
      .map(|(id, r)| (*id, r.as_ref().ok().map(|o| o.success_probability)))
      .collect()
  }
}

#[derive(Clone, Debug, Default)]
pub struct GoalPlanner {
  config: PlannerConfig,
}

impl GoalPlanner {
  pub fn new(config: PlannerConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &PlannerConfig {
    &self.config
  }

  /// Allocate, simulate and score every goal.
  ///
  /// Goals whose optimization or simulation fails are reported individually;
  /// the call fails as a whole only when the budget split is undefined.
  pub fn plan(
    &self,
    goals: &[Goal],
    universe: &AssetUniverse,
    total_budget: f64,
  ) -> Result<PlanReport> {
    let plan = BudgetAllocator::new(self.config.allocator.clone()).allocate(
      goals,
      universe.expected_returns(),
      universe.covariance(),
      total_budget,
    )?;

    let seed = self.base_seed();
    let entries = plan
      .into_iter()
      .collect::<Vec<_>>()
      .into_par_iter()
      .map(|(id, allocated)| {
        let outcome = allocated.and_then(|ga| self.score(universe, ga, seed));
        (id, outcome)
      })
      .collect();

    Ok(PlanReport { seed, entries })
  }

  /// Naive estimate: `total_budget / goal_count` per goal, equal asset weights.
  pub fn baseline(
    &self,
    goals: &[Goal],
    universe: &AssetUniverse,
    total_budget: f64,
  ) -> Result<PlanReport> {
    // validates the goal list and budget the same way `plan` does
    budget_shares(goals, total_budget)?;

    let budget = total_budget / goals.len() as f64;
    let seed = self.base_seed();
    let entries = goals
      .par_iter()
      .enumerate()
      .map(|(i, goal)| {
        let id = GoalId::from_index(i);
        let ga = GoalAllocation {
          id,
          goal: *goal,
          allocation: Allocation::from_weights(
            universe.expected_returns(),
            universe.covariance(),
            universe.equal_weights(),
          ),
          budget,
          target: goal.target_amount,
        };
        let outcome = goal
          .validate_profile()
          .and_then(|()| self.score(universe, ga, seed));
        (id, outcome)
      })
      .collect();

    Ok(PlanReport { seed, entries })
  }

  fn base_seed(&self) -> u64 {
    self
      .config
      .simulation
      .seed
      .unwrap_or_else(|| rand::thread_rng().gen())
  }

  fn score(
    &self,
    universe: &AssetUniverse,
    allocation: GoalAllocation,
    seed: u64,
  ) -> Result<GoalOutcome> {
    let id = allocation.id;
    let config = self
      .config
      .simulation
      .clone()
      .with_seed(stream_seed(seed, id.index()));

    let outcome = simulate(
      universe.expected_returns(),
      universe.covariance(),
      allocation.budget,
      allocation.goal.horizon_years,
      Some(allocation.allocation.weights.as_slice()),
      &config,
    )
    .and_then(|simulation| {
      let success_probability = simulation.success_probability(allocation.target)?;
      Ok((simulation, success_probability))
    });

    match outcome {
      Ok((simulation, success_probability)) => {
        info!(
          goal = %id,
          budget = allocation.budget,
          target = allocation.target,
          success_probability,
          "goal simulated"
        );
        Ok(GoalOutcome {
          id,
          allocation,
          simulation,
          success_probability,
        })
      }
      Err(err) => {
        warn!(goal = %id, error = %err, "goal simulation failed");
        Err(err)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use crate::simulation::ShockScale;
  use super::*;

  fn universe() -> AssetUniverse {
    AssetUniverse::from_volatilities(
      ["A", "B", "C", "D"].map(String::from).to_vec(),
      vec![0.07, 0.03, 0.02, 0.09],
      &[0.15, 0.08, 0.12, 0.20],
      &[
        vec![1.0, 0.2, 0.1, 0.3],
        vec![0.2, 1.0, 0.05, 0.1],
        vec![0.1, 0.05, 1.0, 0.15],
        vec![0.3, 0.1, 0.15, 1.0],
      ],
    )
    .unwrap()
  }

  fn goals() -> Vec<Goal> {
    vec![
      Goal::new(50_000.0, 5, 0.2),
      Goal::new(100_000.0, 10, 0.1),
      Goal::new(200_000.0, 20, 0.05),
    ]
  }

  fn planner(seed: u64) -> GoalPlanner {
    GoalPlanner::new(PlannerConfig {
      simulation: SimulationConfig::default()
        .with_num_simulations(200)
        .with_seed(seed)
        .with_shock_scale(ShockScale::PerStep),
      ..PlannerConfig::default()
    })
  }

  #[test]
  fn plan_scores_every_goal() {
    let report = planner(42).plan(&goals(), &universe(), 100_000.0).unwrap();
    assert_eq!(report.len(), 3);
    assert!(report.is_complete());

    let budgets: f64 = report.outcomes().map(|o| o.allocation.budget).sum();
    assert_abs_diff_eq!(budgets, 100_000.0, epsilon = 1e-6);
    for outcome in report.outcomes() {
      assert!((0.0..=1.0).contains(&outcome.success_probability));
      assert_eq!(outcome.simulation.len(), 200);
      assert_eq!(
        outcome.simulation.horizon_years(),
        outcome.allocation.goal.horizon_years
      );
      assert_eq!(outcome.simulation.initial_investment(), outcome.allocation.budget);
    }
  }

  #[test]
  fn plan_is_reproducible_with_a_seed() {
    let a = planner(7).plan(&goals(), &universe(), 100_000.0).unwrap();
    let b = planner(7).plan(&goals(), &universe(), 100_000.0).unwrap();
    assert_eq!(a.probabilities(), b.probabilities());
    for (x, y) in a.outcomes().zip(b.outcomes()) {
      assert_eq!(x.simulation, y.simulation);
    }
  }

  #[test]
  fn goals_get_distinct_streams() {
    let report = planner(3).plan(&goals(), &universe(), 100_000.0).unwrap();
    let seeds: Vec<u64> = report.outcomes().map(|o| o.simulation.seed()).collect();
    assert_ne!(seeds[0], seeds[1]);
    assert_ne!(seeds[1], seeds[2]);
  }

  #[test]
  fn baseline_splits_budget_equally_with_equal_weights() {
    let report = planner(1).baseline(&goals(), &universe(), 90_000.0).unwrap();
    assert!(report.is_complete());
    for outcome in report.outcomes() {
      assert_abs_diff_eq!(outcome.allocation.budget, 30_000.0, epsilon = 1e-9);
      for w in &outcome.allocation.allocation.weights {
        assert_abs_diff_eq!(*w, 0.25, epsilon = 1e-15);
      }
    }
  }

  #[test]
  fn unreachable_target_has_zero_probability() {
    let goals = vec![Goal::new(1e12, 1, 0.5), Goal::new(1.0, 1, 0.5)];
    let report = planner(9).plan(&goals, &universe(), 1_000.0).unwrap();
    let probs = report.probabilities();
    assert_eq!(probs[&GoalId::from_index(0)], Some(0.0));
  }

  #[test]
  fn optimizer_failures_are_reported_per_goal() {
    let config = PlannerConfig {
      allocator: AllocatorConfig::default().with_bounds(0.3, 0.6),
      simulation: SimulationConfig::default()
        .with_num_simulations(10)
        .with_seed(1),
    };
    let report = GoalPlanner::new(config)
      .plan(&goals(), &universe(), 100_000.0)
      .unwrap();
    assert_eq!(report.failures().count(), 3);
    assert!(report
      .failures()
      .all(|(_, e)| matches!(e, Error::Optimization(_))));
  }

  #[test]
  fn bad_horizon_is_reported_per_goal() {
    let goals = vec![Goal::new(50_000.0, 5, 0.2), Goal::new(50_000.0, 0, 0.2)];
    for report in [
      planner(4).plan(&goals, &universe(), 100_000.0).unwrap(),
      planner(4).baseline(&goals, &universe(), 100_000.0).unwrap(),
    ] {
      assert!(matches!(
        report.get(GoalId::from_index(0)),
        Some(Ok(_))
      ));
      assert!(matches!(
        report.get(GoalId::from_index(1)),
        Some(Err(Error::InvalidGoal(_)))
      ));
    }
  }

  #[test]
  fn empty_goal_list_fails_the_call() {
    assert!(matches!(
      planner(1).plan(&[], &universe(), 1.0),
      Err(Error::InvalidGoal(_))
    ));
    assert!(matches!(
      planner(1).baseline(&[], &universe(), 1.0),
      Err(Error::InvalidGoal(_))
    ));
  }
}
