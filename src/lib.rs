//! # goalfolio
//!
//! $$
//! \max_{\mathbf w \in \Delta_{[\ell, u]}}\ \boldsymbol\mu^\top\mathbf w - \lambda\,\mathbf w^\top\Sigma\mathbf w
//! $$
//!
//! Goal-based portfolio allocation. A total budget is split across financial
//! goals in proportion to their targets, each goal gets a long-only
//! mean-variance portfolio with a horizon-adjusted risk aversion, and a
//! correlated Monte Carlo simulation estimates the probability of reaching
//! every target.
//!
//! - [`optimizer`]: risk-adjusted quadratic program over the bounded simplex
//! - [`allocator`]: budget split and per-goal optimization
//! - [`simulation`]: daily correlated paths and the success estimator
//! - [`planner`]: allocate, simulate and score in one call

pub mod allocator;
pub mod error;
pub mod linalg;
pub mod optimizer;
pub mod planner;
pub mod simulation;
pub mod universe;

pub use allocator::AllocationPlan;
pub use allocator::AllocatorConfig;
pub use allocator::BudgetAllocator;
pub use allocator::Goal;
pub use allocator::GoalAllocation;
pub use allocator::GoalId;
pub use allocator::allocate;
pub use error::Error;
pub use error::Result;
pub use optimizer::Allocation;
pub use optimizer::AllocationConstraints;
pub use optimizer::OptimizerConfig;
pub use optimizer::optimize;
pub use planner::GoalOutcome;
pub use planner::GoalPlanner;
pub use planner::PlanReport;
pub use planner::PlannerConfig;
pub use simulation::ShockScale;
pub use simulation::SimulationConfig;
pub use simulation::SimulationResult;
pub use simulation::simulate;
pub use simulation::success_probability;
pub use universe::AssetUniverse;
