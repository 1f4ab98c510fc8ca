use goalfolio::AssetUniverse;
use goalfolio::Goal;
use goalfolio::GoalPlanner;
use goalfolio::PlanReport;
use goalfolio::PlannerConfig;
use goalfolio::SimulationConfig;
use prettytable::Cell;
use prettytable::Table;
use prettytable::row;
use tracing_subscriber::EnvFilter;

const TOTAL_BUDGET: f64 = 100_000.0;

fn synthetic_universe() -> goalfolio::Result<AssetUniverse> {
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
}

fn print_report(
  title: &str,
  universe: &AssetUniverse,
  report: &PlanReport,
) -> anyhow::Result<()> {
  println!("\n{title} (seed {})", report.seed());

  let mut table = Table::new();
  let mut titles = row!["goal", "budget", "target", "E[r]", "vol", "median", "P(success)"];
  for name in universe.names() {
    titles.add_cell(Cell::new(name));
  }
  table.set_titles(titles);

  for (id, entry) in report.iter() {
    match entry {
      Ok(outcome) => {
        let summary = outcome.simulation.summary()?;
        let alloc = &outcome.allocation;
        let mut r = row![
          id,
          format!("{:.2}", alloc.budget),
          format!("{:.2}", alloc.target),
          format!("{:.2}%", alloc.allocation.expected_return * 100.0),
          format!("{:.2}%", alloc.allocation.volatility * 100.0),
          format!("{:.2}", summary.median),
          format!("{:.2}%", outcome.success_probability * 100.0)
        ];
        for w in &alloc.allocation.weights {
          r.add_cell(Cell::new(&format!("{:.2}%", w * 100.0)));
        }
        table.add_row(r);
      }
      Err(err) => {
        table.add_row(row![id, format!("failed: {err}")]);
      }
    }
  }

  table.printstd();
  Ok(())
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let universe = synthetic_universe()?;
  let goals = [
    Goal::new(50_000.0, 5, 0.2),
    Goal::new(100_000.0, 10, 0.1),
    Goal::new(200_000.0, 20, 0.05),
  ];

  let planner = GoalPlanner::new(PlannerConfig {
    simulation: SimulationConfig::default()
      .with_num_simulations(2_000)
      .with_seed(42),
    ..PlannerConfig::default()
  });

  let optimized = planner.plan(&goals, &universe, TOTAL_BUDGET)?;
  print_report("Optimized allocation", &universe, &optimized)?;

  let baseline = planner.baseline(&goals, &universe, TOTAL_BUDGET)?;
  print_report("Equal-split baseline", &universe, &baseline)?;

  Ok(())
}
