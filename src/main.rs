use mapf_warehouse::common::Fleet;
use mapf_warehouse::config::{Cli, Config};
use mapf_warehouse::evaluate::{evaluate_layouts, EvaluationSettings};
use mapf_warehouse::map::Map;
use mapf_warehouse::scenario::{load_agents, write_report, Report};
use mapf_warehouse::task::TaskAssigner;
use mapf_warehouse::window::{run_windowed, WindowSettings};

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    if cli.config.is_none() {
        info!("No config file specified, using default config");
    }
    let config = Config::load(&cli)?;

    let map = Map::from_file(&config.map_path)
        .context("Error loading map")?
        .with_dwell_time(config.dwell_time);
    let settings = WindowSettings::new(config.window, config.search_horizon, config.solver)?;

    if config.layouts > 0 {
        let evaluation = EvaluationSettings {
            candidates: config.layouts,
            generations: config.generations,
            entropy: config.entropy,
            replicates: config.replicates,
            checkpoints_ratio: config.checkpoints_ratio,
            num_agents: config.num_agents,
            num_assignments: config.num_assignments,
            window: settings,
            seed: config.seed,
        };
        let best = evaluate_layouts(&map, &evaluation).await?;
        return write_report(
            &config.output_path,
            &Report {
                config: &config,
                run: None,
                best_layout: best.as_ref(),
            },
        );
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut source = TaskAssigner::for_map(&map, config.num_assignments, &mut rng)?;
    let fleet = match &config.agents_path {
        Some(path) => Fleet::new(load_agents(path, &map)?),
        None => Fleet::random(&map, config.num_agents, &mut rng)?,
    };

    let outcome = match run_windowed(&map, fleet, &mut source, &settings, &mut rng) {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("planning failed: {err}");
            return Err(err.into());
        }
    };
    outcome.stats.print();
    info!(
        "{} assignments in {} iterations, cost {}, throughput {:.3}",
        outcome.assignments, outcome.iterations, outcome.cost, outcome.throughput
    );

    write_report(
        &config.output_path,
        &Report {
            config: &config,
            run: Some(&outcome),
            best_layout: None,
        },
    )
}
