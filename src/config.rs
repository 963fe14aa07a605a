use crate::algorithm::DEFAULT_HORIZON;
use crate::solver::SolverKind;

use anyhow::{ensure, Context};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug, Default)]
#[command(
    name = "mapf-warehouse",
    about = "Windowed multi-agent path planning for warehouse layouts.",
    version = "0.1.0"
)]
pub struct Cli {
    #[arg(long, help = "Path to a YAML config file")]
    pub config: Option<String>,

    #[arg(long, help = "Path to the warehouse layout file")]
    pub map_path: Option<String>,

    #[arg(long, help = "Path to the report file (.yaml, .yml or .json)")]
    pub output_path: Option<String>,

    #[arg(long, help = "Path to a YAML file with agent start positions")]
    pub agents_path: Option<String>,

    #[arg(long, help = "Number of agents")]
    pub num_agents: Option<usize>,

    #[arg(long, help = "Number of pickup/drop-off assignments")]
    pub num_assignments: Option<usize>,

    #[arg(long, help = "Timesteps committed per planning iteration")]
    pub window: Option<usize>,

    #[arg(long, help = "Timestep limit of the single-agent search")]
    pub search_horizon: Option<usize>,

    #[arg(long, value_enum, help = "Conflict resolver")]
    pub solver: Option<SolverKind>,

    #[arg(long, help = "Ticks an agent stays on a reached waypoint")]
    pub dwell_time: Option<usize>,

    #[arg(long, help = "Seed for the random number generator")]
    pub seed: Option<u64>,

    #[arg(long, help = "Candidate layouts per generation (0 runs once)")]
    pub layouts: Option<usize>,

    #[arg(long, help = "Generations of layout evolution")]
    pub generations: Option<usize>,

    #[arg(long, help = "Mutation and crossover probability of the layout evolution")]
    pub entropy: Option<f64>,

    #[arg(long, help = "Runs per candidate layout")]
    pub replicates: Option<usize>,

    #[arg(long, help = "Share of induct checkpoints each candidate layout keeps")]
    pub checkpoints_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub map_path: String,
    pub output_path: String,
    pub agents_path: Option<String>,
    pub num_agents: usize,
    pub num_assignments: usize,
    pub window: usize,
    pub search_horizon: usize,
    pub solver: SolverKind,
    pub dwell_time: usize,
    pub seed: u64,
    pub layouts: usize,
    pub generations: usize,
    pub entropy: f64,
    pub replicates: usize,
    pub checkpoints_ratio: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            map_path: "map_file/test/warehouse.csv".to_string(),
            output_path: "result/report.yaml".to_string(),
            agents_path: None,
            num_agents: 10,
            num_assignments: 100,
            window: 30,
            search_horizon: DEFAULT_HORIZON,
            solver: SolverKind::Pbs,
            dwell_time: 1,
            seed: 42,
            layouts: 0,
            generations: 1,
            entropy: 0.3,
            replicates: 3,
            checkpoints_ratio: 0.2,
        }
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// `cli.config` if given, defaults otherwise, then every flag set on the
    /// command line.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let config = match cli.config.as_ref() {
            Some(config_file) => {
                let config_str = std::fs::read_to_string(config_file)
                    .with_context(|| format!("failed to read config file {config_file}"))?;
                Config::from_yaml_str(&config_str)
                    .with_context(|| format!("error with config file: {config_file}"))?
            }
            None => Config::default(),
        };
        config.override_from_command_line(cli)
    }

    pub fn override_from_command_line(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(map_path) = &cli.map_path {
            self.map_path = map_path.clone();
        }
        if let Some(output_path) = &cli.output_path {
            self.output_path = output_path.clone();
        }
        if let Some(agents_path) = &cli.agents_path {
            self.agents_path = Some(agents_path.clone());
        }
        if let Some(num_agents) = cli.num_agents {
            self.num_agents = num_agents;
        }
        if let Some(num_assignments) = cli.num_assignments {
            self.num_assignments = num_assignments;
        }
        if let Some(window) = cli.window {
            self.window = window;
        }
        if let Some(search_horizon) = cli.search_horizon {
            self.search_horizon = search_horizon;
        }
        if let Some(solver) = cli.solver {
            self.solver = solver;
        }
        if let Some(dwell_time) = cli.dwell_time {
            self.dwell_time = dwell_time;
        }
        if let Some(seed) = cli.seed {
            self.seed = seed;
        }
        if let Some(layouts) = cli.layouts {
            self.layouts = layouts;
        }
        if let Some(generations) = cli.generations {
            self.generations = generations;
        }
        if let Some(entropy) = cli.entropy {
            self.entropy = entropy;
        }
        if let Some(replicates) = cli.replicates {
            self.replicates = replicates;
        }
        if let Some(checkpoints_ratio) = cli.checkpoints_ratio {
            self.checkpoints_ratio = checkpoints_ratio;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.num_agents > 0, "need at least one agent");
        ensure!(self.window > 0, "window must be positive, got {}", self.window);
        ensure!(
            self.search_horizon > 0,
            "search horizon must be positive, got {}",
            self.search_horizon
        );
        if self.layouts > 0 {
            ensure!(self.replicates > 0, "need at least one replicate per layout");
            ensure!(self.generations > 0, "need at least one generation");
            ensure!(
                (0.0..=1.0).contains(&self.entropy),
                "entropy must be in [0, 1], got {}",
                self.entropy
            );
            ensure!(
                self.checkpoints_ratio > 0.0 && self.checkpoints_ratio <= 1.0,
                "checkpoints ratio must be in (0, 1], got {}",
                self.checkpoints_ratio
            );
        }
        Ok(())
    }
}
