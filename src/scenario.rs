use crate::common::{Agent, Position};
use crate::config::Config;
use crate::evaluate::BestLayout;
use crate::map::Map;
use crate::window::RunOutcome;

use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentYaml {
    pub start: [usize; 2],
    #[serde(default)]
    pub waypoints: Vec<[usize; 2]>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub agents: Vec<AgentYaml>,
}

impl Scenario {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let scenario = serde_yaml::from_str(yaml)?;
        Ok(scenario)
    }

    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open scenario {path}"))?;
        let scenario = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("invalid scenario {path}"))?;
        Ok(scenario)
    }

    /// Agents numbered in file order; every start and waypoint must be free.
    pub fn to_agents(&self, map: &Map) -> anyhow::Result<Vec<Agent>> {
        let mut agents = Vec::with_capacity(self.agents.len());
        for (id, agent) in self.agents.iter().enumerate() {
            let agent = Agent::new(id, Position::from((agent.start[0], agent.start[1])))
                .with_waypoints(
                    agent
                        .waypoints
                        .iter()
                        .map(|&[x, y]| Position::new(x, y)),
                );
            ensure!(agent.verify(map), "agent {id} starts or ends on a blocked cell");
            agents.push(agent);
        }
        let mut starts: Vec<Position> = agents.iter().map(|agent| agent.start).collect();
        starts.sort();
        starts.dedup();
        ensure!(starts.len() == agents.len(), "two agents share a start cell");
        Ok(agents)
    }
}

pub fn load_agents(path: &str, map: &Map) -> anyhow::Result<Vec<Agent>> {
    Scenario::load_from_file(path)?.to_agents(map)
}

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub config: &'a Config,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<&'a RunOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_layout: Option<&'a BestLayout>,
}

/// Writes `report` as JSON for `.json` paths and as YAML for `.yaml`/`.yml`.
pub fn write_report<T: Serialize>(path: &str, report: &T) -> anyhow::Result<()> {
    let output = Path::new(path);
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let extension = output.extension().and_then(|ext| ext.to_str());
    let writer = || -> anyhow::Result<BufWriter<File>> {
        let file = File::create(output).with_context(|| format!("failed to create {path}"))?;
        Ok(BufWriter::new(file))
    };
    match extension {
        Some("json") => serde_json::to_writer_pretty(writer()?, report)?,
        Some("yaml" | "yml") => serde_yaml::to_writer(writer()?, report)?,
        _ => bail!("unsupported report format {path:?}, use .json, .yaml or .yml"),
    }
    info!("report written to {path}");
    Ok(())
}
