use crate::common::{Agent, Fleet, Path};
use crate::error::PlanError;
use crate::map::Map;
use crate::solver::{build_solver, SolverKind};
use crate::stat::Stats;
use crate::task::TaskSource;

use anyhow::ensure;
use rand::Rng;
use serde::Serialize;
use tracing::{error, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSettings {
    window_size: usize,
    horizon: usize,
    solver: SolverKind,
}

impl WindowSettings {
    pub fn new(window_size: usize, horizon: usize, solver: SolverKind) -> anyhow::Result<Self> {
        ensure!(window_size > 0, "window size must be positive");
        ensure!(horizon > 0, "search horizon must be positive");
        Ok(WindowSettings {
            window_size,
            horizon,
            solver,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}

/// Everything a finished run executed.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Executed positions per agent, see `Fleet::trajectories`.
    pub paths: Vec<Path>,
    pub agents: Vec<Agent>,
    pub iterations: usize,
    pub assignments: usize,
    /// Sum of the executed trajectory lengths.
    pub cost: usize,
    /// Assignments per timestep of the longest trajectory.
    pub throughput: f64,
    pub stats: Stats,
}

/// Plans, commits `window_size` timesteps and replans until `source` is
/// drained and every agent has visited all of its waypoints.
#[instrument(skip_all, fields(agents = fleet.len(), window = settings.window_size, solver = %settings.solver))]
pub fn run_windowed<S, R>(
    map: &Map,
    mut fleet: Fleet,
    source: &mut S,
    settings: &WindowSettings,
    rng: &mut R,
) -> Result<RunOutcome, PlanError>
where
    S: TaskSource + ?Sized,
    R: Rng + ?Sized,
{
    let window = settings.window_size();
    let mut solver = build_solver(settings.solver, map, Some(window), settings.horizon);
    let mut stats = Stats::default();
    let mut iterations = 0;
    let mut assignments = 0;
    let mut pending = fleet.has_pending_waypoints();

    while source.has_remaining_work() || pending {
        assignments += fleet.update_task_lists(source, map, window, rng);

        let solution = solver.solve(fleet.agents()).map_err(|err| {
            error!("iteration {iterations} failed at timestep {}: {err}", fleet.elapsed());
            err
        })?;
        stats.merge(solver.stats());

        // Only route indices below `window` are conflict-checked, yet the move
        // from index `window - 1` to the next start at `window` is executed too.
        pending = fleet.commit(&solution, window, map.dwell_time());
        iterations += 1;
        info!(
            "iteration {iterations}: elapsed {}, {} assignments left",
            fleet.elapsed(),
            source.remaining_count()
        );
    }

    let (agents, paths) = fleet.into_parts();
    let cost = paths.iter().map(Vec::len).sum();
    let longest = paths.iter().map(Vec::len).max().unwrap_or(0);
    let throughput = if longest == 0 {
        0.0
    } else {
        assignments as f64 / longest as f64
    };
    stats.costs = cost;

    Ok(RunOutcome {
        paths,
        agents,
        iterations,
        assignments,
        cost,
        throughput,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Position;
    use crate::task::TaskAssigner;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    }

    fn warehouse() -> Map {
        Map::from_file("map_file/test/warehouse.csv")
            .unwrap()
            .with_dwell_time(1)
    }

    fn assert_contiguous(path: &Path) {
        assert!(path.windows(2).all(|step| step[0].manhattan(&step[1]) <= 1));
    }

    #[test]
    fn test_settings_reject_zero_window() {
        assert!(WindowSettings::new(0, 100, SolverKind::Pbs).is_err());
        assert!(WindowSettings::new(3, 0, SolverKind::Pbs).is_err());
        assert_eq!(
            WindowSettings::new(3, 100, SolverKind::Cbs).unwrap().window_size(),
            3
        );
    }

    #[test]
    fn test_single_agent_run_completes_every_assignment() {
        init_tracing();
        let map = warehouse();
        let mut rng = StdRng::seed_from_u64(3);
        let mut source = TaskAssigner::for_map(&map, 4, &mut rng).unwrap();
        let fleet = Fleet::new(vec![Agent::new(0, Position::new(3, 3))]);
        let settings = WindowSettings::new(5, 200, SolverKind::Pbs).unwrap();

        let outcome = run_windowed(&map, fleet, &mut source, &settings, &mut rng).unwrap();

        assert!(!source.has_remaining_work());
        assert_eq!(outcome.assignments, 4);
        assert!(outcome.iterations > 1);
        let agent = &outcome.agents[0];
        assert!(agent.waypoints.is_empty());
        assert_eq!(agent.history.len(), 8);
        assert!(agent.history.windows(2).all(|pair| pair[0].1 < pair[1].1));
        assert_contiguous(&outcome.paths[0]);
        assert_eq!(outcome.paths[0][0], Position::new(3, 3));
        assert_eq!(outcome.cost, outcome.paths[0].len());
        assert!(outcome.throughput > 0.0);
    }

    #[test]
    fn test_windowed_run_is_reproducible() {
        init_tracing();
        let map = warehouse();
        let run = |kind: SolverKind| {
            let mut rng = StdRng::seed_from_u64(11);
            let mut source = TaskAssigner::for_map(&map, 4, &mut rng).unwrap();
            let fleet = Fleet::random(&map, 2, &mut rng).unwrap();
            let settings = WindowSettings::new(4, 200, kind).unwrap();
            run_windowed(&map, fleet, &mut source, &settings, &mut rng)
                .map(|outcome| (outcome.paths, outcome.iterations))
        };

        for kind in [SolverKind::Pbs, SolverKind::Cbs] {
            let first = run(kind);
            assert_eq!(first, run(kind));
            if let Ok((paths, _)) = first {
                paths.iter().for_each(assert_contiguous);
            }
        }
    }

    #[test]
    fn test_idle_fleet_without_work_stops_immediately() {
        let map = warehouse();
        let mut rng = StdRng::seed_from_u64(0);
        let mut source = TaskAssigner::from_assignments([]);
        let fleet = Fleet::new(vec![Agent::new(0, Position::new(1, 1))]);
        let settings = WindowSettings::new(5, 100, SolverKind::Cbs).unwrap();

        let outcome = run_windowed(&map, fleet, &mut source, &settings, &mut rng).unwrap();
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.cost, 0);
        assert_eq!(outcome.throughput, 0.0);
    }
}
