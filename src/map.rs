use crate::common::Position;

use anyhow::{bail, ensure, Context};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;
use std::fs;

#[derive(Debug, Clone)]
pub struct Tile {
    passable: bool,
    pub neighbors: Vec<Position>, // Reachable cells including the tile itself
}

impl Tile {
    pub fn is_passable(&self) -> bool {
        self.passable
    }
}

#[derive(Debug, Clone)]
pub struct Map {
    pub width: usize,
    pub height: usize,
    grid: Vec<Vec<Tile>>, // indexed [y][x]
    induct_checkpoints: Vec<Position>,
    eject_checkpoints: Vec<Position>,
    dwell_time: usize,
}

impl Map {
    /// Obstacle-free grid without checkpoints.
    pub fn new(width: usize, height: usize) -> Self {
        let grid = vec![
            vec![
                Tile {
                    passable: true,
                    neighbors: Vec::new(),
                };
                width
            ];
            height
        ];
        let mut map = Map {
            width,
            height,
            grid,
            induct_checkpoints: Vec::new(),
            eject_checkpoints: Vec::new(),
            dwell_time: 0,
        };
        map.initialize_neighbors();
        map
    }

    pub fn with_obstacles(mut self, obstacles: impl IntoIterator<Item = Position>) -> Self {
        for obstacle in obstacles {
            if self.contains(obstacle) {
                self.grid[obstacle.y][obstacle.x].passable = false;
            }
        }
        self.initialize_neighbors();
        self
    }

    /// Eject checkpoints are stations: they become obstacles served from a free
    /// neighbouring cell.
    pub fn with_checkpoints(mut self, induct: Vec<Position>, eject: Vec<Position>) -> Self {
        self.induct_checkpoints = induct;
        self.eject_checkpoints = eject.clone();
        self.with_obstacles(eject)
    }

    pub fn with_dwell_time(mut self, dwell_time: usize) -> Self {
        self.dwell_time = dwell_time;
        self
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read layout {path}"))?;
        Self::from_layout_str(&content).with_context(|| format!("invalid layout {path}"))
    }

    /// Parses the warehouse layout format: a `width,height` header followed by
    /// one `_,Type,_,x,y,...` line per non-travel cell.
    pub fn from_layout_str(content: &str) -> anyhow::Result<Self> {
        let mut lines = content.lines();
        let header = lines.next().context("layout is empty")?;
        let (width, height) = header
            .split_once(',')
            .with_context(|| format!("malformed header {header:?}"))?;
        let width: usize = width.trim().parse().context("invalid width")?;
        let height: usize = height.trim().parse().context("invalid height")?;

        let mut obstacles = Vec::new();
        let mut induct = Vec::new();
        let mut eject = Vec::new();

        for (line_no, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let tokens: Vec<&str> = line.split(',').map(str::trim).collect();
            ensure!(
                tokens.len() >= 5,
                "line {}: expected at least 5 fields, got {}",
                line_no + 2,
                tokens.len()
            );
            let x: usize = tokens[3]
                .parse()
                .with_context(|| format!("line {}: invalid x", line_no + 2))?;
            let y: usize = tokens[4]
                .parse()
                .with_context(|| format!("line {}: invalid y", line_no + 2))?;
            ensure!(
                x < width && y < height,
                "line {}: cell ({x}, {y}) is outside {width}x{height}",
                line_no + 2
            );

            let position = Position::new(x, y);
            match tokens[1] {
                "Obstacle" => obstacles.push(position),
                "Eject" => eject.push(position),
                "Induct" => induct.push(position),
                "Travel" => {}
                other => bail!("line {}: unknown cell type {other:?}", line_no + 2),
            }
        }

        Ok(Map::new(width, height)
            .with_obstacles(obstacles)
            .with_checkpoints(induct, eject))
    }

    fn initialize_neighbors(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                self.grid[y][x].neighbors = if self.grid[y][x].passable {
                    self.get_neighbors(Position::new(x, y))
                } else {
                    Vec::new()
                };
            }
        }
    }

    /// Passable 4-neighbours of `position` followed by `position` itself.
    pub fn get_neighbors(&self, position: Position) -> Vec<Position> {
        let directions = [(-1, 0), (1, 0), (0, -1), (0, 1), (0, 0)]; // Left, right, up, down, stay
        let mut neighbors = Vec::new();

        for &(dx, dy) in &directions {
            let new_x = position.x as i64 + dx;
            let new_y = position.y as i64 + dy;
            if new_x >= 0 && new_y >= 0 {
                let candidate = Position::new(new_x as usize, new_y as usize);
                if self.is_passable(candidate) {
                    neighbors.push(candidate);
                }
            }
        }

        neighbors
    }

    /// Cached [`Map::get_neighbors`]; empty for obstacles.
    pub fn neighbors(&self, position: Position) -> &[Position] {
        if self.contains(position) {
            &self.grid[position.y][position.x].neighbors
        } else {
            &[]
        }
    }

    pub fn contains(&self, position: Position) -> bool {
        position.x < self.width && position.y < self.height
    }

    pub fn is_passable(&self, position: Position) -> bool {
        self.contains(position) && self.grid[position.y][position.x].is_passable()
    }

    pub fn dwell_time(&self) -> usize {
        self.dwell_time
    }

    pub fn induct_checkpoints(&self) -> &[Position] {
        &self.induct_checkpoints
    }

    pub fn eject_checkpoints(&self) -> &[Position] {
        &self.eject_checkpoints
    }

    pub fn spare_locations(&self) -> Vec<Position> {
        (0..self.width)
            .flat_map(|x| (0..self.height).map(move |y| Position::new(x, y)))
            .filter(|position| self.is_passable(*position))
            .collect()
    }

    /// A random free 4-neighbour of `position`, which may itself be an obstacle.
    pub fn near_spare_location<R: Rng + ?Sized>(
        &self,
        position: Position,
        rng: &mut R,
    ) -> Option<Position> {
        let candidates: Vec<Position> = self
            .get_neighbors(position)
            .into_iter()
            .filter(|neighbor| *neighbor != position)
            .collect();
        candidates.choose(rng).copied()
    }

    /// Free cell from which eject checkpoint `index` is served.
    pub fn dropoff_location<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Option<Position> {
        let eject = *self.eject_checkpoints.get(index)?;
        self.near_spare_location(eject, rng)
    }

    /// Whether all free cells form one 4-connected component.
    pub fn is_connected(&self) -> bool {
        let spare = self.spare_locations();
        let Some(&first) = spare.first() else {
            return true;
        };

        let mut visited = vec![vec![false; self.width]; self.height];
        let mut queue = VecDeque::from([first]);
        visited[first.y][first.x] = true;
        let mut reached = 1;

        while let Some(current) = queue.pop_front() {
            for &neighbor in self.neighbors(current) {
                if !visited[neighbor.y][neighbor.x] {
                    visited[neighbor.y][neighbor.x] = true;
                    reached += 1;
                    queue.push_back(neighbor);
                }
            }
        }

        reached == spare.len()
    }

    /// Keeps only the induct checkpoints at `indices`, in that order.
    pub fn keep_induct_checkpoints(&mut self, indices: &[usize]) {
        self.induct_checkpoints = indices
            .iter()
            .filter_map(|&index| self.induct_checkpoints.get(index).copied())
            .collect();
    }

    /// Reorders both checkpoint lists; the cells themselves are unchanged.
    pub fn shuffle_checkpoints<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.eject_checkpoints.shuffle(rng);
        self.induct_checkpoints.shuffle(rng);
    }

    /// Fails when a task could never be served on this layout.
    pub fn validate_checkpoints(&self) -> anyhow::Result<()> {
        ensure!(
            !self.induct_checkpoints.is_empty(),
            "need at least one induct checkpoint"
        );
        ensure!(
            !self.eject_checkpoints.is_empty(),
            "need at least one eject checkpoint"
        );
        for induct in &self.induct_checkpoints {
            ensure!(
                self.is_passable(*induct),
                "induct checkpoint {induct} is not a free cell"
            );
        }
        for eject in &self.eject_checkpoints {
            ensure!(
                self.get_neighbors(*eject).iter().any(|n| n != eject),
                "eject checkpoint {eject} has no free neighbour"
            );
        }
        Ok(())
    }
}
