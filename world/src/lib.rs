#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for the wanderers simulation.
//!
//! The [`World`] owns every agent and obstacle together with the
//! [`SpatialIndex`] answering occupancy queries. Each call to [`World::tick`]
//! clears the agent layer, advances every agent against a frozen view of the
//! index, then rebuilds the agent layer serially before reporting the agents
//! that moved.

mod config;
mod spatial;
mod tick;

use std::sync::{Mutex, PoisonError};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use wanderers_core::{AgentId, Bounds, DVec2, Obstacle, ObstacleId, WorldQuery};
use wanderers_pathfinding::Pathfinder;
use wanderers_system_behavior::{Agent, Behavior};

pub use config::{ConfigError, ObstacleConfig, WorldConfig};
pub use spatial::{IndexError, Layer, Occupant, SpatialIndex};
pub use tick::WorldView;

/// Errors raised while building or populating a world.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The spatial index rejected its parameters.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// No unblocked starting position was found for the agent.
    #[error("no free spawn position found for agent {agent}")]
    NoFreeSpawnPosition {
        /// Agent that could not be placed.
        agent: AgentId,
    },
    /// An agent with the same identifier already exists.
    #[error("agent {agent} already exists")]
    DuplicateAgent {
        /// Conflicting identifier.
        agent: AgentId,
    },
}

/// Represents the authoritative arena state.
#[derive(Debug)]
pub struct World {
    width: f64,
    height: f64,
    seed: i64,
    parallel: bool,
    rng: Mutex<ChaCha8Rng>,
    agents: Vec<Agent>,
    obstacles: Vec<Obstacle>,
    index: SpatialIndex,
    behavior: Behavior,
    tick_index: u64,
}

impl World {
    /// Builds a world from `config`, inserting its obstacles and spawning its agents.
    pub fn new(config: WorldConfig) -> Result<Self, WorldError> {
        config.validate()?;

        let mut world = Self {
            width: config.width,
            height: config.height,
            seed: config.seed,
            parallel: config.parallel,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(config.seed as u64)),
            agents: Vec::with_capacity(config.agents),
            obstacles: Vec::with_capacity(config.obstacles.len()),
            index: SpatialIndex::new(config.spatial_cell_size)?,
            behavior: Behavior::new(config.behavior, Pathfinder::new(config.pathfinder)),
            tick_index: 0,
        };

        for obstacle in &config.obstacles {
            let _ = world.add_obstacle(obstacle.bounds());
        }
        for _ in 0..config.agents {
            let _ = world.spawn_agent()?;
        }

        tracing::info!(
            width = world.width,
            height = world.height,
            seed = world.seed,
            obstacles = world.obstacles.len(),
            agents = world.agents.len(),
            "world created"
        );
        Ok(world)
    }

    /// Places a static obstacle and registers it in the obstacle layer.
    pub fn add_obstacle(&mut self, bounds: Bounds) -> ObstacleId {
        let id = ObstacleId::from_random_bytes(self.random_bytes());
        self.obstacles.push(Obstacle::new(id, bounds));
        self.index.insert(Occupant::Obstacle(id), bounds);
        id
    }

    /// Spawns an agent with an identifier drawn from the world's random source.
    pub fn spawn_agent(&mut self) -> Result<AgentId, WorldError> {
        let id = AgentId::from_random_bytes(self.random_bytes());
        self.spawn_agent_with_id(id)
    }

    /// Spawns an agent with an externally supplied identifier.
    pub fn spawn_agent_with_id(&mut self, id: AgentId) -> Result<AgentId, WorldError> {
        if self.agent(id).is_some() {
            return Err(WorldError::DuplicateAgent { agent: id });
        }

        let agent = self
            .behavior
            .spawn(id, &self.view())
            .ok_or(WorldError::NoFreeSpawnPosition { agent: id })?;
        self.index
            .insert(Occupant::Agent(id), agent.footprint(self.behavior.config().body_size));
        self.agents.push(agent);
        Ok(id)
    }

    /// Steers an agent toward `point`. Returns `false` when the agent is unknown.
    pub fn assign_target(&mut self, id: AgentId, point: DVec2) -> bool {
        let view = WorldView::new(&self.index, &self.rng, self.seed, self.width, self.height);
        let Some(agent) = self.agents.iter_mut().find(|agent| agent.id() == id) else {
            return false;
        };
        self.behavior.assign_target(agent, point, &view);
        true
    }

    /// Clears both index layers and re-inserts every obstacle and agent.
    pub fn reset_index(&mut self) {
        self.index.clear(true);
        for obstacle in &self.obstacles {
            self.index
                .insert(Occupant::Obstacle(obstacle.id()), obstacle.bounds());
        }
        self.reinsert_agents();
    }

    /// Switches between parallel and serial agent updates.
    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    /// Looks up an agent by identifier.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.id() == id)
    }

    fn view(&self) -> WorldView<'_> {
        WorldView::new(&self.index, &self.rng, self.seed, self.width, self.height)
    }

    fn random_bytes(&mut self) -> [u8; 16] {
        self.rng
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .gen::<[u8; 16]>()
    }

    fn reinsert_agents(&mut self) {
        let body_size = self.behavior.config().body_size;
        for agent in &self.agents {
            self.index
                .insert(Occupant::Agent(agent.id()), agent.footprint(body_size));
        }
    }
}

impl WorldQuery for World {
    fn is_point_blocked(&self, point: DVec2) -> bool {
        self.index.is_point_blocked(point)
    }

    fn random_float(&self) -> f64 {
        self.view().random_float()
    }

    fn world_seed(&self) -> i64 {
        self.seed
    }

    fn boundaries(&self) -> (f64, f64) {
        (self.width, self.height)
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::collections::BTreeSet;

    use wanderers_core::{DVec2, ObstacleSnapshot, WorldSnapshot};
    use wanderers_system_behavior::Agent;

    use super::{Layer, Occupant, SpatialIndex, World};

    /// Agents in creation order.
    #[must_use]
    pub fn agents(world: &World) -> &[Agent] {
        &world.agents
    }

    /// Broadcast representation of every obstacle, in insertion order.
    #[must_use]
    pub fn obstacles(world: &World) -> Vec<ObstacleSnapshot> {
        world
            .obstacles
            .iter()
            .map(|obstacle| obstacle.snapshot())
            .collect()
    }

    /// Provides read-only access to the spatial index.
    #[must_use]
    pub fn spatial_index(world: &World) -> &SpatialIndex {
        &world.index
    }

    /// Occupants of `layer` in the 3×3 block of cells around `point`.
    #[must_use]
    pub fn nearby(world: &World, point: DVec2, layer: Layer) -> BTreeSet<Occupant> {
        world.index.nearby(point, layer)
    }

    /// Number of ticks the world has advanced.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Full state suitable for the initial synchronisation of an observer.
    #[must_use]
    pub fn snapshot(world: &World) -> WorldSnapshot {
        WorldSnapshot {
            tick: world.tick_index,
            width: world.width,
            height: world.height,
            agents: world.agents.iter().map(Agent::snapshot).collect(),
            obstacles: obstacles(world),
        }
    }
}
