use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use wanderers_core::{DVec2, TickReport, WorldQuery};

use crate::{Occupant, SpatialIndex, World};

/// Read-only view of the world handed to agent updates.
///
/// The view borrows the spatial index immutably, so the index cannot change
/// while agents are being advanced.
#[derive(Clone, Copy, Debug)]
pub struct WorldView<'a> {
    index: &'a SpatialIndex,
    rng: &'a Mutex<ChaCha8Rng>,
    seed: i64,
    width: f64,
    height: f64,
}

impl<'a> WorldView<'a> {
    pub(crate) fn new(
        index: &'a SpatialIndex,
        rng: &'a Mutex<ChaCha8Rng>,
        seed: i64,
        width: f64,
        height: f64,
    ) -> Self {
        Self {
            index,
            rng,
            seed,
            width,
            height,
        }
    }
}

impl WorldQuery for WorldView<'_> {
    fn is_point_blocked(&self, point: DVec2) -> bool {
        self.index.is_point_blocked(point)
    }

    fn random_float(&self) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen::<f64>()
    }

    fn world_seed(&self) -> i64 {
        self.seed
    }

    fn boundaries(&self) -> (f64, f64) {
        (self.width, self.height)
    }
}

impl World {
    /// Advances every agent by `dt` and reports the agents that moved.
    ///
    /// The agent layer of the index is cleared first; agents then update
    /// against the obstacle layer, in parallel unless the world runs serially.
    /// Once every update finished the agent layer is rebuilt in agent order.
    pub fn tick(&mut self, dt: Duration) -> TickReport {
        self.tick_index = self.tick_index.saturating_add(1);
        self.index.clear(false);

        let view = WorldView::new(&self.index, &self.rng, self.seed, self.width, self.height);
        let behavior = &self.behavior;
        let changed: Vec<bool> = if self.parallel {
            self.agents
                .par_iter_mut()
                .map(|agent| behavior.tick(agent, dt, &view))
                .collect()
        } else {
            self.agents
                .iter_mut()
                .map(|agent| behavior.tick(agent, dt, &view))
                .collect()
        };

        let body_size = self.behavior.config().body_size;
        for agent in &self.agents {
            self.index
                .insert(Occupant::Agent(agent.id()), agent.footprint(body_size));
        }

        let updated: Vec<_> = self
            .agents
            .iter()
            .zip(&changed)
            .filter(|(_, moved)| **moved)
            .map(|(agent, _)| agent.snapshot())
            .collect();

        tracing::debug!(
            tick = self.tick_index,
            changed = updated.len(),
            agents = self.agents.len(),
            "tick complete"
        );

        TickReport {
            tick: self.tick_index,
            updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use wanderers_core::AgentId;

    use crate::{query, Layer, WorldConfig};

    use super::*;

    fn world(parallel: bool) -> World {
        World::new(WorldConfig {
            width: 60.0,
            height: 60.0,
            agents: 40,
            parallel,
            ..WorldConfig::default()
        })
        .expect("world")
    }

    #[test]
    fn tick_reports_moved_agents_in_agent_order() {
        let mut world = world(true);
        let report = world.tick(Duration::from_millis(50));

        assert_eq!(report.tick, 1);
        assert!(!report.updated.is_empty());
        let order: Vec<AgentId> = query::agents(&world).iter().map(|agent| agent.id()).collect();
        let indices: Vec<usize> = report
            .changed_ids()
            .filter_map(|id| order.iter().position(|candidate| *candidate == id))
            .collect();
        assert_eq!(indices.len(), report.updated.len());
        assert!(indices.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn agent_layer_is_rebuilt_after_tick() {
        let mut world = world(false);
        let _ = world.tick(Duration::from_millis(50));

        for agent in query::agents(&world) {
            let nearby: BTreeSet<_> = query::nearby(&world, agent.position(), Layer::Agents);
            assert!(nearby.contains(&Occupant::Agent(agent.id())));
        }
    }

    #[test]
    fn view_answers_like_the_world() {
        let world = world(false);
        let view = world.view();

        assert_eq!(view.boundaries(), world.boundaries());
        assert_eq!(view.world_seed(), world.world_seed());
        let sample = view.random_float();
        assert!((0.0..1.0).contains(&sample));
    }
}
