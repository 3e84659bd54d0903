#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Obstacle-aware A* pathfinding over continuous arena coordinates.
//!
//! The search runs on a virtual grid whose discretization step is independent
//! of the world's spatial index. Candidate points must keep a requested
//! clearance from obstacles, falling back to half that clearance so narrow
//! corridors stay traversable. Routes are validated before they are returned,
//! and an unreachable goal is reported as `None` rather than as an error.

pub mod clearance;
mod search;
mod validate;

use serde::{Deserialize, Serialize};
use wanderers_core::{DVec2, WorldQuery};

pub use validate::validate_path;

/// Tuning knobs for the A* search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathfinderConfig {
    /// Distance between neighbouring virtual grid points in world units.
    pub step: f64,
    /// Maximum number of node expansions before the search gives up.
    pub max_expansions: usize,
    /// Best-effort tolerance: the closest node found is accepted when it lies
    /// within this many steps of the goal.
    pub best_effort_steps: f64,
    /// Scale applied to both axes of a diagonal step.
    pub diagonal_scale: f64,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            step: 2.0,
            max_expansions: 1_000,
            best_effort_steps: 3.0,
            diagonal_scale: 0.707,
        }
    }
}

/// Ordered waypoints produced by a successful search.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    waypoints: Vec<DVec2>,
    cost: f64,
}

impl Path {
    pub(crate) fn new(waypoints: Vec<DVec2>, cost: f64) -> Self {
        Self { waypoints, cost }
    }

    /// Waypoints from the start point toward the goal.
    #[must_use]
    pub fn waypoints(&self) -> &[DVec2] {
        &self.waypoints
    }

    /// Consumes the path, yielding its waypoints.
    #[must_use]
    pub fn into_waypoints(self) -> Vec<DVec2> {
        self.waypoints
    }

    /// Accumulated travel distance along the waypoints.
    #[must_use]
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Number of waypoints in the route.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Reports whether the route holds no waypoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

/// Stateless A* planner parameterised by [`PathfinderConfig`].
#[derive(Clone, Debug, Default)]
pub struct Pathfinder {
    config: PathfinderConfig,
}

impl Pathfinder {
    /// Creates a planner using the provided configuration.
    #[must_use]
    pub fn new(config: PathfinderConfig) -> Self {
        Self { config }
    }

    /// Configuration the planner was created with.
    #[must_use]
    pub fn config(&self) -> &PathfinderConfig {
        &self.config
    }

    /// Searches for a clearance-respecting route from `start` to `goal`.
    ///
    /// Returns `None` when the expansion budget is exhausted without reaching
    /// the goal and no explored node lies within the best-effort tolerance, or
    /// when the found route fails validation. Callers treat `None` as a normal
    /// outcome.
    pub fn find_path<Q>(&self, start: DVec2, goal: DVec2, clearance: f64, query: &Q) -> Option<Path>
    where
        Q: WorldQuery + ?Sized,
    {
        let path = search::Search::new(&self.config, goal, clearance, query).run(start)?;
        if !validate_path(path.waypoints(), query) {
            tracing::trace!(
                start_x = start.x,
                start_z = start.y,
                goal_x = goal.x,
                goal_z = goal.y,
                "discarding route that failed validation"
            );
            return None;
        }
        Some(path)
    }
}
