#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the wanderers simulation.
//!
//! This crate defines the vocabulary that connects the authoritative world,
//! the pure navigation and behavior systems, and external observers. Systems
//! never reach into the world directly: they consult it exclusively through
//! the narrow [`WorldQuery`] trait. After every tick the world reports the
//! agents that moved as [`AgentSnapshot`] values, alongside the static
//! [`ObstacleSnapshot`] list, so broadcasters can serialize state without
//! borrowing engine internals.
//!
//! Positions are expressed as [`DVec2`] values whose `y` component carries the
//! world Z axis.

use std::{fmt, time::Duration};

pub use glam::DVec2;
use serde::{Deserialize, Serialize};
use uuid::{Builder, Uuid};

/// Unique identifier assigned to an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(Uuid);

impl AgentId {
    /// Builds a version 4 identifier from caller-provided random bytes.
    ///
    /// Seeded callers use this to reproduce the same identifiers across runs.
    #[must_use]
    pub fn from_random_bytes(bytes: [u8; 16]) -> Self {
        Self(Builder::from_random_bytes(bytes).into_uuid())
    }

    /// Retrieves the wrapped identifier.
    #[must_use]
    pub const fn get(&self) -> Uuid {
        self.0
    }

    /// Lower 64 bits of the identifier, used to derive per-agent random streams.
    #[must_use]
    pub const fn seed_bits(&self) -> u64 {
        self.0.as_u128() as u64
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Unique identifier assigned to an obstacle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObstacleId(Uuid);

impl ObstacleId {
    /// Builds a version 4 identifier from caller-provided random bytes.
    #[must_use]
    pub fn from_random_bytes(bytes: [u8; 16]) -> Self {
        Self(Builder::from_random_bytes(bytes).into_uuid())
    }
}

impl fmt::Display for ObstacleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Axis-aligned rectangle expressed in world units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    min: DVec2,
    max: DVec2,
}

impl Bounds {
    /// Creates a rectangle from its corner coordinates.
    ///
    /// Corners are reordered so that `min` never exceeds `max` on either axis.
    #[must_use]
    pub fn new(min_x: f64, min_z: f64, max_x: f64, max_z: f64) -> Self {
        Self {
            min: DVec2::new(min_x.min(max_x), min_z.min(max_z)),
            max: DVec2::new(min_x.max(max_x), min_z.max(max_z)),
        }
    }

    /// Creates a rectangle anchored at `origin` that extends by `size`.
    #[must_use]
    pub fn from_origin_and_size(origin: DVec2, size: DVec2) -> Self {
        let far = origin + size;
        Self::new(origin.x, origin.y, far.x, far.y)
    }

    /// Corner with the smallest coordinates.
    #[must_use]
    pub const fn min(&self) -> DVec2 {
        self.min
    }

    /// Corner with the largest coordinates.
    #[must_use]
    pub const fn max(&self) -> DVec2 {
        self.max
    }

    /// Extent of the rectangle along the X axis.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Extent of the rectangle along the Z axis.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Reports whether the point lies inside the half-open rectangle `[min, max)`.
    #[must_use]
    pub fn contains(&self, point: DVec2) -> bool {
        point.x >= self.min.x && point.x < self.max.x && point.y >= self.min.y && point.y < self.max.y
    }
}

/// Static rectangular obstacle placed in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    id: ObstacleId,
    bounds: Bounds,
}

impl Obstacle {
    /// Creates an obstacle covering the provided bounds.
    #[must_use]
    pub const fn new(id: ObstacleId, bounds: Bounds) -> Self {
        Self { id, bounds }
    }

    /// Identifier assigned to the obstacle.
    #[must_use]
    pub const fn id(&self) -> ObstacleId {
        self.id
    }

    /// Region covered by the obstacle.
    #[must_use]
    pub const fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Captures the broadcast representation of the obstacle.
    #[must_use]
    pub const fn snapshot(&self) -> ObstacleSnapshot {
        ObstacleSnapshot {
            id: self.id,
            bounds: self.bounds,
        }
    }
}

/// Read-only queries the world answers for navigation and behavior systems.
///
/// Implementations must be safe to share across the worker threads that run
/// agent updates in parallel.
pub trait WorldQuery: Sync {
    /// Reports whether an obstacle occupies the spatial cell containing `point`.
    ///
    /// Agent occupancy never blocks and points outside the indexed area are free.
    fn is_point_blocked(&self, point: DVec2) -> bool;

    /// Draws a uniform sample in `[0, 1)` from the world-scoped random source.
    fn random_float(&self) -> f64;

    /// Seed the world was created with.
    fn world_seed(&self) -> i64;

    /// Width and height of the arena.
    fn boundaries(&self) -> (f64, f64);

    /// Reports whether `point` lies within `[0, width] × [0, height]`.
    fn in_bounds(&self, point: DVec2) -> bool {
        let (width, height) = self.boundaries();
        point.x >= 0.0 && point.x <= width && point.y >= 0.0 && point.y <= height
    }

    /// Clamps `point` onto the arena.
    fn clamp_to_bounds(&self, point: DVec2) -> DVec2 {
        let (width, height) = self.boundaries();
        DVec2::new(point.x.clamp(0.0, width), point.y.clamp(0.0, height))
    }
}

/// Immutable representation of a single agent handed to broadcasters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Unique identifier assigned to the agent.
    pub id: AgentId,
    /// Position after the tick.
    pub position: DVec2,
    /// Velocity applied during the tick.
    pub velocity: DVec2,
    /// Waypoints of the route the agent is following, empty when it has none.
    pub path: Vec<DVec2>,
    /// Set when the last route request for the current target failed.
    pub no_path: bool,
}

impl AgentSnapshot {
    /// Rotation observers render for the agent, derived from its velocity.
    #[must_use]
    pub fn heading(&self) -> f64 {
        self.velocity.y.atan2(self.velocity.x) + std::f64::consts::FRAC_PI_2
    }
}

/// Immutable representation of an obstacle handed to broadcasters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObstacleSnapshot {
    /// Identifier assigned to the obstacle.
    pub id: ObstacleId,
    /// Region covered by the obstacle.
    pub bounds: Bounds,
}

/// Outcome of a single world tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Sequence number of the tick, starting at one.
    pub tick: u64,
    /// Agents whose position changed, in agent order.
    pub updated: Vec<AgentSnapshot>,
}

impl TickReport {
    /// Identifiers of the agents that moved during the tick.
    pub fn changed_ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.updated.iter().map(|snapshot| snapshot.id)
    }
}

/// Full snapshot of the arena suitable for initial synchronisation of observers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Number of ticks the world has advanced.
    pub tick: u64,
    /// Width of the arena.
    pub width: f64,
    /// Height of the arena.
    pub height: f64,
    /// Every agent in the arena, in agent order.
    pub agents: Vec<AgentSnapshot>,
    /// Every obstacle in the arena, in insertion order.
    pub obstacles: Vec<ObstacleSnapshot>,
}

/// Record of a completed wander: where the agent was heading and how long it took.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WanderingEvent {
    /// Agent clock reading when the wander completed.
    pub at: Duration,
    /// Position of the agent when the wander completed.
    pub position: DVec2,
    /// Target the agent was wandering toward.
    pub target: DVec2,
    /// Simulated time since the previous wander completed.
    pub duration: Duration,
}
