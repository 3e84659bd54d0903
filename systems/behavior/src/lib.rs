#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-agent wandering behavior with path following and stuck recovery.
//!
//! The [`Behavior`] system advances one [`Agent`] at a time against a read-only
//! [`WorldQuery`]. It never touches other agents, so the world may run it for
//! every agent in parallel as long as the query stays immutable for the
//! duration of the tick.

mod agent;

use std::{f64::consts::TAU, time::Duration};

use rand::Rng;
use serde::{Deserialize, Serialize};
use wanderers_core::{AgentId, DVec2, WorldQuery};
use wanderers_pathfinding::{
    clearance::{find_clear_position, has_clearance},
    Pathfinder,
};

pub use agent::{
    derive_agent_seed, Agent, MotionState, PathFollow, StuckState, WanderLog, WanderTarget,
};

/// Movement below this distance does not count as a change of position.
pub const CHANGE_EPSILON: f64 = 1e-9;

const ARRIVAL_EPSILON: f64 = 1e-6;

/// Tuning knobs for the wandering behavior.
///
/// Speeds are expressed in world units per tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BehaviorConfig {
    /// Distance at which the wandering target counts as reached.
    pub reach_distance: f64,
    /// Distance at which a waypoint counts as reached.
    pub waypoint_reach: f64,
    /// Radius of the disc new wandering targets are sampled from.
    pub wander_radius: f64,
    /// Reduced sampling radius used when recovering from a stuck state.
    pub recovery_radius: f64,
    /// Clearance routes and targets keep from obstacles.
    pub obstacle_offset: f64,
    /// Dwell time at a reached target, in milliseconds.
    pub dwell_millis: u64,
    /// Minimum per-target bonus speed.
    pub bonus_speed_min: f64,
    /// Random spread added to the per-target bonus speed.
    pub bonus_speed_range: f64,
    /// Minimum base speed drawn at creation.
    pub base_speed_min: f64,
    /// Random spread added to the base speed.
    pub base_speed_range: f64,
    /// Displacement below which the agent counts as not progressing.
    ///
    /// Measured against the previous tick's position, so an agent whose speed
    /// stays below this value counts as stuck even while it creeps forward.
    pub stuck_epsilon: f64,
    /// Consecutive non-progressing ticks tolerated before recovery starts.
    pub stuck_threshold: u32,
    /// Minimum number of ticks between two stuck-triggered replans.
    pub replan_cooldown: u64,
    /// Samples drawn when looking for a wandering target before giving up.
    pub max_target_attempts: usize,
    /// Samples drawn when looking for a free starting position.
    pub max_spawn_attempts: usize,
    /// Side of the square footprint agents occupy in the spatial index.
    pub body_size: f64,
    /// Number of completed wanders kept per agent.
    pub event_log_capacity: usize,
}

impl BehaviorConfig {
    /// Dwell time at a reached target.
    #[must_use]
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_millis)
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            reach_distance: 0.5,
            waypoint_reach: 0.2,
            wander_radius: 30.0,
            recovery_radius: 8.0,
            obstacle_offset: 1.0,
            dwell_millis: 500,
            bonus_speed_min: 0.03,
            bonus_speed_range: 0.02,
            base_speed_min: 0.01,
            base_speed_range: 0.02,
            stuck_epsilon: 0.001,
            stuck_threshold: 100,
            replan_cooldown: 50,
            max_target_attempts: 32,
            max_spawn_attempts: 1_000,
            body_size: 1.0,
            event_log_capacity: 64,
        }
    }
}

/// Draws an offset uniformly distributed over a disc of `radius`.
///
/// The radius is the square root of a uniform sample so that the density is
/// uniform per unit area rather than concentrated near the centre.
pub fn sample_disc_offset<R>(rng: &mut R, radius: f64) -> DVec2
where
    R: Rng + ?Sized,
{
    let angle = rng.gen::<f64>() * TAU;
    let distance = rng.gen::<f64>().sqrt() * radius;
    DVec2::new(angle.cos(), angle.sin()) * distance
}

/// Pure system driving the wandering state machine of individual agents.
#[derive(Clone, Debug, Default)]
pub struct Behavior {
    config: BehaviorConfig,
    pathfinder: Pathfinder,
}

impl Behavior {
    /// Creates the system from its configuration and the planner it routes with.
    #[must_use]
    pub fn new(config: BehaviorConfig, pathfinder: Pathfinder) -> Self {
        Self { config, pathfinder }
    }

    /// Configuration the system was created with.
    #[must_use]
    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    /// Planner used for routing.
    #[must_use]
    pub fn pathfinder(&self) -> &Pathfinder {
        &self.pathfinder
    }

    /// Creates an agent at a random unblocked position and picks its first target.
    ///
    /// Returns `None` when no unblocked position is found within the configured
    /// number of attempts.
    pub fn spawn<Q>(&self, id: AgentId, query: &Q) -> Option<Agent>
    where
        Q: WorldQuery + ?Sized,
    {
        let mut agent = Agent::new(id, DVec2::ZERO, query.world_seed(), &self.config);
        let (width, height) = query.boundaries();
        let rng = &mut agent.rng;
        let position = (0..self.config.max_spawn_attempts)
            .map(|_| DVec2::new(rng.gen::<f64>() * width, rng.gen::<f64>() * height))
            .find(|candidate| !query.is_point_blocked(*candidate))?;

        agent.place(position);
        self.retarget(&mut agent, self.config.wander_radius, query);
        Some(agent)
    }

    /// Classifies what the agent is currently doing.
    #[must_use]
    pub fn motion_state(&self, agent: &Agent) -> MotionState {
        if self.within_reach(agent) {
            MotionState::WaitingAtTarget
        } else if agent.stuck.counter > self.config.stuck_threshold {
            MotionState::StuckRecovering
        } else if agent.path.is_active() {
            MotionState::FollowingPath
        } else {
            MotionState::DirectMove
        }
    }

    /// Steers the agent toward `point` with a fresh dwell timer.
    ///
    /// The destination is pushed away from nearby obstacles when it lacks
    /// clearance. When no route exists the agent keeps no path and its
    /// `no_path` flag is raised.
    pub fn assign_target<Q>(&self, agent: &mut Agent, point: DVec2, query: &Q)
    where
        Q: WorldQuery + ?Sized,
    {
        let destination = self.clear_destination(point, query);
        let _ = self.plan_route(agent, destination, query);

        let bonus_speed =
            self.config.bonus_speed_min + agent.rng.gen::<f64>() * self.config.bonus_speed_range;
        agent.target = WanderTarget::new(destination, self.config.dwell(), bonus_speed);
        agent.stuck.reset(agent.position);
    }

    /// Advances the agent by one tick of `dt` simulated time.
    ///
    /// Returns whether the agent's position changed.
    pub fn tick<Q>(&self, agent: &mut Agent, dt: Duration, query: &Q) -> bool
    where
        Q: WorldQuery + ?Sized,
    {
        let before = agent.position;
        agent.ticks += 1;
        agent.clock += dt;

        if agent.target.remaining_wait.is_zero() {
            agent.log.record(agent.clock, agent.position, agent.target.point);
            self.retarget(agent, self.config.wander_radius, query);
        }

        if self.within_reach(agent) {
            agent.target.remaining_wait = agent.target.remaining_wait.saturating_sub(dt);
            agent.velocity = DVec2::ZERO;
            agent.stuck.reset(agent.position);
        } else {
            self.advance(agent, query);
            self.detect_stuck(agent, query);
        }

        let delta = agent.position - before;
        delta.x.abs() > CHANGE_EPSILON || delta.y.abs() > CHANGE_EPSILON
    }

    fn within_reach(&self, agent: &Agent) -> bool {
        agent.position.distance_squared(agent.target.point)
            < self.config.reach_distance * self.config.reach_distance
    }

    fn speed(&self, agent: &Agent) -> f64 {
        agent.base_speed + agent.target.bonus_speed
    }

    fn retarget<Q>(&self, agent: &mut Agent, radius: f64, query: &Q)
    where
        Q: WorldQuery + ?Sized,
    {
        let origin = agent.position;
        let candidate = (0..self.config.max_target_attempts)
            .map(|_| origin + sample_disc_offset(&mut agent.rng, radius))
            .find(|candidate| query.in_bounds(*candidate) && !query.is_point_blocked(*candidate));

        let point = candidate.unwrap_or_else(|| {
            tracing::debug!(
                agent = %agent.id,
                radius,
                "no wandering target found, keeping current position"
            );
            origin
        });
        self.assign_target(agent, point, query);
    }

    fn clear_destination<Q>(&self, point: DVec2, query: &Q) -> DVec2
    where
        Q: WorldQuery + ?Sized,
    {
        let offset = self.config.obstacle_offset;
        if has_clearance(query, point, offset) {
            return point;
        }

        find_clear_position(query, point, offset).unwrap_or_else(|| query.clamp_to_bounds(point))
    }

    fn plan_route<Q>(&self, agent: &mut Agent, destination: DVec2, query: &Q) -> bool
    where
        Q: WorldQuery + ?Sized,
    {
        match self.pathfinder.find_path(
            agent.position,
            destination,
            self.config.obstacle_offset,
            query,
        ) {
            Some(path) => {
                agent.path.adopt(path.into_waypoints());
                agent.no_path = false;
                true
            }
            None => {
                agent.path.clear();
                agent.no_path = true;
                false
            }
        }
    }

    fn advance<Q>(&self, agent: &mut Agent, query: &Q)
    where
        Q: WorldQuery + ?Sized,
    {
        while let Some(waypoint) = agent.path.current() {
            if agent.position.distance(waypoint) < self.config.waypoint_reach {
                agent.path.advance();
                continue;
            }
            self.step_along_path(agent, waypoint, query);
            return;
        }

        self.step_direct(agent, query);
    }

    fn step_along_path<Q>(&self, agent: &mut Agent, waypoint: DVec2, query: &Q)
    where
        Q: WorldQuery + ?Sized,
    {
        let direction = (waypoint - agent.position).normalize_or_zero();
        agent.velocity = direction * self.speed(agent);
        agent.no_path = false;

        let next = query.clamp_to_bounds(agent.position + agent.velocity);
        if !query.is_point_blocked(next) {
            agent.position = next;
            return;
        }

        if !query.is_point_blocked(waypoint) {
            agent.position = query.clamp_to_bounds(waypoint);
            agent.path.advance();
            return;
        }

        self.replan(agent, query);
    }

    fn step_direct<Q>(&self, agent: &mut Agent, query: &Q)
    where
        Q: WorldQuery + ?Sized,
    {
        let offset = agent.target.point - agent.position;
        let distance = offset.length();
        if distance < ARRIVAL_EPSILON {
            agent.velocity = DVec2::ZERO;
            return;
        }

        let velocity = offset / distance * self.speed(agent);
        let next = query.clamp_to_bounds(agent.position + velocity);
        if !query.is_point_blocked(next) {
            agent.position = next;
            agent.velocity = velocity;
            return;
        }

        agent.velocity = DVec2::ZERO;
        self.replan(agent, query);
    }

    fn replan<Q>(&self, agent: &mut Agent, query: &Q)
    where
        Q: WorldQuery + ?Sized,
    {
        let target = agent.target.point;
        if self.plan_route(agent, target, query) {
            tracing::debug!(agent = %agent.id, "replanned route around blocked step");
            return;
        }

        tracing::debug!(
            agent = %agent.id,
            target_x = target.x,
            target_z = target.y,
            "target unreachable, choosing a new one"
        );
        self.retarget(agent, self.config.wander_radius, query);
    }

    fn detect_stuck<Q>(&self, agent: &mut Agent, query: &Q)
    where
        Q: WorldQuery + ?Sized,
    {
        let displacement = agent.position.distance(agent.stuck.last_position);
        agent.stuck.last_position = agent.position;
        if displacement >= self.config.stuck_epsilon {
            agent.stuck.reset(agent.position);
            return;
        }

        agent.stuck.counter += 1;
        if agent.stuck.counter <= self.config.stuck_threshold {
            return;
        }

        if !agent.stuck.warned {
            agent.stuck.warned = true;
            tracing::warn!(
                agent = %agent.id,
                x = agent.position.x,
                z = agent.position.y,
                ticks = agent.stuck.counter,
                "agent is stuck"
            );
        }

        let cooled_down = agent
            .stuck
            .last_replan_tick
            .map_or(true, |tick| agent.ticks - tick >= self.config.replan_cooldown);
        if !cooled_down {
            return;
        }
        agent.stuck.last_replan_tick = Some(agent.ticks);

        // A best-effort route that ends where the agent already stands is no recovery.
        let target = agent.target.point;
        let recovered = self.plan_route(agent, target, query) && self.route_makes_progress(agent);
        if !recovered {
            tracing::debug!(
                agent = %agent.id,
                radius = self.config.recovery_radius,
                "stuck replan failed, picking a closer target"
            );
            self.retarget(agent, self.config.recovery_radius, query);
        }
        agent.stuck.counter = 0;
    }

    fn route_makes_progress(&self, agent: &Agent) -> bool {
        agent
            .path
            .waypoints()
            .last()
            .is_some_and(|end| end.distance(agent.position) > self.config.reach_distance)
    }
}
