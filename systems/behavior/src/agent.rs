use std::{collections::VecDeque, time::Duration};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use wanderers_core::{AgentId, AgentSnapshot, Bounds, DVec2, WanderingEvent};

use crate::BehaviorConfig;

/// Derives the seed of an agent's private random stream from the world seed
/// and the agent identifier.
#[must_use]
pub fn derive_agent_seed(world_seed: i64, id: AgentId) -> u64 {
    (world_seed as u64).wrapping_sub(id.seed_bits())
}

/// Coarse motion state of an agent, derived from its sub-states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MotionState {
    /// Within reach of the wandering target, counting down the dwell timer.
    WaitingAtTarget,
    /// Walking along a computed route.
    FollowingPath,
    /// Walking straight toward the target because no route is available.
    DirectMove,
    /// Lack of progress crossed the stuck threshold.
    StuckRecovering,
}

/// Destination the agent is currently wandering toward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WanderTarget {
    pub(crate) point: DVec2,
    pub(crate) remaining_wait: Duration,
    pub(crate) bonus_speed: f64,
}

impl WanderTarget {
    pub(crate) fn new(point: DVec2, wait: Duration, bonus_speed: f64) -> Self {
        Self {
            point,
            remaining_wait: wait,
            bonus_speed,
        }
    }

    /// Location of the target.
    #[must_use]
    pub fn point(&self) -> DVec2 {
        self.point
    }

    /// Dwell time left once the agent is within reach of the target.
    #[must_use]
    pub fn remaining_wait(&self) -> Duration {
        self.remaining_wait
    }

    /// Extra speed granted for this target on top of the agent's base speed.
    #[must_use]
    pub fn bonus_speed(&self) -> f64 {
        self.bonus_speed
    }
}

/// Route being followed and the index of the next waypoint.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathFollow {
    waypoints: Vec<DVec2>,
    next: usize,
}

impl PathFollow {
    pub(crate) fn adopt(&mut self, waypoints: Vec<DVec2>) {
        // The first waypoint is the position the search started from.
        self.next = usize::from(waypoints.len() > 1);
        self.waypoints = waypoints;
    }

    pub(crate) fn clear(&mut self) {
        self.waypoints.clear();
        self.next = 0;
    }

    pub(crate) fn current(&self) -> Option<DVec2> {
        self.waypoints.get(self.next).copied()
    }

    pub(crate) fn advance(&mut self) {
        self.next += 1;
    }

    /// Every waypoint of the route, including those already passed.
    #[must_use]
    pub fn waypoints(&self) -> &[DVec2] {
        &self.waypoints
    }

    /// Index of the waypoint the agent is heading toward.
    #[must_use]
    pub fn next_index(&self) -> usize {
        self.next
    }

    /// Reports whether waypoints remain to be visited.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.next < self.waypoints.len()
    }
}

/// Bookkeeping for detecting agents that stopped making progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StuckState {
    pub(crate) counter: u32,
    pub(crate) last_position: DVec2,
    pub(crate) last_replan_tick: Option<u64>,
    pub(crate) warned: bool,
}

impl StuckState {
    fn new(position: DVec2) -> Self {
        Self {
            counter: 0,
            last_position: position,
            last_replan_tick: None,
            warned: false,
        }
    }

    /// Forgets accumulated non-progress while keeping the replan cooldown.
    pub(crate) fn reset(&mut self, position: DVec2) {
        self.counter = 0;
        self.last_position = position;
        self.warned = false;
    }

    /// Consecutive ticks without meaningful displacement.
    #[must_use]
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Agent tick at which the last stuck-triggered replan was attempted.
    #[must_use]
    pub fn last_replan_tick(&self) -> Option<u64> {
        self.last_replan_tick
    }
}

/// Bounded history of completed wanders.
#[derive(Clone, Debug, PartialEq)]
pub struct WanderLog {
    events: VecDeque<WanderingEvent>,
    capacity: usize,
    last_wander_at: Duration,
}

impl WanderLog {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            last_wander_at: Duration::ZERO,
        }
    }

    pub(crate) fn record(&mut self, at: Duration, position: DVec2, target: DVec2) {
        let duration = at.saturating_sub(self.last_wander_at);
        self.last_wander_at = at;
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            let _ = self.events.pop_front();
        }
        self.events.push_back(WanderingEvent {
            at,
            position,
            target,
            duration,
        });
    }

    /// Recorded events, oldest first.
    pub fn events(&self) -> impl ExactSizeIterator<Item = &WanderingEvent> + '_ {
        self.events.iter()
    }

    /// Drops every recorded event.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// Autonomous point-agent wandering the arena.
///
/// The record groups its behavior state into plain sub-states: the wandering
/// target, the route being followed, stuck detection and the wander log. All
/// randomness comes from a private stream seeded from the world seed and the
/// agent identifier, so an agent's trajectory is reproducible on its own.
#[derive(Clone, Debug)]
pub struct Agent {
    pub(crate) id: AgentId,
    pub(crate) position: DVec2,
    pub(crate) velocity: DVec2,
    pub(crate) base_speed: f64,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) clock: Duration,
    pub(crate) ticks: u64,
    pub(crate) target: WanderTarget,
    pub(crate) path: PathFollow,
    pub(crate) stuck: StuckState,
    pub(crate) log: WanderLog,
    pub(crate) no_path: bool,
}

impl Agent {
    /// Creates an agent at `position` that starts out dwelling on its own position.
    #[must_use]
    pub fn new(id: AgentId, position: DVec2, world_seed: i64, config: &BehaviorConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(derive_agent_seed(world_seed, id));
        let base_speed = config.base_speed_min + rng.gen::<f64>() * config.base_speed_range;

        Self {
            id,
            position,
            velocity: DVec2::ZERO,
            base_speed,
            rng,
            clock: Duration::ZERO,
            ticks: 0,
            target: WanderTarget::new(position, config.dwell(), 0.0),
            path: PathFollow::default(),
            stuck: StuckState::new(position),
            log: WanderLog::with_capacity(config.event_log_capacity),
            no_path: false,
        }
    }

    pub(crate) fn place(&mut self, position: DVec2) {
        self.position = position;
        self.target.point = position;
        self.stuck.reset(position);
    }

    /// Identifier of the agent.
    #[must_use]
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> DVec2 {
        self.position
    }

    /// Velocity applied during the last tick.
    #[must_use]
    pub fn velocity(&self) -> DVec2 {
        self.velocity
    }

    /// Distance covered per tick before the per-target bonus is added.
    #[must_use]
    pub fn base_speed(&self) -> f64 {
        self.base_speed
    }

    /// Simulated time accumulated over the agent's ticks.
    #[must_use]
    pub fn clock(&self) -> Duration {
        self.clock
    }

    /// Number of ticks the agent has been advanced.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Current wandering target.
    #[must_use]
    pub fn target(&self) -> &WanderTarget {
        &self.target
    }

    /// Route the agent follows toward its target.
    #[must_use]
    pub fn path(&self) -> &PathFollow {
        &self.path
    }

    /// Stuck detection bookkeeping.
    #[must_use]
    pub fn stuck(&self) -> &StuckState {
        &self.stuck
    }

    /// Completed wanders.
    #[must_use]
    pub fn wander_log(&self) -> &WanderLog {
        &self.log
    }

    /// Mutable access to the completed wanders, used to drain the log.
    pub fn wander_log_mut(&mut self) -> &mut WanderLog {
        &mut self.log
    }

    /// Set when the last route request for the current target failed.
    #[must_use]
    pub fn no_path(&self) -> bool {
        self.no_path
    }

    /// Square footprint of side `size` anchored at the agent's position.
    #[must_use]
    pub fn footprint(&self, size: f64) -> Bounds {
        Bounds::from_origin_and_size(self.position, DVec2::splat(size))
    }

    /// Captures the broadcast representation of the agent.
    #[must_use]
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            position: self.position,
            velocity: self.velocity,
            path: self.path.waypoints().to_vec(),
            no_path: self.no_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> AgentId {
        AgentId::from_random_bytes([byte; 16])
    }

    #[test]
    fn seed_derivation_depends_on_world_seed_and_identifier() {
        assert_eq!(derive_agent_seed(42, id(1)), derive_agent_seed(42, id(1)));
        assert_ne!(derive_agent_seed(42, id(1)), derive_agent_seed(43, id(1)));
        assert_ne!(derive_agent_seed(42, id(1)), derive_agent_seed(42, id(2)));
    }

    #[test]
    fn new_agent_dwells_on_its_position() {
        let config = BehaviorConfig::default();
        let agent = Agent::new(id(3), DVec2::new(4.0, 6.0), 42, &config);

        assert_eq!(agent.target().point(), agent.position());
        assert_eq!(agent.target().remaining_wait(), config.dwell());
        assert!(agent.base_speed() >= config.base_speed_min);
        assert!(agent.base_speed() < config.base_speed_min + config.base_speed_range);
        assert!(!agent.path().is_active());
    }

    #[test]
    fn adopting_a_route_skips_its_start() {
        let mut follow = PathFollow::default();
        follow.adopt(vec![DVec2::ZERO, DVec2::new(2.0, 0.0)]);
        assert_eq!(follow.current(), Some(DVec2::new(2.0, 0.0)));

        follow.adopt(vec![DVec2::ONE]);
        assert_eq!(follow.current(), Some(DVec2::ONE));

        follow.advance();
        assert!(!follow.is_active());
        assert_eq!(follow.current(), None);
    }

    #[test]
    fn wander_log_is_bounded() {
        let mut log = WanderLog::with_capacity(2);
        for step in 1..=3_u64 {
            log.record(Duration::from_secs(step), DVec2::ZERO, DVec2::ONE);
        }

        let recorded: Vec<_> = log.events().map(|event| event.at).collect();
        assert_eq!(recorded, vec![Duration::from_secs(2), Duration::from_secs(3)]);
        assert!(log.events().all(|event| event.duration == Duration::from_secs(1)));

        log.clear();
        assert_eq!(log.events().len(), 0);
    }
}
