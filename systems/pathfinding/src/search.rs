//! A* search over a virtual grid laid on continuous coordinates.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
};

use wanderers_core::{DVec2, WorldQuery};

use crate::{clearance::has_clearance, Path, PathfinderConfig};

/// Quantization applied to node coordinates when deduplicating grid points.
const KEY_SCALE: f64 = 1_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct NodeKey(i64, i64);

impl NodeKey {
    fn of(point: DVec2) -> Self {
        Self(
            (point.x * KEY_SCALE).round() as i64,
            (point.y * KEY_SCALE).round() as i64,
        )
    }
}

#[derive(Clone, Copy, Debug)]
struct SearchNode {
    point: DVec2,
    cost: f64,
    parent: Option<usize>,
    closed: bool,
}

#[derive(Debug)]
struct OpenEntry {
    priority: f64,
    sequence: u64,
    node: usize,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the lowest priority, oldest entry first.
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// State of one search call; nothing survives past [`Search::run`].
pub(crate) struct Search<'a, Q: ?Sized> {
    config: &'a PathfinderConfig,
    goal: DVec2,
    clearance: f64,
    query: &'a Q,
    nodes: Vec<SearchNode>,
    lookup: HashMap<NodeKey, usize>,
    open: BinaryHeap<OpenEntry>,
    sequence: u64,
}

impl<'a, Q> Search<'a, Q>
where
    Q: WorldQuery + ?Sized,
{
    pub(crate) fn new(config: &'a PathfinderConfig, goal: DVec2, clearance: f64, query: &'a Q) -> Self {
        Self {
            config,
            goal,
            clearance,
            query,
            nodes: Vec::new(),
            lookup: HashMap::new(),
            open: BinaryHeap::new(),
            sequence: 0,
        }
    }

    pub(crate) fn run(mut self, start: DVec2) -> Option<Path> {
        let step = self.config.step;
        let start_index = self.open_node(start, 0.0, None);
        let mut best = start_index;
        let mut expansions = 0_usize;

        while expansions < self.config.max_expansions {
            let Some(entry) = self.open.pop() else {
                break;
            };
            let current = entry.node;
            if self.nodes[current].closed {
                continue;
            }
            expansions += 1;
            self.nodes[current].closed = true;

            let point = self.nodes[current].point;
            if self.heuristic(point) < self.heuristic(self.nodes[best].point) {
                best = current;
            }

            if point.distance(self.goal) < step {
                return Some(self.reconstruct(current));
            }

            self.expand(current);
        }

        let remaining = self.heuristic(self.nodes[best].point);
        if remaining < step * self.config.best_effort_steps {
            tracing::trace!(
                expansions,
                remaining,
                "returning best-effort route short of the goal"
            );
            return Some(self.reconstruct(best));
        }

        tracing::trace!(
            expansions,
            remaining,
            goal_x = self.goal.x,
            goal_z = self.goal.y,
            "search exhausted without reaching the goal"
        );
        None
    }

    fn expand(&mut self, current: usize) {
        let origin = self.nodes[current].point;
        let origin_cost = self.nodes[current].cost;

        for offset in self.directions() {
            let candidate = origin + offset;
            if !self.is_walkable(candidate) {
                continue;
            }

            let cost = origin_cost + origin.distance(candidate);
            match self.lookup.get(&NodeKey::of(candidate)).copied() {
                Some(existing) => {
                    let node = &self.nodes[existing];
                    if node.closed || cost >= node.cost {
                        continue;
                    }
                    let priority = cost + self.heuristic(node.point);
                    let node = &mut self.nodes[existing];
                    node.cost = cost;
                    node.parent = Some(current);
                    self.push_open(existing, priority);
                }
                None => {
                    let _ = self.open_node(candidate, cost, Some(current));
                }
            }
        }
    }

    fn directions(&self) -> [DVec2; 8] {
        let step = self.config.step;
        let diagonal = step * self.config.diagonal_scale;
        [
            DVec2::new(step, 0.0),
            DVec2::new(-step, 0.0),
            DVec2::new(0.0, step),
            DVec2::new(0.0, -step),
            DVec2::new(diagonal, diagonal),
            DVec2::new(-diagonal, diagonal),
            DVec2::new(diagonal, -diagonal),
            DVec2::new(-diagonal, -diagonal),
        ]
    }

    fn is_walkable(&self, point: DVec2) -> bool {
        if !self.query.in_bounds(point) || self.query.is_point_blocked(point) {
            return false;
        }

        has_clearance(self.query, point, self.clearance)
            || has_clearance(self.query, point, self.clearance * 0.5)
    }

    fn open_node(&mut self, point: DVec2, cost: f64, parent: Option<usize>) -> usize {
        let priority = cost + self.heuristic(point);
        let index = self.nodes.len();
        self.nodes.push(SearchNode {
            point,
            cost,
            parent,
            closed: false,
        });
        let _ = self.lookup.insert(NodeKey::of(point), index);
        self.push_open(index, priority);
        index
    }

    fn push_open(&mut self, node: usize, priority: f64) {
        self.open.push(OpenEntry {
            priority,
            sequence: self.sequence,
            node,
        });
        self.sequence += 1;
    }

    fn heuristic(&self, point: DVec2) -> f64 {
        point.distance(self.goal)
    }

    fn reconstruct(&self, last: usize) -> Path {
        let mut waypoints = Vec::new();
        let mut cursor = Some(last);
        while let Some(index) = cursor {
            let node = &self.nodes[index];
            waypoints.push(node.point);
            cursor = node.parent;
        }
        waypoints.reverse();
        Path::new(waypoints, self.nodes[last].cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Open;

    impl WorldQuery for Open {
        fn is_point_blocked(&self, _point: DVec2) -> bool {
            false
        }

        fn random_float(&self) -> f64 {
            0.0
        }

        fn world_seed(&self) -> i64 {
            0
        }

        fn boundaries(&self) -> (f64, f64) {
            (50.0, 50.0)
        }
    }

    #[test]
    fn open_entries_pop_lowest_priority_first() {
        let mut heap = BinaryHeap::new();
        heap.push(OpenEntry {
            priority: 3.0,
            sequence: 0,
            node: 0,
        });
        heap.push(OpenEntry {
            priority: 1.0,
            sequence: 1,
            node: 1,
        });
        heap.push(OpenEntry {
            priority: 1.0,
            sequence: 2,
            node: 2,
        });

        assert_eq!(heap.pop().map(|entry| entry.node), Some(1));
        assert_eq!(heap.pop().map(|entry| entry.node), Some(2));
        assert_eq!(heap.pop().map(|entry| entry.node), Some(0));
    }

    #[test]
    fn straight_route_in_open_arena() {
        let config = PathfinderConfig::default();
        let path = Search::new(&config, DVec2::new(20.0, 5.0), 1.0, &Open)
            .run(DVec2::new(5.0, 5.0))
            .expect("route in open arena");

        assert_eq!(path.waypoints().first().copied(), Some(DVec2::new(5.0, 5.0)));
        let last = path.waypoints().last().copied().expect("waypoints");
        assert!(last.distance(DVec2::new(20.0, 5.0)) < config.step);
        assert!((path.cost() - 14.0).abs() < 1e-9);
    }

    #[test]
    fn start_within_one_step_yields_single_waypoint() {
        let config = PathfinderConfig::default();
        let path = Search::new(&config, DVec2::new(5.5, 5.0), 1.0, &Open)
            .run(DVec2::new(5.0, 5.0))
            .expect("route");
        assert_eq!(path.waypoints(), &[DVec2::new(5.0, 5.0)]);
    }

    #[test]
    fn budget_exhaustion_falls_back_to_best_effort_within_tolerance() {
        let config = PathfinderConfig {
            max_expansions: 1,
            ..PathfinderConfig::default()
        };
        let start = DVec2::new(5.0, 5.0);

        let near = Search::new(&config, DVec2::new(9.0, 5.0), 1.0, &Open).run(start);
        assert_eq!(near.map(|path| path.len()), Some(1));

        let far = Search::new(&config, DVec2::new(30.0, 5.0), 1.0, &Open).run(start);
        assert!(far.is_none());
    }
}
