//! Uniform hash-bucketed grid tracking which obstacles and agents overlap each cell.

use std::collections::{BTreeSet, HashMap, HashSet};

use thiserror::Error;
use wanderers_core::{AgentId, Bounds, DVec2, ObstacleId};

/// Errors raised while configuring the spatial index.
#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    /// Cell size must be positive and finite.
    #[error("spatial cell size must be positive and finite, got {0}")]
    InvalidCellSize(f64),
}

/// Identifier stored in a spatial cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Occupant {
    /// Static obstacle; blocks movement.
    Obstacle(ObstacleId),
    /// Agent; never blocks movement.
    Agent(AgentId),
}

/// Layer of the index a query inspects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Permanent obstacle memberships.
    Obstacles,
    /// Agent memberships rebuilt every tick.
    Agents,
}

#[derive(Clone, Debug, Default)]
struct Cell {
    obstacles: HashSet<ObstacleId>,
    agents: HashSet<AgentId>,
}

impl Cell {
    fn is_empty(&self) -> bool {
        self.obstacles.is_empty() && self.agents.is_empty()
    }
}

/// Packs a 2-D cell coordinate into a single map key.
fn pack(column: i32, row: i32) -> i64 {
    (i64::from(column) << 32) | i64::from(row as u32)
}

/// Sparse uniform grid over world coordinates.
///
/// Obstacle membership is permanent until a full reset, while the agent layer
/// is cleared and rebuilt by the world on every tick. Queries outside any
/// populated cell report free space: the arena edges are not implicitly solid.
#[derive(Clone, Debug)]
pub struct SpatialIndex {
    cell_size: f64,
    cells: HashMap<i64, Cell>,
}

impl SpatialIndex {
    /// Creates an empty index with square cells of `cell_size` world units.
    pub fn new(cell_size: f64) -> Result<Self, IndexError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(IndexError::InvalidCellSize(cell_size));
        }

        Ok(Self {
            cell_size,
            cells: HashMap::new(),
        })
    }

    /// Side length of a cell.
    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of cells holding at least one occupant.
    #[must_use]
    pub fn populated_cells(&self) -> usize {
        self.cells.len()
    }

    /// Registers `occupant` in every cell overlapped by the half-open rectangle.
    ///
    /// Degenerate rectangles still occupy the cell containing their minimum corner.
    pub fn insert(&mut self, occupant: Occupant, bounds: Bounds) {
        let (first_column, first_row) = self.cell_of(bounds.min());
        let last_column = self.last_cell(bounds.max().x).max(first_column);
        let last_row = self.last_cell(bounds.max().y).max(first_row);

        for column in first_column..=last_column {
            for row in first_row..=last_row {
                let cell = self.cells.entry(pack(column, row)).or_default();
                let _ = match occupant {
                    Occupant::Obstacle(id) => cell.obstacles.insert(id),
                    Occupant::Agent(id) => cell.agents.insert(id),
                };
            }
        }
    }

    /// Empties the agent layer, and the obstacle layer too when `include_obstacles` is set.
    pub fn clear(&mut self, include_obstacles: bool) {
        if include_obstacles {
            self.cells.clear();
            return;
        }

        self.cells.retain(|_, cell| {
            cell.agents.clear();
            !cell.is_empty()
        });
    }

    /// Reports whether the cell containing `point` holds an obstacle.
    #[must_use]
    pub fn is_point_blocked(&self, point: DVec2) -> bool {
        let (column, row) = self.cell_of(point);
        self.cells
            .get(&pack(column, row))
            .is_some_and(|cell| !cell.obstacles.is_empty())
    }

    /// Collects the occupants of `layer` in the 3×3 block of cells around `point`.
    #[must_use]
    pub fn nearby(&self, point: DVec2, layer: Layer) -> BTreeSet<Occupant> {
        let (column, row) = self.cell_of(point);
        let mut found = BTreeSet::new();

        for offset_column in -1..=1 {
            for offset_row in -1..=1 {
                let key = pack(
                    column.saturating_add(offset_column),
                    row.saturating_add(offset_row),
                );
                let Some(cell) = self.cells.get(&key) else {
                    continue;
                };
                match layer {
                    Layer::Obstacles => {
                        found.extend(cell.obstacles.iter().copied().map(Occupant::Obstacle));
                    }
                    Layer::Agents => found.extend(cell.agents.iter().copied().map(Occupant::Agent)),
                }
            }
        }

        found
    }

    fn cell_of(&self, point: DVec2) -> (i32, i32) {
        (
            (point.x / self.cell_size).floor() as i32,
            (point.y / self.cell_size).floor() as i32,
        )
    }

    fn last_cell(&self, max: f64) -> i32 {
        ((max / self.cell_size).ceil() as i32).saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obstacle(byte: u8) -> ObstacleId {
        ObstacleId::from_random_bytes([byte; 16])
    }

    fn agent(byte: u8) -> AgentId {
        AgentId::from_random_bytes([byte; 16])
    }

    #[test]
    fn rejects_invalid_cell_sizes() {
        assert_eq!(SpatialIndex::new(0.0).err(), Some(IndexError::InvalidCellSize(0.0)));
        assert!(SpatialIndex::new(-1.0).is_err());
        assert!(SpatialIndex::new(f64::NAN).is_err());
    }

    #[test]
    fn obstacle_covers_half_open_cells() {
        let mut index = SpatialIndex::new(1.0).expect("valid cell size");
        index.insert(Occupant::Obstacle(obstacle(1)), Bounds::new(10.0, 10.0, 20.0, 20.0));

        assert!(index.is_point_blocked(DVec2::new(10.0, 10.0)));
        assert!(index.is_point_blocked(DVec2::new(19.99, 19.99)));
        assert!(!index.is_point_blocked(DVec2::new(20.0, 15.0)));
        assert!(!index.is_point_blocked(DVec2::new(9.99, 15.0)));
        assert_eq!(index.populated_cells(), 100);
    }

    #[test]
    fn agents_never_block() {
        let mut index = SpatialIndex::new(1.0).expect("valid cell size");
        index.insert(Occupant::Agent(agent(1)), Bounds::new(3.0, 3.0, 4.0, 4.0));

        assert!(!index.is_point_blocked(DVec2::new(3.5, 3.5)));
        assert!(index
            .nearby(DVec2::new(3.5, 3.5), Layer::Agents)
            .contains(&Occupant::Agent(agent(1))));
    }

    #[test]
    fn clearing_keeps_obstacles_unless_requested() {
        let mut index = SpatialIndex::new(2.0).expect("valid cell size");
        index.insert(Occupant::Obstacle(obstacle(1)), Bounds::new(0.0, 0.0, 2.0, 2.0));
        index.insert(Occupant::Agent(agent(1)), Bounds::new(1.0, 1.0, 2.0, 2.0));
        index.insert(Occupant::Agent(agent(2)), Bounds::new(9.0, 9.0, 10.0, 10.0));

        index.clear(false);
        assert!(index.is_point_blocked(DVec2::new(1.0, 1.0)));
        assert!(index.nearby(DVec2::new(1.0, 1.0), Layer::Agents).is_empty());
        assert_eq!(index.populated_cells(), 1);

        index.clear(true);
        assert!(!index.is_point_blocked(DVec2::new(1.0, 1.0)));
        assert_eq!(index.populated_cells(), 0);
    }

    #[test]
    fn nearby_scans_the_surrounding_block() {
        let mut index = SpatialIndex::new(1.0).expect("valid cell size");
        index.insert(Occupant::Obstacle(obstacle(1)), Bounds::new(6.0, 6.0, 7.0, 7.0));
        index.insert(Occupant::Obstacle(obstacle(2)), Bounds::new(8.0, 5.0, 9.0, 6.0));

        let around = index.nearby(DVec2::new(5.5, 5.5), Layer::Obstacles);
        assert_eq!(around.len(), 1);
        assert!(around.contains(&Occupant::Obstacle(obstacle(1))));
        assert!(index.nearby(DVec2::new(5.5, 5.5), Layer::Agents).is_empty());
    }

    #[test]
    fn negative_coordinates_use_floor() {
        let mut index = SpatialIndex::new(1.0).expect("valid cell size");
        index.insert(Occupant::Obstacle(obstacle(1)), Bounds::new(-1.0, -1.0, 0.0, 0.0));

        assert!(index.is_point_blocked(DVec2::new(-0.5, -0.5)));
        assert!(!index.is_point_blocked(DVec2::new(0.5, 0.5)));
    }
}
