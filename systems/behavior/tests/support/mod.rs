//! Obstacle arena for integration tests.
//!
//! The world crate depends on this crate, so the real `World` cannot serve as
//! a dev-dependency here. Keep this file identical to
//! `systems/pathfinding/tests/support/mod.rs` apart from this header.

use wanderers_core::{Bounds, DVec2, WorldQuery};

/// Arena with static rectangles rasterized onto unit cells, mirroring how the
/// world's spatial index answers occupancy queries.
pub struct Arena {
    width: f64,
    height: f64,
    obstacles: Vec<Bounds>,
}

impl Arena {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            obstacles: Vec::new(),
        }
    }

    pub fn with_obstacle(mut self, min_x: f64, min_z: f64, max_x: f64, max_z: f64) -> Self {
        self.obstacles.push(Bounds::new(min_x, min_z, max_x, max_z));
        self
    }

    pub fn walled_box(self, min: f64, max: f64, thickness: f64) -> Self {
        self.with_obstacle(min, min, max, min + thickness)
            .with_obstacle(min, max - thickness, max, max)
            .with_obstacle(min, min, min + thickness, max)
            .with_obstacle(max - thickness, min, max, max)
    }
}

impl WorldQuery for Arena {
    fn is_point_blocked(&self, point: DVec2) -> bool {
        let cell_x = point.x.floor();
        let cell_z = point.y.floor();
        self.obstacles.iter().any(|bounds| {
            let min = bounds.min();
            let max = bounds.max();
            cell_x >= min.x.floor()
                && cell_x <= max.x.ceil() - 1.0
                && cell_z >= min.y.floor()
                && cell_z <= max.y.ceil() - 1.0
        })
    }

    fn random_float(&self) -> f64 {
        0.5
    }

    fn world_seed(&self) -> i64 {
        42
    }

    fn boundaries(&self) -> (f64, f64) {
        (self.width, self.height)
    }
}
