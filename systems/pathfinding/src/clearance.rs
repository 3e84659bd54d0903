//! Radial probes that keep points a safe distance away from obstacles.

use std::f64::consts::TAU;

use wanderers_core::{DVec2, WorldQuery};

/// Points sampled on the ring when testing clearance around a candidate.
pub const CLEARANCE_SAMPLES: usize = 8;

const PROBE_ANGLES: usize = 16;
const PROBE_ATTEMPTS: usize = 5;
const PROBE_GROWTH: f64 = 0.1;

/// Reports whether `point` is free and every sample on a ring of `radius`
/// around it is free as well.
pub fn has_clearance<Q>(query: &Q, point: DVec2, radius: f64) -> bool
where
    Q: WorldQuery + ?Sized,
{
    if query.is_point_blocked(point) {
        return false;
    }

    ring(point, radius, CLEARANCE_SAMPLES).all(|sample| !query.is_point_blocked(sample))
}

/// Searches outward from `point` for an in-bounds position with `offset` clearance.
///
/// Rings start at `offset` and widen by a small increment per attempt; the
/// first qualifying sample in angular order wins.
pub fn find_clear_position<Q>(query: &Q, point: DVec2, offset: f64) -> Option<DVec2>
where
    Q: WorldQuery + ?Sized,
{
    (0..PROBE_ATTEMPTS)
        .map(|attempt| offset + attempt as f64 * PROBE_GROWTH)
        .flat_map(|distance| ring(point, distance, PROBE_ANGLES))
        .find(|candidate| query.in_bounds(*candidate) && has_clearance(query, *candidate, offset))
}

fn ring(center: DVec2, radius: f64, samples: usize) -> impl Iterator<Item = DVec2> {
    (0..samples).map(move |index| {
        let angle = index as f64 * TAU / samples as f64;
        center + DVec2::new(angle.cos(), angle.sin()) * radius
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Wall {
        min_x: f64,
    }

    impl WorldQuery for Wall {
        fn is_point_blocked(&self, point: DVec2) -> bool {
            point.x >= self.min_x
        }

        fn random_float(&self) -> f64 {
            0.0
        }

        fn world_seed(&self) -> i64 {
            0
        }

        fn boundaries(&self) -> (f64, f64) {
            (100.0, 100.0)
        }
    }

    #[test]
    fn clearance_fails_next_to_wall() {
        let wall = Wall { min_x: 10.0 };
        assert!(!has_clearance(&wall, DVec2::new(9.5, 5.0), 1.0));
        assert!(has_clearance(&wall, DVec2::new(8.5, 5.0), 1.0));
    }

    #[test]
    fn probe_moves_point_away_from_wall() {
        let wall = Wall { min_x: 10.0 };
        let start = DVec2::new(9.5, 5.0);
        let found = find_clear_position(&wall, start, 1.0).expect("clear position");
        assert!(has_clearance(&wall, found, 1.0));
        assert!(found.distance(start) >= 1.0 - 1e-9);
    }

    #[test]
    fn probe_gives_up_when_everything_is_blocked() {
        let wall = Wall { min_x: -1.0 };
        assert!(find_clear_position(&wall, DVec2::new(5.0, 5.0), 1.0).is_none());
    }
}
