use wanderers_core::{DVec2, WorldQuery};

const SEGMENT_SAMPLES: [f64; 2] = [1.0 / 3.0, 2.0 / 3.0];

/// Checks that no waypoint of a route is blocked and that each segment is
/// clear at one third and two thirds of its length.
///
/// Empty routes are rejected.
pub fn validate_path<Q>(waypoints: &[DVec2], query: &Q) -> bool
where
    Q: WorldQuery + ?Sized,
{
    if waypoints.is_empty() {
        return false;
    }

    if waypoints.iter().any(|point| query.is_point_blocked(*point)) {
        return false;
    }

    waypoints.windows(2).all(|segment| {
        SEGMENT_SAMPLES
            .iter()
            .all(|t| !query.is_point_blocked(segment[0].lerp(segment[1], *t)))
    })
}
