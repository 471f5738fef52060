//! Planar geometry over raw (latitude, longitude) pairs.
//!
//! Latitude and longitude are treated as Cartesian coordinates. That is only
//! acceptable at the scale of a single route edit; callers needing real
//! distances must not use these degree-unit results for anything but
//! comparisons.

/// Projects `p` onto the segment `a`-`b` and returns the nearest point on the
/// segment together with the Euclidean distance (in degree units) from `p`.
///
/// The projection parameter is clamped to `[0, 1]`, so the result is always on
/// the segment. A degenerate segment (`a == b`) yields `a`.
pub fn nearest_point_on_segment(
    p: (f64, f64),
    a: (f64, f64),
    b: (f64, f64),
) -> ((f64, f64), f64) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length_squared = dx * dx + dy * dy;

    let t = if length_squared == 0.0 {
        0.0
    } else {
        let raw = ((p.0 - a.0) * dx + (p.1 - a.1) * dy) / length_squared;
        raw.clamp(0.0, 1.0)
    };

    let nearest = (a.0 + t * dx, a.1 + t * dy);
    let distance = ((p.0 - nearest.0).powi(2) + (p.1 - nearest.1).powi(2)).sqrt();
    (nearest, distance)
}

/// Returns the indices of all points inside the closed axis-aligned rectangle
/// spanned by the two corners. The corners may be given in any order; bounds
/// are normalized per axis and all edges are inclusive.
pub fn points_in_bounding_box(
    points: &[(f64, f64)],
    corner_1: (f64, f64),
    corner_2: (f64, f64),
) -> Vec<usize> {
    let (min_lat, max_lat) = (corner_1.0.min(corner_2.0), corner_1.0.max(corner_2.0));
    let (min_lon, max_lon) = (corner_1.1.min(corner_2.1), corner_1.1.max(corner_2.1));

    points
        .iter()
        .enumerate()
        .filter(|(_, p)| {
            p.0 >= min_lat && p.0 <= max_lat && p.1 >= min_lon && p.1 <= max_lon
        })
        .map(|(index, _)| index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_onto_segment_interior() {
        let ((lat, lon), distance) =
            nearest_point_on_segment((5.0, 1.0), (0.0, 0.0), (10.0, 0.0));
        assert!((lat - 5.0).abs() < 1e-12);
        assert!(lon.abs() < 1e-12);
        assert!((distance - 1.0).abs() < 1e-12);
    }

    #[test]
    fn midpoint_on_segment_has_zero_distance() {
        let (nearest, distance) =
            nearest_point_on_segment((0.0, 5.0), (0.0, 0.0), (0.0, 10.0));
        assert_eq!(nearest, (0.0, 5.0));
        assert_eq!(distance, 0.0);
    }

    #[test]
    fn clamps_to_segment_start() {
        let (nearest, distance) =
            nearest_point_on_segment((5.0, -5.0), (0.0, 0.0), (0.0, 10.0));
        assert_eq!(nearest, (0.0, 0.0));
        assert!((distance - 50.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn degenerate_segment_yields_endpoint() {
        let (nearest, distance) =
            nearest_point_on_segment((3.0, 4.0), (0.0, 0.0), (0.0, 0.0));
        assert_eq!(nearest, (0.0, 0.0));
        assert!((distance - 5.0).abs() < 1e-12);
    }

    #[test]
    fn bounding_box_is_inclusive_and_order_independent() {
        let points = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)];
        let inside = points_in_bounding_box(&points, (2.0, 2.0), (1.0, 1.0));
        assert_eq!(inside, vec![1, 2]);
    }

    #[test]
    fn bounding_box_of_nothing_is_empty() {
        assert!(points_in_bounding_box(&[], (0.0, 0.0), (1.0, 1.0)).is_empty());
    }
}
