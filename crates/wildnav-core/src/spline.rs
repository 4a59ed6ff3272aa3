//! Cardinal spline smoothing for predicted movement paths.

use crate::models::GeoPoint;

/// Interpolate a Catmull-Rom style cardinal spline through an ordered
/// list of waypoints.
///
/// The curve passes exactly through every input waypoint: the first
/// and last waypoints are duplicated as phantom control points, and the
/// final emitted point is forced equal to the last input so no
/// floating-point drift accumulates at the terminus.
///
/// `substeps` is the number of points emitted per segment; `tension`
/// in [0, 1] controls tightness (1.0 degenerates to straight lines).
/// Fewer than two waypoints are returned unchanged.
pub fn smooth_path(waypoints: &[GeoPoint], substeps: usize, tension: f64) -> Vec<GeoPoint> {
    if waypoints.len() < 2 {
        return waypoints.to_vec();
    }

    let substeps = substeps.max(1);
    let s = (1.0 - tension.clamp(0.0, 1.0)) / 2.0;

    // Phantom end controls: [first, w0, .., wn, last].
    let mut control = Vec::with_capacity(waypoints.len() + 2);
    control.push(waypoints[0]);
    control.extend_from_slice(waypoints);
    control.push(waypoints[waypoints.len() - 1]);

    let mut out = Vec::with_capacity((waypoints.len() - 1) * substeps + 1);
    out.push(waypoints[0]);

    for seg in 0..waypoints.len() - 1 {
        let p0 = control[seg];
        let p1 = control[seg + 1];
        let p2 = control[seg + 2];
        let p3 = control[seg + 3];

        let m1 = (
            s * (p2.lat - p0.lat),
            s * (p2.lon - p0.lon),
        );
        let m2 = (
            s * (p3.lat - p1.lat),
            s * (p3.lon - p1.lon),
        );

        for step in 1..=substeps {
            let t = step as f64 / substeps as f64;
            let t2 = t * t;
            let t3 = t2 * t;

            let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
            let h10 = t3 - 2.0 * t2 + t;
            let h01 = -2.0 * t3 + 3.0 * t2;
            let h11 = t3 - t2;

            out.push(GeoPoint::new(
                h00 * p1.lat + h10 * m1.0 + h01 * p2.lat + h11 * m2.0,
                h00 * p1.lon + h10 * m1.1 + h01 * p2.lon + h11 * m2.1,
            ));
        }
    }

    // Exact terminus.
    let last = out.len() - 1;
    out[last] = waypoints[waypoints.len() - 1];
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon)
    }

    #[test]
    fn short_inputs_are_returned_unchanged() {
        assert!(smooth_path(&[], 8, 0.5).is_empty());
        let single = [p(11.0, 76.0)];
        assert_eq!(smooth_path(&single, 8, 0.5), single.to_vec());
    }

    #[test]
    fn curve_starts_and_ends_exactly_at_input_endpoints() {
        let wps = [p(11.0, 76.0), p(11.2, 76.3), p(11.5, 76.1)];
        let curve = smooth_path(&wps, 10, 0.5);
        assert_eq!(curve[0], wps[0]);
        assert_eq!(*curve.last().unwrap(), wps[2]);
    }

    #[test]
    fn curve_passes_through_interior_waypoints() {
        let wps = [p(0.0, 0.0), p(1.0, 1.0), p(2.0, 0.0), p(3.0, 1.0)];
        let curve = smooth_path(&wps, 4, 0.5);
        for wp in &wps {
            let hit = curve
                .iter()
                .any(|c| (c.lat - wp.lat).abs() < 1e-9 && (c.lon - wp.lon).abs() < 1e-9);
            assert!(hit, "waypoint {wp:?} missing from curve");
        }
    }

    #[test]
    fn point_count_matches_substeps() {
        let wps = [p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0)];
        let curve = smooth_path(&wps, 6, 0.5);
        assert_eq!(curve.len(), 2 * 6 + 1);
    }

    #[test]
    fn deterministic_for_identical_input() {
        let wps = [p(0.0, 0.0), p(0.5, 0.7), p(1.2, 0.4)];
        assert_eq!(smooth_path(&wps, 8, 0.3), smooth_path(&wps, 8, 0.3));
    }
}
