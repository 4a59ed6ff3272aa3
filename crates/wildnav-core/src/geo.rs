//! Spherical geometry for routing and live progress tracking.

use crate::models::GeoPoint;

pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Samples without improvement before the nearest-point scan gives up.
pub const NEAREST_STALL_LIMIT: usize = 30;
/// How far behind the last matched index the scan is allowed to start.
pub const NEAREST_BACK_BUFFER: usize = 20;

/// Great-circle distance in kilometers (haversine).
///
/// Uses the `0.5 - cos/2` form rather than `sin^2(d/2)` so small deltas
/// do not cancel near the antipodes.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let dphi = (b.lat - a.lat).to_radians();
    let dlambda = (b.lon - a.lon).to_radians();

    let h = 0.5 - dphi.cos() / 2.0 + phi1.cos() * phi2.cos() * (0.5 - dlambda.cos() / 2.0);
    2.0 * EARTH_RADIUS_KM * h.max(0.0).sqrt().clamp(-1.0, 1.0).asin()
}

/// Geodesic midpoint via spherical interpolation, not the arithmetic
/// mean of the coordinates.
pub fn midpoint(a: GeoPoint, b: GeoPoint) -> GeoPoint {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let lambda1 = a.lon.to_radians();
    let dlambda = (b.lon - a.lon).to_radians();

    let bx = phi2.cos() * dlambda.cos();
    let by = phi2.cos() * dlambda.sin();

    let phi_m = (phi1.sin() + phi2.sin()).atan2(((phi1.cos() + bx).powi(2) + by * by).sqrt());
    let lambda_m = lambda1 + by.atan2(phi1.cos() + bx);
    let lambda_m = (lambda_m + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI)
        - std::f64::consts::PI;

    GeoPoint::new(phi_m.to_degrees(), lambda_m.to_degrees())
}

/// Initial bearing from `a` to `b` in radians (0 = north, pi/2 = east).
pub fn bearing(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let dlambda = (b.lon - a.lon).to_radians();

    let x = dlambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();

    x.atan2(y)
}

/// Destination point given start, distance and bearing on the sphere.
pub fn destination_point(origin: GeoPoint, distance_km: f64, bearing_rad: f64) -> GeoPoint {
    if distance_km.abs() <= f64::EPSILON {
        return origin;
    }

    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lon.to_radians();
    let angular = distance_km / EARTH_RADIUS_KM;

    let sin_lat1 = lat1.sin();
    let cos_lat1 = lat1.cos();
    let sin_ad = angular.sin();
    let cos_ad = angular.cos();

    let sin_lat2 = sin_lat1 * cos_ad + cos_lat1 * sin_ad * bearing_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = bearing_rad.sin() * sin_ad * cos_lat1;
    let x = cos_ad - sin_lat1 * sin_lat2;
    let mut lon2 = lon1 + y.atan2(x);
    lon2 =
        (lon2 + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI) - std::f64::consts::PI;

    GeoPoint::new(lat2.to_degrees(), lon2.to_degrees())
}

/// Kilometers per degree of latitude at a given latitude (WGS84 approximation).
pub fn km_per_deg_lat(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    (111_132.954 - 559.822 * (2.0 * lat_rad).cos() + 1.175 * (4.0 * lat_rad).cos()
        - 0.0023 * (6.0 * lat_rad).cos())
        / 1000.0
}

/// Kilometers per degree of longitude at a given latitude (WGS84 approximation).
pub fn km_per_deg_lon(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    (111_412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos() + 0.118 * (5.0 * lat_rad).cos())
        / 1000.0
}

/// Vertex ordering for polygon rings handed to an external service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordOrder {
    /// `[lon, lat]` pairs (GeoJSON / Valhalla exclude_polygons).
    LonLat,
    /// `[lat, lon]` pairs.
    LatLon,
}

/// Closed ring of `vertices` points approximating a circle of
/// `radius_km` around `center`. The first vertex is repeated as the
/// last to close the ring, so the result has `vertices + 1` entries.
pub fn circle_polygon(
    center: GeoPoint,
    radius_km: f64,
    vertices: usize,
    order: CoordOrder,
) -> Vec<[f64; 2]> {
    let vertices = vertices.max(3);
    let mut ring = Vec::with_capacity(vertices + 1);
    for i in 0..vertices {
        let theta = 2.0 * std::f64::consts::PI * (i as f64) / (vertices as f64);
        let p = destination_point(center, radius_km, theta);
        ring.push(match order {
            CoordOrder::LonLat => [p.lon, p.lat],
            CoordOrder::LatLon => [p.lat, p.lon],
        });
    }
    ring.push(ring[0]);
    ring
}

/// Sum of consecutive great-circle distances along a path.
pub fn path_length_km(path: &[GeoPoint]) -> f64 {
    path.windows(2).map(|w| distance_km(w[0], w[1])).sum()
}

/// Result of a nearest-vertex search along a path.
#[derive(Debug, Clone)]
pub struct NearestPoint {
    /// Index of the closest path vertex found.
    pub index: usize,
    /// Distance from the query point to that vertex, in kilometers.
    pub distance_km: f64,
    /// Sub-path from the matched vertex to the end, with the query
    /// point prepended.
    pub remaining: Vec<GeoPoint>,
}

/// Find the path vertex closest to `point`, scanning forward from
/// `max(0, search_start - NEAREST_BACK_BUFFER)`.
///
/// The scan stops once the running minimum has failed to improve for
/// `NEAREST_STALL_LIMIT` consecutive samples. That trades global
/// optimality for resilience on self-intersecting routes: a
/// geographically close but topologically distant loop segment must
/// not capture the match and make progress jump.
pub fn nearest_point_on_path(
    point: GeoPoint,
    path: &[GeoPoint],
    search_start: usize,
) -> Option<NearestPoint> {
    if path.is_empty() {
        return None;
    }

    let from = search_start.saturating_sub(NEAREST_BACK_BUFFER).min(path.len() - 1);
    let mut best_index = from;
    let mut best_distance = f64::INFINITY;
    let mut stalled = 0usize;

    for (index, vertex) in path.iter().enumerate().skip(from) {
        let d = distance_km(point, *vertex);
        if d < best_distance {
            best_distance = d;
            best_index = index;
            stalled = 0;
        } else {
            stalled += 1;
            if stalled >= NEAREST_STALL_LIMIT {
                break;
            }
        }
    }

    let mut remaining = Vec::with_capacity(path.len() - best_index + 1);
    remaining.push(point);
    remaining.extend_from_slice(&path[best_index..]);

    Some(NearestPoint {
        index: best_index,
        distance_km: best_distance,
        remaining,
    })
}

/// Linear scan for the minimum-distance candidate. None when empty.
pub fn nearest_of<'a, T>(
    point: GeoPoint,
    candidates: &'a [T],
    position: impl Fn(&T) -> GeoPoint,
) -> Option<(&'a T, f64)> {
    let mut best: Option<(&T, f64)> = None;
    for candidate in candidates {
        let d = distance_km(point, position(candidate));
        match best {
            Some((_, current)) if current <= d => {}
            _ => best = Some((candidate, d)),
        }
    }
    best
}

/// Minimum perpendicular distance from a point to a polyline, in
/// kilometers. Segments are projected into a local tangent plane
/// around the segment start; adequate at the few-km scales the
/// arbiter annotates hazards at.
pub fn distance_to_path_km(point: GeoPoint, path: &[GeoPoint]) -> f64 {
    if path.is_empty() {
        return f64::INFINITY;
    }
    if path.len() == 1 {
        return distance_km(point, path[0]);
    }

    let mut min = f64::INFINITY;
    for w in path.windows(2) {
        min = min.min(distance_to_segment_km(point, w[0], w[1]));
    }
    min
}

fn distance_to_segment_km(point: GeoPoint, a: GeoPoint, b: GeoPoint) -> f64 {
    let ref_lat = a.lat;
    let kx = km_per_deg_lon(ref_lat);
    let ky = km_per_deg_lat(ref_lat);

    let px = (point.lon - a.lon) * kx;
    let py = (point.lat - a.lat) * ky;
    let sx = (b.lon - a.lon) * kx;
    let sy = (b.lat - a.lat) * ky;

    let seg_len_sq = sx * sx + sy * sy;
    if seg_len_sq < 1e-12 {
        return (px * px + py * py).sqrt();
    }

    let t = ((px * sx + py * sy) / seg_len_sq).clamp(0.0, 1.0);
    let dx = px - t * sx;
    let dy = py - t * sy;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon)
    }

    #[test]
    fn distance_known_value() {
        // ~111.19 km per degree of latitude at the equator.
        let d = distance_km(p(0.0, 0.0), p(1.0, 0.0));
        assert!((d - 111.19).abs() < 0.1, "got {d}");
    }

    #[test]
    fn distance_is_symmetric_and_zero_at_identity() {
        let a = p(11.41, 76.7);
        let b = p(12.3, 75.9);
        assert_eq!(distance_km(a, a), 0.0);
        assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-9);
        assert!(distance_km(a, b) > 0.0);
    }

    #[test]
    fn distance_triangle_inequality() {
        let a = p(11.0, 76.0);
        let b = p(11.5, 76.5);
        let c = p(12.0, 76.2);
        assert!(distance_km(a, c) <= distance_km(a, b) + distance_km(b, c) + 1e-9);
    }

    #[test]
    fn midpoint_is_equidistant() {
        let a = p(10.0, 75.0);
        let b = p(12.0, 78.0);
        let m = midpoint(a, b);
        let da = distance_km(a, m);
        let db = distance_km(b, m);
        assert!((da - db).abs() < 1e-6, "da={da} db={db}");
    }

    #[test]
    fn destination_point_round_trips_distance() {
        let origin = p(11.0, 76.0);
        let dest = destination_point(origin, 5.0, 1.1);
        assert!((distance_km(origin, dest) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn circle_polygon_ring_is_closed_and_on_radius() {
        let center = p(11.0, 76.0);
        let ring = circle_polygon(center, 2.0, 24, CoordOrder::LatLon);
        assert_eq!(ring.len(), 25);
        assert_eq!(ring.first(), ring.last());
        for v in &ring[..24] {
            let d = distance_km(center, p(v[0], v[1]));
            assert!(d >= 2.0 * 0.999 && d <= 2.0 * 1.001, "vertex at {d} km");
        }
    }

    #[test]
    fn circle_polygon_respects_coordinate_order() {
        let center = p(45.0, 10.0);
        let lonlat = circle_polygon(center, 1.0, 8, CoordOrder::LonLat);
        let latlon = circle_polygon(center, 1.0, 8, CoordOrder::LatLon);
        assert!((lonlat[0][0] - latlon[0][1]).abs() < 1e-12);
        assert!((lonlat[0][1] - latlon[0][0]).abs() < 1e-12);
    }

    #[test]
    fn nearest_of_empty_is_none() {
        let empty: [GeoPoint; 0] = [];
        assert!(nearest_of(p(0.0, 0.0), &empty, |c| *c).is_none());
    }

    #[test]
    fn nearest_of_picks_minimum() {
        let candidates = [p(11.0, 76.0), p(11.5, 76.0), p(12.0, 76.0)];
        let (found, d) = nearest_of(p(11.45, 76.0), &candidates, |c| *c).unwrap();
        assert_eq!(found.lat, 11.5);
        assert!(d < 10.0);
    }

    /// A route that loops back near its own start must not capture the
    /// match once the traveler is past the loop.
    #[test]
    fn nearest_point_prefers_forward_segment_on_looping_path() {
        // Straight out along the equator, then a long detour, then back
        // right next to the start before continuing.
        let mut path = Vec::new();
        for i in 0..60 {
            path.push(p(0.0, 0.001 * i as f64));
        }
        for i in 0..60 {
            path.push(p(0.01, 0.059 - 0.001 * i as f64));
        }
        // Returning leg passes close to vertex 1.
        for i in 0..60 {
            path.push(p(0.0002, 0.001 * i as f64));
        }

        // Laterally closer to the outbound leg than to the returning leg.
        let query = p(0.00005, 0.0015);
        // Traveler is already on the returning leg.
        let result = nearest_point_on_path(query, &path, 121).unwrap();
        assert!(
            result.index >= 120,
            "matched early-loop vertex {} instead of the forward leg",
            result.index
        );
        assert_eq!(result.remaining[0], query);
    }

    #[test]
    fn nearest_point_searches_back_buffer() {
        let path: Vec<GeoPoint> = (0..100).map(|i| p(0.0, 0.001 * i as f64)).collect();
        let query = p(0.0, 0.0455);
        // Search start slightly ahead of the true match; the back
        // buffer must still find vertex 45 or 46.
        let result = nearest_point_on_path(query, &path, 60).unwrap();
        assert!(result.index == 45 || result.index == 46, "got {}", result.index);
    }

    #[test]
    fn path_length_sums_segments() {
        let path = [p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0)];
        let len = path_length_km(&path);
        assert!((len - 2.0 * 111.19).abs() < 0.3);
    }

    #[test]
    fn distance_to_path_uses_perpendicular_projection() {
        // Point abeam the middle of a straight east-west segment.
        let path = [p(0.0, 0.0), p(0.0, 1.0)];
        let d = distance_to_path_km(p(0.1, 0.5), &path);
        assert!((d - 11.12).abs() < 0.1, "got {d}");
    }
}
