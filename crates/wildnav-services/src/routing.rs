//! Routing service client (Valhalla-style API).

use crate::fetch::{FetchError, ResilientClient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wildnav_core::geo::CoordOrder;
use wildnav_core::models::{AvoidanceZone, Location, Route, TravelMode};
use wildnav_core::polyline;
use wildnav_core::validate::PlausibilityRules;

/// Shape precision used by the routing service's encoded polylines.
const SHAPE_PRECISION: u32 = 6;
/// Vertices per avoidance polygon ring.
const POLYGON_VERTICES: usize = 18;

/// Valhalla error codes that mean "no path exists", as opposed to a
/// malformed request: unconnected regions (170), no suitable edges
/// near a location (171), breakage distance exceeded (172), and no
/// path found (442).
const NO_PATH_ERROR_CODES: [u32; 4] = [170, 171, 172, 442];

/// Error body shape Valhalla sends with a 400.
#[derive(Debug, Deserialize)]
struct ServiceError {
    error_code: u32,
}

/// Whether a 400 body carries one of the documented no-path codes.
fn is_no_path_rejection(body: &str) -> bool {
    serde_json::from_str::<ServiceError>(body)
        .map(|err| NO_PATH_ERROR_CODES.contains(&err.error_code))
        .unwrap_or(false)
}

/// Seam between the engine and the routing service.
///
/// `Ok(None)` means the service answered but the result failed
/// plausibility checks or no path exists ("service said no safe
/// path"); `Err` means the service was unreachable or spoke garbage.
/// Callers must be able to tell the two apart.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn request_route(
        &self,
        start: &Location,
        end: &Location,
        mode: TravelMode,
        avoidance: &[AvoidanceZone],
    ) -> Result<Option<Route>, FetchError>;
}

/// HTTP client for a Valhalla-compatible routing endpoint.
pub struct RoutingClient {
    fetch: ResilientClient,
    base_url: String,
    rules: PlausibilityRules,
}

#[derive(Debug, Serialize)]
struct RouteRequest {
    locations: [RequestLocation; 2],
    costing: &'static str,
    units: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    exclude_polygons: Vec<Vec<[f64; 2]>>,
}

#[derive(Debug, Serialize)]
struct RequestLocation {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    trip: Option<Trip>,
}

#[derive(Debug, Deserialize)]
struct Trip {
    legs: Vec<Leg>,
    summary: Summary,
}

#[derive(Debug, Deserialize)]
struct Leg {
    shape: String,
}

#[derive(Debug, Deserialize)]
struct Summary {
    /// Kilometers (units=kilometers in the request).
    length: f64,
    /// Seconds.
    time: f64,
}

impl RoutingClient {
    pub fn new(fetch: ResilientClient, base_url: impl Into<String>, rules: PlausibilityRules) -> Self {
        Self {
            fetch,
            base_url: base_url.into(),
            rules,
        }
    }
}

#[async_trait]
impl RouteProvider for RoutingClient {
    async fn request_route(
        &self,
        start: &Location,
        end: &Location,
        mode: TravelMode,
        avoidance: &[AvoidanceZone],
    ) -> Result<Option<Route>, FetchError> {
        let url = format!("{}/route", self.base_url);

        // Valhalla expects exclude_polygons as [lon, lat] rings.
        let exclude_polygons = avoidance
            .iter()
            .map(|zone| zone.to_polygon(POLYGON_VERTICES, CoordOrder::LonLat))
            .collect();

        let request = RouteRequest {
            locations: [
                RequestLocation {
                    lat: start.point.lat,
                    lon: start.point.lon,
                },
                RequestLocation {
                    lat: end.point.lat,
                    lon: end.point.lon,
                },
            ],
            costing: mode.costing(),
            units: "kilometers",
            exclude_polygons,
        };

        let response: RouteResponse = match self.fetch.post_json(&url, &request).await {
            Ok(response) => response,
            // "No path found" comes back as a 400 from Valhalla, but
            // so does a malformed request. Only the documented no-path
            // error codes count as an answer.
            Err(FetchError::Rejected { status, body })
                if status == 400 && is_no_path_rejection(&body) =>
            {
                tracing::debug!(status, "routing service found no path: {body}");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let Some(trip) = response.trip else {
            return Ok(None);
        };

        let mut path = Vec::new();
        for leg in &trip.legs {
            let decoded = polyline::decode(&leg.shape, SHAPE_PRECISION)
                .map_err(|err| FetchError::Malformed(err.to_string()))?;
            path.extend(decoded);
        }

        let route = Route {
            path,
            distance_km: trip.summary.length,
            duration_min: trip.summary.time / 60.0,
            start: start.clone(),
            end: end.clone(),
            mode,
            high_risk: false,
        };

        if !self
            .rules
            .is_route_reasonable(&route, start.point, end.point)
        {
            tracing::warn!(
                mode = mode.label(),
                distance_km = route.distance_km,
                duration_min = route.duration_min,
                "discarding implausible route"
            );
            return Ok(None);
        }

        Ok(Some(route))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_valhalla_shape() {
        let request = RouteRequest {
            locations: [
                RequestLocation { lat: 11.0, lon: 76.0 },
                RequestLocation { lat: 11.1, lon: 76.2 },
            ],
            costing: TravelMode::Bike.costing(),
            units: "kilometers",
            exclude_polygons: vec![vec![[76.0, 11.0], [76.01, 11.0], [76.0, 11.0]]],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["costing"], "bicycle");
        assert_eq!(json["exclude_polygons"][0][0][0], 76.0);
        assert_eq!(json["locations"][1]["lat"], 11.1);
    }

    #[test]
    fn no_path_error_code_is_a_rejection() {
        let body = r#"{"error_code":442,"error":"No path could be found for input","status_code":400}"#;
        assert!(is_no_path_rejection(body));
    }

    #[test]
    fn malformed_request_400_is_not_a_rejection() {
        // Bad costing string; a client-side bug, not "no path".
        let body = r#"{"error_code":125,"error":"No costing method found","status_code":400}"#;
        assert!(!is_no_path_rejection(body));
        // A non-JSON body is never a no-path answer either.
        assert!(!is_no_path_rejection("Bad Request"));
    }

    #[test]
    fn empty_avoidance_is_omitted_from_request() {
        let request = RouteRequest {
            locations: [
                RequestLocation { lat: 0.0, lon: 0.0 },
                RequestLocation { lat: 1.0, lon: 1.0 },
            ],
            costing: "auto",
            units: "kilometers",
            exclude_polygons: Vec::new(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("exclude_polygons").is_none());
    }
}
