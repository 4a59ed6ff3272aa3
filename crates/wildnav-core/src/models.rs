//! Core data models for the wildnav system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Error)]
#[error("coordinate out of range: lat={lat}, lon={lon}")]
pub struct CoordinateError {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Validate WGS84 bounds. Out-of-range coordinates are an error,
    /// never silently clamped.
    pub fn validate(&self) -> Result<(), CoordinateError> {
        if (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon) {
            Ok(())
        } else {
            Err(CoordinateError {
                lat: self.lat,
                lon: self.lon,
            })
        }
    }
}

/// A geocoded place: coordinate plus display name.
///
/// Immutable once produced by geocoding; replaced, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub point: GeoPoint,
    pub name: String,
}

impl Location {
    pub fn new(point: GeoPoint, name: impl Into<String>) -> Self {
        Self {
            point,
            name: name.into(),
        }
    }
}

/// A single animal observation. Lists of sightings are ordered
/// most-recent-first (index 0 = latest).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sighting {
    pub point: GeoPoint,
    /// When the animal was observed, if the source recorded it.
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Hazard severity tier for a species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
    Severe,
}

/// Tracked species. A closed set resolved against a static metadata
/// table, not a free-text registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Elephant,
    Tiger,
    Leopard,
    SlothBear,
    Gaur,
    WildBoar,
}

/// Display and risk metadata for a species.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SpeciesInfo {
    pub common_name: &'static str,
    pub scientific_name: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    pub risk: RiskTier,
}

impl Species {
    pub const ALL: [Species; 6] = [
        Species::Elephant,
        Species::Tiger,
        Species::Leopard,
        Species::SlothBear,
        Species::Gaur,
        Species::WildBoar,
    ];

    pub fn info(&self) -> &'static SpeciesInfo {
        match self {
            Species::Elephant => &SpeciesInfo {
                common_name: "Asian Elephant",
                scientific_name: "Elephas maximus",
                icon: "elephant",
                color: "#6b7280",
                risk: RiskTier::Severe,
            },
            Species::Tiger => &SpeciesInfo {
                common_name: "Bengal Tiger",
                scientific_name: "Panthera tigris",
                icon: "tiger",
                color: "#f97316",
                risk: RiskTier::Severe,
            },
            Species::Leopard => &SpeciesInfo {
                common_name: "Indian Leopard",
                scientific_name: "Panthera pardus",
                icon: "leopard",
                color: "#eab308",
                risk: RiskTier::High,
            },
            Species::SlothBear => &SpeciesInfo {
                common_name: "Sloth Bear",
                scientific_name: "Melursus ursinus",
                icon: "bear",
                color: "#78350f",
                risk: RiskTier::High,
            },
            Species::Gaur => &SpeciesInfo {
                common_name: "Gaur",
                scientific_name: "Bos gaurus",
                icon: "gaur",
                color: "#1e3a5f",
                risk: RiskTier::Moderate,
            },
            Species::WildBoar => &SpeciesInfo {
                common_name: "Wild Boar",
                scientific_name: "Sus scrofa",
                icon: "boar",
                color: "#57534e",
                risk: RiskTier::Low,
            },
        }
    }
}

/// Travel mode for route requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Car,
    Bus,
    Bike,
    Walk,
}

impl TravelMode {
    pub const ALL: [TravelMode; 4] = [
        TravelMode::Car,
        TravelMode::Bus,
        TravelMode::Bike,
        TravelMode::Walk,
    ];

    /// Costing profile name used by the routing service.
    pub fn costing(&self) -> &'static str {
        match self {
            TravelMode::Car => "auto",
            TravelMode::Bus => "bus",
            TravelMode::Bike => "bicycle",
            TravelMode::Walk => "pedestrian",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TravelMode::Car => "car",
            TravelMode::Bus => "bus",
            TravelMode::Bike => "bike",
            TravelMode::Walk => "walk",
        }
    }
}

/// A vetted route returned by the broker. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub path: Vec<GeoPoint>,
    pub distance_km: f64,
    pub duration_min: f64,
    pub start: Location,
    pub end: Location,
    pub mode: TravelMode,
    /// Set when this route crosses known hazard zones and no acceptable
    /// safer alternative was found.
    pub high_risk: bool,
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl Route {
    /// Bounding box of the path, expanded by `buffer_km` on every side.
    /// Used for safe-place corridor queries.
    pub fn bounding_box(&self, buffer_km: f64) -> Option<BoundingBox> {
        let first = self.path.first()?;
        let mut bbox = BoundingBox {
            min_lat: first.lat,
            min_lon: first.lon,
            max_lat: first.lat,
            max_lon: first.lon,
        };
        for p in &self.path {
            bbox.min_lat = bbox.min_lat.min(p.lat);
            bbox.min_lon = bbox.min_lon.min(p.lon);
            bbox.max_lat = bbox.max_lat.max(p.lat);
            bbox.max_lon = bbox.max_lon.max(p.lon);
        }
        let mid_lat = (bbox.min_lat + bbox.max_lat) / 2.0;
        let lat_deg = buffer_km / crate::geo::km_per_deg_lat(mid_lat);
        let lon_deg = buffer_km / crate::geo::km_per_deg_lon(mid_lat).max(1e-9);
        bbox.min_lat -= lat_deg;
        bbox.max_lat += lat_deg;
        bbox.min_lon -= lon_deg;
        bbox.max_lon += lon_deg;
        Some(bbox)
    }
}

/// A hazard footprint the routing service should carve out:
/// a point plus radius, convertible to a closed polygon ring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AvoidanceZone {
    pub center: GeoPoint,
    pub radius_km: f64,
}

impl AvoidanceZone {
    /// Generate the closed ring for this zone. Coordinate order is an
    /// explicit per-call contract with the consuming service.
    pub fn to_polygon(&self, vertices: usize, order: crate::geo::CoordOrder) -> Vec<[f64; 2]> {
        crate::geo::circle_polygon(self.center, self.radius_km, vertices, order)
    }
}

/// Predicted movement for one species, produced once per prediction
/// cycle and replaced wholesale on the next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardPrediction {
    pub id: String,
    pub species: Species,
    pub current: Sighting,
    /// Distance from the prediction's reference point (search center).
    pub distance_km: f64,
    /// 0-2 predicted future positions, pre-smoothing.
    pub waypoints: Vec<GeoPoint>,
    /// Dense spline-interpolated curve through [current, ...waypoints].
    pub smoothed_path: Vec<GeoPoint>,
}

/// A hazard annotated with its perpendicular distance from a route path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteHazard {
    pub prediction: HazardPrediction,
    pub distance_from_route_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafePlaceKind {
    SecurityPost,
    RangerPost,
}

/// A place of safety sourced from external search; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafePlace {
    pub point: GeoPoint,
    pub kind: SafePlaceKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Progress snapshot derived on every position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavigationStats {
    pub remaining_km: f64,
    pub eta_min: f64,
    /// Rounded progress, clamped to [0, 100].
    pub percent: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::CoordOrder;

    #[test]
    fn geopoint_validate_rejects_out_of_range() {
        assert!(GeoPoint::new(91.0, 0.0).validate().is_err());
        assert!(GeoPoint::new(0.0, -180.5).validate().is_err());
        assert!(GeoPoint::new(-90.0, 180.0).validate().is_ok());
    }

    #[test]
    fn species_table_is_total() {
        for species in Species::ALL {
            let info = species.info();
            assert!(!info.common_name.is_empty());
            assert!(info.color.starts_with('#'));
        }
    }

    #[test]
    fn route_bounding_box_contains_path_with_buffer() {
        let route = Route {
            path: vec![GeoPoint::new(11.0, 76.0), GeoPoint::new(11.1, 76.2)],
            distance_km: 25.0,
            duration_min: 30.0,
            start: Location::new(GeoPoint::new(11.0, 76.0), "a"),
            end: Location::new(GeoPoint::new(11.1, 76.2), "b"),
            mode: TravelMode::Car,
            high_risk: false,
        };
        let bbox = route.bounding_box(1.0).unwrap();
        assert!(bbox.min_lat < 11.0 && bbox.max_lat > 11.1);
        assert!(bbox.min_lon < 76.0 && bbox.max_lon > 76.2);
    }

    #[test]
    fn empty_route_has_no_bounding_box() {
        let route = Route {
            path: Vec::new(),
            distance_km: 0.0,
            duration_min: 0.0,
            start: Location::new(GeoPoint::new(0.0, 0.0), "a"),
            end: Location::new(GeoPoint::new(0.0, 0.0), "b"),
            mode: TravelMode::Walk,
            high_risk: false,
        };
        assert!(route.bounding_box(1.0).is_none());
    }

    #[test]
    fn avoidance_zone_polygon_is_closed() {
        let zone = AvoidanceZone {
            center: GeoPoint::new(11.0, 76.0),
            radius_km: 0.5,
        };
        let ring = zone.to_polygon(16, CoordOrder::LonLat);
        assert_eq!(ring.len(), 17);
        assert_eq!(ring.first(), ring.last());
    }
}
