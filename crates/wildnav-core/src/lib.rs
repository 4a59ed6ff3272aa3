pub mod geo;
pub mod models;
pub mod polyline;
pub mod predict;
pub mod spline;
pub mod validate;

pub use geo::{
    bearing, circle_polygon, destination_point, distance_km, distance_to_path_km, midpoint,
    nearest_of, nearest_point_on_path, path_length_km, CoordOrder, NearestPoint,
};
pub use models::{
    AvoidanceZone, BoundingBox, CoordinateError, GeoPoint, HazardPrediction, Location,
    NavigationStats, RiskTier, Route, RouteHazard, SafePlace, SafePlaceKind, Sighting, Species,
    SpeciesInfo, TravelMode,
};
pub use predict::{DisplacementModel, MovementModel, SEQ_LEN};
pub use spline::smooth_path;
pub use validate::PlausibilityRules;
