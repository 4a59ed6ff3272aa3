//! Route plausibility rules and thresholds.

use crate::geo;
use crate::models::{GeoPoint, Route, TravelMode};
use serde::{Deserialize, Serialize};

/// Plausibility thresholds applied to every route the broker accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlausibilityRules {
    /// Reject when route distance exceeds this multiple of the
    /// straight-line distance. Guards against degenerate detours when
    /// avoidance polygons overlap the destination.
    pub max_detour_ratio: f64,
    /// Plausible average speed band per mode, km/h.
    pub speed_bands: SpeedBands,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedBands {
    pub car: (f64, f64),
    pub bus: (f64, f64),
    pub bike: (f64, f64),
    pub walk: (f64, f64),
}

impl Default for PlausibilityRules {
    fn default() -> Self {
        Self {
            max_detour_ratio: 7.0,
            speed_bands: SpeedBands {
                car: (10.0, 120.0),
                bus: (10.0, 100.0),
                bike: (8.0, 35.0),
                walk: (2.0, 8.0),
            },
        }
    }
}

impl SpeedBands {
    pub fn for_mode(&self, mode: TravelMode) -> (f64, f64) {
        match mode {
            TravelMode::Car => self.car,
            TravelMode::Bus => self.bus,
            TravelMode::Bike => self.bike,
            TravelMode::Walk => self.walk,
        }
    }
}

impl PlausibilityRules {
    /// Sanity-check a route the service returned. A failing route is a
    /// semantic rejection, not a transport error; callers discard it.
    pub fn is_route_reasonable(&self, route: &Route, start: GeoPoint, end: GeoPoint) -> bool {
        let crow_km = geo::distance_km(start, end);
        if crow_km > 0.0 && route.distance_km > crow_km * self.max_detour_ratio {
            return false;
        }

        if route.duration_min <= 0.0 {
            return false;
        }
        let speed_kmh = route.distance_km / (route.duration_min / 60.0);
        let (min, max) = self.speed_bands.for_mode(route.mode);
        (min..=max).contains(&speed_kmh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;

    fn route(distance_km: f64, duration_min: f64, mode: TravelMode) -> Route {
        Route {
            path: Vec::new(),
            distance_km,
            duration_min,
            start: Location::new(GeoPoint::new(11.0, 76.0), "start"),
            end: Location::new(GeoPoint::new(11.0, 76.2), "end"),
            mode,
            high_risk: false,
        }
    }

    // ~21.8 km straight line.
    const START: GeoPoint = GeoPoint { lat: 11.0, lon: 76.0 };
    const END: GeoPoint = GeoPoint { lat: 11.0, lon: 76.2 };

    #[test]
    fn rejects_eightfold_detour() {
        let rules = PlausibilityRules::default();
        let crow = geo::distance_km(START, END);
        let detour = route(crow * 8.0, crow * 8.0, TravelMode::Car);
        assert!(!rules.is_route_reasonable(&detour, START, END));
    }

    #[test]
    fn accepts_mild_detour() {
        let rules = PlausibilityRules::default();
        let crow = geo::distance_km(START, END);
        // 1.3x detour at ~52 km/h.
        let ok = route(crow * 1.3, crow * 1.3 / 52.0 * 60.0, TravelMode::Car);
        assert!(rules.is_route_reasonable(&ok, START, END));
    }

    #[test]
    fn rejects_implausible_car_speed() {
        let rules = PlausibilityRules::default();
        // 200 km/h average.
        let too_fast = route(25.0, 25.0 / 200.0 * 60.0, TravelMode::Car);
        assert!(!rules.is_route_reasonable(&too_fast, START, END));
    }

    #[test]
    fn accepts_walking_pace() {
        let rules = PlausibilityRules::default();
        // 5 km/h over 22 km.
        let walk = route(22.0, 22.0 / 5.0 * 60.0, TravelMode::Walk);
        assert!(rules.is_route_reasonable(&walk, START, END));
    }

    #[test]
    fn rejects_zero_duration() {
        let rules = PlausibilityRules::default();
        assert!(!rules.is_route_reasonable(&route(10.0, 0.0, TravelMode::Car), START, END));
    }
}
