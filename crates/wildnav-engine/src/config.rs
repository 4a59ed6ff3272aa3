//! Engine configuration from environment.
//!
//! The trade-off thresholds (`safe_duration_ratio`,
//! `safe_duration_margin_min`) and the avoidance shrink divisor are
//! heuristics with no derivation from first principles; they are kept
//! configurable so they can be calibrated against real routing-service
//! behavior.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub routing_url: String,
    pub geocode_url: String,
    pub weather_url: String,
    pub overpass_url: String,
    pub occurrence_url: String,

    /// Human-perception hazard alert radius, km.
    pub hazard_radius_km: f64,
    /// The avoidance footprint handed to the routing service is the
    /// alert radius divided by this.
    pub avoidance_shrink_divisor: f64,
    /// Safer route accepted when its duration is below
    /// `direct * ratio` ...
    pub safe_duration_ratio: f64,
    /// ... and below `direct + margin` minutes.
    pub safe_duration_margin_min: f64,

    /// Minimum hazard search radius around the route midpoint, km.
    pub base_search_radius_km: f64,
    /// Search radius is `max(base, half-distance * factor)`.
    pub search_radius_factor: f64,
    /// Corridor buffer for the safe-place query, km.
    pub safe_place_buffer_km: f64,

    /// Live distance at which a near-route hazard raises an alert, km.
    pub hazard_alert_km: f64,
    /// Distance-to-start above which the session counts as still
    /// approaching the route, km.
    pub approach_threshold_km: f64,
    /// Minimum interval between weather checks.
    pub weather_poll: Duration,

    /// Sightings kept per species.
    pub seq_len: usize,
    /// Spline density for predicted movement paths.
    pub spline_substeps: usize,
    pub spline_tension: f64,
    /// Occurrence records requested per species.
    pub sighting_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            routing_url: "https://valhalla1.openstreetmap.de".to_string(),
            geocode_url: "https://nominatim.openstreetmap.org".to_string(),
            weather_url: "https://api.open-meteo.com".to_string(),
            overpass_url: "https://overpass-api.de".to_string(),
            occurrence_url: "https://api.gbif.org".to_string(),
            hazard_radius_km: 2.0,
            avoidance_shrink_divisor: 10.0,
            safe_duration_ratio: 2.5,
            safe_duration_margin_min: 120.0,
            base_search_radius_km: 25.0,
            search_radius_factor: 1.25,
            safe_place_buffer_km: 5.0,
            hazard_alert_km: 2.0,
            approach_threshold_km: 0.5,
            weather_poll: Duration::from_secs(300),
            seq_len: wildnav_core::predict::SEQ_LEN,
            spline_substeps: 12,
            spline_tension: 0.5,
            sighting_limit: 20,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            routing_url: env_or("WILDNAV_ROUTING_URL", defaults.routing_url),
            geocode_url: env_or("WILDNAV_GEOCODE_URL", defaults.geocode_url),
            weather_url: env_or("WILDNAV_WEATHER_URL", defaults.weather_url),
            overpass_url: env_or("WILDNAV_OVERPASS_URL", defaults.overpass_url),
            occurrence_url: env_or("WILDNAV_OCCURRENCE_URL", defaults.occurrence_url),
            hazard_radius_km: env_parsed("WILDNAV_HAZARD_RADIUS_KM", defaults.hazard_radius_km),
            avoidance_shrink_divisor: env_parsed(
                "WILDNAV_AVOIDANCE_SHRINK",
                defaults.avoidance_shrink_divisor,
            ),
            safe_duration_ratio: env_parsed("WILDNAV_SAFE_RATIO", defaults.safe_duration_ratio),
            safe_duration_margin_min: env_parsed(
                "WILDNAV_SAFE_MARGIN_MIN",
                defaults.safe_duration_margin_min,
            ),
            base_search_radius_km: env_parsed(
                "WILDNAV_BASE_SEARCH_RADIUS_KM",
                defaults.base_search_radius_km,
            ),
            search_radius_factor: env_parsed(
                "WILDNAV_SEARCH_RADIUS_FACTOR",
                defaults.search_radius_factor,
            ),
            safe_place_buffer_km: env_parsed(
                "WILDNAV_SAFE_PLACE_BUFFER_KM",
                defaults.safe_place_buffer_km,
            ),
            hazard_alert_km: env_parsed("WILDNAV_HAZARD_ALERT_KM", defaults.hazard_alert_km),
            approach_threshold_km: env_parsed(
                "WILDNAV_APPROACH_THRESHOLD_KM",
                defaults.approach_threshold_km,
            ),
            weather_poll: Duration::from_secs(env_parsed(
                "WILDNAV_WEATHER_POLL_SECS",
                defaults.weather_poll.as_secs(),
            )),
            ..defaults
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test owns its variable names; the process environment is
    // shared across test threads.
    #[test]
    fn heuristics_are_overridable_from_env() {
        env::set_var("WILDNAV_HAZARD_ALERT_KM", "3.5");
        env::set_var("WILDNAV_APPROACH_THRESHOLD_KM", "1.0");
        env::set_var("WILDNAV_BASE_SEARCH_RADIUS_KM", "40");
        let config = EngineConfig::from_env();
        assert!((config.hazard_alert_km - 3.5).abs() < 1e-12);
        assert!((config.approach_threshold_km - 1.0).abs() < 1e-12);
        assert!((config.base_search_radius_km - 40.0).abs() < 1e-12);
        env::remove_var("WILDNAV_HAZARD_ALERT_KM");
        env::remove_var("WILDNAV_APPROACH_THRESHOLD_KM");
        env::remove_var("WILDNAV_BASE_SEARCH_RADIUS_KM");
    }

    #[test]
    fn unparseable_value_falls_back_to_default() {
        env::set_var("WILDNAV_SAFE_PLACE_BUFFER_KM", "five");
        let config = EngineConfig::from_env();
        assert!((config.safe_place_buffer_km - EngineConfig::default().safe_place_buffer_km).abs() < 1e-12);
        env::remove_var("WILDNAV_SAFE_PLACE_BUFFER_KM");
    }
}
