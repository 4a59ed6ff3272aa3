//! Forward and reverse geocoding client (Nominatim-style API).

use crate::fetch::{FetchError, ResilientClient};
use serde::Deserialize;
use thiserror::Error;
use wildnav_core::models::{CoordinateError, GeoPoint, Location};

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("no geocoding result for {0:?}")]
    NoResult(String),
}

pub struct GeocodeClient {
    fetch: ResilientClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResult {
    display_name: String,
}

impl GeocodeClient {
    pub fn new(fetch: ResilientClient, base_url: impl Into<String>) -> Self {
        Self {
            fetch,
            base_url: base_url.into(),
        }
    }

    /// Free-text search. Returns ranked candidates; the first entry is
    /// the resolved location.
    pub async fn forward(&self, query: &str) -> Result<Vec<Location>, GeocodeError> {
        let url = format!("{}/search", self.base_url);
        let results: Vec<SearchResult> = self
            .fetch
            .get_json(
                &url,
                &[
                    ("q", query.to_string()),
                    ("format", "jsonv2".to_string()),
                    ("limit", "5".to_string()),
                ],
            )
            .await?;

        let mut candidates = Vec::with_capacity(results.len());
        for result in results {
            let lat: f64 = result
                .lat
                .parse()
                .map_err(|_| FetchError::Malformed(format!("bad latitude {:?}", result.lat)))?;
            let lon: f64 = result
                .lon
                .parse()
                .map_err(|_| FetchError::Malformed(format!("bad longitude {:?}", result.lon)))?;
            let point = GeoPoint::new(lat, lon);
            point.validate()?;
            candidates.push(Location::new(point, result.display_name));
        }

        if candidates.is_empty() {
            return Err(GeocodeError::NoResult(query.to_string()));
        }
        Ok(candidates)
    }

    /// Resolve a coordinate to a display name. Out-of-range input
    /// fails the call; it is never clamped.
    pub async fn reverse(&self, point: GeoPoint) -> Result<Location, GeocodeError> {
        point.validate()?;

        let url = format!("{}/reverse", self.base_url);
        let result: ReverseResult = self
            .fetch
            .get_json(
                &url,
                &[
                    ("lat", point.lat.to_string()),
                    ("lon", point.lon.to_string()),
                    ("format", "jsonv2".to_string()),
                ],
            )
            .await?;

        Ok(Location::new(point, result.display_name))
    }
}
