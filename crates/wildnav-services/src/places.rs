//! Place-of-safety search client (Overpass-style API).

use crate::fetch::{FetchError, ResilientClient};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use wildnav_core::models::{BoundingBox, GeoPoint, SafePlace, SafePlaceKind};

#[async_trait]
pub trait SafePlaceProvider: Send + Sync {
    /// Search a bounding box for security and ranger/forestry posts.
    async fn search(&self, bbox: BoundingBox) -> Result<Vec<SafePlace>, FetchError>;
}

pub struct OverpassClient {
    fetch: ResilientClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
struct Element {
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

impl OverpassClient {
    pub fn new(fetch: ResilientClient, base_url: impl Into<String>) -> Self {
        Self {
            fetch,
            base_url: base_url.into(),
        }
    }

    fn build_query(bbox: BoundingBox) -> String {
        // Overpass bbox order is (south, west, north, east).
        let bbox = format!(
            "{},{},{},{}",
            bbox.min_lat, bbox.min_lon, bbox.max_lat, bbox.max_lon
        );
        format!(
            "[out:json][timeout:25];(node[\"amenity\"=\"police\"]({bbox});node[\"amenity\"=\"ranger_station\"]({bbox});node[\"office\"=\"forestry\"]({bbox}););out body;"
        )
    }
}

fn classify(tags: &HashMap<String, String>) -> Option<SafePlaceKind> {
    match tags.get("amenity").map(String::as_str) {
        Some("police") => return Some(SafePlaceKind::SecurityPost),
        Some("ranger_station") => return Some(SafePlaceKind::RangerPost),
        _ => {}
    }
    if tags.get("office").map(String::as_str) == Some("forestry") {
        return Some(SafePlaceKind::RangerPost);
    }
    None
}

#[async_trait]
impl SafePlaceProvider for OverpassClient {
    async fn search(&self, bbox: BoundingBox) -> Result<Vec<SafePlace>, FetchError> {
        let url = format!("{}/api/interpreter", self.base_url);
        let query = Self::build_query(bbox);
        let response: OverpassResponse =
            self.fetch.post_form(&url, &[("data", query)]).await?;

        let places = response
            .elements
            .into_iter()
            .filter_map(|element| {
                let (lat, lon) = (element.lat?, element.lon?);
                let kind = classify(&element.tags)?;
                Some(SafePlace {
                    point: GeoPoint::new(lat, lon),
                    kind,
                    name: element.tags.get("name").cloned(),
                    address: element.tags.get("addr:full").cloned(),
                    opening_hours: element.tags.get("opening_hours").cloned(),
                    phone: element.tags.get("phone").cloned(),
                })
            })
            .collect();

        Ok(places)
    }
}
