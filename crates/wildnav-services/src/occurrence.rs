//! Species occurrence lookup client (GBIF-style API).

use crate::fetch::{FetchError, ResilientClient};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use wildnav_core::models::{BoundingBox, GeoPoint, Sighting, Species};

#[async_trait]
pub trait SightingProvider: Send + Sync {
    /// Recent observations of one species inside a bounding box,
    /// most recent first.
    async fn recent_sightings(
        &self,
        species: Species,
        bbox: BoundingBox,
        limit: usize,
    ) -> Result<Vec<Sighting>, FetchError>;
}

pub struct OccurrenceClient {
    fetch: ResilientClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OccurrenceResponse {
    results: Vec<Occurrence>,
}

#[derive(Debug, Deserialize)]
struct Occurrence {
    #[serde(rename = "decimalLatitude")]
    lat: Option<f64>,
    #[serde(rename = "decimalLongitude")]
    lon: Option<f64>,
    #[serde(rename = "eventDate")]
    event_date: Option<String>,
    #[serde(default)]
    media: Vec<Media>,
}

#[derive(Debug, Deserialize)]
struct Media {
    identifier: Option<String>,
}

impl OccurrenceClient {
    pub fn new(fetch: ResilientClient, base_url: impl Into<String>) -> Self {
        Self {
            fetch,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SightingProvider for OccurrenceClient {
    async fn recent_sightings(
        &self,
        species: Species,
        bbox: BoundingBox,
        limit: usize,
    ) -> Result<Vec<Sighting>, FetchError> {
        let url = format!("{}/v1/occurrence/search", self.base_url);
        let response: OccurrenceResponse = self
            .fetch
            .get_json(
                &url,
                &[
                    ("scientificName", species.info().scientific_name.to_string()),
                    (
                        "decimalLatitude",
                        format!("{},{}", bbox.min_lat, bbox.max_lat),
                    ),
                    (
                        "decimalLongitude",
                        format!("{},{}", bbox.min_lon, bbox.max_lon),
                    ),
                    ("limit", limit.to_string()),
                    ("sort", "eventDate,desc".to_string()),
                ],
            )
            .await?;

        let sightings = response
            .results
            .into_iter()
            .filter_map(|occurrence| {
                let (lat, lon) = (occurrence.lat?, occurrence.lon?);
                Some(Sighting {
                    point: GeoPoint::new(lat, lon),
                    observed_at: occurrence
                        .event_date
                        .as_deref()
                        .and_then(parse_event_date),
                    image_url: occurrence
                        .media
                        .into_iter()
                        .find_map(|media| media.identifier),
                })
            })
            .collect();

        Ok(sightings)
    }
}

/// Occurrence event dates come in several shapes: full RFC 3339, a
/// naive local timestamp, or a bare date. Dates the parser does not
/// recognize are dropped rather than failing the record.
fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return parsed.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occurrence_parse_skips_entries_without_coordinates() {
        let json = r#"{"results":[
            {"decimalLatitude":11.4,"decimalLongitude":76.7,"media":[{"identifier":"http://img/1.jpg"}]},
            {"decimalLatitude":null,"decimalLongitude":76.7},
            {}
        ]}"#;
        let parsed: OccurrenceResponse = serde_json::from_str(json).unwrap();
        let usable: Vec<_> = parsed
            .results
            .into_iter()
            .filter(|o| o.lat.is_some() && o.lon.is_some())
            .collect();
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].media[0].identifier.as_deref(), Some("http://img/1.jpg"));
    }

    #[test]
    fn event_dates_parse_in_all_published_shapes() {
        assert!(parse_event_date("2024-05-01T10:00:00Z").is_some());
        assert!(parse_event_date("2024-05-01T10:00:00").is_some());
        assert!(parse_event_date("2024-05-01").is_some());
        assert!(parse_event_date("May 2024").is_none());
    }
}
