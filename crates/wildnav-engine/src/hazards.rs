//! Hazard forecasting: sightings in, predicted movement out.

use crate::config::EngineConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use wildnav_core::geo;
use wildnav_core::models::{BoundingBox, GeoPoint, HazardPrediction, Sighting, Species};
use wildnav_core::predict::{self, MovementModel};
use wildnav_services::occurrence::SightingProvider;

/// Runs the movement model over every tracked species in a search
/// area. Degrades to an empty prediction set when the occurrence
/// service is unavailable; downstream treats "no predictions" as "no
/// avoidance needed", never as an error.
pub struct HazardForecaster {
    sightings: Arc<dyn SightingProvider>,
    model: Arc<dyn MovementModel + Send + Sync>,
    manual: Mutex<HashMap<Species, Vec<Sighting>>>,
    seq_len: usize,
    sighting_limit: usize,
    spline_substeps: usize,
    spline_tension: f64,
}

impl HazardForecaster {
    pub fn new(
        sightings: Arc<dyn SightingProvider>,
        model: Arc<dyn MovementModel + Send + Sync>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            sightings,
            model,
            manual: Mutex::new(HashMap::new()),
            seq_len: config.seq_len,
            sighting_limit: config.sighting_limit,
            spline_substeps: config.spline_substeps,
            spline_tension: config.spline_tension,
        }
    }

    /// Log a manually reported sighting. Manual entries take
    /// precedence over fetched observations at the head of the merged
    /// history.
    pub fn log_manual_sighting(&self, species: Species, sighting: Sighting) {
        if let Ok(mut manual) = self.manual.lock() {
            let entries = manual.entry(species).or_default();
            entries.insert(0, sighting);
            entries.truncate(self.seq_len);
        }
    }

    /// Predict movement for every species with sightings around
    /// `center` within `radius_km`.
    pub async fn forecast(&self, center: GeoPoint, radius_km: f64) -> Vec<HazardPrediction> {
        let bbox = search_bbox(center, radius_km);
        let mut predictions = Vec::new();

        for species in Species::ALL {
            let observed = match self
                .sightings
                .recent_sightings(species, bbox, self.sighting_limit)
                .await
            {
                Ok(observed) => observed,
                Err(err) => {
                    // Absence of a hazard is a valid output; an outage
                    // must not become a planning error.
                    tracing::warn!(
                        species = species.info().common_name,
                        "occurrence lookup failed, returning no predictions: {err}"
                    );
                    return Vec::new();
                }
            };

            let manual = self
                .manual
                .lock()
                .map(|manual| manual.get(&species).cloned().unwrap_or_default())
                .unwrap_or_default();

            let history = predict::merge_sightings(&observed, &manual, self.seq_len);
            if let Some(prediction) = predict::build_prediction(
                format!("hazard-{}", species.info().icon),
                species,
                &history,
                center,
                self.model.as_ref(),
                self.spline_substeps,
                self.spline_tension,
            ) {
                predictions.push(prediction);
            }
        }

        predictions
    }
}

fn search_bbox(center: GeoPoint, radius_km: f64) -> BoundingBox {
    let lat_deg = radius_km / geo::km_per_deg_lat(center.lat);
    let lon_deg = radius_km / geo::km_per_deg_lon(center.lat).max(1e-9);
    BoundingBox {
        min_lat: center.lat - lat_deg,
        min_lon: center.lon - lon_deg,
        max_lat: center.lat + lat_deg,
        max_lon: center.lon + lon_deg,
    }
}
