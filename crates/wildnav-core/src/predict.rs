//! Animal movement prediction from sighting history.
//!
//! Deliberately a cheap, explainable heuristic, not a trained model.
//! The `MovementModel` trait is the substitution point for anything
//! better; callers never depend on the concrete model.

use crate::geo;
use crate::models::{GeoPoint, HazardPrediction, Sighting, Species};
use crate::spline;
use rand::Rng;

/// Maximum sightings kept per species after merging.
pub const SEQ_LEN: usize = 8;

/// Predicts a short forward path from an ordered sighting history
/// (index 0 = most recent).
pub trait MovementModel {
    /// Returns 0-2 future waypoints for the given history.
    fn predict(&self, sightings: &[Sighting]) -> Vec<GeoPoint>;
}

/// Reference implementation: mean displacement vector between
/// consecutive sightings, extrapolated forward.
#[derive(Debug, Clone)]
pub struct DisplacementModel {
    /// Number of forward steps to extrapolate.
    pub steps: usize,
    /// Displacement radius used when only one sighting exists and the
    /// direction is unknown ("nearby, direction unknown").
    pub lone_jitter_km: f64,
}

impl Default for DisplacementModel {
    fn default() -> Self {
        Self {
            steps: 2,
            lone_jitter_km: 0.3,
        }
    }
}

impl MovementModel for DisplacementModel {
    fn predict(&self, sightings: &[Sighting]) -> Vec<GeoPoint> {
        let Some(current) = sightings.first() else {
            return Vec::new();
        };

        if sightings.len() < 2 {
            // Direction unknown: emit a small pseudo-random displacement
            // rather than no prediction at all.
            let mut rng = rand::rng();
            let bearing = rng.random_range(0.0..std::f64::consts::TAU);
            let distance = rng.random_range(0.05..self.lone_jitter_km.max(0.06));
            return vec![geo::destination_point(current.point, distance, bearing)];
        }

        // Mean displacement oldest -> newest.
        let ordered: Vec<GeoPoint> = sightings.iter().rev().map(|s| s.point).collect();
        let hops = (ordered.len() - 1) as f64;
        let mut dlat = 0.0;
        let mut dlon = 0.0;
        for w in ordered.windows(2) {
            dlat += w[1].lat - w[0].lat;
            dlon += w[1].lon - w[0].lon;
        }
        dlat /= hops;
        dlon /= hops;

        let mut waypoints = Vec::with_capacity(self.steps);
        let mut last = current.point;
        for _ in 0..self.steps {
            last = GeoPoint::new(last.lat + dlat, last.lon + dlon);
            waypoints.push(last);
        }
        waypoints
    }
}

/// Merge freshly observed sightings with locally logged manual entries.
/// Manual entries take precedence at the head of the list; the merged
/// list is re-truncated to `seq_len`.
pub fn merge_sightings(observed: &[Sighting], manual: &[Sighting], seq_len: usize) -> Vec<Sighting> {
    let mut merged = Vec::with_capacity(seq_len);
    merged.extend(manual.iter().cloned());
    merged.extend(observed.iter().cloned());
    merged.truncate(seq_len);
    merged
}

/// Build the full prediction for one species: future waypoints plus a
/// smoothed path from the current position through them. Returns None
/// when there is no sighting to anchor the prediction.
pub fn build_prediction(
    id: impl Into<String>,
    species: Species,
    sightings: &[Sighting],
    reference: GeoPoint,
    model: &dyn MovementModel,
    substeps: usize,
    tension: f64,
) -> Option<HazardPrediction> {
    let current = sightings.first()?.clone();
    let waypoints = model.predict(sightings);

    let mut control = Vec::with_capacity(waypoints.len() + 1);
    control.push(current.point);
    control.extend_from_slice(&waypoints);
    let smoothed_path = spline::smooth_path(&control, substeps, tension);

    Some(HazardPrediction {
        id: id.into(),
        species,
        distance_km: geo::distance_km(reference, current.point),
        current,
        waypoints,
        smoothed_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sighting(lat: f64, lon: f64) -> Sighting {
        Sighting {
            point: GeoPoint::new(lat, lon),
            observed_at: None,
            image_url: None,
        }
    }

    #[test]
    fn no_sightings_yields_no_waypoints() {
        let model = DisplacementModel::default();
        assert!(model.predict(&[]).is_empty());
    }

    #[test]
    fn lone_sighting_yields_nearby_displacement() {
        let model = DisplacementModel::default();
        let history = [sighting(11.0, 76.0)];
        let waypoints = model.predict(&history);
        assert_eq!(waypoints.len(), 1);
        let d = geo::distance_km(history[0].point, waypoints[0]);
        assert!(d > 0.0 && d <= model.lone_jitter_km + 1e-9, "displaced {d} km");
    }

    #[test]
    fn mean_displacement_extrapolates_two_steps() {
        // Moving steadily north-east: newest first.
        let history = [
            sighting(11.02, 76.02),
            sighting(11.01, 76.01),
            sighting(11.00, 76.00),
        ];
        let model = DisplacementModel::default();
        let waypoints = model.predict(&history);
        assert_eq!(waypoints.len(), 2);
        assert!((waypoints[0].lat - 11.03).abs() < 1e-9);
        assert!((waypoints[0].lon - 76.03).abs() < 1e-9);
        assert!((waypoints[1].lat - 11.04).abs() < 1e-9);
        assert!((waypoints[1].lon - 76.04).abs() < 1e-9);
    }

    #[test]
    fn merge_puts_manual_entries_first_and_truncates() {
        let observed: Vec<Sighting> = (0..6).map(|i| sighting(11.0 + i as f64, 76.0)).collect();
        let manual = [sighting(20.0, 70.0), sighting(21.0, 70.0)];
        let merged = merge_sightings(&observed, &manual, 4);
        assert_eq!(merged.len(), 4);
        assert_eq!(merged[0].point.lat, 20.0);
        assert_eq!(merged[1].point.lat, 21.0);
        assert_eq!(merged[2].point.lat, 11.0);
    }

    #[test]
    fn prediction_smoothed_path_anchors_at_current_sighting() {
        let history = [
            sighting(11.01, 76.01),
            sighting(11.00, 76.00),
        ];
        let model = DisplacementModel::default();
        let prediction = build_prediction(
            "hz-1",
            Species::Elephant,
            &history,
            GeoPoint::new(11.0, 76.0),
            &model,
            8,
            0.5,
        )
        .unwrap();

        assert_eq!(prediction.smoothed_path[0], history[0].point);
        assert_eq!(
            *prediction.smoothed_path.last().unwrap(),
            *prediction.waypoints.last().unwrap()
        );
        assert_eq!(prediction.waypoints.len(), 2);
    }
}
