//! Route arbitration: direct versus hazard-avoiding alternative.

use crate::config::EngineConfig;
use crate::hazards::HazardForecaster;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use wildnav_core::geo;
use wildnav_core::models::{
    AvoidanceZone, HazardPrediction, Location, Route, RouteHazard, SafePlace, TravelMode,
};
use wildnav_services::fetch::FetchError;
use wildnav_services::places::SafePlaceProvider;
use wildnav_services::routing::RouteProvider;

#[derive(Debug, Error)]
pub enum PlanError {
    /// The routing service answered but found no usable direct route.
    /// There is no plan without this baseline.
    #[error("no direct route found from {start:?} to {end:?}")]
    NoDirectRoute { start: String, end: String },
    /// The routing service could not be reached at all.
    #[error("routing service unavailable")]
    Service(#[from] FetchError),
}

/// How the primary route was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// No hazards near the corridor; the direct route stands.
    Direct,
    /// A hazard-avoiding route was accepted as primary.
    SaferAccepted,
    /// No acceptable safer alternative; proceeding on the direct
    /// route, flagged high-risk.
    HighRiskDirect,
}

/// Cross-mode duration/distance entry published by the probe tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeProbe {
    pub mode: TravelMode,
    pub distance_km: f64,
    pub duration_min: f64,
}

#[derive(Debug, Clone)]
pub struct RoutePlan {
    pub primary: Route,
    pub alternative: Option<Route>,
    pub decision: RouteDecision,
    /// Hazards within the alert radius of the primary path, annotated
    /// with perpendicular distance from it.
    pub hazards: Vec<RouteHazard>,
    /// Safe places inside the route corridor.
    pub safe_places: Vec<SafePlace>,
}

pub struct RouteArbiter {
    router: Arc<dyn RouteProvider>,
    places: Arc<dyn SafePlaceProvider>,
    forecaster: Arc<HazardForecaster>,
    config: EngineConfig,
    /// Sink for cross-mode probe results; probes are skipped when the
    /// host does not listen.
    probe_tx: Option<mpsc::UnboundedSender<ModeProbe>>,
}

impl RouteArbiter {
    pub fn new(
        router: Arc<dyn RouteProvider>,
        places: Arc<dyn SafePlaceProvider>,
        forecaster: Arc<HazardForecaster>,
        config: EngineConfig,
    ) -> Self {
        Self {
            router,
            places,
            forecaster,
            config,
            probe_tx: None,
        }
    }

    /// Receive cross-mode probe results from subsequent plans.
    pub fn probe_results(&mut self) -> mpsc::UnboundedReceiver<ModeProbe> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.probe_tx = Some(tx);
        rx
    }

    /// Plan a route from `start` to `end` that avoids predicted
    /// hazards where an avoidance detour is acceptable.
    pub async fn plan_safe_route(
        &self,
        start: &Location,
        end: &Location,
        hazard_radius_km: f64,
        mode: TravelMode,
        excluded_hazard_ids: &HashSet<String>,
    ) -> Result<RoutePlan, PlanError> {
        let crow_km = geo::distance_km(start.point, end.point);
        let center = geo::midpoint(start.point, end.point);
        let search_radius = self
            .config
            .base_search_radius_km
            .max(crow_km / 2.0 * self.config.search_radius_factor);

        let predictions = self.forecaster.forecast(center, search_radius).await;

        // The configured radius is what a person perceives as "near";
        // the footprint the routing service carves out is much smaller.
        let avoidance_radius = hazard_radius_km / self.config.avoidance_shrink_divisor;
        let zones: Vec<AvoidanceZone> = predictions
            .iter()
            .filter(|p| !excluded_hazard_ids.contains(&p.id))
            .map(|p| AvoidanceZone {
                center: p.current.point,
                radius_km: avoidance_radius,
            })
            .collect();

        let direct = self
            .router
            .request_route(start, end, mode, &[])
            .await?
            .ok_or_else(|| PlanError::NoDirectRoute {
                start: start.name.clone(),
                end: end.name.clone(),
            })?;

        self.spawn_mode_probes(start, end, mode);

        let (primary, alternative, decision) = if zones.is_empty() {
            tracing::info!(
                mode = mode.label(),
                distance_km = direct.distance_km,
                "no hazards near corridor, direct route stands"
            );
            (direct, None, RouteDecision::Direct)
        } else {
            self.arbitrate(start, end, mode, direct, &zones).await
        };

        let hazards = annotate_hazards(predictions, &primary, hazard_radius_km);
        let safe_places = self.find_safe_places(&primary).await;

        Ok(RoutePlan {
            primary,
            alternative,
            decision,
            hazards,
            safe_places,
        })
    }

    /// Decide between the direct baseline and a safer alternative.
    async fn arbitrate(
        &self,
        start: &Location,
        end: &Location,
        mode: TravelMode,
        direct: Route,
        zones: &[AvoidanceZone],
    ) -> (Route, Option<Route>, RouteDecision) {
        let safe = match self.router.request_route(start, end, mode, zones).await {
            Ok(safe) => safe,
            Err(err) => {
                tracing::warn!("safer-route request failed, keeping direct route: {err}");
                None
            }
        };

        let mut direct = direct;
        direct.high_risk = true;

        match safe {
            Some(safe)
                if safe.duration_min < direct.duration_min * self.config.safe_duration_ratio
                    && safe.duration_min
                        < direct.duration_min + self.config.safe_duration_margin_min =>
            {
                tracing::info!(
                    direct_min = direct.duration_min,
                    safe_min = safe.duration_min,
                    "accepted hazard-avoiding route as primary"
                );
                (safe, Some(direct), RouteDecision::SaferAccepted)
            }
            other => {
                tracing::warn!(
                    direct_min = direct.duration_min,
                    safe_min = other.as_ref().map(|r| r.duration_min),
                    "safer alternative unacceptable, proceeding on high-risk direct route"
                );
                (direct, other, RouteDecision::HighRiskDirect)
            }
        }
    }

    /// Probe the remaining travel modes (direct, no avoidance) to
    /// populate the cross-mode comparison table. Each probe is
    /// independent: a failure loses only that mode's entry and never
    /// gates the primary route.
    fn spawn_mode_probes(&self, start: &Location, end: &Location, chosen: TravelMode) {
        let Some(probe_tx) = self.probe_tx.clone() else {
            return;
        };

        for mode in TravelMode::ALL {
            if mode == chosen {
                continue;
            }
            let router = Arc::clone(&self.router);
            let tx = probe_tx.clone();
            let start = start.clone();
            let end = end.clone();
            tokio::spawn(async move {
                match router.request_route(&start, &end, mode, &[]).await {
                    Ok(Some(route)) => {
                        let _ = tx.send(ModeProbe {
                            mode,
                            distance_km: route.distance_km,
                            duration_min: route.duration_min,
                        });
                    }
                    Ok(None) => {
                        tracing::debug!(mode = mode.label(), "no plausible route for probe");
                    }
                    Err(err) => {
                        tracing::warn!(mode = mode.label(), "mode probe failed: {err}");
                    }
                }
            });
        }
    }

    async fn find_safe_places(&self, route: &Route) -> Vec<SafePlace> {
        let Some(bbox) = route.bounding_box(self.config.safe_place_buffer_km) else {
            return Vec::new();
        };
        match self.places.search(bbox).await {
            Ok(places) => places,
            Err(err) => {
                tracing::warn!("safe-place search failed: {err}");
                Vec::new()
            }
        }
    }
}

/// Annotate predictions with perpendicular distance from the route
/// path and keep those within the alert radius.
fn annotate_hazards(
    predictions: Vec<HazardPrediction>,
    route: &Route,
    hazard_radius_km: f64,
) -> Vec<RouteHazard> {
    let mut hazards: Vec<RouteHazard> = predictions
        .into_iter()
        .filter_map(|prediction| {
            let distance = geo::distance_to_path_km(prediction.current.point, &route.path);
            (distance <= hazard_radius_km).then_some(RouteHazard {
                prediction,
                distance_from_route_km: distance,
            })
        })
        .collect();
    hazards.sort_by(|a, b| {
        a.distance_from_route_km
            .total_cmp(&b.distance_from_route_km)
    });
    hazards
}
