//! Live navigation session: position fixes in, progress and alerts out.
//!
//! A session is single-owner mutable state driven by one update at a
//! time. Every fix runs the same pipeline in a fixed order: signal
//! recovery, weather, hazard proximity, then route matching and
//! progress. Events go out over an unbounded channel so a slow
//! consumer can never stall the fix handler.

use crate::arbiter::RoutePlan;
use crate::config::EngineConfig;
use crate::position::{PositionSource, PositionSubscription, PositionUpdate};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use wildnav_core::geo;
use wildnav_core::models::{
    GeoPoint, Location, NavigationStats, Route, RouteHazard, SafePlace, SafePlaceKind, TravelMode,
};
use wildnav_services::fetch::FetchError;
use wildnav_services::routing::RouteProvider;
use wildnav_services::weather::WeatherProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Weather,
    Hazard,
    SignalLost,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

/// Everything a session reports while running.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started,
    /// Still off-route, heading towards the start point.
    ApproachingStart { distance_km: f64 },
    /// First fix matched onto the route proper.
    NavigationStarted,
    Stats(NavigationStats),
    AlertRaised(Alert),
    AlertCleared(AlertKind),
    /// An emergency reroute replaced the active route.
    RouteReplaced(Route),
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Approaching,
    Active,
    Emergency,
}

#[derive(Debug, Error)]
pub enum EmergencyError {
    #[error("session is not running")]
    NotRunning,
    #[error("no live position fix yet")]
    NoLiveFix,
    #[error("no safe places known along the route")]
    NoSafePlaces,
    #[error("no drivable route to the nearest safe place")]
    NoEmergencyRoute,
    #[error(transparent)]
    Service(#[from] FetchError),
}

pub struct NavigationSession {
    router: Arc<dyn RouteProvider>,
    weather: Arc<dyn WeatherProvider>,
    config: EngineConfig,
    events: mpsc::UnboundedSender<SessionEvent>,

    planned: Route,
    hazards: Vec<RouteHazard>,
    safe_places: Vec<SafePlace>,

    emergency: Option<Route>,
    /// Best-effort route from the original start to the same safe
    /// place, for a traveller who decides to turn back instead.
    emergency_alternative: Option<Route>,
    live: Option<GeoPoint>,
    matched_index: usize,
    approaching: bool,
    /// Hazards already alerted on; never alerted twice per session.
    alerted_hazards: HashSet<String>,
    /// At most one hazard alert live at a time.
    live_hazard_alert: Option<String>,
    live_weather_alert: Option<String>,
    signal_lost: bool,
    last_weather_check: Option<Instant>,

    running: bool,
    subscription: Option<PositionSubscription>,
}

impl NavigationSession {
    pub fn new(
        plan: RoutePlan,
        router: Arc<dyn RouteProvider>,
        weather: Arc<dyn WeatherProvider>,
        config: EngineConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            router,
            weather,
            config,
            events,
            planned: plan.primary,
            hazards: plan.hazards,
            safe_places: plan.safe_places,
            emergency: None,
            emergency_alternative: None,
            live: None,
            matched_index: 0,
            approaching: false,
            alerted_hazards: HashSet::new(),
            live_hazard_alert: None,
            live_weather_alert: None,
            signal_lost: false,
            last_weather_check: None,
            running: false,
            subscription: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if !self.running {
            SessionPhase::Idle
        } else if self.emergency.is_some() {
            SessionPhase::Emergency
        } else if self.approaching {
            SessionPhase::Approaching
        } else {
            SessionPhase::Active
        }
    }

    /// Subscribe to the position source and begin the session.
    pub fn start(&mut self, source: &dyn PositionSource) {
        if self.running {
            return;
        }
        self.running = true;
        self.subscription = Some(source.subscribe());
        tracing::info!(
            from = %self.planned.start.name,
            to = %self.planned.end.name,
            "navigation session started"
        );
        self.emit(SessionEvent::Started);
    }

    /// Drive the session from its subscription until the stream ends
    /// or the session is stopped.
    pub async fn run(&mut self) {
        let Some(mut subscription) = self.subscription.take() else {
            return;
        };
        while let Some(update) = subscription.next().await {
            self.process_update(update).await;
            if !self.running {
                break;
            }
        }
    }

    /// Handle one position update. Public so hosts and tests can feed
    /// fixes directly instead of going through a subscription.
    pub async fn process_update(&mut self, update: PositionUpdate) {
        if !self.running {
            return;
        }
        match update {
            PositionUpdate::SignalLost => {
                if !self.signal_lost {
                    self.signal_lost = true;
                    self.emit(SessionEvent::AlertRaised(Alert {
                        kind: AlertKind::SignalLost,
                        message: "Position signal lost. Displayed progress may be stale."
                            .to_string(),
                    }));
                }
            }
            PositionUpdate::Fix(point) => self.process_fix(point).await,
        }
    }

    async fn process_fix(&mut self, point: GeoPoint) {
        if self.signal_lost {
            self.signal_lost = false;
            self.emit(SessionEvent::AlertCleared(AlertKind::SignalLost));
        }
        self.live = Some(point);

        self.check_weather(point).await;
        self.check_hazards(point);
        self.update_progress(point);
    }

    /// Reroute from the current fix to the nearest known safe place.
    /// The planned route is kept; `stop` or session teardown discards
    /// the emergency override.
    pub async fn emergency_reroute(&mut self) -> Result<(), EmergencyError> {
        if !self.running {
            return Err(EmergencyError::NotRunning);
        }
        let live = self.live.ok_or(EmergencyError::NoLiveFix)?;
        let (place, distance_km) = geo::nearest_of(live, &self.safe_places, |p| p.point)
            .ok_or(EmergencyError::NoSafePlaces)?;
        let place = place.clone();

        let name = place.name.clone().unwrap_or_else(|| {
            match place.kind {
                SafePlaceKind::SecurityPost => "Security post",
                SafePlaceKind::RangerPost => "Ranger post",
            }
            .to_string()
        });
        tracing::warn!(
            place = %name,
            distance_km,
            "emergency reroute requested"
        );

        let start = Location::new(live, "Current position");
        let end = Location::new(place.point, name);
        let route = self
            .router
            .request_route(&start, &end, TravelMode::Car, &[])
            .await?
            .ok_or(EmergencyError::NoEmergencyRoute)?;

        // The session may have been stopped while the request was in
        // flight; a stale result must not resurrect it.
        if !self.running {
            return Err(EmergencyError::NotRunning);
        }

        self.matched_index = 0;
        self.approaching = false;
        self.emit(SessionEvent::RouteReplaced(route.clone()));
        self.emergency = Some(route);

        // Best effort only; the reroute already succeeded.
        let original_start = self.planned.start.clone();
        match self
            .router
            .request_route(&original_start, &end, TravelMode::Car, &[])
            .await
        {
            Ok(alternative) => self.emergency_alternative = alternative,
            Err(err) => {
                tracing::debug!("no alternative from the original start: {err}");
            }
        }
        Ok(())
    }

    /// Route from the original start to the emergency destination, if
    /// one could be found.
    pub fn emergency_alternative(&self) -> Option<&Route> {
        self.emergency_alternative.as_ref()
    }

    /// Stop the session. Idempotent; after this returns no further
    /// event is emitted until `start` is called again.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.emergency = None;
        self.emergency_alternative = None;
        self.live = None;
        self.matched_index = 0;
        self.approaching = false;
        self.alerted_hazards.clear();
        self.live_hazard_alert = None;
        self.live_weather_alert = None;
        self.signal_lost = false;
        self.last_weather_check = None;
        tracing::info!("navigation session stopped");
        self.emit(SessionEvent::Stopped);
    }

    /// Dismiss a live alert. Hazard suppression survives dismissal, so
    /// the same hazard never re-alerts.
    pub fn dismiss_alert(&mut self, kind: AlertKind) {
        let was_live = match kind {
            AlertKind::Weather => self.live_weather_alert.take().is_some(),
            AlertKind::Hazard => self.live_hazard_alert.take().is_some(),
            AlertKind::SignalLost => std::mem::take(&mut self.signal_lost),
        };
        if was_live {
            self.emit(SessionEvent::AlertCleared(kind));
        }
    }

    async fn check_weather(&mut self, point: GeoPoint) {
        let due = self
            .last_weather_check
            .map_or(true, |at| at.elapsed() >= self.config.weather_poll);
        if !due {
            return;
        }
        // A failed check still counts against the throttle; the next
        // eligible fix retries.
        self.last_weather_check = Some(Instant::now());

        let current = match self.weather.current(point).await {
            Ok(current) => current,
            Err(err) => {
                tracing::warn!("weather check failed, skipping this cycle: {err}");
                return;
            }
        };

        match current.severe_message() {
            Some(message) => {
                if self.live_weather_alert.as_deref() != Some(message) {
                    self.live_weather_alert = Some(message.to_string());
                    self.emit(SessionEvent::AlertRaised(Alert {
                        kind: AlertKind::Weather,
                        message: message.to_string(),
                    }));
                }
            }
            None => {
                if self.live_weather_alert.take().is_some() {
                    self.emit(SessionEvent::AlertCleared(AlertKind::Weather));
                }
            }
        }
    }

    fn check_hazards(&mut self, point: GeoPoint) {
        if self.live_hazard_alert.is_some() {
            return;
        }
        let nearest = self
            .hazards
            .iter()
            .filter(|h| !self.alerted_hazards.contains(&h.prediction.id))
            .filter_map(|h| {
                let d = geo::distance_km(point, h.prediction.current.point);
                (d <= self.config.hazard_alert_km).then_some((h, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(h, d)| {
                let info = h.prediction.species.info();
                (
                    h.prediction.id.clone(),
                    format!(
                        "{} reported about {:.1} km away. Stay alert and keep to the route.",
                        info.common_name, d
                    ),
                )
            });

        if let Some((id, message)) = nearest {
            self.alerted_hazards.insert(id.clone());
            self.live_hazard_alert = Some(id);
            self.emit(SessionEvent::AlertRaised(Alert {
                kind: AlertKind::Hazard,
                message,
            }));
        }
    }

    fn update_progress(&mut self, point: GeoPoint) {
        let route = self.emergency.as_ref().unwrap_or(&self.planned);
        let Some(nearest) = geo::nearest_point_on_path(point, &route.path, self.matched_index)
        else {
            return;
        };
        let path_len = route.path.len();
        let total_km = route.distance_km;
        let total_min = route.duration_min;

        let distance_to_start = geo::distance_km(point, route.path[0]);
        let before_start = nearest.index == 0
            && distance_to_start > self.config.approach_threshold_km
            && self.emergency.is_none();

        if before_start {
            // Off-route on the way to the start point: progress stays
            // frozen at the planned totals.
            self.approaching = true;
            self.emit(SessionEvent::ApproachingStart {
                distance_km: distance_to_start,
            });
            self.emit(SessionEvent::Stats(NavigationStats {
                remaining_km: self.planned.distance_km,
                eta_min: self.planned.duration_min,
                percent: 0,
            }));
            return;
        }

        if self.approaching {
            self.approaching = false;
            self.emit(SessionEvent::NavigationStarted);
        }

        self.matched_index = nearest.index;
        let ratio = if path_len > 1 {
            nearest.index as f64 / (path_len - 1) as f64
        } else {
            1.0
        };
        let stats = NavigationStats {
            remaining_km: total_km * (1.0 - ratio),
            eta_min: total_min * (1.0 - ratio),
            percent: (ratio * 100.0).round().clamp(0.0, 100.0) as u8,
        };
        self.emit(SessionEvent::Stats(stats));
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
