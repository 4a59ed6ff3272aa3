//! Planning and live-guidance engine.
//!
//! `RouteArbiter` turns a start/end pair into a hazard-aware plan,
//! `NavigationSession` guides a traveller along it, and
//! `HazardForecaster` feeds both with predicted animal movement.

pub mod arbiter;
pub mod config;
pub mod hazards;
pub mod position;
pub mod session;

pub use arbiter::{ModeProbe, PlanError, RouteArbiter, RouteDecision, RoutePlan};
pub use config::EngineConfig;
pub use hazards::HazardForecaster;
pub use position::{PositionSource, PositionSubscription, PositionUpdate, ScriptedSource};
pub use session::{
    Alert, AlertKind, EmergencyError, NavigationSession, SessionEvent, SessionPhase,
};
