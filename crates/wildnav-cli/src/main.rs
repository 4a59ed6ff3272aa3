//! wildnav command line.
//!
//! `plan` resolves two places, plans a hazard-aware route and prints
//! the decision. `simulate` plans a route and then replays a journey
//! along it through a live navigation session, printing alerts and
//! progress as they happen.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wildnav_core::models::{GeoPoint, Location, TravelMode};
use wildnav_core::predict::DisplacementModel;
use wildnav_core::validate::PlausibilityRules;
use wildnav_engine::position::PositionUpdate;
use wildnav_engine::{
    EngineConfig, HazardForecaster, NavigationSession, RouteArbiter, RouteDecision, RoutePlan,
    ScriptedSource, SessionEvent,
};
use wildnav_services::fetch::{ResilientClient, RetryPolicy};
use wildnav_services::geocode::GeocodeClient;
use wildnav_services::occurrence::OccurrenceClient;
use wildnav_services::places::OverpassClient;
use wildnav_services::routing::RoutingClient;
use wildnav_services::weather::WeatherClient;

#[derive(Parser, Debug)]
#[command(author, version, about = "Wildlife-hazard-aware route planner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan a route between two places.
    Plan(PlanArgs),
    /// Plan a route, then replay a simulated journey along it.
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Start, as "lat,lon" or a place name to geocode.
    from: String,

    /// Destination, as "lat,lon" or a place name to geocode.
    to: String,

    #[arg(long, value_enum, default_value_t = ModeArg::Car)]
    mode: ModeArg,

    /// Hazard alert radius in km.
    #[arg(long)]
    hazard_radius: Option<f64>,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    #[command(flatten)]
    plan: PlanArgs,

    /// Milliseconds between simulated position fixes.
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,

    /// Emit a fix every Nth route point.
    #[arg(long, default_value_t = 5)]
    stride: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Car,
    Bus,
    Bike,
    Walk,
}

impl From<ModeArg> for TravelMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Car => TravelMode::Car,
            ModeArg::Bus => TravelMode::Bus,
            ModeArg::Bike => TravelMode::Bike,
            ModeArg::Walk => TravelMode::Walk,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wildnav=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env();

    match cli.command {
        Command::Plan(args) => run_plan(args, config).await,
        Command::Simulate(args) => run_simulate(args, config).await,
    }
}

struct Stack {
    geocoder: GeocodeClient,
    router: Arc<RoutingClient>,
    weather: Arc<WeatherClient>,
    arbiter: RouteArbiter,
}

fn build_stack(config: &EngineConfig) -> Stack {
    let fetch = ResilientClient::new(RetryPolicy::default());
    let geocoder = GeocodeClient::new(fetch.clone(), config.geocode_url.clone());
    let router = Arc::new(RoutingClient::new(
        fetch.clone(),
        config.routing_url.clone(),
        PlausibilityRules::default(),
    ));
    let weather = Arc::new(WeatherClient::new(fetch.clone(), config.weather_url.clone()));
    let places = Arc::new(OverpassClient::new(fetch.clone(), config.overpass_url.clone()));
    let occurrences = Arc::new(OccurrenceClient::new(fetch, config.occurrence_url.clone()));
    let forecaster = Arc::new(HazardForecaster::new(
        occurrences,
        Arc::new(DisplacementModel::default()),
        config,
    ));
    let arbiter = RouteArbiter::new(router.clone(), places, forecaster, config.clone());
    Stack {
        geocoder,
        router,
        weather,
        arbiter,
    }
}

/// Accept "lat,lon" directly, otherwise geocode a place name.
async fn resolve(geocoder: &GeocodeClient, query: &str) -> Result<Location> {
    if let Some((lat, lon)) = query.split_once(',') {
        if let (Ok(lat), Ok(lon)) = (lat.trim().parse::<f64>(), lon.trim().parse::<f64>()) {
            let point = GeoPoint::new(lat, lon);
            point.validate()?;
            return Ok(Location::new(point, query.trim()));
        }
    }
    let candidates = geocoder
        .forward(query)
        .await
        .with_context(|| format!("could not geocode '{query}'"))?;
    candidates
        .into_iter()
        .next()
        .with_context(|| format!("no geocoding result for '{query}'"))
}

async fn plan_route(
    args: &PlanArgs,
    config: &EngineConfig,
    stack: &mut Stack,
    with_probes: bool,
) -> Result<RoutePlan> {
    let start = resolve(&stack.geocoder, &args.from).await?;
    let end = resolve(&stack.geocoder, &args.to).await?;
    println!(
        "Planning {} -> {} by {}",
        start.name,
        end.name,
        TravelMode::from(args.mode).label()
    );

    let mut probes = with_probes.then(|| stack.arbiter.probe_results());
    let plan = stack
        .arbiter
        .plan_safe_route(
            &start,
            &end,
            args.hazard_radius.unwrap_or(config.hazard_radius_km),
            args.mode.into(),
            &HashSet::new(),
        )
        .await?;

    print_plan(&plan);
    if let Some(probes) = probes.as_mut() {
        print_probes(probes).await;
    }
    Ok(plan)
}

fn print_plan(plan: &RoutePlan) {
    match plan.decision {
        RouteDecision::Direct => println!("No hazards near the route."),
        RouteDecision::SaferAccepted => println!("Taking a safer route around reported hazards."),
        RouteDecision::HighRiskDirect => {
            println!("WARNING: no acceptable detour found; the direct route crosses hazard areas.")
        }
    }
    println!(
        "Route: {:.1} km, about {:.0} min{}",
        plan.primary.distance_km,
        plan.primary.duration_min,
        if plan.primary.high_risk {
            " (HIGH RISK)"
        } else {
            ""
        }
    );
    if let Some(alternative) = &plan.alternative {
        println!(
            "Alternative: {:.1} km, about {:.0} min{}",
            alternative.distance_km,
            alternative.duration_min,
            if alternative.high_risk {
                " (HIGH RISK)"
            } else {
                ""
            }
        );
    }
    for hazard in &plan.hazards {
        println!(
            "  hazard: {} {:.1} km from the route",
            hazard.prediction.species.info().common_name,
            hazard.distance_from_route_km
        );
    }
    for place in &plan.safe_places {
        println!(
            "  safe place: {}",
            place.name.as_deref().unwrap_or("(unnamed)")
        );
    }
}

/// Cross-mode comparisons arrive from background probes; wait briefly
/// and print whatever made it in time.
async fn print_probes(probes: &mut mpsc::UnboundedReceiver<wildnav_engine::ModeProbe>) {
    for _ in 0..TravelMode::ALL.len() - 1 {
        match tokio::time::timeout(Duration::from_secs(10), probes.recv()).await {
            Ok(Some(probe)) => println!(
                "  by {}: {:.1} km, about {:.0} min",
                probe.mode.label(),
                probe.distance_km,
                probe.duration_min
            ),
            _ => break,
        }
    }
}

async fn run_plan(args: PlanArgs, config: EngineConfig) -> Result<()> {
    let mut stack = build_stack(&config);
    plan_route(&args, &config, &mut stack, true).await?;
    Ok(())
}

async fn run_simulate(args: SimulateArgs, config: EngineConfig) -> Result<()> {
    let mut stack = build_stack(&config);
    let plan = plan_route(&args.plan, &config, &mut stack, false).await?;

    let stride = args.stride.max(1);
    let path = &plan.primary.path;
    let mut updates: Vec<PositionUpdate> = path
        .iter()
        .step_by(stride)
        .copied()
        .map(PositionUpdate::Fix)
        .collect();
    if let Some(last) = path.last() {
        if path.len().saturating_sub(1) % stride != 0 {
            updates.push(PositionUpdate::Fix(*last));
        }
    }
    let source = ScriptedSource {
        updates,
        interval: Duration::from_millis(args.interval_ms),
    };

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut session = NavigationSession::new(
        plan,
        stack.router.clone(),
        stack.weather.clone(),
        config,
        events_tx,
    );

    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            print_event(&event);
        }
    });

    session.start(&source);
    session.run().await;
    session.stop();
    drop(session);
    printer.await.context("event printer failed")?;
    Ok(())
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Started => println!("Session started."),
        SessionEvent::ApproachingStart { distance_km } => {
            println!("Approaching the route start, {distance_km:.1} km to go.")
        }
        SessionEvent::NavigationStarted => println!("On route."),
        SessionEvent::Stats(stats) => println!(
            "  {:3}%  {:.1} km remaining, about {:.0} min",
            stats.percent, stats.remaining_km, stats.eta_min
        ),
        SessionEvent::AlertRaised(alert) => println!("ALERT: {}", alert.message),
        SessionEvent::AlertCleared(kind) => println!("alert cleared: {kind:?}"),
        SessionEvent::RouteReplaced(route) => {
            println!("Route replaced: now heading to {}.", route.end.name)
        }
        SessionEvent::Stopped => println!("Session stopped."),
    }
}
