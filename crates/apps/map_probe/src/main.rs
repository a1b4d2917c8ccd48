use std::env;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use foundation::{Id, LatLng};
use maps::{
    BindingState, GeoOps, MapBinding, MapsConfig, MountTarget, SimulatedProvider, TravelMode,
    loader_for,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Exercise the map capability loader against a simulated provider")]
struct Args {
    /// JSON config file (see MapsConfig); env vars override it
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Attach several map widgets and report how each one settles
    Bind {
        /// Number of concurrent attachment points
        #[arg(long, default_value_t = 3)]
        bindings: u32,

        /// Delay before the simulated capability appears
        #[arg(long, default_value_t = 300)]
        available_after_ms: u64,

        /// Never make the capability available
        #[arg(long)]
        never_available: bool,

        /// Tear the first binding down after this many milliseconds
        #[arg(long)]
        teardown_after_ms: Option<u64>,
    },

    /// Distance and straight-line route between two "lat,lng" points
    Distance {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        #[arg(long, default_value = "driving")]
        mode: String,
    },
}

#[derive(Debug, Serialize)]
struct BindingReport {
    widget: u32,
    state: String,
    surface: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Bind {
            bindings,
            available_after_ms,
            never_available,
            teardown_after_ms,
        } => {
            run_bind(
                &config,
                bindings,
                (!never_available).then(|| Duration::from_millis(available_after_ms)),
                teardown_after_ms.map(Duration::from_millis),
            )
            .await
        }
        Command::Distance { from, to, mode } => run_distance(&from, &to, &mode).await,
    }
}

fn load_config(path: Option<&str>) -> Result<MapsConfig, maps::ConfigError> {
    let mut config = match path {
        Some(path) => MapsConfig::from_path(path)?,
        None => MapsConfig::default(),
    };
    config.loader.poll_interval_ms =
        env_var_u64("MAPS_POLL_INTERVAL_MS", config.loader.poll_interval_ms);
    config.loader.max_attempts = env_var_u32("MAPS_MAX_ATTEMPTS", config.loader.max_attempts);
    config.binding.settle_delay_ms =
        env_var_u64("MAPS_SETTLE_DELAY_MS", config.binding.settle_delay_ms);
    Ok(config)
}

async fn run_bind(
    config: &MapsConfig,
    count: u32,
    available_after: Option<Duration>,
    teardown_after: Option<Duration>,
) -> Result<(), Box<dyn std::error::Error>> {
    let provider = Arc::new(SimulatedProvider::new());
    let loader = runtime::global::install(loader_for(provider.clone(), config.loader))?;
    let ops = GeoOps::new(provider.clone());

    match available_after {
        Some(delay) => {
            info!(delay_ms = delay.as_millis() as u64, "capability scheduled");
            provider.become_available_after(delay);
        }
        None => warn!("capability will never become available"),
    }

    let mut bindings: Vec<MapBinding> = (0..count)
        .map(|n| {
            let mut binding = MapBinding::new();
            binding.set_mount_target(MountTarget::new(Id::new(n as u64), format!("widget-{n}")));
            binding.activate(loader, ops.clone(), config.surface_options(), config.binding);
            binding
        })
        .collect();

    if let (Some(after), Some(first)) = (teardown_after, bindings.first_mut()) {
        tokio::time::sleep(after).await;
        first.teardown();
        info!("widget-0 removed");
    }

    let mut reports = Vec::with_capacity(bindings.len());
    for (n, binding) in bindings.iter().enumerate() {
        let state = binding.settled().await;
        if let BindingState::Failed(err) = &state {
            warn!(widget = n, "binding failed: {err}");
        }
        reports.push(BindingReport {
            widget: n as u32,
            state: format!("{state:?}"),
            surface: binding.surface().map(|s| s.id.get()),
        });
    }

    let summary = json!({
        "loader": loader.state(),
        "provider": provider.counters(),
        "bindings": reports,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn run_distance(from: &str, to: &str, mode: &str) -> Result<(), Box<dyn std::error::Error>> {
    let origin = parse_lat_lng(from)?;
    let destination = parse_lat_lng(to)?;
    let travel_mode: TravelMode = serde_json::from_value(json!(mode.to_uppercase()))?;

    let provider = Arc::new(SimulatedProvider::new());
    provider.set_available(true);
    let ops = GeoOps::new(provider);

    let km = ops.calculate_distance(origin, destination)?;
    let route = ops.get_directions(origin, destination, travel_mode).await?;
    let summary = json!({
        "origin": origin,
        "destination": destination,
        "distanceKm": km,
        "route": route,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn parse_lat_lng(s: &str) -> Result<LatLng, String> {
    let (lat, lng) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lng\", got {s:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude {lat:?}: {e}"))?;
    let lng: f64 = lng.trim().parse().map_err(|e| format!("bad longitude {lng:?}: {e}"))?;
    Ok(LatLng::new(lat, lng))
}

fn env_var_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
