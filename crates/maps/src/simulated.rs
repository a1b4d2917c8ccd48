//! In-process stand-in for the external mapping SDK.
//!
//! Availability is a switch, responses are scripted, distance is the
//! spherical haversine. Used by tests and by the `map_probe` app.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use foundation::{IdAllocator, LatLng, spherical_distance_m};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::provider::{
    GeocodeResult, MapProvider, Marker, MarkerOptions, MountTarget, NearbyRequest,
    NearbyResponse, PlacesStatus, ProviderError, Route, RouteLeg, RouteRequest, Surface,
    SurfaceOptions, TravelMode, Waypoint,
};

/// Call counts, for asserting what did (and did not) reach the provider.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SimulatedCounters {
    pub probes: u64,
    pub surfaces: u64,
    pub markers: u64,
    pub geocodes: u64,
    pub routes: u64,
    pub searches: u64,
}

#[derive(Default)]
struct Counters {
    probes: AtomicU64,
    surfaces: AtomicU64,
    markers: AtomicU64,
    geocodes: AtomicU64,
    routes: AtomicU64,
    searches: AtomicU64,
}

fn bump(c: &AtomicU64) {
    c.fetch_add(1, Ordering::Relaxed);
}

#[derive(Default)]
struct Script {
    geocode: HashMap<String, Result<Vec<GeocodeResult>, ProviderError>>,
    route: Option<Result<Route, ProviderError>>,
    nearby: Option<NearbyResponse>,
}

pub struct SimulatedProvider {
    available: AtomicBool,
    latency: Duration,
    ids: IdAllocator,
    script: Mutex<Script>,
    counters: Counters,
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedProvider {
    /// A provider that starts out unavailable and answers without delay.
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    /// Asynchronous calls sleep for `latency` before answering.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            available: AtomicBool::new(false),
            latency,
            ids: IdAllocator::new(),
            script: Mutex::new(Script::default()),
            counters: Counters::default(),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Flips the provider to available after `delay`, the way a script tag
    /// finishes loading some time after the page.
    pub fn become_available_after(
        self: &Arc<Self>,
        delay: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.set_available(true);
        })
    }

    pub fn script_geocode(
        &self,
        address: impl Into<String>,
        result: Result<Vec<GeocodeResult>, ProviderError>,
    ) {
        self.script.lock().geocode.insert(address.into(), result);
    }

    pub fn script_route(&self, result: Result<Route, ProviderError>) {
        self.script.lock().route = Some(result);
    }

    pub fn script_nearby(&self, response: NearbyResponse) {
        self.script.lock().nearby = Some(response);
    }

    pub fn counters(&self) -> SimulatedCounters {
        let c = &self.counters;
        SimulatedCounters {
            probes: c.probes.load(Ordering::Relaxed),
            surfaces: c.surfaces.load(Ordering::Relaxed),
            markers: c.markers.load(Ordering::Relaxed),
            geocodes: c.geocodes.load(Ordering::Relaxed),
            routes: c.routes.load(Ordering::Relaxed),
            searches: c.searches.load(Ordering::Relaxed),
        }
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn resolve(&self, waypoint: &Waypoint) -> Option<LatLng> {
        match waypoint {
            Waypoint::Coord(c) => Some(*c),
            Waypoint::Address(a) => match self.script.lock().geocode.get(a) {
                Some(Ok(results)) => results.first().map(|r| r.location),
                _ => None,
            },
        }
    }

    fn straight_line(&self, request: &RouteRequest) -> Result<Route, ProviderError> {
        let start = self.resolve(&request.origin).ok_or(ProviderError::ZeroResults)?;
        let end = self.resolve(&request.destination).ok_or(ProviderError::ZeroResults)?;
        let distance_m = spherical_distance_m(start, end);
        Ok(Route {
            summary: format!("{start} to {end}"),
            legs: vec![RouteLeg {
                start,
                end,
                distance_m,
                duration_s: distance_m / speed_mps(request.travel_mode),
            }],
        })
    }
}

fn speed_mps(mode: TravelMode) -> f64 {
    match mode {
        TravelMode::Driving => 13.9,
        TravelMode::Transit => 8.3,
        TravelMode::Bicycling => 4.2,
        TravelMode::Walking => 1.4,
    }
}

impl MapProvider for SimulatedProvider {
    fn name(&self) -> &str {
        "simulated"
    }

    fn is_available(&self) -> bool {
        bump(&self.counters.probes);
        self.available.load(Ordering::SeqCst)
    }

    fn create_surface(&self, target: &MountTarget, options: &SurfaceOptions) -> Surface {
        bump(&self.counters.surfaces);
        Surface {
            id: self.ids.next_id(),
            target: target.id(),
            options: options.clone(),
        }
    }

    fn create_marker(&self, options: &MarkerOptions) -> Marker {
        bump(&self.counters.markers);
        Marker {
            id: self.ids.next_id(),
            surface: options.surface,
            position: options.position,
            title: options.title.clone(),
        }
    }

    fn geocode<'a>(
        &'a self,
        address: &'a str,
    ) -> BoxFuture<'a, Result<Vec<GeocodeResult>, ProviderError>> {
        async move {
            bump(&self.counters.geocodes);
            self.delay().await;
            let scripted = self.script.lock().geocode.get(address).cloned();
            scripted.unwrap_or(Ok(Vec::new()))
        }
        .boxed()
    }

    fn distance_m(&self, origin: LatLng, destination: LatLng) -> f64 {
        spherical_distance_m(origin, destination)
    }

    fn route(&self, request: RouteRequest) -> BoxFuture<'_, Result<Route, ProviderError>> {
        async move {
            bump(&self.counters.routes);
            self.delay().await;
            let scripted = self.script.lock().route.clone();
            match scripted {
                Some(result) => result,
                None => self.straight_line(&request),
            }
        }
        .boxed()
    }

    fn nearby_search(&self, request: NearbyRequest) -> BoxFuture<'_, NearbyResponse> {
        async move {
            bump(&self.counters.searches);
            self.delay().await;
            let scripted = self.script.lock().nearby.clone();
            scripted.unwrap_or_else(|| {
                debug!(keyword = %request.keyword, "no scripted places");
                NearbyResponse::status(PlacesStatus::ZeroResults)
            })
        }
        .boxed()
    }
}
