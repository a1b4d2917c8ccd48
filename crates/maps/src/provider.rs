//! The external mapping capability, seen from the outside.
//!
//! Everything here is an opaque contract: the real SDK (or a fake) does the
//! geometry, tiling and place lookups. This crate only decides when it is
//! allowed to call into it and what to do with the answers.

use std::sync::Arc;

use foundation::{Id, LatLng};
use futures_util::future::BoxFuture;
use runtime::{LoaderConfig, Probe, ResourceLoader};
use serde::{Deserialize, Serialize};

/// Lower-level failures reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("no results")]
    ZeroResults,
    #[error("provider returned status {0}")]
    Status(String),
}

/// A display region supplied by the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MountTarget {
    id: Id,
    label: String,
}

impl MountTarget {
    pub fn new(id: Id, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapType {
    #[default]
    Roadmap,
    Satellite,
    Hybrid,
    Terrain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceOptions {
    pub center: LatLng,
    pub zoom: u8,
    #[serde(default)]
    pub map_type: MapType,
}

/// Map surface rendered into a [`MountTarget`].
///
/// The native resource behind it belongs to the display region; dropping
/// the handle is all the cleanup a consumer has to do.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub id: Id,
    pub target: Id,
    pub options: SurfaceOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerOptions {
    pub position: LatLng,
    /// Surface the marker is drawn on; detached markers are allowed.
    #[serde(skip)]
    pub surface: Option<Id>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl MarkerOptions {
    pub fn at(position: LatLng) -> Self {
        Self {
            position,
            surface: None,
            title: None,
            label: None,
        }
    }

    pub fn on(mut self, surface: &Surface) -> Self {
        self.surface = Some(surface.id);
        self
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: Id,
    pub surface: Option<Id>,
    pub position: LatLng,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub location: LatLng,
    pub formatted_address: String,
}

/// Route endpoint: either a free-form address or a coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Waypoint {
    Coord(LatLng),
    Address(String),
}

impl From<LatLng> for Waypoint {
    fn from(v: LatLng) -> Self {
        Waypoint::Coord(v)
    }
}

impl From<&str> for Waypoint {
    fn from(v: &str) -> Self {
        Waypoint::Address(v.to_string())
    }
}

impl From<String> for Waypoint {
    fn from(v: String) -> Self {
        Waypoint::Address(v)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Bicycling,
    Transit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub origin: Waypoint,
    pub destination: Waypoint,
    pub travel_mode: TravelMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub start: LatLng,
    pub end: LatLng,
    pub distance_m: f64,
    pub duration_s: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub summary: String,
    pub legs: Vec<RouteLeg>,
}

impl Route {
    pub fn distance_m(&self) -> f64 {
        self.legs.iter().map(|l| l.distance_m).sum()
    }

    pub fn duration_s(&self) -> f64 {
        self.legs.iter().map(|l| l.duration_s).sum()
    }
}

/// Status attached to every place search response.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlacesStatus {
    Ok,
    ZeroResults,
    OverQueryLimit,
    RequestDenied,
    InvalidRequest,
    UnknownError,
}

impl PlacesStatus {
    pub fn is_ok(self) -> bool {
        self == PlacesStatus::Ok
    }
}

impl std::fmt::Display for PlacesStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlacesStatus::Ok => "OK",
            PlacesStatus::ZeroResults => "ZERO_RESULTS",
            PlacesStatus::OverQueryLimit => "OVER_QUERY_LIMIT",
            PlacesStatus::RequestDenied => "REQUEST_DENIED",
            PlacesStatus::InvalidRequest => "INVALID_REQUEST",
            PlacesStatus::UnknownError => "UNKNOWN_ERROR",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyRequest {
    pub location: LatLng,
    pub radius_m: f64,
    pub keyword: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub location: LatLng,
    #[serde(default)]
    pub vicinity: Option<String>,
    #[serde(default)]
    pub rating: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyResponse {
    pub status: PlacesStatus,
    pub results: Vec<Place>,
}

impl NearbyResponse {
    pub fn ok(results: Vec<Place>) -> Self {
        Self {
            status: PlacesStatus::Ok,
            results,
        }
    }

    pub fn status(status: PlacesStatus) -> Self {
        Self {
            status,
            results: Vec::new(),
        }
    }
}

/// Contract of the external mapping capability.
///
/// `is_available` must be a cheap synchronous check. Every other method may
/// assume it returned `true`; callers go through [`crate::GeoOps`], which
/// enforces that.
pub trait MapProvider: Send + Sync + 'static {
    /// Provider name for logging.
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    fn create_surface(&self, target: &MountTarget, options: &SurfaceOptions) -> Surface;

    fn create_marker(&self, options: &MarkerOptions) -> Marker;

    fn geocode<'a>(
        &'a self,
        address: &'a str,
    ) -> BoxFuture<'a, Result<Vec<GeocodeResult>, ProviderError>>;

    /// Spherical great-circle distance in meters.
    fn distance_m(&self, origin: LatLng, destination: LatLng) -> f64;

    fn route(&self, request: RouteRequest) -> BoxFuture<'_, Result<Route, ProviderError>>;

    fn nearby_search(&self, request: NearbyRequest) -> BoxFuture<'_, NearbyResponse>;
}

/// Adapts a provider's presence check to the loader's [`Probe`].
#[derive(Clone)]
pub struct ProviderProbe(pub Arc<dyn MapProvider>);

impl Probe for ProviderProbe {
    fn is_available(&self) -> bool {
        self.0.is_available()
    }
}

/// Builds a loader that waits for `provider` to become available.
pub fn loader_for(provider: Arc<dyn MapProvider>, config: LoaderConfig) -> ResourceLoader {
    ResourceLoader::new(Arc::new(ProviderProbe(provider)), config)
}
