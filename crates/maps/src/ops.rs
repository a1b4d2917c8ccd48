use std::sync::Arc;

use foundation::LatLng;
use tracing::{debug, warn};

use crate::provider::{
    MapProvider, Marker, MarkerOptions, MountTarget, NearbyRequest, Place, PlacesStatus,
    Route, RouteRequest, Surface, SurfaceOptions, TravelMode, Waypoint,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeoError {
    #[error("mapping capability is not ready")]
    NotReady,
    #[error("nearby search failed with status {0}")]
    SearchFailed(PlacesStatus),
}

/// Geospatial operations gated on the capability being present.
///
/// None of these trigger loading. Each one checks presence first and bails
/// out with [`GeoError::NotReady`] before touching the provider; bringing the
/// capability up is the job of [`runtime::ResourceLoader`].
#[derive(Clone)]
pub struct GeoOps {
    provider: Arc<dyn MapProvider>,
}

impl std::fmt::Debug for GeoOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoOps")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl GeoOps {
    pub fn new(provider: Arc<dyn MapProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn MapProvider> {
        &self.provider
    }

    fn ready(&self) -> Result<&dyn MapProvider, GeoError> {
        if self.provider.is_available() {
            Ok(self.provider.as_ref())
        } else {
            Err(GeoError::NotReady)
        }
    }

    pub fn create_surface(
        &self,
        target: &MountTarget,
        options: &SurfaceOptions,
    ) -> Result<Surface, GeoError> {
        let provider = self.ready()?;
        let surface = provider.create_surface(target, options);
        debug!(surface = %surface.id, target = target.label(), "surface created");
        Ok(surface)
    }

    pub fn create_marker(&self, options: &MarkerOptions) -> Result<Marker, GeoError> {
        Ok(self.ready()?.create_marker(options))
    }

    /// Coordinate of the first match for `address`.
    ///
    /// `Ok(None)` means "no result": zero matches and provider failures
    /// both land here (the latter is logged).
    pub async fn geocode_address(&self, address: &str) -> Result<Option<LatLng>, GeoError> {
        let provider = self.ready()?;
        match provider.geocode(address).await {
            Ok(results) => Ok(results.first().map(|r| r.location)),
            Err(err) => {
                warn!(address, "geocoding failed: {err}");
                Ok(None)
            }
        }
    }

    /// Great-circle distance in kilometers, as computed by the provider.
    pub fn calculate_distance(
        &self,
        origin: LatLng,
        destination: LatLng,
    ) -> Result<f64, GeoError> {
        Ok(self.ready()?.distance_m(origin, destination) / 1000.0)
    }

    /// Route between two waypoints, or `Ok(None)` when none could be found.
    pub async fn get_directions(
        &self,
        origin: impl Into<Waypoint>,
        destination: impl Into<Waypoint>,
        travel_mode: TravelMode,
    ) -> Result<Option<Route>, GeoError> {
        let provider = self.ready()?;
        let request = RouteRequest {
            origin: origin.into(),
            destination: destination.into(),
            travel_mode,
        };
        match provider.route(request).await {
            Ok(route) => Ok(Some(route)),
            Err(err) => {
                warn!(?travel_mode, "directions request failed: {err}");
                Ok(None)
            }
        }
    }

    /// Places matching `keyword` within `radius_m` of `location`.
    ///
    /// Unlike geocoding and directions, any non-OK status is an error so
    /// callers can tell a broken query from an empty neighbourhood.
    pub async fn search_nearby(
        &self,
        location: LatLng,
        radius_m: f64,
        keyword: &str,
    ) -> Result<Vec<Place>, GeoError> {
        let provider = self.ready()?;
        let response = provider
            .nearby_search(NearbyRequest {
                location,
                radius_m,
                keyword: keyword.to_string(),
            })
            .await;
        if response.status.is_ok() {
            Ok(response.results)
        } else {
            Err(GeoError::SearchFailed(response.status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GeoError, GeoOps};
    use crate::provider::{
        GeocodeResult, MarkerOptions, MountTarget, NearbyResponse, Place, PlacesStatus,
        ProviderError, SurfaceOptions, TravelMode,
    };
    use crate::simulated::SimulatedProvider;
    use foundation::{Id, LatLng};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn ready_provider() -> Arc<SimulatedProvider> {
        let provider = Arc::new(SimulatedProvider::new());
        provider.set_available(true);
        provider
    }

    fn options() -> SurfaceOptions {
        SurfaceOptions {
            center: LatLng::new(0.0, 0.0),
            zoom: 3,
            map_type: Default::default(),
        }
    }

    fn place(name: &str) -> Place {
        Place {
            id: name.to_lowercase(),
            name: name.to_string(),
            location: LatLng::new(0.0, 0.0),
            vicinity: None,
            rating: None,
        }
    }

    #[tokio::test]
    async fn every_operation_refuses_before_ready() {
        let provider = Arc::new(SimulatedProvider::new());
        let ops = GeoOps::new(provider.clone());
        let target = MountTarget::new(Id::new(1), "dash");
        let p = LatLng::new(1.0, 1.0);

        assert_eq!(ops.create_surface(&target, &options()), Err(GeoError::NotReady));
        assert_eq!(
            ops.create_marker(&MarkerOptions::at(p)).unwrap_err(),
            GeoError::NotReady
        );
        assert_eq!(ops.geocode_address("x").await, Err(GeoError::NotReady));
        assert_eq!(ops.calculate_distance(p, p), Err(GeoError::NotReady));
        assert_eq!(
            ops.get_directions(p, p, TravelMode::Driving).await,
            Err(GeoError::NotReady)
        );
        assert_eq!(ops.search_nearby(p, 100.0, "food").await, Err(GeoError::NotReady));

        let counts = provider.counters();
        assert_eq!(counts.surfaces, 0);
        assert_eq!(counts.markers, 0);
        assert_eq!(counts.geocodes, 0);
        assert_eq!(counts.routes, 0);
        assert_eq!(counts.searches, 0);
    }

    #[tokio::test]
    async fn geocode_returns_first_match() {
        let provider = ready_provider();
        provider.script_geocode(
            "Depot",
            Ok(vec![
                GeocodeResult {
                    location: LatLng::new(1.0, 2.0),
                    formatted_address: "Depot, North".into(),
                },
                GeocodeResult {
                    location: LatLng::new(3.0, 4.0),
                    formatted_address: "Depot, South".into(),
                },
            ]),
        );
        let ops = GeoOps::new(provider);
        assert_eq!(
            ops.geocode_address("Depot").await,
            Ok(Some(LatLng::new(1.0, 2.0)))
        );
    }

    #[tokio::test]
    async fn geocode_zero_results_is_absent() {
        let ops = GeoOps::new(ready_provider());
        assert_eq!(ops.geocode_address("nowhere").await, Ok(None));
    }

    #[tokio::test]
    async fn geocode_provider_failure_is_absent() {
        let provider = ready_provider();
        provider.script_geocode("flaky", Err(ProviderError::Network("reset".into())));
        let ops = GeoOps::new(provider);
        assert_eq!(ops.geocode_address("flaky").await, Ok(None));
    }

    #[tokio::test]
    async fn directions_failure_is_absent() {
        let provider = ready_provider();
        provider.script_route(Err(ProviderError::Status("NOT_FOUND".into())));
        let ops = GeoOps::new(provider);
        assert_eq!(
            ops.get_directions("a", "b", TravelMode::Walking).await,
            Ok(None)
        );
    }

    #[tokio::test]
    async fn directions_between_coordinates() {
        let ops = GeoOps::new(ready_provider());
        let route = ops
            .get_directions(LatLng::new(0.0, 0.0), LatLng::new(0.0, 1.0), TravelMode::Driving)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(route.legs.len(), 1);
        assert!((route.distance_m() / 1000.0 - 111.3).abs() < 0.5);
    }

    #[test]
    fn distance_between_identical_points_is_zero() {
        let ops = GeoOps::new(ready_provider());
        let p = LatLng::new(-1.2921, 36.8219);
        assert_eq!(ops.calculate_distance(p, p), Ok(0.0));
    }

    #[tokio::test]
    async fn nearby_ok_returns_results() {
        let provider = ready_provider();
        provider.script_nearby(NearbyResponse::ok(vec![place("Clinic"), place("School")]));
        let ops = GeoOps::new(provider);
        let places = ops
            .search_nearby(LatLng::new(0.0, 0.0), 500.0, "aid")
            .await
            .unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].name, "Clinic");
    }

    #[tokio::test]
    async fn nearby_non_ok_status_is_an_error() {
        let provider = ready_provider();
        let ops = GeoOps::new(provider.clone());

        for status in [
            PlacesStatus::ZeroResults,
            PlacesStatus::OverQueryLimit,
            PlacesStatus::RequestDenied,
        ] {
            provider.script_nearby(NearbyResponse::status(status));
            assert_eq!(
                ops.search_nearby(LatLng::new(0.0, 0.0), 500.0, "aid").await,
                Err(GeoError::SearchFailed(status))
            );
        }
    }

    #[test]
    fn markers_attach_to_surfaces() {
        let ops = GeoOps::new(ready_provider());
        let surface = ops
            .create_surface(&MountTarget::new(Id::new(9), "map"), &options())
            .unwrap();
        let marker = ops
            .create_marker(&MarkerOptions::at(LatLng::new(1.0, 1.0)).on(&surface).titled("Hub"))
            .unwrap();
        assert_eq!(marker.surface, Some(surface.id));
        assert_eq!(marker.title.as_deref(), Some("Hub"));
    }
}
