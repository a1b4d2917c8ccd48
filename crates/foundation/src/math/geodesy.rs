use serde::{Deserialize, Serialize};

/// WGS84 semi-major axis (meters).
///
/// Also the sphere radius used for great-circle distances, which keeps
/// results in line with what web mapping SDKs report.
pub const WGS84_A: f64 = 6_378_137.0;

/// Geographic coordinate in degrees.
///
/// No range validation is applied; whatever consumes the coordinate decides
/// what it accepts.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn lat_rad(self) -> f64 {
        self.lat.to_radians()
    }

    pub fn lng_rad(self) -> f64 {
        self.lng.to_radians()
    }
}

impl std::fmt::Display for LatLng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// Great-circle distance in meters on a sphere of radius `radius_m`.
///
/// Haversine form; numerically stable for small separations.
pub fn haversine_m(a: LatLng, b: LatLng, radius_m: f64) -> f64 {
    let dlat = b.lat_rad() - a.lat_rad();
    let dlng = b.lng_rad() - a.lng_rad();

    let s_lat = (dlat * 0.5).sin();
    let s_lng = (dlng * 0.5).sin();
    let h = s_lat * s_lat + a.lat_rad().cos() * b.lat_rad().cos() * s_lng * s_lng;

    2.0 * radius_m * h.sqrt().min(1.0).asin()
}

/// Great-circle distance in meters using [`WGS84_A`] as the sphere radius.
pub fn spherical_distance_m(a: LatLng, b: LatLng) -> f64 {
    haversine_m(a, b, WGS84_A)
}
