//! Great-circle distance helpers.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Mean Earth radius in miles.
pub const EARTH_RADIUS_MILES: f64 = 6371.0 * 0.621371;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

fn central_angle(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Haversine distance in metres.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    EARTH_RADIUS_M * central_angle(a, b)
}

/// Haversine distance in miles.
pub fn haversine_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    EARTH_RADIUS_MILES * central_angle(a, b)
}
