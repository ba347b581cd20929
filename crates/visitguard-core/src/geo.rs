//! Great-circle distance between two coordinates.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS-84 coordinate in decimal degrees.
///
/// No range validation is applied: out-of-range values flow through the
/// trigonometry unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Surface distance to `other` in meters.
    #[must_use]
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_distance_m(*self, *other)
    }
}

/// Haversine distance in meters on a spherical Earth of radius [`EARTH_RADIUS_M`].
#[must_use]
pub fn haversine_distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let delta_phi = (b.latitude - a.latitude).to_radians();
    let delta_lambda = (b.longitude - a.longitude).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Render a distance the way clients display it: fixed two decimals.
#[must_use]
pub fn format_distance(meters: f64) -> String {
    format!("{meters:.2}")
}
