//! Location verification for scans.
//!
//! Distance is great-circle (haversine) over a spherical Earth, which is
//! accurate to well under a meter at room-geofence scales. Verification is
//! advisory: an out-of-radius scan is recorded anyway with
//! `location_verified = false` for later review.

use crate::config::RoomLocation;

/// Mean Earth radius in meters.
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Outcome of a geofence comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceCheck {
    /// Great-circle distance from the room's registered location.
    pub distance_meters: f64,
    /// Whether the scan fell inside the effective radius.
    pub within_radius: bool,
}

/// Great-circle distance between two WGS84 coordinates, in meters.
#[must_use]
pub fn haversine_distance_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Compare a scanner's reported position against a room's geofence.
///
/// The room's own radius takes precedence; `default_radius_meters` applies
/// when the room does not declare one.
#[must_use]
pub fn verify(
    room: &RoomLocation,
    latitude: f64,
    longitude: f64,
    default_radius_meters: f64,
) -> GeofenceCheck {
    let distance_meters = haversine_distance_meters(room.lat, room.lng, latitude, longitude);
    let radius = room.radius.unwrap_or(default_radius_meters);
    GeofenceCheck {
        distance_meters,
        within_radius: distance_meters <= radius,
    }
}
