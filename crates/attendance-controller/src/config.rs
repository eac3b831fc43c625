//! Attendance controller configuration.
//!
//! Configuration is loaded from environment variables. Every knob has a
//! default; malformed values are rejected with `ConfigError::InvalidValue`
//! rather than silently falling back.

use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::tokens::TokenLimits;

/// Default token validity window in seconds.
pub const DEFAULT_QR_EXPIRY_SECONDS: u64 = 90;

/// Default display rotation cadence in seconds. Shorter than expiry so that
/// consecutive tokens have overlapping validity windows.
pub const DEFAULT_QR_ROTATION_INTERVAL_SECONDS: u64 = 30;

/// Default grace window past nominal expiry, absorbing clock skew and
/// network latency.
pub const DEFAULT_QR_GRACE_PERIOD_SECONDS: u64 = 30;

/// Default lateness threshold in minutes.
pub const DEFAULT_LATE_THRESHOLD_MINUTES: u32 = 5;

/// Default geofence radius in meters for rooms without an explicit radius.
pub const DEFAULT_LOCATION_VERIFICATION_RADIUS_METERS: f64 = 100.0;

/// Default API bind address.
pub const DEFAULT_HTTP_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default public base URL embedded in scan deep links.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Default cadence of the background token sweep in seconds.
pub const DEFAULT_TOKEN_SWEEP_INTERVAL_SECONDS: u64 = 60;

/// Default cap on concurrently registered sessions (load shedding).
pub const DEFAULT_MAX_SESSIONS: u32 = 1000;

/// Registered coordinates for one room, used by the geofence check.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RoomLocation {
    pub lat: f64,
    pub lng: f64,
    /// Per-room override of the verification radius in meters.
    #[serde(default)]
    pub radius: Option<f64>,
}

/// Attendance controller configuration.
///
/// Loaded from environment variables with defaults for every field.
#[derive(Debug, Clone)]
pub struct Config {
    /// API bind address (default: "0.0.0.0:8080").
    pub http_bind_address: String,

    /// Health/metrics bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,

    /// Public base URL embedded in scan deep links.
    pub base_url: String,

    /// Token validity window in seconds (`QR_EXPIRY_SECONDS`).
    pub qr_expiry_seconds: u64,

    /// Display rotation cadence in seconds (`QR_ROTATION_INTERVAL_SECONDS`).
    pub qr_rotation_interval_seconds: u64,

    /// Grace window past expiry in seconds (`QR_GRACE_PERIOD_SECONDS`).
    pub qr_grace_period_seconds: u64,

    /// Minutes after scheduled start before a scan is marked late.
    pub late_threshold_minutes: u32,

    /// Whether to compute geofence checks for scans carrying a location.
    pub enable_geolocation: bool,

    /// Fallback geofence radius in meters.
    pub location_verification_radius_meters: f64,

    /// Room coordinate table, parsed from the `ROOM_LOCATIONS` JSON map
    /// (`{"A-101": {"lat": 28.6, "lng": 77.2, "radius": 75}}`).
    pub room_locations: HashMap<String, RoomLocation>,

    /// Cadence of the background token sweep in seconds.
    pub token_sweep_interval_seconds: u64,

    /// Whether the server drives rotation on the configured cadence in
    /// addition to the owner-triggered rotate endpoint.
    pub auto_rotate: bool,

    /// Maximum concurrently registered sessions.
    pub max_sessions: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

fn parse_var<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match vars.get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

fn parse_bool(
    vars: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match vars.get(key) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected boolean, got {other:?}"),
            }),
        },
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let http_bind_address = vars
            .get("HTTP_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HTTP_BIND_ADDRESS.to_string());

        let health_bind_address = vars
            .get("HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let base_url = vars
            .get("BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let qr_expiry_seconds =
            parse_var(vars, "QR_EXPIRY_SECONDS", DEFAULT_QR_EXPIRY_SECONDS)?;
        let qr_rotation_interval_seconds = parse_var(
            vars,
            "QR_ROTATION_INTERVAL_SECONDS",
            DEFAULT_QR_ROTATION_INTERVAL_SECONDS,
        )?;
        let qr_grace_period_seconds = parse_var(
            vars,
            "QR_GRACE_PERIOD_SECONDS",
            DEFAULT_QR_GRACE_PERIOD_SECONDS,
        )?;
        let late_threshold_minutes = parse_var(
            vars,
            "LATE_THRESHOLD_MINUTES",
            DEFAULT_LATE_THRESHOLD_MINUTES,
        )?;
        let enable_geolocation = parse_bool(vars, "ENABLE_GEOLOCATION", false)?;
        let location_verification_radius_meters = parse_var(
            vars,
            "LOCATION_VERIFICATION_RADIUS_METERS",
            DEFAULT_LOCATION_VERIFICATION_RADIUS_METERS,
        )?;
        let token_sweep_interval_seconds = parse_var(
            vars,
            "TOKEN_SWEEP_INTERVAL_SECONDS",
            DEFAULT_TOKEN_SWEEP_INTERVAL_SECONDS,
        )?;
        let auto_rotate = parse_bool(vars, "AUTO_ROTATE", false)?;
        let max_sessions = parse_var(vars, "MAX_SESSIONS", DEFAULT_MAX_SESSIONS)?;

        let room_locations = match vars.get("ROOM_LOCATIONS") {
            None => HashMap::new(),
            Some(raw) => {
                serde_json::from_str(raw).map_err(|e| ConfigError::InvalidValue {
                    key: "ROOM_LOCATIONS".to_string(),
                    message: e.to_string(),
                })?
            }
        };

        Ok(Config {
            http_bind_address,
            health_bind_address,
            base_url,
            qr_expiry_seconds,
            qr_rotation_interval_seconds,
            qr_grace_period_seconds,
            late_threshold_minutes,
            enable_geolocation,
            location_verification_radius_meters,
            room_locations,
            token_sweep_interval_seconds,
            auto_rotate,
            max_sessions,
        })
    }

    /// Token validity limits in milliseconds, derived from the second-based
    /// environment knobs.
    #[must_use]
    pub fn token_limits(&self) -> TokenLimits {
        TokenLimits {
            expiry_ms: (self.qr_expiry_seconds * 1000) as i64,
            grace_ms: (self.qr_grace_period_seconds * 1000) as i64,
        }
    }
}
