//! Metrics definitions for the attendance controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `attendance_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `status`: 4 values (present, late, absent, excused)
//! - `reason`: 4 values (session_not_active, not_enrolled, duplicate,
//!   invalid_token)

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder and return the handle for
/// serving the `/metrics` endpoint.
///
/// Must be called before any metrics are recorded; recording without a
/// recorder falls through to a no-op, which is the test-mode behavior.
///
/// # Errors
///
/// Returns an error if the recorder fails to install (e.g., already
/// installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Record an accepted scan.
///
/// Metric: `attendance_scans_total`
/// Labels: `status` (present, late)
pub fn record_scan(status: crate::types::AttendanceStatus) {
    counter!("attendance_scans_total", "status" => status.as_str()).increment(1);
}

/// Record a rejected scan.
///
/// Metric: `attendance_scans_rejected_total`
/// Labels: `reason` (session_not_active, not_enrolled, duplicate,
/// invalid_token)
pub fn record_scan_rejected(reason: &'static str) {
    counter!("attendance_scans_rejected_total", "reason" => reason).increment(1);
}

/// Record a token rotation.
///
/// Metric: `attendance_token_rotations_total`
pub fn record_rotation() {
    counter!("attendance_token_rotations_total").increment(1);
}

/// Set the number of registered sessions.
///
/// Metric: `attendance_sessions_registered`
pub fn set_sessions_registered(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("attendance_sessions_registered").set(count as f64);
}

/// Set the number of tokens resident in the store.
///
/// Metric: `attendance_tokens_stored`
pub fn set_tokens_stored(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("attendance_tokens_stored").set(count as f64);
}
