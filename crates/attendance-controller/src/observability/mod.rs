//! Observability for the attendance controller.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `attendance_scans_total` | Counter | `status` | Accepted scans |
//! | `attendance_scans_rejected_total` | Counter | `reason` | Rejected scans |
//! | `attendance_token_rotations_total` | Counter | none | Token rotations |
//! | `attendance_sessions_registered` | Gauge | none | Registered sessions |
//! | `attendance_tokens_stored` | Gauge | none | Tokens resident in store |
//!
//! Label cardinality is bounded by enums in code; no participant or session
//! identifiers ever become labels.

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
