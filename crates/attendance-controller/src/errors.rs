//! Attendance controller error types.
//!
//! Every validation and recording failure is a typed variant returned to the
//! caller; nothing in the core retries automatically (a rejected scan is a
//! client-side "scan the latest code" decision). Variants map to HTTP status
//! codes via `IntoResponse`; internal details are logged server-side and not
//! exposed to clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{AttendanceStatus, SessionStatus};

/// Attendance controller error type.
#[derive(Debug, Error)]
pub enum AttendanceError {
    /// Scan payload failed structured decode or is missing required fields.
    #[error("Invalid scan payload: {0}")]
    InvalidFormat(String),

    /// Token is past its expiry plus the grace window.
    #[error("QR code has expired. Please scan the latest QR code.")]
    Expired,

    /// Token is still stored but was issued for a different session.
    #[error("Scan payload does not match the issuing session")]
    SessionMismatch,

    /// Session not found.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Operation requires an active session.
    #[error("Session is not active: {0}")]
    SessionNotActive(String),

    /// Illegal lifecycle transition.
    #[error("Invalid transition: cannot {attempted} a {from} session")]
    InvalidTransition {
        from: SessionStatus,
        attempted: &'static str,
    },

    /// Participant has no active enrollment for the session's class.
    #[error("Participant is not enrolled in this class")]
    NotEnrolled,

    /// An attendance record already exists for (session, participant).
    /// Carries the existing record's status and scan time so the client can
    /// show "already marked".
    #[error("Attendance already marked")]
    DuplicateScan {
        status: AttendanceStatus,
        scanned_at: DateTime<Utc>,
    },

    /// Attendance record not found (status correction target).
    #[error("Attendance record not found: {0}")]
    RecordNotFound(String),

    /// Registry refused to create another session (load shedding).
    #[error("Session capacity exceeded")]
    CapacityExceeded,

    /// Conflict (e.g. session id already registered).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error (channel failures, serialization).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AttendanceError {
    fn into_response(self) -> Response {
        let status = match &self {
            AttendanceError::InvalidFormat(msg) => {
                tracing::debug!(target: "attendance.http", %msg, "rejected malformed payload");
                StatusCode::BAD_REQUEST
            }
            AttendanceError::Expired => StatusCode::GONE,
            AttendanceError::SessionMismatch => StatusCode::CONFLICT,
            AttendanceError::SessionNotFound(_) | AttendanceError::RecordNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AttendanceError::SessionNotActive(_)
            | AttendanceError::InvalidTransition { .. }
            | AttendanceError::Conflict(_) => StatusCode::CONFLICT,
            AttendanceError::NotEnrolled => StatusCode::FORBIDDEN,
            AttendanceError::DuplicateScan { .. } => StatusCode::CONFLICT,
            AttendanceError::CapacityExceeded => StatusCode::TOO_MANY_REQUESTS,
            AttendanceError::Internal(msg) => {
                tracing::error!(target: "attendance.http", %msg, "internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match &self {
            // Clients use the embedded attendance info to display the
            // original scan rather than treating the retry as a failure.
            AttendanceError::DuplicateScan {
                status: record_status,
                scanned_at,
            } => serde_json::json!({
                "error": self.to_string(),
                "attendance": {
                    "status": record_status,
                    "scanned_at": scanned_at,
                }
            }),
            AttendanceError::Internal(_) => serde_json::json!({
                "error": "Internal server error"
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
