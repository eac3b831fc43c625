//! Core domain types shared across the controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a session (one scheduled meeting occurrence).
///
/// `scheduled -> active -> completed` is the happy path; `cancelled` is
/// reachable from `scheduled` or `active`. Both `completed` and `cancelled`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Scheduled,
    Active,
    Cancelled,
    Completed,
}

impl SessionStatus {
    /// Returns the status as a lowercase string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Active => "active",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Completed => "completed",
        }
    }

    /// Whether this state admits no further transitions.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Cancelled | SessionStatus::Completed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status recorded on an attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    Excused,
}

impl AttendanceStatus {
    /// Returns the status as a lowercase string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Excused => "excused",
        }
    }

    /// Whether this status counts toward the session's running
    /// `attendance_count` (everything except `absent`).
    #[must_use]
    pub const fn counts_as_attended(&self) -> bool {
        !matches!(self, AttendanceStatus::Absent)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of a session at registration time. The scheduling
/// subsystem owns these fields; the controller only materializes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSeed {
    /// Session identifier (UUID string).
    pub id: String,
    /// Parent class identifier (enrollment scope).
    pub class_id: String,
    /// Room reference used for geofence lookup. Optional.
    pub room: Option<String>,
    /// Scheduled start of the meeting window.
    pub scheduled_start: DateTime<Utc>,
    /// Scheduled end of the meeting window.
    pub scheduled_end: DateTime<Utc>,
}

/// Mutable session state owned by its `SessionActor`.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub class_id: String,
    pub room: Option<String>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub status: SessionStatus,
    /// Redundant cache of `status == active`, kept for API consumers.
    pub is_active: bool,
    /// Identifier of the most recently issued token, if any.
    pub current_token: Option<String>,
    /// Expiry of the most recently issued token (epoch milliseconds).
    pub token_expires_at_ms: Option<i64>,
    /// Running count of records with status in {present, late, excused}.
    pub attendance_count: u32,
    /// Snapshot of active enrollment taken at activation.
    pub total_enrolled: u32,
    /// Reason recorded at cancellation.
    pub cancel_reason: Option<String>,
}

impl Session {
    /// Materialize a freshly scheduled session from its seed.
    #[must_use]
    pub fn from_seed(seed: SessionSeed) -> Self {
        Self {
            id: seed.id,
            class_id: seed.class_id,
            room: seed.room,
            scheduled_start: seed.scheduled_start,
            scheduled_end: seed.scheduled_end,
            status: SessionStatus::Scheduled,
            is_active: false,
            current_token: None,
            token_expires_at_ms: None,
            attendance_count: 0,
            total_enrolled: 0,
            cancel_reason: None,
        }
    }
}

/// The wire payload a participant's device presents at scan time.
///
/// Field names are the compact QR wire format: `token` (opaque identifier),
/// `sid` (session id), `ts` (issuance, epoch ms), `exp` (expiry, epoch ms).
/// Transient; validated but never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPayload {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// One attendance record per (session, participant).
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRecord {
    pub id: String,
    pub session_id: String,
    pub participant_id: String,
    pub scanned_at: DateTime<Utc>,
    pub status: AttendanceStatus,
    pub minutes_late: u32,
    pub device_fingerprint: Option<String>,
    pub source_addr: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Whether the claimed location fell inside the room's geofence.
    pub location_verified: bool,
    /// Great-circle distance from the room in meters, when computed.
    pub location_distance: Option<f64>,
    pub status_changed_by: Option<String>,
    pub status_changed_at: Option<DateTime<Utc>>,
    pub status_change_reason: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_status_terminal_states() {
        assert!(!SessionStatus::Scheduled.is_terminal());
        assert!(!SessionStatus::Active.is_terminal());
        assert!(SessionStatus::Cancelled.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
    }

    #[test]
    fn test_attendance_status_counting() {
        assert!(AttendanceStatus::Present.counts_as_attended());
        assert!(AttendanceStatus::Late.counts_as_attended());
        assert!(AttendanceStatus::Excused.counts_as_attended());
        assert!(!AttendanceStatus::Absent.counts_as_attended());
    }

    #[test]
    fn test_scan_payload_wire_format() {
        let payload = ScanPayload {
            token: "abc".to_string(),
            sid: "session-1".to_string(),
            ts: 1_000,
            exp: Some(91_000),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"token":"abc","sid":"session-1","ts":1000,"exp":91000}"#);
    }

    #[test]
    fn test_scan_payload_tolerates_missing_optional_fields() {
        // Only `sid` is semantically required; validation rejects an empty
        // one, but decode must not fail on sparse payloads.
        let payload: ScanPayload = serde_json::from_str(r#"{"sid":"s1"}"#).unwrap();
        assert_eq!(payload.sid, "s1");
        assert_eq!(payload.ts, 0);
        assert!(payload.exp.is_none());
        assert!(payload.token.is_empty());
    }

    #[test]
    fn test_session_from_seed_starts_scheduled() {
        let seed = SessionSeed {
            id: "s1".to_string(),
            class_id: "c1".to_string(),
            room: Some("A-101".to_string()),
            scheduled_start: Utc::now(),
            scheduled_end: Utc::now(),
        };
        let session = Session::from_seed(seed);
        assert_eq!(session.status, SessionStatus::Scheduled);
        assert!(!session.is_active);
        assert!(session.current_token.is_none());
        assert_eq!(session.attendance_count, 0);
    }
}
