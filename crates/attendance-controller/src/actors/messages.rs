//! Message types for actor communication.
//!
//! All inter-actor communication uses strongly-typed message passing via
//! `tokio::sync::mpsc`. Response patterns use `tokio::sync::oneshot` for
//! request-reply semantics.

use serde::Serialize;
use tokio::sync::oneshot;

use crate::errors::AttendanceError;
use crate::types::{AttendanceRecord, AttendanceStatus, ScanPayload, Session, SessionSeed};

/// Messages sent to `SessionRegistryActor`.
#[derive(Debug)]
pub enum RegistryMessage {
    /// Register a scheduled session and spawn its actor.
    RegisterSession {
        seed: SessionSeed,
        /// Response channel for the initial session snapshot or error.
        respond_to: oneshot::Sender<Result<Session, AttendanceError>>,
    },

    /// Get a handle to an existing session actor.
    GetSession {
        session_id: String,
        /// Response channel for the session actor handle or error.
        respond_to: oneshot::Sender<Result<super::session::SessionActorHandle, AttendanceError>>,
    },

    /// Handles to every registered session actor (rotation timer input).
    ListSessions {
        respond_to: oneshot::Sender<Vec<super::session::SessionActorHandle>>,
    },

    /// Current registry status (for health checks and gauges).
    GetStatus {
        respond_to: oneshot::Sender<RegistryStatus>,
    },
}

/// Messages sent to a `SessionActor`.
#[derive(Debug)]
pub enum SessionMessage {
    /// Transition `scheduled -> active` and issue the first token.
    Activate {
        respond_to: oneshot::Sender<Result<ActivationResult, AttendanceError>>,
    },

    /// Issue a fresh token while active; the superseded one stays valid.
    Rotate {
        respond_to: oneshot::Sender<Result<RotationResult, AttendanceError>>,
    },

    /// Transition `active -> completed`, synthesizing absent records.
    Complete {
        respond_to: oneshot::Sender<Result<CompletionResult, AttendanceError>>,
    },

    /// Transition to `cancelled` from `scheduled` or `active`.
    Cancel {
        reason: String,
        respond_to: oneshot::Sender<Result<Session, AttendanceError>>,
    },

    /// Record a validated scan for a participant.
    RecordScan {
        input: ScanInput,
        respond_to: oneshot::Sender<Result<AttendanceRecord, AttendanceError>>,
    },

    /// Manually override an attendance record's status.
    CorrectStatus {
        record_id: String,
        new_status: AttendanceStatus,
        changed_by: String,
        reason: Option<String>,
        respond_to: oneshot::Sender<Result<AttendanceRecord, AttendanceError>>,
    },

    /// Current session state snapshot.
    GetSnapshot {
        respond_to: oneshot::Sender<Session>,
    },
}

/// A validated scan, ready for the session actor to record.
///
/// The token layer has already vouched for the payload; the actor performs
/// the session-scoped checks (active state, enrollment, uniqueness).
#[derive(Debug, Clone)]
pub struct ScanInput {
    pub participant_id: String,
    pub payload: ScanPayload,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub device_fingerprint: Option<String>,
    pub source_addr: Option<String>,
}

/// Result of a successful activation.
#[derive(Debug, Clone, Serialize)]
pub struct ActivationResult {
    /// Session snapshot after the transition.
    pub session: Session,
    /// First token's wire payload.
    pub payload: ScanPayload,
    /// Deep link to render as the scannable code.
    pub deep_link: String,
    /// Token expiry, epoch milliseconds.
    pub expires_at_ms: i64,
}

/// Result of a successful rotation.
#[derive(Debug, Clone, Serialize)]
pub struct RotationResult {
    pub payload: ScanPayload,
    pub deep_link: String,
    pub expires_at_ms: i64,
}

/// Result of a successful completion.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResult {
    /// Session snapshot after the transition.
    pub session: Session,
    /// Absent records synthesized for enrollees that never scanned.
    pub absent_synthesized: usize,
    /// Tokens purged from the store.
    pub tokens_purged: usize,
}

/// Status of the `SessionRegistryActor`.
#[derive(Debug, Clone)]
pub struct RegistryStatus {
    /// Total registered sessions (any lifecycle state).
    pub session_count: usize,
    /// Whether new registrations are accepted.
    pub accepting_new: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_input_clone() {
        let input = ScanInput {
            participant_id: "p1".to_string(),
            payload: ScanPayload {
                token: "tok".to_string(),
                sid: "s1".to_string(),
                ts: 0,
                exp: None,
            },
            latitude: Some(40.0),
            longitude: Some(-74.0),
            device_fingerprint: Some("Mozilla/5.0".to_string()),
            source_addr: Some("10.0.0.1:54321".to_string()),
        };
        let cloned = input.clone();
        assert_eq!(input.participant_id, cloned.participant_id);
        assert_eq!(input.latitude, cloned.latitude);
    }

    #[test]
    fn test_registry_status_fields() {
        let status = RegistryStatus {
            session_count: 0,
            accepting_new: true,
        };
        assert_eq!(status.session_count, 0);
        assert!(status.accepting_new);
    }
}
