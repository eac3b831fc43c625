//! `SessionActor` - one actor per session, owning its lifecycle state.
//!
//! All transitions, scans, and corrections for a session flow through this
//! actor's mailbox, so check-then-transition and check-then-record are
//! atomic without explicit locking. A scan racing a completion is accepted
//! if the actor dequeues it first; no token is ever issued after a terminal
//! state is reached.
//!
//! The actor stays resident after reaching a terminal state: it refuses
//! further transitions and scans but keeps serving snapshots and manual
//! status corrections.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::messages::{
    ActivationResult, CompletionResult, RotationResult, ScanInput, SessionMessage,
};
use crate::broadcast::{SessionEvent, SessionTopics};
use crate::clock::Clock;
use crate::config::RoomLocation;
use crate::errors::AttendanceError;
use crate::geofence;
use crate::observability::metrics;
use crate::ports::{EnrollmentDirectory, NotificationSink};
use crate::records::{AttendanceLedger, ScanRecord};
use crate::tokens::{TokenIssuer, TokenStore};
use crate::types::{AttendanceRecord, AttendanceStatus, Session, SessionSeed, SessionStatus};

/// Channel buffer size for a session mailbox.
const SESSION_CHANNEL_BUFFER: usize = 256;

/// Scan policy knobs shared by every session actor.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Grace period after `scheduled_start` before a scan counts as late.
    pub late_threshold_minutes: u32,
    /// Whether claimed coordinates are checked against room geofences.
    pub enable_geolocation: bool,
    /// Geofence radius for rooms that do not declare their own.
    pub default_radius_meters: f64,
    /// Registered room coordinates, keyed by room reference.
    pub room_locations: HashMap<String, RoomLocation>,
}

/// Shared collaborators injected into every session actor.
#[derive(Clone)]
pub struct SessionDeps {
    pub store: Arc<TokenStore>,
    pub ledger: Arc<AttendanceLedger>,
    pub enrollment: Arc<dyn EnrollmentDirectory>,
    pub notifier: Arc<dyn NotificationSink>,
    pub topics: Arc<SessionTopics>,
    pub clock: Arc<dyn Clock>,
    pub issuer: TokenIssuer,
    pub settings: ScanSettings,
}

/// Handle to a `SessionActor`.
#[derive(Debug, Clone)]
pub struct SessionActorHandle {
    sender: mpsc::Sender<SessionMessage>,
    cancel_token: CancellationToken,
}

impl SessionActorHandle {
    /// Spawn a session actor for a freshly registered session.
    #[must_use]
    pub fn spawn(
        seed: SessionSeed,
        deps: SessionDeps,
        cancel_token: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_BUFFER);
        let actor = SessionActor {
            session: Session::from_seed(seed),
            receiver,
            cancel_token: cancel_token.clone(),
            deps,
        };
        let task_handle = tokio::spawn(actor.run());
        (
            Self {
                sender,
                cancel_token,
            },
            task_handle,
        )
    }

    /// Activate the session and get the first token.
    pub async fn activate(&self) -> Result<ActivationResult, AttendanceError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::Activate { respond_to: tx }).await?;
        Self::receive(rx).await?
    }

    /// Rotate to a fresh token.
    pub async fn rotate(&self) -> Result<RotationResult, AttendanceError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::Rotate { respond_to: tx }).await?;
        Self::receive(rx).await?
    }

    /// Complete the session, synthesizing absent records.
    pub async fn complete(&self) -> Result<CompletionResult, AttendanceError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::Complete { respond_to: tx }).await?;
        Self::receive(rx).await?
    }

    /// Cancel the session with a reason.
    pub async fn cancel_session(&self, reason: String) -> Result<Session, AttendanceError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::Cancel {
            reason,
            respond_to: tx,
        })
        .await?;
        Self::receive(rx).await?
    }

    /// Record a validated scan.
    pub async fn record_scan(&self, input: ScanInput) -> Result<AttendanceRecord, AttendanceError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::RecordScan {
            input,
            respond_to: tx,
        })
        .await?;
        Self::receive(rx).await?
    }

    /// Manually correct a record's status.
    pub async fn correct_status(
        &self,
        record_id: String,
        new_status: AttendanceStatus,
        changed_by: String,
        reason: Option<String>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::CorrectStatus {
            record_id,
            new_status,
            changed_by,
            reason,
            respond_to: tx,
        })
        .await?;
        Self::receive(rx).await?
    }

    /// Current session snapshot.
    pub async fn snapshot(&self) -> Result<Session, AttendanceError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::GetSnapshot { respond_to: tx })
            .await?;
        Self::receive(rx).await
    }

    /// Cancel the actor task (shutdown, not a lifecycle transition).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    async fn send(&self, message: SessionMessage) -> Result<(), AttendanceError> {
        self.sender
            .send(message)
            .await
            .map_err(|e| AttendanceError::Internal(format!("channel send failed: {e}")))
    }

    async fn receive<T>(rx: oneshot::Receiver<T>) -> Result<T, AttendanceError> {
        rx.await
            .map_err(|e| AttendanceError::Internal(format!("response receive failed: {e}")))
    }
}

/// The `SessionActor` implementation.
struct SessionActor {
    session: Session,
    receiver: mpsc::Receiver<SessionMessage>,
    cancel_token: CancellationToken,
    deps: SessionDeps,
}

impl SessionActor {
    /// Run the actor message loop.
    #[instrument(skip_all, name = "attendance.actor.session", fields(session_id = %self.session.id))]
    async fn run(mut self) {
        debug!(
            target: "attendance.actor.session",
            session_id = %self.session.id,
            "SessionActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "attendance.actor.session",
                        session_id = %self.session.id,
                        "SessionActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message),
                        None => break,
                    }
                }
            }
        }

        debug!(
            target: "attendance.actor.session",
            session_id = %self.session.id,
            status = %self.session.status,
            "SessionActor stopped"
        );
    }

    fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Activate { respond_to } => {
                let _ = respond_to.send(self.activate());
            }
            SessionMessage::Rotate { respond_to } => {
                let _ = respond_to.send(self.rotate());
            }
            SessionMessage::Complete { respond_to } => {
                let _ = respond_to.send(self.complete());
            }
            SessionMessage::Cancel { reason, respond_to } => {
                let _ = respond_to.send(self.cancel(reason));
            }
            SessionMessage::RecordScan { input, respond_to } => {
                let _ = respond_to.send(self.record_scan(input));
            }
            SessionMessage::CorrectStatus {
                record_id,
                new_status,
                changed_by,
                reason,
                respond_to,
            } => {
                let _ =
                    respond_to.send(self.correct_status(&record_id, new_status, &changed_by, reason));
            }
            SessionMessage::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.session.clone());
            }
        }
    }

    fn activate(&mut self) -> Result<ActivationResult, AttendanceError> {
        if self.session.status != SessionStatus::Scheduled {
            return Err(AttendanceError::InvalidTransition {
                from: self.session.status,
                attempted: "activate",
            });
        }

        let enrollees = self.deps.enrollment.active_enrollees(&self.session.class_id);
        let issued = self.deps.issuer.issue(
            &self.deps.store,
            &self.session.id,
            self.deps.clock.now_ms(),
        )?;

        self.session.status = SessionStatus::Active;
        self.session.is_active = true;
        self.session.total_enrolled = enrollees.len() as u32;
        self.session.current_token = Some(issued.token.clone());
        self.session.token_expires_at_ms = Some(issued.expires_at_ms);

        // Fire-and-forget; a failed notification never fails activation.
        self.deps.notifier.session_started(&self.session);

        info!(
            target: "attendance.actor.session",
            session_id = %self.session.id,
            total_enrolled = self.session.total_enrolled,
            "session activated"
        );

        Ok(ActivationResult {
            session: self.session.clone(),
            payload: issued.payload,
            deep_link: issued.deep_link,
            expires_at_ms: issued.expires_at_ms,
        })
    }

    fn rotate(&mut self) -> Result<RotationResult, AttendanceError> {
        if self.session.status != SessionStatus::Active {
            return Err(AttendanceError::SessionNotActive(self.session.id.clone()));
        }

        // The superseded token stays in the store; overlapping validity lets
        // a participant finish scanning the code they are looking at.
        let issued = self.deps.issuer.issue(
            &self.deps.store,
            &self.session.id,
            self.deps.clock.now_ms(),
        )?;

        self.session.current_token = Some(issued.token.clone());
        self.session.token_expires_at_ms = Some(issued.expires_at_ms);

        self.deps.topics.publish(
            &self.session.id,
            SessionEvent::TokenRotated {
                session_id: self.session.id.clone(),
                payload: issued.payload.clone(),
                deep_link: issued.deep_link.clone(),
                expires_at_ms: issued.expires_at_ms,
            },
        );
        metrics::record_rotation();

        debug!(
            target: "attendance.actor.session",
            session_id = %self.session.id,
            expires_at_ms = issued.expires_at_ms,
            "token rotated"
        );

        Ok(RotationResult {
            payload: issued.payload,
            deep_link: issued.deep_link,
            expires_at_ms: issued.expires_at_ms,
        })
    }

    fn complete(&mut self) -> Result<CompletionResult, AttendanceError> {
        if self.session.status != SessionStatus::Active {
            return Err(AttendanceError::InvalidTransition {
                from: self.session.status,
                attempted: "complete",
            });
        }

        let enrollees = self.deps.enrollment.active_enrollees(&self.session.class_id);
        let synthesized = self.deps.ledger.mark_absent_for_missing(
            &self.session.id,
            &enrollees,
            self.deps.clock.now_utc(),
        );
        for record in &synthesized {
            self.deps.topics.publish(
                &self.session.id,
                SessionEvent::AttendanceRecorded {
                    session_id: self.session.id.clone(),
                    participant_id: record.participant_id.clone(),
                    status: record.status,
                    scanned_at: record.scanned_at,
                    running_count: self.session.attendance_count,
                },
            );
        }

        let tokens_purged = self.deps.store.delete_all_for_session(&self.session.id);
        self.session.status = SessionStatus::Completed;
        self.session.is_active = false;
        self.session.current_token = None;
        self.session.token_expires_at_ms = None;
        self.deps.topics.remove(&self.session.id);

        info!(
            target: "attendance.actor.session",
            session_id = %self.session.id,
            absent_synthesized = synthesized.len(),
            tokens_purged,
            attendance_count = self.session.attendance_count,
            "session completed"
        );

        Ok(CompletionResult {
            session: self.session.clone(),
            absent_synthesized: synthesized.len(),
            tokens_purged,
        })
    }

    fn cancel(&mut self, reason: String) -> Result<Session, AttendanceError> {
        if self.session.status.is_terminal() {
            return Err(AttendanceError::InvalidTransition {
                from: self.session.status,
                attempted: "cancel",
            });
        }

        let tokens_purged = self.deps.store.delete_all_for_session(&self.session.id);
        self.session.status = SessionStatus::Cancelled;
        self.session.is_active = false;
        self.session.current_token = None;
        self.session.token_expires_at_ms = None;
        self.session.cancel_reason = Some(reason);
        self.deps.topics.remove(&self.session.id);

        info!(
            target: "attendance.actor.session",
            session_id = %self.session.id,
            tokens_purged,
            "session cancelled"
        );

        Ok(self.session.clone())
    }

    fn record_scan(&mut self, input: ScanInput) -> Result<AttendanceRecord, AttendanceError> {
        if self.session.status != SessionStatus::Active {
            metrics::record_scan_rejected("session_not_active");
            return Err(AttendanceError::SessionNotActive(self.session.id.clone()));
        }

        if !self
            .deps
            .enrollment
            .is_actively_enrolled(&self.session.class_id, &input.participant_id)
        {
            metrics::record_scan_rejected("not_enrolled");
            return Err(AttendanceError::NotEnrolled);
        }

        let scanned_at = self.deps.clock.now_utc();
        let (status, minutes_late) = lateness(
            self.session.scheduled_start,
            scanned_at,
            self.deps.settings.late_threshold_minutes,
        );
        let (location_verified, location_distance) =
            self.check_geofence(input.latitude, input.longitude);

        let record = self
            .deps
            .ledger
            .insert_scan(ScanRecord {
                session_id: self.session.id.clone(),
                participant_id: input.participant_id.clone(),
                scanned_at,
                status,
                minutes_late,
                device_fingerprint: input.device_fingerprint,
                source_addr: input.source_addr,
                latitude: input.latitude,
                longitude: input.longitude,
                location_verified,
                location_distance,
            })
            .inspect_err(|_| metrics::record_scan_rejected("duplicate"))?;

        if record.status.counts_as_attended() {
            self.session.attendance_count += 1;
        }
        self.deps.topics.publish(
            &self.session.id,
            SessionEvent::AttendanceRecorded {
                session_id: self.session.id.clone(),
                participant_id: record.participant_id.clone(),
                status: record.status,
                scanned_at: record.scanned_at,
                running_count: self.session.attendance_count,
            },
        );
        metrics::record_scan(record.status);

        info!(
            target: "attendance.actor.session",
            session_id = %self.session.id,
            participant_id = %record.participant_id,
            status = %record.status,
            minutes_late = record.minutes_late,
            location_verified = record.location_verified,
            "attendance recorded"
        );

        Ok(record)
    }

    fn correct_status(
        &mut self,
        record_id: &str,
        new_status: AttendanceStatus,
        changed_by: &str,
        reason: Option<String>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let (record, previous) = self.deps.ledger.correct_status(
            record_id,
            new_status,
            changed_by,
            reason,
            self.deps.clock.now_utc(),
        )?;

        // Keep attendance_count equal to the number of records counting as
        // attended; only absent<->other corrections move it.
        match (previous.counts_as_attended(), new_status.counts_as_attended()) {
            (false, true) => self.session.attendance_count += 1,
            (true, false) => {
                self.session.attendance_count = self.session.attendance_count.saturating_sub(1);
            }
            _ => {}
        }

        self.deps.topics.publish(
            &self.session.id,
            SessionEvent::AttendanceRecorded {
                session_id: self.session.id.clone(),
                participant_id: record.participant_id.clone(),
                status: record.status,
                scanned_at: record.scanned_at,
                running_count: self.session.attendance_count,
            },
        );

        info!(
            target: "attendance.actor.session",
            session_id = %self.session.id,
            record_id = %record.id,
            previous = %previous,
            new = %record.status,
            changed_by,
            "attendance status corrected"
        );

        Ok(record)
    }

    fn check_geofence(
        &self,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> (bool, Option<f64>) {
        if !self.deps.settings.enable_geolocation {
            return (false, None);
        }
        let (Some(lat), Some(lng)) = (latitude, longitude) else {
            return (false, None);
        };
        let Some(room) = self
            .session
            .room
            .as_ref()
            .and_then(|room| self.deps.settings.room_locations.get(room))
        else {
            warn!(
                target: "attendance.actor.session",
                session_id = %self.session.id,
                room = ?self.session.room,
                "geolocation enabled but room has no registered coordinates"
            );
            return (false, None);
        };

        let check = geofence::verify(room, lat, lng, self.deps.settings.default_radius_meters);
        (check.within_radius, Some(check.distance_meters))
    }
}

/// Classify a scan against the scheduled start.
///
/// A scan at exactly the threshold is `present`; one second past it is
/// `late`. `minutes_late` is whole minutes elapsed, zero for present scans
/// and for scans before the scheduled start.
fn lateness(
    scheduled_start: chrono::DateTime<chrono::Utc>,
    scanned_at: chrono::DateTime<chrono::Utc>,
    late_threshold_minutes: u32,
) -> (AttendanceStatus, u32) {
    let elapsed_seconds = (scanned_at - scheduled_start).num_seconds();
    if elapsed_seconds > i64::from(late_threshold_minutes) * 60 {
        (AttendanceStatus::Late, (elapsed_seconds / 60) as u32)
    } else {
        (AttendanceStatus::Present, 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ports::{InMemoryEnrollmentDirectory, LoggingNotificationSink};
    use crate::tokens::TokenLimits;
    use crate::types::ScanPayload;
    use chrono::{DateTime, Duration, Utc};

    const START_MS: i64 = 1_700_000_000_000;

    fn start() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(START_MS).unwrap()
    }

    fn seed(id: &str) -> SessionSeed {
        SessionSeed {
            id: id.to_string(),
            class_id: "c1".to_string(),
            room: Some("A-101".to_string()),
            scheduled_start: start(),
            scheduled_end: start() + Duration::hours(1),
        }
    }

    struct Harness {
        handle: SessionActorHandle,
        clock: Arc<ManualClock>,
        store: Arc<TokenStore>,
        ledger: Arc<AttendanceLedger>,
        enrollment: Arc<InMemoryEnrollmentDirectory>,
        topics: Arc<SessionTopics>,
    }

    fn spawn_session(id: &str, enrollees: &[&str]) -> Harness {
        let limits = TokenLimits {
            expiry_ms: 90_000,
            grace_ms: 30_000,
        };
        let clock = Arc::new(ManualClock::at_ms(START_MS));
        let store = Arc::new(TokenStore::new(limits.grace_ms));
        let ledger = Arc::new(AttendanceLedger::new());
        let enrollment = Arc::new(InMemoryEnrollmentDirectory::new());
        for participant in enrollees {
            enrollment.enroll("c1", participant);
        }
        let topics = Arc::new(SessionTopics::new());

        let mut room_locations = HashMap::new();
        room_locations.insert(
            "A-101".to_string(),
            RoomLocation {
                lat: 0.0,
                lng: 0.0,
                radius: None,
            },
        );
        let deps = SessionDeps {
            store: Arc::clone(&store),
            ledger: Arc::clone(&ledger),
            enrollment: Arc::clone(&enrollment) as Arc<dyn EnrollmentDirectory>,
            notifier: Arc::new(LoggingNotificationSink),
            topics: Arc::clone(&topics),
            clock: Arc::clone(&clock) as Arc<dyn Clock>,
            issuer: TokenIssuer::new("http://localhost:8080", 90),
            settings: ScanSettings {
                late_threshold_minutes: 5,
                enable_geolocation: true,
                default_radius_meters: 100.0,
                room_locations,
            },
        };

        let (handle, _task) = SessionActorHandle::spawn(seed(id), deps, CancellationToken::new());
        Harness {
            handle,
            clock,
            store,
            ledger,
            enrollment,
            topics,
        }
    }

    fn scan(participant: &str, payload: ScanPayload) -> ScanInput {
        ScanInput {
            participant_id: participant.to_string(),
            payload,
            latitude: None,
            longitude: None,
            device_fingerprint: Some("test-agent".to_string()),
            source_addr: None,
        }
    }

    #[tokio::test]
    async fn test_activate_issues_token_and_snapshots_enrollment() {
        let h = spawn_session("s1", &["p1", "p2", "p3"]);
        let activation = h.handle.activate().await.unwrap();

        assert_eq!(activation.session.status, SessionStatus::Active);
        assert!(activation.session.is_active);
        assert_eq!(activation.session.total_enrolled, 3);
        assert_eq!(activation.expires_at_ms, START_MS + 90_000);
        assert!(h.store.get(&activation.payload.token).is_some());
    }

    #[tokio::test]
    async fn test_activate_twice_is_invalid_transition() {
        let h = spawn_session("s1", &["p1"]);
        h.handle.activate().await.unwrap();

        let result = h.handle.activate().await;
        assert!(matches!(
            result,
            Err(AttendanceError::InvalidTransition {
                from: SessionStatus::Active,
                attempted: "activate",
            })
        ));
    }

    #[tokio::test]
    async fn test_rotate_requires_active() {
        let h = spawn_session("s1", &["p1"]);
        let result = h.handle.rotate().await;
        assert!(matches!(result, Err(AttendanceError::SessionNotActive(_))));
    }

    #[tokio::test]
    async fn test_rotate_keeps_previous_token_resident() {
        let h = spawn_session("s1", &["p1"]);
        let activation = h.handle.activate().await.unwrap();

        h.clock.advance(Duration::seconds(30));
        let rotation = h.handle.rotate().await.unwrap();

        assert_ne!(rotation.payload.token, activation.payload.token);
        assert!(h.store.get(&activation.payload.token).is_some());
        assert!(h.store.get(&rotation.payload.token).is_some());
    }

    #[tokio::test]
    async fn test_scan_at_threshold_is_present_one_second_later_is_late() {
        let h = spawn_session("s1", &["p1", "p2"]);
        let activation = h.handle.activate().await.unwrap();

        h.clock.set_ms(START_MS + 5 * 60 * 1000);
        let record = h
            .handle
            .record_scan(scan("p1", activation.payload.clone()))
            .await
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.minutes_late, 0);

        h.clock.advance(Duration::seconds(1));
        let record = h
            .handle
            .record_scan(scan("p2", activation.payload.clone()))
            .await
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::Late);
        assert_eq!(record.minutes_late, 5);
    }

    #[tokio::test]
    async fn test_duplicate_scan_reports_original() {
        let h = spawn_session("s1", &["p1"]);
        let activation = h.handle.activate().await.unwrap();

        let first = h
            .handle
            .record_scan(scan("p1", activation.payload.clone()))
            .await
            .unwrap();

        h.clock.advance(Duration::seconds(10));
        let retry = h
            .handle
            .record_scan(scan("p1", activation.payload.clone()))
            .await;
        match retry {
            Err(AttendanceError::DuplicateScan { status, scanned_at }) => {
                assert_eq!(status, AttendanceStatus::Present);
                assert_eq!(scanned_at, first.scanned_at);
            }
            other => panic!("expected DuplicateScan, got {other:?}"),
        }

        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.attendance_count, 1);
    }

    #[tokio::test]
    async fn test_scan_by_unenrolled_participant() {
        let h = spawn_session("s1", &["p1"]);
        let activation = h.handle.activate().await.unwrap();

        let result = h
            .handle
            .record_scan(scan("stranger", activation.payload.clone()))
            .await;
        assert!(matches!(result, Err(AttendanceError::NotEnrolled)));
    }

    #[tokio::test]
    async fn test_scan_with_location_inside_geofence() {
        let h = spawn_session("s1", &["p1"]);
        let activation = h.handle.activate().await.unwrap();

        let mut input = scan("p1", activation.payload.clone());
        input.latitude = Some(0.0001);
        input.longitude = Some(0.0);
        let record = h.handle.record_scan(input).await.unwrap();

        assert!(record.location_verified);
        let distance = record.location_distance.unwrap();
        assert!(distance > 0.0 && distance < 100.0);
    }

    #[tokio::test]
    async fn test_scan_outside_geofence_is_recorded_unverified() {
        let h = spawn_session("s1", &["p1"]);
        let activation = h.handle.activate().await.unwrap();

        let mut input = scan("p1", activation.payload.clone());
        input.latitude = Some(1.0);
        input.longitude = Some(1.0);
        let record = h.handle.record_scan(input).await.unwrap();

        assert!(!record.location_verified);
        assert!(record.location_distance.unwrap() > 100.0);
    }

    #[tokio::test]
    async fn test_complete_synthesizes_absent_records() {
        let enrollees: Vec<String> = (1..=10).map(|i| format!("p{i}")).collect();
        let refs: Vec<&str> = enrollees.iter().map(String::as_str).collect();
        let h = spawn_session("s1", &refs);
        let activation = h.handle.activate().await.unwrap();

        for participant in &refs[..3] {
            h.handle
                .record_scan(scan(participant, activation.payload.clone()))
                .await
                .unwrap();
        }

        let completion = h.handle.complete().await.unwrap();
        assert_eq!(completion.absent_synthesized, 7);
        assert_eq!(completion.session.status, SessionStatus::Completed);
        assert_eq!(completion.session.attendance_count, 3);
        assert!(completion.session.current_token.is_none());
        assert!(h.store.is_empty());
        assert_eq!(h.ledger.for_session("s1").len(), 10);
    }

    #[tokio::test]
    async fn test_scan_after_complete_is_rejected() {
        let h = spawn_session("s1", &["p1"]);
        let activation = h.handle.activate().await.unwrap();
        h.handle.complete().await.unwrap();

        let result = h
            .handle
            .record_scan(scan("p1", activation.payload.clone()))
            .await;
        assert!(matches!(result, Err(AttendanceError::SessionNotActive(_))));
    }

    #[tokio::test]
    async fn test_cancel_from_scheduled_and_not_from_terminal() {
        let h = spawn_session("s1", &["p1"]);
        let cancelled = h
            .handle
            .cancel_session("instructor out sick".to_string())
            .await
            .unwrap();
        assert_eq!(cancelled.status, SessionStatus::Cancelled);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("instructor out sick"));

        let result = h.handle.cancel_session("again".to_string()).await;
        assert!(matches!(
            result,
            Err(AttendanceError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_correction_adjusts_running_count() {
        let h = spawn_session("s1", &["p1", "p2"]);
        let activation = h.handle.activate().await.unwrap();
        h.handle
            .record_scan(scan("p1", activation.payload.clone()))
            .await
            .unwrap();
        let completion = h.handle.complete().await.unwrap();
        assert_eq!(completion.session.attendance_count, 1);

        // p2 was synthesized absent; excusing them bumps the count.
        let absent = h.ledger.get_for_participant("s1", "p2").unwrap();
        let corrected = h
            .handle
            .correct_status(
                absent.id.clone(),
                AttendanceStatus::Excused,
                "instructor-1".to_string(),
                Some("family emergency".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(corrected.status, AttendanceStatus::Excused);

        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.attendance_count, 2);

        // And marking a present record absent lowers it again.
        let present = h.ledger.get_for_participant("s1", "p1").unwrap();
        h.handle
            .correct_status(
                present.id.clone(),
                AttendanceStatus::Absent,
                "instructor-1".to_string(),
                None,
            )
            .await
            .unwrap();
        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.attendance_count, 1);
    }

    #[tokio::test]
    async fn test_rotation_publishes_to_topic() {
        let h = spawn_session("s1", &["p1"]);
        h.handle.activate().await.unwrap();

        let mut rx = h.topics.subscribe("s1");
        h.handle.rotate().await.unwrap();

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::TokenRotated { .. }));
    }

    #[tokio::test]
    async fn test_enrollment_withdrawal_before_scan() {
        let h = spawn_session("s1", &["p1"]);
        let activation = h.handle.activate().await.unwrap();

        h.enrollment.withdraw("c1", "p1");
        let result = h
            .handle
            .record_scan(scan("p1", activation.payload.clone()))
            .await;
        assert!(matches!(result, Err(AttendanceError::NotEnrolled)));
    }

    #[test]
    fn test_lateness_never_negative() {
        // Scan before the scheduled start is simply present.
        let (status, minutes) = lateness(start(), start() - Duration::minutes(10), 5);
        assert_eq!(status, AttendanceStatus::Present);
        assert_eq!(minutes, 0);
    }

    #[test]
    fn test_lateness_floor_minutes() {
        let (status, minutes) = lateness(start(), start() + Duration::seconds(7 * 60 + 59), 5);
        assert_eq!(status, AttendanceStatus::Late);
        assert_eq!(minutes, 7);
    }
}
