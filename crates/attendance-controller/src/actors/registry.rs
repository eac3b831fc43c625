//! `SessionRegistryActor` - singleton supervisor for session actors.
//!
//! The registry owns the session-id to actor-handle map:
//!
//! - Singleton per controller instance
//! - Spawns one `SessionActor` per registered session
//! - Refuses registrations past the capacity ceiling (load shedding)
//! - Owns the root `CancellationToken` for graceful shutdown
//!
//! Session actors stay registered after reaching a terminal state so that
//! snapshots and status corrections keep working; they are torn down with
//! the registry at shutdown.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::messages::{RegistryMessage, RegistryStatus};
use super::session::{SessionActorHandle, SessionDeps};
use crate::errors::AttendanceError;
use crate::observability::metrics;
use crate::types::{Session, SessionSeed};

/// Channel buffer size for the registry mailbox.
const REGISTRY_CHANNEL_BUFFER: usize = 1000;

/// Handle to the `SessionRegistryActor`.
///
/// This is the public interface for interacting with the registry. All
/// methods are async and return results via oneshot channels.
#[derive(Clone)]
pub struct SessionRegistryHandle {
    sender: mpsc::Sender<RegistryMessage>,
    cancel_token: CancellationToken,
}

impl SessionRegistryHandle {
    /// Create a new `SessionRegistryActor` and return a handle to it.
    ///
    /// This spawns the actor task and returns immediately. `cancel_token`
    /// is the root token; each session actor gets a child of it.
    /// `max_sessions` is the registration ceiling (load shedding).
    #[must_use]
    pub fn new(deps: SessionDeps, max_sessions: usize, cancel_token: CancellationToken) -> Self {
        let (sender, receiver) = mpsc::channel(REGISTRY_CHANNEL_BUFFER);

        let actor = SessionRegistryActor {
            receiver,
            cancel_token: cancel_token.clone(),
            sessions: HashMap::new(),
            deps,
            max_sessions,
            accepting_new: true,
        };
        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Register a scheduled session, spawning its actor.
    pub async fn register_session(&self, seed: SessionSeed) -> Result<Session, AttendanceError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RegistryMessage::RegisterSession {
                seed,
                respond_to: tx,
            })
            .await
            .map_err(|e| AttendanceError::Internal(format!("channel send failed: {e}")))?;
        rx.await
            .map_err(|e| AttendanceError::Internal(format!("response receive failed: {e}")))?
    }

    /// Get a handle to an existing session actor.
    pub async fn get_session(
        &self,
        session_id: String,
    ) -> Result<SessionActorHandle, AttendanceError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RegistryMessage::GetSession {
                session_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| AttendanceError::Internal(format!("channel send failed: {e}")))?;
        rx.await
            .map_err(|e| AttendanceError::Internal(format!("response receive failed: {e}")))?
    }

    /// Handles to every registered session actor.
    pub async fn list_sessions(&self) -> Result<Vec<SessionActorHandle>, AttendanceError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RegistryMessage::ListSessions { respond_to: tx })
            .await
            .map_err(|e| AttendanceError::Internal(format!("channel send failed: {e}")))?;
        rx.await
            .map_err(|e| AttendanceError::Internal(format!("response receive failed: {e}")))
    }

    /// Current registry status.
    pub async fn get_status(&self) -> Result<RegistryStatus, AttendanceError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RegistryMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| AttendanceError::Internal(format!("channel send failed: {e}")))?;
        rx.await
            .map_err(|e| AttendanceError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the registry and every session actor (immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the registry is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// Internal state for a managed session.
struct ManagedSession {
    handle: SessionActorHandle,
    task_handle: JoinHandle<()>,
}

/// The `SessionRegistryActor` implementation.
struct SessionRegistryActor {
    receiver: mpsc::Receiver<RegistryMessage>,
    cancel_token: CancellationToken,
    sessions: HashMap<String, ManagedSession>,
    deps: SessionDeps,
    max_sessions: usize,
    accepting_new: bool,
}

impl SessionRegistryActor {
    /// Run the actor message loop.
    #[instrument(skip_all, name = "attendance.actor.registry")]
    async fn run(mut self) {
        info!(
            target: "attendance.actor.registry",
            "SessionRegistryActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "attendance.actor.registry",
                        "SessionRegistryActor received cancellation signal"
                    );
                    self.shutdown().await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message).await,
                        None => {
                            info!(
                                target: "attendance.actor.registry",
                                "SessionRegistryActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "attendance.actor.registry",
            sessions_remaining = self.sessions.len(),
            "SessionRegistryActor stopped"
        );
    }

    async fn handle_message(&mut self, message: RegistryMessage) {
        match message {
            RegistryMessage::RegisterSession { seed, respond_to } => {
                let _ = respond_to.send(self.register_session(seed));
            }
            RegistryMessage::GetSession {
                session_id,
                respond_to,
            } => {
                let result = self
                    .sessions
                    .get(&session_id)
                    .map(|managed| managed.handle.clone())
                    .ok_or(AttendanceError::SessionNotFound(session_id));
                let _ = respond_to.send(result);
            }
            RegistryMessage::ListSessions { respond_to } => {
                let handles = self
                    .sessions
                    .values()
                    .map(|managed| managed.handle.clone())
                    .collect();
                let _ = respond_to.send(handles);
            }
            RegistryMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(RegistryStatus {
                    session_count: self.sessions.len(),
                    accepting_new: self.accepting_new,
                });
            }
        }
    }

    fn register_session(&mut self, seed: SessionSeed) -> Result<Session, AttendanceError> {
        if !self.accepting_new {
            return Err(AttendanceError::Conflict(
                "registry is shutting down".to_string(),
            ));
        }
        if self.sessions.len() >= self.max_sessions {
            warn!(
                target: "attendance.actor.registry",
                session_count = self.sessions.len(),
                "refusing registration, capacity reached"
            );
            return Err(AttendanceError::CapacityExceeded);
        }
        if self.sessions.contains_key(&seed.id) {
            return Err(AttendanceError::Conflict(format!(
                "session already registered: {}",
                seed.id
            )));
        }

        let session_id = seed.id.clone();
        let snapshot = Session::from_seed(seed.clone());
        let (handle, task_handle) = SessionActorHandle::spawn(
            seed,
            self.deps.clone(),
            self.cancel_token.child_token(),
        );
        self.sessions.insert(
            session_id.clone(),
            ManagedSession {
                handle,
                task_handle,
            },
        );
        metrics::set_sessions_registered(self.sessions.len());

        info!(
            target: "attendance.actor.registry",
            session_id = %session_id,
            total_sessions = self.sessions.len(),
            "session registered"
        );

        Ok(snapshot)
    }

    async fn shutdown(&mut self) {
        self.accepting_new = false;

        for (session_id, managed) in &self.sessions {
            debug!(
                target: "attendance.actor.registry",
                session_id = %session_id,
                "cancelling session actor"
            );
            managed.handle.cancel();
        }

        for (session_id, managed) in self.sessions.drain() {
            match tokio::time::timeout(std::time::Duration::from_secs(5), managed.task_handle)
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        target: "attendance.actor.registry",
                        session_id = %session_id,
                        error = ?e,
                        "session actor task failed during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "attendance.actor.registry",
                        session_id = %session_id,
                        "session actor shutdown timed out"
                    );
                }
            }
        }
    }
}
