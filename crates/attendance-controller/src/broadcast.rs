//! Per-session realtime event fan-out.
//!
//! Each active session gets its own `tokio::sync::broadcast` channel;
//! subscribers (SSE connections) attach to exactly one session's stream and
//! never see another session's events. Publishing to a session with no
//! subscribers is a no-op, and a slow subscriber that falls more than the
//! channel capacity behind loses the oldest events rather than stalling the
//! publisher.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::types::{AttendanceStatus, ScanPayload};

/// Events delivered to session subscribers.
///
/// Serialized with an `event` tag so stream consumers can dispatch without
/// inspecting the payload shape.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A fresh token replaced the displayed code.
    TokenRotated {
        session_id: String,
        payload: ScanPayload,
        deep_link: String,
        expires_at_ms: i64,
    },
    /// A scan was accepted (or an absent record was synthesized).
    AttendanceRecorded {
        session_id: String,
        participant_id: String,
        status: AttendanceStatus,
        scanned_at: DateTime<Utc>,
        running_count: u32,
    },
}

/// Buffered events per subscriber before the oldest are dropped.
const TOPIC_CAPACITY: usize = 64;

/// Registry of per-session broadcast channels.
pub struct SessionTopics {
    topics: RwLock<HashMap<String, broadcast::Sender<SessionEvent>>>,
}

impl Default for SessionTopics {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTopics {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to a session's event stream, creating the topic on first
    /// use. Subscribers only receive events published after this call.
    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<SessionEvent> {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        topics
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to a session's subscribers. Returns the number of
    /// subscribers the event reached.
    pub fn publish(&self, session_id: &str, event: SessionEvent) -> usize {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        match topics.get(session_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Drop a session's topic. Existing receivers observe stream end.
    pub fn remove(&self, session_id: &str) {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        topics.remove(session_id);
    }
}
