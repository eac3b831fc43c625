//! Boundary traits for subsystems the controller consults but does not own.
//!
//! Enrollment and notification live outside this service. The traits here
//! are the seams: production wiring can back them with a directory service
//! or message bus, tests and the bundled binary use the in-memory and
//! logging implementations.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use crate::types::Session;

/// Read-only view of class enrollment.
pub trait EnrollmentDirectory: Send + Sync {
    /// Whether the participant has an active enrollment in the class.
    fn is_actively_enrolled(&self, class_id: &str, participant_id: &str) -> bool;

    /// All participants actively enrolled in the class.
    fn active_enrollees(&self, class_id: &str) -> Vec<String>;
}

/// In-memory enrollment, mutated directly by tests and the demo binary.
#[derive(Default)]
pub struct InMemoryEnrollmentDirectory {
    by_class: RwLock<HashMap<String, HashSet<String>>>,
}

impl InMemoryEnrollmentDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an active enrollment.
    pub fn enroll(&self, class_id: &str, participant_id: &str) {
        let mut by_class = self
            .by_class
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        by_class
            .entry(class_id.to_string())
            .or_default()
            .insert(participant_id.to_string());
    }

    /// Remove an enrollment (drop or withdrawal).
    pub fn withdraw(&self, class_id: &str, participant_id: &str) {
        let mut by_class = self
            .by_class
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(enrollees) = by_class.get_mut(class_id) {
            enrollees.remove(participant_id);
        }
    }
}

impl EnrollmentDirectory for InMemoryEnrollmentDirectory {
    fn is_actively_enrolled(&self, class_id: &str, participant_id: &str) -> bool {
        let by_class = self.by_class.read().unwrap_or_else(PoisonError::into_inner);
        by_class
            .get(class_id)
            .is_some_and(|enrollees| enrollees.contains(participant_id))
    }

    fn active_enrollees(&self, class_id: &str) -> Vec<String> {
        let by_class = self.by_class.read().unwrap_or_else(PoisonError::into_inner);
        let mut enrollees: Vec<String> = by_class
            .get(class_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        enrollees.sort();
        enrollees
    }
}

/// Outbound notifications triggered by lifecycle transitions.
///
/// Delivery is best-effort; implementations must not block the caller on
/// external I/O.
pub trait NotificationSink: Send + Sync {
    /// A session just became active and is accepting scans.
    fn session_started(&self, session: &Session);
}

/// Notification sink that only logs. Stands in until a real push channel is
/// wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotificationSink;

impl NotificationSink for LoggingNotificationSink {
    fn session_started(&self, session: &Session) {
        tracing::info!(
            target: "attendance.notify",
            session_id = %session.id,
            class_id = %session.class_id,
            "session started"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_enroll_and_check() {
        let directory = InMemoryEnrollmentDirectory::new();
        directory.enroll("c1", "p1");
        directory.enroll("c1", "p2");

        assert!(directory.is_actively_enrolled("c1", "p1"));
        assert!(!directory.is_actively_enrolled("c1", "p3"));
        assert!(!directory.is_actively_enrolled("c2", "p1"));
        assert_eq!(directory.active_enrollees("c1"), vec!["p1", "p2"]);
    }

    #[test]
    fn test_withdraw_removes_enrollment() {
        let directory = InMemoryEnrollmentDirectory::new();
        directory.enroll("c1", "p1");
        directory.withdraw("c1", "p1");

        assert!(!directory.is_actively_enrolled("c1", "p1"));
        assert!(directory.active_enrollees("c1").is_empty());
    }

    #[test]
    fn test_unknown_class_is_empty() {
        let directory = InMemoryEnrollmentDirectory::new();
        assert!(directory.active_enrollees("nope").is_empty());
    }
}
