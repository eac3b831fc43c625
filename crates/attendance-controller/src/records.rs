//! Attendance record storage.
//!
//! The ledger is keyed by `(session_id, participant_id)`, which makes the
//! one-record-per-participant-per-session rule structural: the second insert
//! for the same pair cannot create a row, it can only observe the first.
//! Writes for a single session are additionally serialized by that session's
//! actor, but the ledger does not rely on it.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AttendanceError;
use crate::types::{AttendanceRecord, AttendanceStatus};

/// Input captured from a scan, before the ledger stamps identity fields.
#[derive(Debug, Clone)]
pub struct ScanRecord {
    pub session_id: String,
    pub participant_id: String,
    pub scanned_at: DateTime<Utc>,
    pub status: AttendanceStatus,
    pub minutes_late: u32,
    pub device_fingerprint: Option<String>,
    pub source_addr: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_verified: bool,
    pub location_distance: Option<f64>,
}

/// In-memory attendance records, uniquely keyed per (session, participant).
pub struct AttendanceLedger {
    records: Mutex<HashMap<(String, String), AttendanceRecord>>,
}

impl Default for AttendanceLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AttendanceLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Record a scan, enforcing first-scan-wins idempotency.
    ///
    /// If a record already exists for the pair, returns
    /// [`AttendanceError::DuplicateScan`] carrying the existing record's
    /// status and scan time; the stored record is never modified by a retry.
    pub fn insert_scan(&self, scan: ScanRecord) -> Result<AttendanceRecord, AttendanceError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (scan.session_id.clone(), scan.participant_id.clone());

        if let Some(existing) = records.get(&key) {
            return Err(AttendanceError::DuplicateScan {
                status: existing.status,
                scanned_at: existing.scanned_at,
            });
        }

        let record = AttendanceRecord {
            id: Uuid::new_v4().to_string(),
            session_id: scan.session_id,
            participant_id: scan.participant_id,
            scanned_at: scan.scanned_at,
            status: scan.status,
            minutes_late: scan.minutes_late,
            device_fingerprint: scan.device_fingerprint,
            source_addr: scan.source_addr,
            latitude: scan.latitude,
            longitude: scan.longitude,
            location_verified: scan.location_verified,
            location_distance: scan.location_distance,
            status_changed_by: None,
            status_changed_at: None,
            status_change_reason: None,
        };
        records.insert(key, record.clone());
        Ok(record)
    }

    /// Create `absent` records for every enrollee in `enrolled` that has no
    /// record for `session_id` yet. The whole batch happens under one lock
    /// acquisition, so a concurrent read sees either none or all of the
    /// synthesized records. Returns the records created.
    pub fn mark_absent_for_missing(
        &self,
        session_id: &str,
        enrolled: &[String],
        now: DateTime<Utc>,
    ) -> Vec<AttendanceRecord> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut created = Vec::new();

        for participant_id in enrolled {
            let key = (session_id.to_string(), participant_id.clone());
            if records.contains_key(&key) {
                continue;
            }
            let record = AttendanceRecord {
                id: Uuid::new_v4().to_string(),
                session_id: session_id.to_string(),
                participant_id: participant_id.clone(),
                scanned_at: now,
                status: AttendanceStatus::Absent,
                minutes_late: 0,
                device_fingerprint: None,
                source_addr: None,
                latitude: None,
                longitude: None,
                location_verified: false,
                location_distance: None,
                status_changed_by: None,
                status_changed_at: None,
                status_change_reason: None,
            };
            records.insert(key, record.clone());
            created.push(record);
        }
        created
    }

    /// Look up a record by its identifier.
    #[must_use]
    pub fn get(&self, record_id: &str) -> Option<AttendanceRecord> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.values().find(|r| r.id == record_id).cloned()
    }

    /// Look up the record for one (session, participant) pair.
    #[must_use]
    pub fn get_for_participant(
        &self,
        session_id: &str,
        participant_id: &str,
    ) -> Option<AttendanceRecord> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records
            .get(&(session_id.to_string(), participant_id.to_string()))
            .cloned()
    }

    /// All records for a session, ordered by scan time.
    #[must_use]
    pub fn for_session(&self, session_id: &str) -> Vec<AttendanceRecord> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<_> = records
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.scanned_at);
        out
    }

    /// Manually correct a record's status, stamping the audit fields.
    ///
    /// Returns the updated record together with the status it replaced so
    /// the caller can adjust the session's running count.
    pub fn correct_status(
        &self,
        record_id: &str,
        new_status: AttendanceStatus,
        changed_by: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(AttendanceRecord, AttendanceStatus), AttendanceError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let record = records
            .values_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| AttendanceError::RecordNotFound(record_id.to_string()))?;

        let previous = record.status;
        record.status = new_status;
        record.status_changed_by = Some(changed_by.to_string());
        record.status_changed_at = Some(now);
        record.status_change_reason = reason;
        Ok((record.clone(), previous))
    }
}
