//! Concurrency test: many identical scans race, exactly one record wins.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use attendance_controller::actors::{
    ScanInput, ScanSettings, SessionDeps, SessionRegistryHandle,
};
use attendance_controller::broadcast::SessionTopics;
use attendance_controller::clock::SystemClock;
use attendance_controller::errors::AttendanceError;
use attendance_controller::ports::{InMemoryEnrollmentDirectory, LoggingNotificationSink};
use attendance_controller::records::AttendanceLedger;
use attendance_controller::tokens::{TokenIssuer, TokenStore};
use attendance_controller::types::SessionSeed;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_identical_scans_yield_one_record() {
    const ATTEMPTS: usize = 16;

    let ledger = Arc::new(AttendanceLedger::new());
    let enrollment = Arc::new(InMemoryEnrollmentDirectory::new());
    enrollment.enroll("c1", "p1");

    let deps = SessionDeps {
        store: Arc::new(TokenStore::new(30_000)),
        ledger: Arc::clone(&ledger),
        enrollment,
        notifier: Arc::new(LoggingNotificationSink),
        topics: Arc::new(SessionTopics::new()),
        clock: Arc::new(SystemClock),
        issuer: TokenIssuer::new("http://localhost:8080", 90),
        settings: ScanSettings {
            late_threshold_minutes: 5,
            enable_geolocation: false,
            default_radius_meters: 100.0,
            room_locations: HashMap::new(),
        },
    };
    let registry = SessionRegistryHandle::new(deps, 16, CancellationToken::new());

    let now = Utc::now();
    registry
        .register_session(SessionSeed {
            id: "s1".to_string(),
            class_id: "c1".to_string(),
            room: None,
            scheduled_start: now,
            scheduled_end: now + Duration::hours(1),
        })
        .await
        .unwrap();
    let handle = registry.get_session("s1".to_string()).await.unwrap();
    let activation = handle.activate().await.unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..ATTEMPTS {
        let handle = handle.clone();
        let payload = activation.payload.clone();
        tasks.spawn(async move {
            handle
                .record_scan(ScanInput {
                    participant_id: "p1".to_string(),
                    payload,
                    latitude: None,
                    longitude: None,
                    device_fingerprint: None,
                    source_addr: None,
                })
                .await
        });
    }

    let mut accepted = 0;
    let mut duplicates = 0;
    let mut first_scanned_at: Option<DateTime<Utc>> = None;
    let mut duplicate_scanned_at: Vec<DateTime<Utc>> = Vec::new();
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(record) => {
                accepted += 1;
                first_scanned_at = Some(record.scanned_at);
            }
            Err(AttendanceError::DuplicateScan { scanned_at, .. }) => {
                duplicates += 1;
                duplicate_scanned_at.push(scanned_at);
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(duplicates, ATTEMPTS - 1);
    assert_eq!(ledger.for_session("s1").len(), 1);

    // Every rejection reported the winning record's scan time.
    let winner = first_scanned_at.unwrap();
    assert!(duplicate_scanned_at.iter().all(|t| *t == winner));

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.attendance_count, 1);
}
