//! Attendance recording handlers.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::actors::ScanInput;
use crate::errors::AttendanceError;
use crate::observability::metrics;
use crate::tokens;
use crate::types::{AttendanceRecord, AttendanceStatus, ScanPayload};

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    /// Decoded QR content: either the payload object itself or the payload
    /// as a JSON string (clients that pass the raw QR text through).
    pub qr_data: serde_json::Value,
    pub participant_id: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// `POST /api/v1/attendance/scan` - record a proof-of-presence scan.
///
/// Token checks run here against the shared store; session-scoped checks
/// (active state, enrollment, uniqueness) run inside the session actor.
pub async fn scan(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<ScanRequest>,
) -> Result<(StatusCode, Json<AttendanceRecord>), AttendanceError> {
    if request.participant_id.is_empty() {
        return Err(AttendanceError::InvalidFormat(
            "missing participant identifier".to_string(),
        ));
    }

    let payload = parse_payload(&request.qr_data)?;
    let session_id = tokens::validate(&payload, &state.store, state.limits, state.clock.now_ms())
        .inspect_err(|_| metrics::record_scan_rejected("invalid_token"))?;

    let device_fingerprint = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);
    let source_addr = connect_info.map(|ConnectInfo(addr)| addr.to_string());

    let handle = state.registry.get_session(session_id).await?;
    let record = handle
        .record_scan(ScanInput {
            participant_id: request.participant_id,
            payload,
            latitude: request.latitude,
            longitude: request.longitude,
            device_fingerprint,
            source_addr,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Deserialize)]
pub struct CorrectionRequest {
    pub status: AttendanceStatus,
    pub changed_by: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `POST /api/v1/attendance/{record_id}/status` - manual status override.
///
/// Routed through the record's session actor so the running attendance
/// count stays consistent with the correction.
pub async fn correct_status(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    Json(request): Json<CorrectionRequest>,
) -> Result<Json<AttendanceRecord>, AttendanceError> {
    let existing = state
        .ledger
        .get(&record_id)
        .ok_or_else(|| AttendanceError::RecordNotFound(record_id.clone()))?;

    let handle = state.registry.get_session(existing.session_id).await?;
    let record = handle
        .correct_status(record_id, request.status, request.changed_by, request.reason)
        .await?;
    Ok(Json(record))
}

/// Per-status tallies for a session's roster.
#[derive(Debug, Serialize)]
pub struct RosterSummary {
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub excused: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct RosterResponse {
    pub session_id: String,
    pub summary: RosterSummary,
    pub records: Vec<AttendanceRecord>,
}

/// `GET /api/v1/sessions/{id}/attendance` - roster with per-status tallies.
pub async fn session_roster(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RosterResponse>, AttendanceError> {
    // 404 for unknown sessions; an empty roster is a valid answer for a
    // known one.
    state.registry.get_session(id.clone()).await?;

    let records = state.ledger.for_session(&id);
    let mut summary = RosterSummary {
        present: 0,
        late: 0,
        absent: 0,
        excused: 0,
        total: records.len(),
    };
    for record in &records {
        match record.status {
            AttendanceStatus::Present => summary.present += 1,
            AttendanceStatus::Late => summary.late += 1,
            AttendanceStatus::Absent => summary.absent += 1,
            AttendanceStatus::Excused => summary.excused += 1,
        }
    }

    Ok(Json(RosterResponse {
        session_id: id,
        summary,
        records,
    }))
}

/// Decode the scan body's `qr_data` into a payload.
///
/// Accepts the payload as a JSON object or as a string containing JSON;
/// anything else is a malformed scan.
fn parse_payload(qr_data: &serde_json::Value) -> Result<ScanPayload, AttendanceError> {
    let payload = match qr_data {
        serde_json::Value::String(raw) => serde_json::from_str(raw),
        serde_json::Value::Object(_) => serde_json::from_value(qr_data.clone()),
        _ => {
            return Err(AttendanceError::InvalidFormat(
                "qr_data must be a payload object or JSON string".to_string(),
            ))
        }
    };
    payload.map_err(|e| AttendanceError::InvalidFormat(format!("payload decode failed: {e}")))
}
