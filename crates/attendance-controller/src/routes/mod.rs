//! HTTP surface of the attendance controller.
//!
//! Session lifecycle and attendance recording are exposed under `/api/v1`;
//! health and metrics live on a separate listener (see
//! [`crate::observability`]). Handlers stay thin: decode, dispatch to the
//! actor system, encode. Error-to-status mapping lives on
//! [`crate::errors::AttendanceError`]'s `IntoResponse` impl.

pub mod attendance;
pub mod sessions;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::actors::SessionRegistryHandle;
use crate::broadcast::SessionTopics;
use crate::clock::Clock;
use crate::records::AttendanceLedger;
use crate::tokens::{TokenLimits, TokenStore};

/// Shared state for the API routes.
#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistryHandle,
    pub store: Arc<TokenStore>,
    pub topics: Arc<SessionTopics>,
    pub ledger: Arc<AttendanceLedger>,
    pub clock: Arc<dyn Clock>,
    pub limits: TokenLimits,
}

/// Build the `/api/v1` router.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/sessions", post(sessions::register))
        .route("/api/v1/sessions/:id", get(sessions::snapshot))
        .route("/api/v1/sessions/:id/activate", post(sessions::activate))
        .route("/api/v1/sessions/:id/rotate", post(sessions::rotate))
        .route("/api/v1/sessions/:id/complete", post(sessions::complete))
        .route("/api/v1/sessions/:id/cancel", post(sessions::cancel))
        .route(
            "/api/v1/sessions/:id/attendance",
            get(attendance::session_roster),
        )
        .route("/api/v1/sessions/:id/events", get(sessions::events))
        .route("/api/v1/attendance/scan", post(attendance::scan))
        .route(
            "/api/v1/attendance/:record_id/status",
            post(attendance::correct_status),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
