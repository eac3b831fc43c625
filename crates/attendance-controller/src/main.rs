//! Attendance Controller
//!
//! QR proof-of-presence attendance service.
//!
//! # Servers
//!
//! - HTTP API server for sessions and scans (default: 0.0.0.0:8080)
//! - HTTP server for health endpoints and metrics (default: 0.0.0.0:8081)
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Construct shared components (token store, ledger, topics, ports)
//! 4. Initialize actor system (`SessionRegistryHandle`)
//! 5. Spawn background tasks (token sweep, optional auto-rotation)
//! 6. Start health and API servers
//! 7. Wait for shutdown signal, then drain via the root `CancellationToken`

#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)] // main.rs orchestrates startup, naturally longer

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use attendance_controller::actors::{ScanSettings, SessionDeps, SessionRegistryHandle};
use attendance_controller::broadcast::SessionTopics;
use attendance_controller::clock::{Clock, SystemClock};
use attendance_controller::config::Config;
use attendance_controller::observability::{health_router, init_metrics_recorder, HealthState};
use attendance_controller::observability::metrics as obs_metrics;
use attendance_controller::ports::{InMemoryEnrollmentDirectory, LoggingNotificationSink};
use attendance_controller::records::AttendanceLedger;
use attendance_controller::routes::{api_router, AppState};
use attendance_controller::tokens::{TokenIssuer, TokenStore};
use attendance_controller::types::SessionStatus;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "attendance_controller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Attendance Controller");

    // Load configuration
    let config = Config::from_env().inspect_err(|e| {
        error!("Failed to load configuration: {}", e);
    })?;

    info!(
        http_bind_address = %config.http_bind_address,
        health_bind_address = %config.health_bind_address,
        base_url = %config.base_url,
        qr_expiry_seconds = config.qr_expiry_seconds,
        qr_rotation_interval_seconds = config.qr_rotation_interval_seconds,
        qr_grace_period_seconds = config.qr_grace_period_seconds,
        late_threshold_minutes = config.late_threshold_minutes,
        enable_geolocation = config.enable_geolocation,
        auto_rotate = config.auto_rotate,
        max_sessions = config.max_sessions,
        "Configuration loaded successfully"
    );

    // Initialize Prometheus metrics recorder before any metrics are recorded
    let prometheus_handle = init_metrics_recorder()
        .map_err(|e| anyhow::anyhow!("metrics recorder init failed: {e}"))?;

    let health_state = Arc::new(HealthState::new());

    // Shared components, constructed once and injected everywhere
    let limits = config.token_limits();
    let store = Arc::new(TokenStore::new(limits.grace_ms));
    let ledger = Arc::new(AttendanceLedger::new());
    let topics = Arc::new(SessionTopics::new());
    let enrollment = Arc::new(InMemoryEnrollmentDirectory::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let deps = SessionDeps {
        store: Arc::clone(&store),
        ledger: Arc::clone(&ledger),
        enrollment,
        notifier: Arc::new(LoggingNotificationSink),
        topics: Arc::clone(&topics),
        clock: Arc::clone(&clock),
        issuer: TokenIssuer::new(config.base_url.clone(), config.qr_expiry_seconds),
        settings: ScanSettings {
            late_threshold_minutes: config.late_threshold_minutes,
            enable_geolocation: config.enable_geolocation,
            default_radius_meters: config.location_verification_radius_meters,
            room_locations: config.room_locations.clone(),
        },
    };

    // Initialize actor system; the root token drains everything on shutdown
    let root_token = CancellationToken::new();
    let registry = SessionRegistryHandle::new(
        deps,
        config.max_sessions as usize,
        root_token.clone(),
    );
    info!("Actor system initialized");

    // Background token sweep
    let sweep_store = Arc::clone(&store);
    let sweep_clock = Arc::clone(&clock);
    let sweep_token = root_token.child_token();
    let sweep_interval = Duration::from_secs(config.token_sweep_interval_seconds);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            tokio::select! {
                () = sweep_token.cancelled() => break,
                _ = ticker.tick() => {
                    let swept = sweep_store.sweep(sweep_clock.now_ms());
                    obs_metrics::set_tokens_stored(sweep_store.len());
                    if swept > 0 {
                        info!(swept, "token sweep removed expired tokens");
                    }
                }
            }
        }
    });

    // Server-driven rotation for active sessions (opt-in)
    if config.auto_rotate {
        let rotate_registry = registry.clone();
        let rotate_token = root_token.child_token();
        let rotate_interval = Duration::from_secs(config.qr_rotation_interval_seconds);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(rotate_interval);
            loop {
                tokio::select! {
                    () = rotate_token.cancelled() => break,
                    _ = ticker.tick() => {
                        rotate_active_sessions(&rotate_registry).await;
                    }
                }
            }
        });
        info!(
            interval_seconds = config.qr_rotation_interval_seconds,
            "auto-rotation task started"
        );
    }

    // Health server: bind before spawning to fail fast on bind errors
    let health_addr: SocketAddr = config.health_bind_address.parse()?;
    let health_app = health_router(Arc::clone(&health_state), Some(prometheus_handle));
    let health_listener = tokio::net::TcpListener::bind(health_addr).await?;
    let health_shutdown = root_token.child_token();
    tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(health_listener, health_app).with_graceful_shutdown(
            async move {
                health_shutdown.cancelled().await;
                info!("Health server shutting down");
            },
        );
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    // API server
    let api_addr: SocketAddr = config.http_bind_address.parse()?;
    let api_app = api_router(AppState {
        registry: registry.clone(),
        store: Arc::clone(&store),
        topics,
        ledger,
        clock,
        limits,
    });
    let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
    let api_shutdown = root_token.child_token();
    tokio::spawn(async move {
        info!(addr = %api_addr, "API server starting");
        let server = axum::serve(
            api_listener,
            api_app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            api_shutdown.cancelled().await;
            info!("API server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "API server failed");
        }
    });

    health_state.set_ready();
    info!("Attendance Controller running - press Ctrl+C to shutdown");

    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");
    health_state.set_not_ready();
    root_token.cancel();

    // Give the servers and actors a moment to drain
    tokio::time::sleep(Duration::from_millis(500)).await;
    info!("Attendance Controller stopped");
    Ok(())
}

/// Rotate every active session's token; errors are logged, not propagated.
async fn rotate_active_sessions(registry: &SessionRegistryHandle) {
    let handles = match registry.list_sessions().await {
        Ok(handles) => handles,
        Err(e) => {
            warn!(error = %e, "auto-rotation could not list sessions");
            return;
        }
    };

    for handle in handles {
        let Ok(snapshot) = handle.snapshot().await else {
            continue;
        };
        if snapshot.status != SessionStatus::Active {
            continue;
        }
        if let Err(e) = handle.rotate().await {
            warn!(
                session_id = %snapshot.id,
                error = %e,
                "auto-rotation failed"
            );
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
