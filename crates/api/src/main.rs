use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use calibra_api::background::status_refresh;
use calibra_api::config::ServerConfig;
use calibra_api::live::LiveUpdateRelay;
use calibra_api::router::build_app_router;
use calibra_api::state::AppState;
use calibra_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "calibra_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = calibra_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    calibra_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    calibra_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    match calibra_db::repositories::SessionRepo::purge_before(&pool, chrono::Utc::now()).await {
        Ok(purged) => tracing::info!(purged, "Purged stale refresh sessions"),
        Err(e) => tracing::warn!(error = %e, "Failed to purge stale refresh sessions"),
    }

    // Cancels the heartbeat and status refresh once the server stops.
    let background_cancel = CancellationToken::new();

    // --- WebSocket manager + heartbeat ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(
        Arc::clone(&ws_manager),
        Duration::from_secs(config.ws_heartbeat_interval_secs),
        background_cancel.clone(),
    );

    // --- Event bus + live-update relay ---
    let event_bus = Arc::new(calibra_events::EventBus::default());
    let relay = LiveUpdateRelay::new(Arc::clone(&ws_manager));
    let relay_handle = tokio::spawn(relay.run(event_bus.subscribe()));

    // --- Status refresh ---
    let refresh_handle = tokio::spawn(status_refresh::run(
        pool.clone(),
        Arc::clone(&event_bus),
        Duration::from_secs(config.status_refresh_interval_secs),
        background_cancel.clone(),
    ));

    tracing::info!("Background services started (heartbeat, live relay, status refresh)");

    // --- App state + router ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        event_bus: Arc::clone(&event_bus),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    background_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), refresh_handle).await;
    let _ = heartbeat_handle.await;
    tracing::info!("Status refresh and heartbeat stopped");

    // The refresh task held the last other bus handle; dropping ours closes
    // the channel and ends the relay.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), relay_handle).await;
    tracing::info!("Live-update relay stopped");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    tracing::info!("Graceful shutdown complete");
}

/// Resolve on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
