//! Marginalia Server
//!
//! Imports e-reader annotations into a Calibre library and serves the
//! reconciled sets.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marginalia_server::config::Config;
use marginalia_server::db;
use marginalia_server::library::{LibraryScanner, LibrarySource};
use marginalia_server::routes;
use marginalia_server::state::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "marginalia_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Marginalia Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Calibre library: {}", config.library.path.display());

    // Initialize database
    let db_pool = db::create_pool(&config.database.url)
        .await
        .expect("Failed to initialize database");
    tracing::info!("Database initialized at {}", config.database.url);

    let scanner: Arc<dyn LibrarySource> = Arc::new(LibraryScanner::new(config.library.path.clone()));
    let app_state = AppState::new(config, db_pool, scanner);

    // Initial index build
    match app_state.library().fresh().await {
        Ok(index) => tracing::info!("Library indexed with {} books", index.len()),
        Err(e) => tracing::warn!("Initial library scan failed: {}. Will retry on the next import", e),
    }

    // Start server with graceful shutdown
    let server = &app_state.config().server;
    let host: std::net::IpAddr = server.host.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid SERVER_HOST '{}', listening on all interfaces", server.host);
        [0, 0, 0, 0].into()
    });
    let addr = SocketAddr::from((host, server.port));
    let app = routes::app(app_state);
    tracing::info!("Marginalia Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    tracing::info!("Server shutdown complete");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
