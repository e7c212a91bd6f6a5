//! Maabara Online booking service
//!
//! Main application entry point

use std::net::SocketAddr;
use std::time::Duration;
use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use maabara::{
    build_router,
    config::Settings,
    database::{self, DatabaseService},
    services::ServiceFactory,
    utils::logging,
    AppState,
};

const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("Failed to load configuration")?;
    settings.validate()?;

    // Initialize logging
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", maabara::info());

    // Initialize database connection
    info!("Connecting to database...");
    let pool = database::create_pool(&(&settings.database).into()).await?;
    database::run_migrations(&pool).await?;
    let database_service = DatabaseService::new(pool);

    // Initialize services
    info!("Initializing services...");
    let services = ServiceFactory::new(&settings, database_service)?;

    let health = services.health_check().await;
    if !health.is_healthy() {
        anyhow::bail!("Service health check failed: {:?}", health.get_issues());
    }
    for issue in health.get_issues() {
        warn!("Degraded at startup: {}", issue);
    }

    match services.auth_service.ensure_bootstrap_admin().await? {
        Some(admin) => info!(user_id = admin.id, "Bootstrap admin ready"),
        None => info!("No bootstrap admin configured"),
    }

    if settings.features.payment_reconciler {
        let every = Duration::from_secs(settings.mpesa.reconcile_interval_seconds);
        services.payment_service.clone().spawn_reconciler(every);
    } else {
        info!("Payment reconciler disabled");
    }

    let address = settings.bind_address();
    let state = AppState::new(services, settings);

    if state.settings.features.rate_limiting {
        state.payment_limiter.clone().spawn_cleanup(RATE_LIMIT_CLEANUP_INTERVAL);
        state.login_limiter.clone().spawn_cleanup(RATE_LIMIT_CLEANUP_INTERVAL);
    }

    let app = build_router(state);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Listening on {}", address);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
