use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use examdesk_api::config::{ServerConfig, UserStoreKind};
use examdesk_api::credentials::{
    CredentialNotifier, CredentialOutbox, EmailCredentialNotifier, SmtpConfig,
};
use examdesk_api::router::build_app_router;
use examdesk_api::state::AppState;
use examdesk_api::user_store::{InMemoryUserStore, PgUserStore, UserStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "examdesk_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        user_store = ?config.user_store,
        max_users = config.import.max_users_per_import,
        "Loaded server configuration",
    );

    // --- User store ---
    let store: Arc<dyn UserStore> = match config.user_store {
        UserStoreKind::Postgres => Arc::new(connect_postgres().await),
        UserStoreKind::Memory => {
            tracing::warn!(
                seeded = config.seed_existing_emails.len(),
                "Using the in-memory user store; imported users are not persisted",
            );
            Arc::new(InMemoryUserStore::with_existing(&config.seed_existing_emails))
        }
    };

    // --- Credential delivery ---
    let notifier: Arc<dyn CredentialNotifier> = match SmtpConfig::from_env() {
        Some(smtp) => {
            tracing::info!(smtp_host = %smtp.smtp_host, "Temporary passwords are sent by email");
            Arc::new(EmailCredentialNotifier::new(smtp))
        }
        None => {
            tracing::warn!("SMTP_HOST not set; temporary passwords are kept in memory only");
            Arc::new(CredentialOutbox::new())
        }
    };

    // --- App state ---
    let state = AppState::new(config.clone(), store, notifier);
    let sessions = Arc::clone(&state.sessions);
    let app = build_app_router(state);

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
    tracing::info!("Server stopped accepting connections, waiting for running imports");
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(drain, sessions.drain_imports())
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Imports still running at shutdown; their batches stay processing",
        );
    }

    tracing::info!("Graceful shutdown complete");
}

/// Connect, check, and migrate the database behind [`PgUserStore`].
async fn connect_postgres() -> PgUserStore {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = examdesk_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    examdesk_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    examdesk_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    PgUserStore::new(pool)
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
