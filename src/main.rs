//! simple_ledger - account ledger service
//!
//! Opens accounts and moves money between them. Every transfer writes one
//! transfer record, two entries and two balance updates in a single
//! database transaction.

use std::net::SocketAddr;

use simple_ledger::api::{self, ApiKeys, AppState};
use simple_ledger::config::LogFormat;
use simple_ledger::store::PgTransactionExecutor;
use simple_ledger::{db, Config, TransferOrchestrator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "simple_ledger=debug,tower_http=debug".into());

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(environment = %config.environment, "Starting simple_ledger server");
    tracing::info!("Connecting to database...");

    let pool = db::connect(&config).await?;
    db::verify_connection(&pool).await?;

    if config.run_migrations {
        tracing::info!("Applying migrations");
        db::run_migrations(&pool).await?;
    }

    // Verify database schema
    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    if config.api_key_hashes.is_empty() {
        tracing::warn!("No API keys configured; every API request will be rejected");
    }

    tracing::info!("Database connected successfully");

    let ledger = TransferOrchestrator::new(PgTransactionExecutor::new(pool.clone()))
        .with_funds_policy(config.funds_policy());
    let app = api::build_app(
        AppState::new(ledger),
        ApiKeys::from_hashes(config.api_key_hashes.clone()),
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    tracing::info!("Server shutting down...");
    pool.close().await;
    tracing::info!("Database connections closed");

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
