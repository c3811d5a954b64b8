//! task_chronicle maintenance binary
//!
//! Verifies the schema, reconciles the read model with the configured
//! timezone, optionally forces a full rebuild, then exits.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use task_chronicle::event_store::{EventStore, PgEventStore};
use task_chronicle::projection::SnapshotPolicy;
use task_chronicle::publisher::EventPublisher;
use task_chronicle::read_model::ReadModel;
use task_chronicle::replay::ReplayService;
use task_chronicle::timezone::{reconcile_timezone, DayBoundary, Reconciliation};
use task_chronicle::{db, AppError, AppResult, Config};

/// Initialize tracing/logging, JSON lines in production
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "task_chronicle=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    init_tracing(config.is_production());

    tracing::info!(
        environment = %config.environment,
        timezone = %config.timezone,
        "Starting task_chronicle maintenance run"
    );

    if let Err(e) = run(&config).await {
        tracing::error!(code = e.error_code(), error = %e, "Maintenance run failed");
        return Err(e.into());
    }

    tracing::info!("Database connections closed. Goodbye!");
    Ok(())
}

/// Schema check, timezone reconciliation and the optional forced rebuild
async fn run(config: &Config) -> AppResult<()> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    db::verify_connection(&pool).await?;

    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(AppError::Internal("Database schema incomplete".to_string()));
    }

    let store: Arc<dyn EventStore> = Arc::new(PgEventStore::new(pool.clone()));
    let publisher =
        Arc::new(EventPublisher::new().with_handler_timeout(config.projection_handler_timeout));
    let policy = SnapshotPolicy::new(DayBoundary::new(config.timezone));
    let replay = ReplayService::new(store, publisher, ReadModel::postgres(pool.clone()), policy);
    replay.register_projections();

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = cancel_tx.send(true);
    });

    let reconciliation = reconcile_timezone(&replay, &cancel_rx).await?;
    tracing::info!(?reconciliation, "Timezone reconciliation finished");

    let already_rebuilt = matches!(reconciliation, Reconciliation::Rebuilt { .. });
    if config.rebuild_on_start && !already_rebuilt {
        let summary = replay.rebuild(&cancel_rx).await?;
        tracing::info!(
            total = summary.total,
            published = summary.published,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            "Forced rebuild finished"
        );
    }

    pool.close().await;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
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
            tracing::info!("Received Ctrl+C, cancelling...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, cancelling...");
        },
    }
}
