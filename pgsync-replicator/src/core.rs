use pgsync::clients::postgres::PgConnector;
use pgsync::pipeline::SyncPipeline;
use pgsync::sync::report::SyncReport;
use pgsync_config::shared::{PgConnectionConfig, SyncConfig, SyncServiceConfig};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};

/// Runs one sync with the provided configuration.
///
/// Fails if the run couldn't start or if any table wasn't synced.
pub async fn start_sync_with_config(sync_service_config: SyncServiceConfig) -> anyhow::Result<()> {
    info!("starting sync service");

    log_config(&sync_service_config);

    let pipeline = SyncPipeline::new(
        sync_service_config.sync,
        PgConnector::new(sync_service_config.source),
        PgConnector::new(sync_service_config.target),
    );

    let report = run_pipeline(&pipeline).await?;
    log_report(&report);

    report.result()?;

    info!("sync service completed");

    Ok(())
}

fn log_config(config: &SyncServiceConfig) {
    log_pg_connection_config("source", &config.source);
    log_pg_connection_config("target", &config.target);
    log_sync_config(&config.sync);
}

fn log_pg_connection_config(role: &str, config: &PgConnectionConfig) {
    debug!(
        host = config.host,
        port = config.port,
        dbname = config.name,
        username = config.username,
        tls_enabled = config.tls.enabled,
        "{role} postgres connection config",
    );
}

fn log_sync_config(config: &SyncConfig) {
    debug!(
        tables_to_sync = ?config.tables_to_sync,
        schemas_to_sync = ?config.schemas_to_sync,
        sync_data = config.sync_data,
        max_table_sync_workers = config.max_table_sync_workers,
        truncate_before_copy = config.truncate_before_copy,
        validate_target_layout = config.validate_target_layout,
        max_attempts = config.retry.max_attempts,
        backoff_step_ms = config.retry.backoff_step_ms,
        chunk_size_bytes = config.transfer.chunk_size_bytes,
        progress_threshold_bytes = config.transfer.progress_threshold_bytes,
        "sync config"
    );
}

fn log_report(report: &SyncReport) {
    for unit in report.failed() {
        error!(
            table = %unit.table(),
            attempts = unit.attempts(),
            error = ?unit.last_error(),
            "table failed"
        );
    }

    for unit in report.canceled() {
        warn!(table = %unit.table(), "table was canceled");
    }
}

/// Runs a pipeline while listening for shutdown signals.
///
/// SIGINT and SIGTERM stop the tables still being synced, they end up canceled in the report.
async fn run_pipeline(
    pipeline: &SyncPipeline<PgConnector, PgConnector>,
) -> anyhow::Result<SyncReport> {
    let shutdown_tx = pipeline.shutdown_tx();
    let mut sigterm = signal(SignalKind::terminate())?;

    let shutdown_handle = tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT (Ctrl+C) received, shutting down sync pipeline");
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down sync pipeline");
            }
        }

        if let Err(e) = shutdown_tx.shutdown() {
            warn!("failed to send shutdown signal: {:?}", e);
            return;
        }

        info!("sync pipeline shutdown successfully")
    });

    let result = pipeline.run().await;

    // The run is over, a signal arriving now has nothing left to stop.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    Ok(result?)
}
