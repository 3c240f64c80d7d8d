use crate::config::load_sync_service_config;
use crate::core::start_sync_with_config;
use pgsync_config::shared::SyncServiceConfig;
use pgsync_telemetry::init_tracing;
use tracing::error;

mod config;
mod core;

fn main() -> anyhow::Result<()> {
    let sync_service_config = load_sync_service_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(sync_service_config))?;

    Ok(())
}

async fn async_main(sync_service_config: SyncServiceConfig) -> anyhow::Result<()> {
    if let Err(err) = start_sync_with_config(sync_service_config).await {
        error!("an error occurred in the sync service: {err}");

        return Err(err);
    }

    Ok(())
}
