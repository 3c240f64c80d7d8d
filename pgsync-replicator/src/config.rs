use anyhow::Context;
use pgsync_config::load_config;
use pgsync_config::shared::SyncServiceConfig;

/// Reads the service configuration from `configuration/` and the `APP_` variables, rejecting it
/// before anything connects if the sync settings are unusable.
pub fn load_sync_service_config() -> anyhow::Result<SyncServiceConfig> {
    let config = load_config::<SyncServiceConfig>()
        .context("failed to load the sync service configuration")?;
    config
        .validate()
        .context("invalid sync service configuration")?;

    Ok(config)
}
