use snapsync_config::load_config;
use snapsync_config::shared::SnapsyncConfig;

use crate::error::{CliError, CliResult};

/// Loads and validates the service configuration.
///
/// Uses the standard configuration loading mechanism from [`snapsync_config`] and
/// validates the resulting [`SnapsyncConfig`] before returning it.
pub fn load_snapsync_config() -> CliResult<SnapsyncConfig> {
    let config = load_config::<SnapsyncConfig>().map_err(CliError::config)?;
    config.validate().map_err(CliError::config)?;

    Ok(config)
}
