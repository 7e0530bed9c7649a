//! CLI configuration: a thin wrapper around `opsfeed_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (`--config`, `--endpoint`).

use std::path::PathBuf;

use opsfeed_config::ConfigError;
use opsfeed_core::HubConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use opsfeed_config::{Config, Rule, load_config_from, save_config_to};

/// Config file in effect: `--config` / `OPSFEED_CONFIG`, else the platform path.
pub fn resolve_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(opsfeed_config::config_path)
}

/// Load config from the resolved path, then apply flag overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = resolve_path(global);
    let mut cfg = load_config_from(&path).map_err(|e| CliError::config(&path, e))?;

    if let Some(ref endpoint) = global.endpoint {
        cfg.connection.endpoint.clone_from(endpoint);
    }
    Ok(cfg)
}

/// Translate the loaded config into the core's `HubConfig`.
pub fn hub_config(global: &GlobalOpts, cfg: &Config) -> Result<HubConfig, CliError> {
    cfg.hub_config().map_err(|e| match e {
        ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
        other => CliError::config(&resolve_path(global), other),
    })
}
