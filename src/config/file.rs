//! TOML configuration file loading
//!
//! Supports `~/.config/avispl/workplace/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults and is itself overridden by environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct WorkplaceConfigFile {
    /// OAuth credentials
    #[serde(default)]
    pub credentials: CredentialsFileConfig,

    /// Remote endpoints
    #[serde(default)]
    pub api: ApiFileConfig,

    /// Background poller timing
    #[serde(default)]
    pub polling: PollingFileConfig,

    /// Device property names reported as dynamic statistics
    #[serde(default)]
    pub historical_properties: Option<Vec<String>>,
}

/// OAuth client credentials
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsFileConfig {
    pub client_id: Option<String>,
    pub refresh_token: Option<String>,
}

/// Remote endpoint configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiFileConfig {
    /// GraphQL endpoint
    pub url: Option<String>,

    /// OAuth token endpoint
    pub token_url: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Poller timing configuration
#[derive(Debug, Default, Deserialize)]
pub struct PollingFileConfig {
    pub interval_secs: Option<u64>,
    pub inactivity_timeout_secs: Option<u64>,
    pub tick_millis: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `WorkplaceConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> WorkplaceConfigFile {
    config_file_path().map_or_else(WorkplaceConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path, with the same fallbacks
pub fn load_from(path: &Path) -> WorkplaceConfigFile {
    if !path.exists() {
        return WorkplaceConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                WorkplaceConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            WorkplaceConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/avispl/workplace/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("avispl")
            .join("workplace")
            .join("config.toml")
    })
}
