//! Configuration management for the Workplace connector

pub mod file;

use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::poller::PollSettings;
use crate::{Error, Result};

use file::WorkplaceConfigFile;

/// Default GraphQL endpoint
pub const DEFAULT_API_URL: &str = "https://api.evoko.app/graphql";

/// Default OAuth token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://iam.workplace.biamp.app/oauth/v2/token";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connector configuration
#[derive(Debug)]
pub struct Config {
    /// OAuth client id
    pub client_id: String,

    /// Seed refresh token, used until the server rotates it
    pub refresh_token: SecretString,

    /// GraphQL endpoint
    pub api_url: String,

    /// OAuth token endpoint
    pub token_url: String,

    /// Poller timing
    pub poll: PollSettings,

    /// Per-request transport timeout
    pub request_timeout: Duration,

    /// Device property names reported as dynamic statistics
    pub historical_properties: Vec<String>,
}

impl Config {
    /// Configuration with default endpoints and timing
    #[must_use]
    pub fn new(client_id: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            refresh_token: SecretString::from(refresh_token.into()),
            api_url: DEFAULT_API_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            poll: PollSettings::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            historical_properties: Vec::new(),
        }
    }

    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a numeric variable cannot be parsed
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a numeric variable cannot be parsed
    pub fn resolve(fc: WorkplaceConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let client_id = var("WORKPLACE_CLIENT_ID")
            .or(fc.credentials.client_id)
            .unwrap_or_default();
        let refresh_token = var("WORKPLACE_REFRESH_TOKEN")
            .or(fc.credentials.refresh_token)
            .unwrap_or_default();

        let defaults = PollSettings::default();
        let poll = PollSettings {
            interval: seconds(
                "WORKPLACE_POLL_INTERVAL_SECS",
                var("WORKPLACE_POLL_INTERVAL_SECS"),
                fc.polling.interval_secs,
            )?
            .unwrap_or(defaults.interval),
            inactivity_timeout: seconds(
                "WORKPLACE_INACTIVITY_TIMEOUT_SECS",
                var("WORKPLACE_INACTIVITY_TIMEOUT_SECS"),
                fc.polling.inactivity_timeout_secs,
            )?
            .unwrap_or(defaults.inactivity_timeout),
            tick: parse::<u64>("WORKPLACE_TICK_MILLIS", var("WORKPLACE_TICK_MILLIS"))?
                .or(fc.polling.tick_millis)
                .map_or(defaults.tick, Duration::from_millis),
        };

        let request_timeout = seconds(
            "WORKPLACE_REQUEST_TIMEOUT_SECS",
            var("WORKPLACE_REQUEST_TIMEOUT_SECS"),
            fc.api.request_timeout_secs,
        )?
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let historical_properties = var("WORKPLACE_HISTORICAL_PROPERTIES").map_or_else(
            || fc.historical_properties.unwrap_or_default(),
            |list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect()
            },
        );

        if poll.tick.is_zero() {
            return Err(Error::Config("poller tick must be greater than zero".into()));
        }

        Ok(Self {
            client_id,
            refresh_token: SecretString::from(refresh_token),
            api_url: var("WORKPLACE_API_URL")
                .or(fc.api.url)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            token_url: var("WORKPLACE_TOKEN_URL")
                .or(fc.api.token_url)
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            poll,
            request_timeout,
            historical_properties,
        })
    }

    /// Check that both credentials are present
    ///
    /// # Errors
    ///
    /// Returns error if the client id or refresh token is empty
    pub fn require_credentials(&self) -> Result<()> {
        if self.client_id.is_empty() || self.refresh_token.expose_secret().is_empty() {
            return Err(Error::Config(
                "WORKPLACE_CLIENT_ID and WORKPLACE_REFRESH_TOKEN must be set".into(),
            ));
        }
        Ok(())
    }
}

fn parse<T: FromStr>(key: &str, value: Option<String>) -> Result<Option<T>> {
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|_| Error::Config(format!("{key} is not a valid number: {v}")))
        })
        .transpose()
}

fn seconds(key: &str, env: Option<String>, file: Option<u64>) -> Result<Option<Duration>> {
    Ok(parse::<u64>(key, env)?.or(file).map(Duration::from_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_file_or_env() {
        let config = Config::resolve(WorkplaceConfigFile::default(), env(&[])).unwrap();

        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.poll, PollSettings::default());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.historical_properties.is_empty());
        assert!(config.require_credentials().is_err());
    }

    #[test]
    fn env_overrides_file() {
        let fc: WorkplaceConfigFile = toml::from_str(
            r#"
            historical_properties = ["Uptime(s)"]

            [credentials]
            client_id = "from-file"
            refresh_token = "file-token"

            [polling]
            interval_secs = 120
            tick_millis = 250
            "#,
        )
        .unwrap();

        let config = Config::resolve(
            fc,
            env(&[
                ("WORKPLACE_CLIENT_ID", "from-env"),
                ("WORKPLACE_POLL_INTERVAL_SECS", "15"),
                ("WORKPLACE_HISTORICAL_PROPERTIES", "Temperature(C), CPUUtilization(%)"),
            ]),
        )
        .unwrap();

        assert_eq!(config.client_id, "from-env");
        assert_eq!(config.refresh_token.expose_secret(), "file-token");
        assert_eq!(config.poll.interval, Duration::from_secs(15));
        assert_eq!(config.poll.tick, Duration::from_millis(250));
        assert_eq!(
            config.historical_properties,
            vec!["Temperature(C)", "CPUUtilization(%)"]
        );
        assert!(config.require_credentials().is_ok());
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let config = Config::resolve(
            WorkplaceConfigFile::default(),
            env(&[("WORKPLACE_API_URL", "  ")]),
        )
        .unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn invalid_number_is_config_error() {
        let result = Config::resolve(
            WorkplaceConfigFile::default(),
            env(&[("WORKPLACE_TICK_MILLIS", "fast")]),
        );
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("WORKPLACE_TICK_MILLIS")));
    }

    #[test]
    fn zero_tick_is_rejected() {
        let result = Config::resolve(
            WorkplaceConfigFile::default(),
            env(&[("WORKPLACE_TICK_MILLIS", "0")]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
