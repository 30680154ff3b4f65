//! Error types for the Workplace connector

use thiserror::Error;

/// Result type alias for connector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Workplace connector
#[derive(Debug, Error)]
pub enum Error {
    /// Credentials rejected, refresh token invalid, or the API reported a
    /// session problem. Always fatal for the current cycle.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Remote call failed for a reason unrelated to authentication
    #[error("transport error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Transport {
        /// HTTP status, when the remote answered
        status: Option<u16>,
        /// Error detail
        message: String,
    },

    /// A control action referenced an unknown device
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Every endpoint attempted in a cycle failed
    #[error(
        "unable to process requested API sections: [{}], error reported: [{cause}]",
        endpoints.join(",")
    )]
    CycleFailed {
        /// Ledger keys of the failed endpoints, in failure order
        endpoints: Vec<String>,
        /// Message of the first recorded failure
        cause: String,
    },

    /// Control command name not recognized
    #[error("unsupported command: {0}")]
    UnsupportedCommand(String),

    /// The remote API reported that a control command did not succeed
    #[error("command failed: {0}")]
    CommandFailed(String),

    /// Response could not be mapped onto the expected shape
    #[error("decode error: {0}")]
    Decode(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error is authentication-class
    ///
    /// Authentication failures short-circuit a cycle regardless of what
    /// else succeeded in it.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}
