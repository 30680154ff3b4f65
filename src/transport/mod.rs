//! Transport collaborator: sends one logical API call and returns the raw body
//!
//! The connector core only depends on the [`Transport`] trait. The production
//! implementation is [`HttpTransport`]; tests script their own.

pub mod http;
pub mod query;

use std::fmt;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::Result;
use crate::mapper::{self, Payload};

pub use http::HttpTransport;

/// Ledger key of the token refresh call
pub const AUTHENTICATION: &str = "Authentication";

/// Ledger key of the profile query
pub const PROFILE: &str = "Profile";

/// A remote API call
#[derive(Debug)]
pub enum Endpoint {
    /// `refresh_token` grant against the token endpoint
    Token {
        client_id: String,
        refresh_token: SecretString,
    },
    /// Profile with memberships and invitations
    Profile,
    /// Device list of one organization
    Devices { organization_id: String },
    /// Next scheduled firmware for one device
    NextFirmware {
        device_id: String,
        firmware_version: Option<String>,
        public_key: Option<String>,
    },
    /// Reboot one device
    Reboot {
        organization_id: String,
        device_id: String,
    },
}

impl Endpoint {
    /// Stable key identifying this call in an outcome ledger
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Token { .. } => AUTHENTICATION.to_string(),
            Self::Profile => PROFILE.to_string(),
            Self::Devices { organization_id } => format!("Devices[{organization_id}]"),
            Self::NextFirmware { device_id, .. } => format!("NextFirmware[{device_id}]"),
            Self::Reboot { device_id, .. } => format!("Reboot[{device_id}]"),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// An endpoint call plus the bearer token to send it with
#[derive(Debug)]
pub struct ApiRequest {
    pub endpoint: Endpoint,
    pub bearer: Option<SecretString>,
}

impl ApiRequest {
    /// Token refresh request; never carries a bearer token
    #[must_use]
    pub fn token(client_id: impl Into<String>, refresh_token: SecretString) -> Self {
        Self {
            endpoint: Endpoint::Token {
                client_id: client_id.into(),
                refresh_token,
            },
            bearer: None,
        }
    }

    /// Authenticated GraphQL request carrying a copy of `bearer`
    #[must_use]
    pub fn authorized(endpoint: Endpoint, bearer: &SecretString) -> Self {
        Self {
            endpoint,
            bearer: Some(SecretString::from(bearer.expose_secret().to_owned())),
        }
    }
}

/// Sends requests to the Workplace API
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the raw response body
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Auth`] when the remote rejects the
    /// credentials, and a transport-class error for any other failure.
    async fn send(&self, request: &ApiRequest) -> Result<Vec<u8>>;
}

/// Send a request and decode the response body into `T`
///
/// # Errors
///
/// Returns the transport error, or the mapper error if the body does not
/// decode
pub async fn fetch<T: Payload>(transport: &dyn Transport, request: &ApiRequest) -> Result<T> {
    let body = transport.send(request).await?;
    mapper::decode(&body)
}
