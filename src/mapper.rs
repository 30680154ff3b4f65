//! Decoding of raw API responses into typed domain objects

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::{CommandResult, Device, NextFirmware, Profile, TokenResponse};
use crate::{Error, Result};

/// GraphQL error codes that mean the bearer token is unusable
const AUTH_ERROR_CODES: &[&str] = &["UNAUTHENTICATED", "UNAUTHORIZED", "FORBIDDEN"];

/// Message fragments that mean the bearer token is unusable
const AUTH_ERROR_MESSAGES: &[&str] = &["invalid token", "token expired", "token is expired", "unauthenticated"];

/// A shape the mapper can decode, located at a fixed path in the response
pub trait Payload: DeserializeOwned {
    /// JSON object keys leading from the response root to the value
    const PATH: &'static [&'static str];
}

impl Payload for TokenResponse {
    const PATH: &'static [&'static str] = &[];
}

impl Payload for Profile {
    const PATH: &'static [&'static str] = &["data", "profile"];
}

impl Payload for Vec<Device> {
    const PATH: &'static [&'static str] = &["data", "devices"];
}

impl Payload for NextFirmware {
    const PATH: &'static [&'static str] = &["data", "nextFirmware"];
}

impl Payload for CommandResult {
    const PATH: &'static [&'static str] = &["data", "rebootDevice"];
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorExtensions {
    #[serde(default)]
    code: Option<String>,
}

impl GraphQlError {
    fn is_auth(&self) -> bool {
        let code_matches = self
            .extensions
            .as_ref()
            .and_then(|e| e.code.as_deref())
            .is_some_and(|code| AUTH_ERROR_CODES.contains(&code));

        let lower = self.message.to_lowercase();
        code_matches || AUTH_ERROR_MESSAGES.iter().any(|m| lower.contains(m))
    }
}

/// Decode a raw response body into `T`
///
/// # Errors
///
/// Returns [`Error::Auth`] when the body carries an authentication-class
/// GraphQL error, [`Error::Transport`] for any other GraphQL error,
/// [`Error::Decode`] when the expected path is missing, and
/// [`Error::Serialization`] when the value does not match `T`.
pub fn decode<T: Payload>(bytes: &[u8]) -> Result<T> {
    let mut root: Value = serde_json::from_slice(bytes)?;

    check_errors(&root)?;

    let mut current = &mut root;
    for key in T::PATH {
        current = current
            .get_mut(*key)
            .ok_or_else(|| Error::Decode(format!("response has no `{}`", T::PATH.join("."))))?;
    }

    Ok(serde_json::from_value(current.take())?)
}

/// Surface a GraphQL `errors` array as a typed error
fn check_errors(root: &Value) -> Result<()> {
    let Some(errors) = root.get("errors").filter(|e| !e.is_null()) else {
        return Ok(());
    };

    let errors: Vec<GraphQlError> = serde_json::from_value(errors.clone())?;
    if errors.is_empty() {
        return Ok(());
    }

    let message = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    if errors.iter().any(GraphQlError::is_auth) {
        return Err(Error::Auth(message));
    }

    Err(Error::Transport {
        status: None,
        message,
    })
}
