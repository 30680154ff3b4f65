//! Token endpoint response

use serde::Deserialize;

/// Response from the OAuth token endpoint for a `refresh_token` grant
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for GraphQL calls
    pub access_token: String,
    /// Rotated refresh token
    pub refresh_token: String,
    /// Lifetime of the access token in seconds
    pub expires_in: i64,
    /// Token type, normally `Bearer`
    #[serde(default)]
    pub token_type: Option<String>,
}
