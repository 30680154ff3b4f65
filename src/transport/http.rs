//! `reqwest` implementation of the transport

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde_json::json;

use super::{ApiRequest, Endpoint, Transport, query};
use crate::{Error, Result};

/// OAuth error code the token endpoint returns for a rejected refresh token
const INVALID_GRANT: &str = "invalid_grant";

/// Transport that talks to the Workplace token endpoint and GraphQL API
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    graphql_url: String,
    token_url: String,
}

impl HttpTransport {
    /// Create a transport for the given endpoints
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        graphql_url: impl Into<String>,
        token_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            graphql_url: graphql_url.into(),
            token_url: token_url.into(),
        })
    }

    /// GraphQL request body; `None` for the form-encoded token call
    fn graphql_body(endpoint: &Endpoint) -> Option<serde_json::Value> {
        let body = match endpoint {
            Endpoint::Token { .. } => return None,
            Endpoint::Profile => json!({ "query": query::PROFILE }),
            Endpoint::Devices { organization_id } => json!({
                "query": query::DEVICES,
                "variables": {
                    "limit": query::DEVICE_PAGE_LIMIT,
                    "offset": 0,
                    "filter": { "organizations": [organization_id] },
                },
            }),
            Endpoint::NextFirmware {
                device_id,
                firmware_version,
                public_key,
            } => json!({
                "query": query::NEXT_FIRMWARE,
                "variables": {
                    "deviceId": device_id,
                    "fwrev": firmware_version,
                    "pubkey": public_key,
                },
            }),
            Endpoint::Reboot {
                organization_id,
                device_id,
            } => json!({
                "query": query::REBOOT_DEVICE,
                "variables": { "orgId": organization_id, "deviceId": device_id },
            }),
        };
        Some(body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<Vec<u8>> {
        let is_token = matches!(request.endpoint, Endpoint::Token { .. });

        let builder = match (&request.endpoint, Self::graphql_body(&request.endpoint)) {
            (
                Endpoint::Token {
                    client_id,
                    refresh_token,
                },
                _,
            ) => self.client.post(&self.token_url).form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id.as_str()),
                ("refresh_token", refresh_token.expose_secret()),
            ]),
            (_, body) => {
                let mut builder = self.client.post(&self.graphql_url).json(&body);
                if let Some(ref bearer) = request.bearer {
                    builder = builder.bearer_auth(bearer.expose_secret());
                }
                builder
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            return Ok(body.to_vec());
        }

        let text = String::from_utf8_lossy(&body);
        tracing::debug!(endpoint = %request.endpoint, status = %status, "request rejected");

        Err(classify_failure(status, &text, is_token))
    }
}

/// Map a non-success response to a typed error
fn classify_failure(status: StatusCode, body: &str, is_token: bool) -> Error {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Error::Auth(format!("{status}: {body}"));
    }

    if is_token && status == StatusCode::BAD_REQUEST && body.contains(INVALID_GRANT) {
        return Error::Auth(format!("refresh token rejected: {body}"));
    }

    Error::Transport {
        status: Some(status.as_u16()),
        message: body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_auth() {
        assert!(classify_failure(StatusCode::UNAUTHORIZED, "", false).is_auth());
        assert!(classify_failure(StatusCode::FORBIDDEN, "", false).is_auth());
    }

    #[test]
    fn invalid_grant_on_token_endpoint_is_auth() {
        let body = r#"{"error":"invalid_grant","error_description":"refresh token invalid"}"#;
        assert!(classify_failure(StatusCode::BAD_REQUEST, body, true).is_auth());
        assert!(!classify_failure(StatusCode::BAD_REQUEST, body, false).is_auth());
    }

    #[test]
    fn server_errors_keep_status() {
        match classify_failure(StatusCode::BAD_GATEWAY, "upstream", false) {
            Error::Transport { status, message } => {
                assert_eq!(status, Some(502));
                assert_eq!(message, "upstream");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn device_query_filters_by_organization() {
        let body = HttpTransport::graphql_body(&Endpoint::Devices {
            organization_id: "org-1".into(),
        })
        .unwrap();

        assert_eq!(body["variables"]["filter"]["organizations"][0], "org-1");
        assert_eq!(body["variables"]["limit"], 200);
    }

    #[test]
    fn token_call_is_not_graphql() {
        let endpoint = Endpoint::Token {
            client_id: "c".into(),
            refresh_token: secrecy::SecretString::from("r".to_string()),
        };
        assert!(HttpTransport::graphql_body(&endpoint).is_none());
    }

    #[test]
    fn reboot_mutation_carries_both_ids() {
        let body = HttpTransport::graphql_body(&Endpoint::Reboot {
            organization_id: "org-1".into(),
            device_id: "dev-1".into(),
        })
        .unwrap();

        assert_eq!(body["variables"]["orgId"], "org-1");
        assert_eq!(body["variables"]["deviceId"], "dev-1");
    }
}
