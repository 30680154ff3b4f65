//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use workplace_connector::{
    ApiRequest, Config, Coordinator, Endpoint, Error, PollSettings, Result, Transport,
};

type Handler = dyn Fn(&Endpoint) -> Result<String> + Send + Sync;

/// Transport scripted by a closure, recording the ledger key of every call
pub struct MockTransport {
    calls: Mutex<Vec<String>>,
    handler: Mutex<Box<Handler>>,
}

impl MockTransport {
    pub fn new(handler: impl Fn(&Endpoint) -> Result<String> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            handler: Mutex::new(Box::new(handler)),
        })
    }

    /// Transport answering every endpoint successfully
    pub fn healthy() -> Arc<Self> {
        Self::new(workplace_api)
    }

    pub fn set_handler(&self, handler: impl Fn(&Endpoint) -> Result<String> + Send + Sync + 'static) {
        *self.handler.lock().unwrap() = Box::new(handler);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls whose key equals `key`
    pub fn count(&self, key: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|k| *k == key).count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(request.endpoint.key());
        let handler = self.handler.lock().unwrap();
        handler(&request.endpoint).map(String::into_bytes)
    }
}

// -- Fixtures -----------------------------------------------------------------

pub fn token_json() -> String {
    json!({
        "access_token": "access",
        "refresh_token": "rotated",
        "token_type": "Bearer",
        "expires_in": 3600,
    })
    .to_string()
}

pub fn profile_json() -> String {
    json!({"data": {"profile": {
        "id": "user-1",
        "name": "Harry",
        "email": "harry@example.com",
        "superAdmin": false,
        "memberships": [
            {"id": "m-1", "orgId": "org-1", "role": "ORG_ADMIN", "status": "ACTIVE",
             "organization": {"id": "org-1", "name": "Lab"}},
            {"id": "m-2", "orgId": "org-2", "role": "USER", "status": "ACTIVE",
             "organization": {"id": "org-2", "name": "Office"}},
        ],
        "invitations": [],
    }}})
    .to_string()
}

pub fn devices_json(organization_id: &str) -> String {
    let devices: Vec<_> = (1..=2)
        .map(|n| {
            json!({
                "id": format!("{organization_id}-dev-{n}"),
                "orgId": organization_id,
                "serial": format!("SN{n}"),
                "type": {"id": "t-1", "name": "Naso"},
                "state": "ONLINE",
                "status": {"firmware": "2.0.0", "temperature": 40 + n},
            })
        })
        .collect();
    json!({"data": {"devices": devices}}).to_string()
}

pub fn next_firmware_json() -> String {
    json!({"data": {"nextFirmware": {"id": "fw-3", "version": "3.0.0"}}}).to_string()
}

pub fn reboot_json(success: bool) -> String {
    let error_message = (!success).then_some("device busy");
    json!({"data": {"rebootDevice": {"success": success, "errorMessage": error_message}}}).to_string()
}

pub fn unavailable() -> Error {
    Error::Transport {
        status: Some(503),
        message: "service unavailable".into(),
    }
}

/// Answers every endpoint successfully
pub fn workplace_api(endpoint: &Endpoint) -> Result<String> {
    Ok(match endpoint {
        Endpoint::Token { .. } => token_json(),
        Endpoint::Profile => profile_json(),
        Endpoint::Devices { organization_id } => devices_json(organization_id),
        Endpoint::NextFirmware { .. } => next_firmware_json(),
        Endpoint::Reboot { .. } => reboot_json(true),
    })
}

/// Config with millisecond-scale poller timing
pub fn test_config() -> Config {
    let mut config = Config::new("client", "seed-token");
    config.poll = PollSettings {
        interval: Duration::from_secs(3600),
        inactivity_timeout: Duration::from_secs(60),
        tick: Duration::from_millis(10),
    };
    config
}

pub fn coordinator(transport: &Arc<MockTransport>) -> Coordinator {
    coordinator_with(test_config(), transport)
}

pub fn coordinator_with(config: Config, transport: &Arc<MockTransport>) -> Coordinator {
    let transport: Arc<dyn Transport> = transport.clone();
    Coordinator::new(config, transport)
}
