//! Host-facing facade
//!
//! The host calls into a [`Coordinator`] from its monitoring loop. Host
//! operations are serialized by an operation gate that also owns the poller
//! handle; connector state sits behind the shared state lock, which is only
//! taken for short sections between network calls.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex as AsyncMutex;

use crate::config::Config;
use crate::ledger::OutcomeLedger;
use crate::models::{CommandResult, Device, Profile, TokenResponse};
use crate::poller::{PollSettings, Poller};
use crate::properties::{AggregatedDevice, Statistics, StatisticsSource};
use crate::session::Session;
use crate::state::{self, Credentials, Shared, SharedState};
use crate::transport::{self, AUTHENTICATION, ApiRequest, Endpoint, HttpTransport, PROFILE, Transport};
use crate::{Error, Result};

/// Control action supported by Workplace devices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    Reboot,
}

impl FromStr for DeviceCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("reboot") {
            Ok(Self::Reboot)
        } else {
            Err(Error::UnsupportedCommand(s.to_string()))
        }
    }
}

/// One entry of a batch control call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    pub device_id: String,
    pub command: String,
}

impl ControlRequest {
    #[must_use]
    pub fn new(device_id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            command: command.into(),
        }
    }
}

/// Result of one entry of a batch control call
#[derive(Debug)]
pub struct ControlOutcome {
    pub device_id: String,
    pub result: Result<()>,
}

/// Entry point for the host monitoring platform
pub struct Coordinator {
    shared: Shared,
    transport: Arc<dyn Transport>,
    poll_settings: PollSettings,
    historical_properties: Vec<String>,
    started_at: Instant,
    /// Held for the whole of each host operation
    gate: AsyncMutex<Option<Poller>>,
}

impl Coordinator {
    /// Create a coordinator on top of an arbitrary transport
    #[must_use]
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        let now = Instant::now();
        let credentials = Credentials {
            client_id: config.client_id,
            refresh_token: config.refresh_token,
        };

        Self {
            shared: SharedState::new(credentials, now).into_shared(),
            transport,
            poll_settings: config.poll,
            historical_properties: config.historical_properties,
            started_at: now,
            gate: AsyncMutex::new(None),
        }
    }

    /// Create a coordinator talking HTTP to the configured endpoints
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn from_config(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(
            config.api_url.clone(),
            config.token_url.clone(),
            config.request_timeout,
        )?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    /// Collect account-level statistics
    ///
    /// Refreshes the session when needed, then fetches the profile and the
    /// device list of every organization. Endpoints that fail are reported
    /// as `N/A` unless every attempted endpoint failed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when the credentials or the session are
    /// rejected, and [`Error::CycleFailed`] when every endpoint failed.
    pub async fn get_statistics(&self) -> Result<Statistics> {
        let _gate = self.gate.lock().await;
        self.touch();

        let mut ledger = OutcomeLedger::new();
        ledger.begin_cycle();

        let mut profile = None;
        let mut device_counts = IndexMap::new();

        if let Some(bearer) = self.ensure_session(&mut ledger).await? {
            profile = self.fetch_profile(&bearer, &mut ledger).await?;
            device_counts = self.fetch_devices(&bearer, &mut ledger).await?;
        }

        if let Err(e) = ledger.evaluate() {
            tracing::error!(error = %e, "statistics cycle failed");
            return Err(e);
        }

        let failed: Vec<&str> = ledger.failed_endpoints().collect();
        if !failed.is_empty() {
            tracing::warn!(failed = ?failed, "statistics cycle partially succeeded");
        }

        let state = state::lock(&self.shared);
        Ok(Statistics::render(&StatisticsSource {
            adapter_uptime: self.started_at.elapsed(),
            last_cycle_duration: state.poll.last_cycle_duration(),
            profile: profile.as_ref(),
            organizations: &state.organizations,
            device_counts: &device_counts,
            monitored_devices: state.devices.len(),
        }))
    }

    /// Snapshot of every cached device
    ///
    /// Starts the poller on first use and keeps it from pausing. Never waits
    /// for an in-progress collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] while the configured credentials stand
    /// rejected
    pub async fn get_aggregated_devices(&self) -> Result<Vec<AggregatedDevice>> {
        self.aggregated(None).await
    }

    /// Snapshot of the cached devices with the given ids
    ///
    /// Same keep-alive behavior as [`get_aggregated_devices`](Self::get_aggregated_devices).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] while the configured credentials stand
    /// rejected
    pub async fn get_aggregated_devices_by_ids(
        &self,
        device_ids: &[String],
    ) -> Result<Vec<AggregatedDevice>> {
        self.aggregated(Some(device_ids)).await
    }

    /// Run a control command on one device
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] for an unknown device,
    /// [`Error::UnsupportedCommand`] for an unknown command,
    /// [`Error::CommandFailed`] when the API reports the command failed, and
    /// any session or transport error of the call itself.
    pub async fn control_device(&self, device_id: &str, command: &str) -> Result<()> {
        let _gate = self.gate.lock().await;
        self.touch();
        self.control(device_id, command).await
    }

    /// Run a batch of control commands
    ///
    /// Entries run in order; a failing entry is logged and does not stop the
    /// rest of the batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the batch is empty
    pub async fn control_devices(&self, requests: &[ControlRequest]) -> Result<Vec<ControlOutcome>> {
        if requests.is_empty() {
            return Err(Error::Config("no control requests supplied".into()));
        }

        let _gate = self.gate.lock().await;
        self.touch();

        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            let result = self.control(&request.device_id, &request.command).await;
            if let Err(ref e) = result {
                tracing::warn!(device_id = %request.device_id, command = %request.command, error = %e, "control request failed");
            }
            outcomes.push(ControlOutcome {
                device_id: request.device_id.clone(),
                result,
            });
        }

        Ok(outcomes)
    }

    /// Supply new credentials
    ///
    /// Drops the current session and lifts a previous credential rejection,
    /// so the next call authenticates with the new pair.
    pub async fn set_credentials(&self, client_id: impl Into<String>, refresh_token: impl Into<String>) {
        let _gate = self.gate.lock().await;
        let mut state = state::lock(&self.shared);

        state.credentials = Credentials {
            client_id: client_id.into(),
            refresh_token: SecretString::from(refresh_token.into()),
        };
        state.session.clear();
        state.auth_rejection = None;
        tracing::info!("credentials replaced");
    }

    /// Stop the poller and drop all cached state
    ///
    /// Safe to call any number of times.
    pub async fn shutdown(&self) {
        let mut poller = self.gate.lock().await;

        if let Some(poller) = poller.take() {
            poller.stop().await;
        }

        state::lock(&self.shared).reset(Instant::now());
        tracing::info!("connector shut down");
    }

    /// Whether the session must be refreshed before the next data call
    #[must_use]
    pub fn session_is_invalid(&self) -> bool {
        state::lock(&self.shared).session.is_invalid()
    }

    /// Whether the background poller task is alive
    #[must_use]
    pub fn is_polling(&self) -> bool {
        state::lock(&self.shared).poll.is_running()
    }

    /// Number of cached devices
    #[must_use]
    pub fn device_count(&self) -> usize {
        state::lock(&self.shared).devices.len()
    }

    // -- internals -----------------------------------------------------------

    async fn aggregated(&self, filter: Option<&[String]>) -> Result<Vec<AggregatedDevice>> {
        let mut poller = self.gate.lock().await;

        if let Some(reason) = state::lock(&self.shared).auth_rejection.clone() {
            return Err(Error::Auth(reason));
        }

        if poller.as_ref().is_none_or(Poller::is_finished) {
            *poller = Some(Poller::spawn(
                Arc::clone(&self.shared),
                Arc::clone(&self.transport),
                self.poll_settings,
            ));
        }
        self.touch();

        let state = state::lock(&self.shared);
        Ok(state
            .devices
            .values()
            .filter(|d| filter.is_none_or(|ids| ids.contains(&d.id)))
            .map(|d| AggregatedDevice::render(d, &self.historical_properties))
            .collect())
    }

    /// Push the poller validity window; expedite a collection after idle
    fn touch(&self) {
        let now = Instant::now();
        let mut state = state::lock(&self.shared);

        if state.poll.touch(now, self.poll_settings.inactivity_timeout) {
            state.poll.expedite(now);
            tracing::debug!("host activity resumed, device collection expedited");
        }
    }

    /// Return a bearer token, refreshing the session if needed
    ///
    /// `Ok(None)` means the refresh failed for a non-authentication reason,
    /// including a token that is unusable on arrival; the failure is recorded
    /// in `ledger`.
    async fn ensure_session(&self, ledger: &mut OutcomeLedger) -> Result<Option<SecretString>> {
        let (client_id, refresh_token) = {
            let state = state::lock(&self.shared);

            if let Some(ref reason) = state.auth_rejection {
                return Err(Error::Auth(reason.clone()));
            }
            if let Some(bearer) = state.session.bearer() {
                return Ok(Some(bearer));
            }

            let refresh_token = state.session.refresh_token().unwrap_or_else(|| {
                SecretString::from(state.credentials.refresh_token.expose_secret().to_owned())
            });
            (state.credentials.client_id.clone(), refresh_token)
        };

        if client_id.is_empty() || refresh_token.expose_secret().is_empty() {
            return Err(Error::Auth("client id or refresh token is empty".into()));
        }

        ledger.record_attempt(AUTHENTICATION);
        let issued_at = Utc::now();
        let request = ApiRequest::token(client_id, refresh_token);

        match transport::fetch::<TokenResponse>(self.transport.as_ref(), &request).await {
            Ok(token) => {
                let rotated = SecretString::from(token.refresh_token.clone());
                let session = Session::from_token(token, issued_at);
                let Some(bearer) = session.bearer() else {
                    tracing::warn!("token endpoint issued an unusable session");
                    if !rotated.expose_secret().is_empty() {
                        state::lock(&self.shared).credentials.refresh_token = rotated;
                    }
                    let e = Error::Decode("issued token is empty or already expired".into());
                    ledger.record_failure(AUTHENTICATION, e)?;
                    return Ok(None);
                };
                ledger.record_success(AUTHENTICATION);

                let mut state = state::lock(&self.shared);
                state.session.replace(session);
                state.credentials.refresh_token = rotated;
                tracing::info!("session refreshed");
                Ok(Some(bearer))
            }
            Err(e) if e.is_auth() => {
                let mut state = state::lock(&self.shared);
                state.session.clear();
                state.auth_rejection = Some(e.to_string());
                tracing::error!(error = %e, "credentials rejected");
                Err(e)
            }
            Err(e) => {
                tracing::warn!(error = %e, "session refresh failed");
                ledger.record_failure(AUTHENTICATION, e)?;
                Ok(None)
            }
        }
    }

    async fn fetch_profile(
        &self,
        bearer: &SecretString,
        ledger: &mut OutcomeLedger,
    ) -> Result<Option<Profile>> {
        ledger.record_attempt(PROFILE);
        let request = ApiRequest::authorized(Endpoint::Profile, bearer);

        match transport::fetch::<Profile>(self.transport.as_ref(), &request).await {
            Ok(profile) => {
                ledger.record_success(PROFILE);
                state::lock(&self.shared).replace_organizations(profile.organizations());
                Ok(Some(profile))
            }
            Err(e) => {
                self.record_data_failure(ledger, PROFILE, e)?;
                Ok(None)
            }
        }
    }

    /// Fetch the device list of every known organization concurrently
    ///
    /// Returns the device count of each organization whose fetch succeeded.
    async fn fetch_devices(
        &self,
        bearer: &SecretString,
        ledger: &mut OutcomeLedger,
    ) -> Result<IndexMap<String, usize>> {
        let organizations: Vec<String> = state::lock(&self.shared)
            .organizations
            .keys()
            .cloned()
            .collect();

        let client = self.transport.as_ref();
        let fetches = organizations.iter().map(|organization_id| async move {
            let endpoint = Endpoint::Devices {
                organization_id: organization_id.clone(),
            };
            let key = endpoint.key();
            let request = ApiRequest::authorized(endpoint, bearer);
            (key, transport::fetch::<Vec<Device>>(client, &request).await)
        });
        let results = futures::future::join_all(fetches).await;

        let mut counts = IndexMap::new();
        for (organization_id, (key, result)) in organizations.into_iter().zip(results) {
            ledger.record_attempt(key.clone());
            match result {
                Ok(devices) => {
                    ledger.record_success(&key);
                    tracing::debug!(organization_id = %organization_id, devices = devices.len(), "device list fetched");
                    counts.insert(organization_id, devices.len());
                    state::lock(&self.shared).merge_devices(devices);
                }
                Err(e) => self.record_data_failure(ledger, &key, e)?,
            }
        }

        Ok(counts)
    }

    /// Record a failed data endpoint; an auth failure drops the session
    fn record_data_failure(&self, ledger: &mut OutcomeLedger, key: &str, error: Error) -> Result<()> {
        if error.is_auth() {
            state::lock(&self.shared).session.clear();
            tracing::warn!(endpoint = key, error = %error, "access token rejected");
        } else {
            tracing::warn!(endpoint = key, error = %error, "endpoint failed");
        }
        ledger.record_failure(key, error)
    }

    async fn control(&self, device_id: &str, command: &str) -> Result<()> {
        let organization_id = state::lock(&self.shared)
            .devices
            .get(device_id)
            .map(|d| d.org_id.clone())
            .ok_or_else(|| Error::DeviceNotFound(device_id.to_string()))?;

        let DeviceCommand::Reboot = command.parse::<DeviceCommand>()?;

        let mut ledger = OutcomeLedger::new();
        let Some(bearer) = self.ensure_session(&mut ledger).await? else {
            ledger.evaluate()?;
            return Err(Error::Auth("no valid session".into()));
        };

        let endpoint = Endpoint::Reboot {
            organization_id,
            device_id: device_id.to_string(),
        };
        let request = ApiRequest::authorized(endpoint, &bearer);

        let result = match transport::fetch::<CommandResult>(self.transport.as_ref(), &request).await {
            Ok(result) => result,
            Err(e) => {
                if e.is_auth() {
                    state::lock(&self.shared).session.clear();
                }
                return Err(e);
            }
        };

        if !result.success {
            let reason = result
                .error_message
                .unwrap_or_else(|| format!("reboot of {device_id} was not accepted"));
            return Err(Error::CommandFailed(reason));
        }

        let mut state = state::lock(&self.shared);
        if let Some(device) = state.devices.get_mut(device_id) {
            device.status = None;
        }
        state.poll.expedite(Instant::now());
        tracing::info!(device_id, "device reboot requested");

        Ok(())
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("poll_settings", &self.poll_settings)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reboot_case_insensitively() {
        assert_eq!("Reboot".parse::<DeviceCommand>().unwrap(), DeviceCommand::Reboot);
        assert_eq!(" reboot ".parse::<DeviceCommand>().unwrap(), DeviceCommand::Reboot);
    }

    #[test]
    fn unknown_command_is_unsupported() {
        assert!(matches!(
            "Shutdown".parse::<DeviceCommand>(),
            Err(Error::UnsupportedCommand(name)) if name == "Shutdown"
        ));
    }
}
