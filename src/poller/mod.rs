//! Background device poller
//!
//! One spawned task wakes every tick, decides under the state lock whether a
//! collection is due, and runs it without holding the lock. A collection
//! refreshes the device list of every known organization and then looks up
//! the next scheduled firmware of every cached device. Failures only affect
//! freshness: they are logged and the stale values are kept.

mod cycle;

pub use cycle::PollCycleState;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::models::{Device, NextFirmware};
use crate::state::{self, Shared};
use crate::transport::{self, ApiRequest, Endpoint, Transport};

/// Timing knobs of the poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Fixed delay between the end of one collection and the next
    pub interval: Duration,
    /// How long after the last host call the poller keeps collecting
    pub inactivity_timeout: Duration,
    /// Granularity of pause and stop checks
    pub tick: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            inactivity_timeout: Duration::from_secs(180),
            tick: Duration::from_millis(500),
        }
    }
}

/// Handle to the running worker task
#[derive(Debug)]
pub struct Poller {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Poller {
    /// Spawn the worker on the current tokio runtime
    pub(crate) fn spawn(
        shared: Shared,
        transport: Arc<dyn Transport>,
        settings: PollSettings,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        state::lock(&shared).poll.set_running(true);

        let handle = tokio::spawn(async move {
            run(shared, transport, settings, stop_rx).await;
        });

        Self { stop_tx, handle }
    }

    /// Signal the worker and wait for it to exit
    ///
    /// An in-flight request is awaited, not aborted; the loop observes the
    /// signal at its next tick boundary.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);

        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "device poller task ended abnormally");
        }
    }

    /// Whether the worker task has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Work decided under the lock, executed outside it
struct CyclePlan {
    started: Instant,
    bearer: SecretString,
    issued_at: DateTime<Utc>,
    organizations: Vec<String>,
}

/// Per-device inputs of the next-firmware lookup
struct FirmwareProbe {
    device_id: String,
    firmware_version: Option<String>,
    public_key: Option<String>,
}

/// Why a collection stopped before visiting every device
struct SessionRejected;

async fn run(
    shared: Shared,
    transport: Arc<dyn Transport>,
    settings: PollSettings,
    mut stop_rx: watch::Receiver<bool>,
) {
    tracing::info!(
        interval_secs = settings.interval.as_secs(),
        inactivity_timeout_secs = settings.inactivity_timeout.as_secs(),
        "device poller started"
    );

    loop {
        if *stop_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            () = tokio::time::sleep(settings.tick) => {}
        }

        let Some(plan) = plan_cycle(&shared, settings.interval) else {
            continue;
        };

        if collect(&shared, transport.as_ref(), &plan).await.is_err() {
            tracing::warn!("device collection stopped early: session rejected");
        }

        let now = Instant::now();
        let mut state = state::lock(&shared);
        state.poll.finish_collection(now, plan.started, settings.interval);
        tracing::debug!(
            duration_ms = now.saturating_duration_since(plan.started).as_millis(),
            devices = state.devices.len(),
            "device collection finished"
        );
    }

    state::lock(&shared).poll.set_running(false);
    tracing::info!("device poller stopped");
}

/// Decide whether this tick collects, entering `Collecting` if so
fn plan_cycle(shared: &Shared, interval: Duration) -> Option<CyclePlan> {
    let now = Instant::now();
    let mut state = state::lock(shared);

    if state.poll.refresh_paused(now) {
        return None;
    }

    if !state.poll.should_collect(now) {
        return None;
    }

    let Some(bearer) = state.session.bearer() else {
        tracing::debug!("skipping device collection: no valid session");
        state.poll.reschedule(now, interval);
        return None;
    };

    state.poll.begin_collection();

    Some(CyclePlan {
        started: now,
        bearer,
        issued_at: state.session.issued_at(),
        organizations: state.organizations.keys().cloned().collect(),
    })
}

async fn collect(
    shared: &Shared,
    transport: &dyn Transport,
    plan: &CyclePlan,
) -> Result<(), SessionRejected> {
    for organization_id in &plan.organizations {
        let endpoint = Endpoint::Devices {
            organization_id: organization_id.clone(),
        };
        let request = ApiRequest::authorized(endpoint, &plan.bearer);

        match transport::fetch::<Vec<Device>>(transport, &request).await {
            Ok(devices) => {
                state::lock(shared).merge_devices(devices);
            }
            Err(e) if e.is_auth() => return Err(reject_session(shared, plan, &e)),
            Err(e) => {
                tracing::warn!(organization_id = %organization_id, error = %e, "device list refresh failed");
            }
        }
    }

    let probes: Vec<FirmwareProbe> = state::lock(shared)
        .devices
        .values()
        .map(|device| FirmwareProbe {
            device_id: device.id.clone(),
            firmware_version: device.current_firmware().map(str::to_owned),
            public_key: device.firmware_public_key.clone(),
        })
        .collect();

    for probe in probes {
        let device_id = probe.device_id.clone();
        let endpoint = Endpoint::NextFirmware {
            device_id: probe.device_id,
            firmware_version: probe.firmware_version,
            public_key: probe.public_key,
        };
        let request = ApiRequest::authorized(endpoint, &plan.bearer);

        match transport::fetch::<NextFirmware>(transport, &request).await {
            Ok(NextFirmware(next)) => {
                if let Some(device) = state::lock(shared).devices.get_mut(&device_id) {
                    device.next_firmware = next;
                }
            }
            Err(e) if e.is_auth() => return Err(reject_session(shared, plan, &e)),
            Err(e) => {
                tracing::warn!(device_id = %device_id, error = %e, "next firmware lookup failed");
            }
        }
    }

    Ok(())
}

/// Drop the session the plan was built from, unless it was already replaced
fn reject_session(shared: &Shared, plan: &CyclePlan, error: &crate::Error) -> SessionRejected {
    let mut state = state::lock(shared);
    if state.session.issued_at() == plan.issued_at {
        state.session.clear();
    }
    tracing::warn!(error = %error, "access token rejected during device collection");
    SessionRejected
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeDelta;

    use crate::models::Organization;
    use crate::session::Session;
    use crate::state::{Credentials, SharedState};
    use crate::{Error, Result};

    type Handler = dyn Fn(&Endpoint) -> Result<String> + Send + Sync;

    struct ScriptedTransport {
        calls: Mutex<Vec<String>>,
        handler: Box<Handler>,
    }

    impl ScriptedTransport {
        fn new(handler: impl Fn(&Endpoint) -> Result<String> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                handler: Box::new(handler),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &ApiRequest) -> Result<Vec<u8>> {
            self.calls.lock().unwrap().push(request.endpoint.key());
            (self.handler)(&request.endpoint).map(String::into_bytes)
        }
    }

    fn respond(endpoint: &Endpoint) -> Result<String> {
        match endpoint {
            Endpoint::Devices { .. } => Ok(r#"{"data":{"devices":[
                {"id":"dev-1","orgId":"org-1","status":{"firmware":"2.0.0"}},
                {"id":"dev-2","orgId":"org-1"}
            ]}}"#
                .into()),
            Endpoint::NextFirmware { device_id, .. } if device_id == "dev-1" => Err(Error::Transport {
                status: Some(503),
                message: "unavailable".into(),
            }),
            Endpoint::NextFirmware { .. } => {
                Ok(r#"{"data":{"nextFirmware":{"id":"fw-3","version":"3.0.0"}}}"#.into())
            }
            other => panic!("unexpected call {other}"),
        }
    }

    fn shared_with_session() -> Shared {
        let mut state = SharedState::new(
            Credentials {
                client_id: "client".into(),
                refresh_token: SecretString::from("seed".to_string()),
            },
            Instant::now(),
        );
        state.session.replace(Session::new(
            "access",
            "refresh",
            Utc::now(),
            TimeDelta::hours(1),
        ));
        state.replace_organizations(vec![Organization {
            id: "org-1".into(),
            name: Some("Lab".into()),
            membership_role: crate::models::MembershipRole::User,
            membership_status: crate::models::MembershipStatus::Active,
            invitation_status: crate::models::InvitationStatus::NotAvailable,
        }]);
        state.into_shared()
    }

    fn fast(interval: Duration) -> PollSettings {
        PollSettings {
            interval,
            inactivity_timeout: Duration::from_secs(60),
            tick: Duration::from_millis(5),
        }
    }

    fn touch(shared: &Shared) {
        let now = Instant::now();
        let mut state = state::lock(shared);
        state.poll.touch(now, Duration::from_secs(60));
        state.poll.expedite(now);
    }

    #[tokio::test]
    async fn untouched_poller_never_collects() {
        let shared = shared_with_session();
        let transport = ScriptedTransport::new(respond);
        let poller = Poller::spawn(shared.clone(), transport.clone(), fast(Duration::ZERO));

        tokio::time::sleep(Duration::from_millis(50)).await;
        poller.stop().await;

        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn touched_poller_collects_once_per_interval() {
        let shared = shared_with_session();
        let transport = ScriptedTransport::new(respond);
        touch(&shared);
        let poller = Poller::spawn(shared.clone(), transport.clone(), fast(Duration::from_secs(3600)));

        tokio::time::sleep(Duration::from_millis(100)).await;
        poller.stop().await;

        assert_eq!(
            transport.calls(),
            vec!["Devices[org-1]", "NextFirmware[dev-1]", "NextFirmware[dev-2]"]
        );

        let state = state::lock(&shared);
        assert!(state.poll.last_cycle_duration().is_some());
        assert!(state.poll.next_collection_time() > Instant::now());
    }

    #[tokio::test]
    async fn failed_device_does_not_abort_batch() {
        let shared = shared_with_session();
        let transport = ScriptedTransport::new(respond);
        touch(&shared);
        let poller = Poller::spawn(shared.clone(), transport, fast(Duration::from_secs(3600)));

        tokio::time::sleep(Duration::from_millis(100)).await;
        poller.stop().await;

        let state = state::lock(&shared);
        assert!(state.devices["dev-1"].next_firmware.is_none());
        let next = state.devices["dev-2"].next_firmware.as_ref().unwrap();
        assert_eq!(next.version.as_deref(), Some("3.0.0"));
    }

    #[tokio::test]
    async fn rejected_token_clears_session_and_stops_cycle() {
        let shared = shared_with_session();
        let transport = ScriptedTransport::new(|_| Err(Error::Auth("revoked".into())));
        touch(&shared);
        let poller = Poller::spawn(shared.clone(), transport.clone(), fast(Duration::from_secs(3600)));

        tokio::time::sleep(Duration::from_millis(100)).await;
        poller.stop().await;

        assert_eq!(transport.calls(), vec!["Devices[org-1]"]);
        assert!(state::lock(&shared).session.is_invalid());
    }

    #[tokio::test]
    async fn invalid_session_skips_collection() {
        let shared = shared_with_session();
        state::lock(&shared).session.clear();
        let transport = ScriptedTransport::new(respond);
        touch(&shared);
        let poller = Poller::spawn(shared.clone(), transport.clone(), fast(Duration::from_secs(3600)));

        tokio::time::sleep(Duration::from_millis(50)).await;
        poller.stop().await;

        assert!(transport.calls().is_empty());
        assert!(state::lock(&shared).poll.last_cycle_duration().is_none());
    }

    #[tokio::test]
    async fn stop_marks_poller_not_running() {
        let shared = shared_with_session();
        let poller = Poller::spawn(shared.clone(), ScriptedTransport::new(respond), fast(Duration::ZERO));
        assert!(state::lock(&shared).poll.is_running());

        poller.stop().await;

        assert!(!state::lock(&shared).poll.is_running());
    }
}
