//! State shared between host calls and the background poller
//!
//! Everything lives behind one mutex because several invariants span fields
//! (session validity is checked and replaced together, device merges and
//! poll bookkeeping happen in the same critical section). The lock is only
//! held for short synchronous sections, never across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use indexmap::IndexMap;
use secrecy::SecretString;

use crate::models::{Device, Organization};
use crate::poller::PollCycleState;
use crate::session::Session;

/// Handle to the shared state
pub type Shared = Arc<Mutex<SharedState>>;

/// Client credentials used to mint sessions
#[derive(Debug)]
pub struct Credentials {
    pub client_id: String,
    pub refresh_token: SecretString,
}

/// Mutable connector state
#[derive(Debug)]
pub struct SharedState {
    pub session: Session,
    pub credentials: Credentials,
    /// Set when the token endpoint rejected the credentials; cleared only by
    /// supplying new ones
    pub auth_rejection: Option<String>,
    pub organizations: IndexMap<String, Organization>,
    pub devices: IndexMap<String, Device>,
    pub poll: PollCycleState,
}

impl SharedState {
    /// Fresh state: empty session, empty collections, paused poller
    #[must_use]
    pub fn new(credentials: Credentials, now: Instant) -> Self {
        Self {
            session: Session::empty(),
            credentials,
            auth_rejection: None,
            organizations: IndexMap::new(),
            devices: IndexMap::new(),
            poll: PollCycleState::new(now, true),
        }
    }

    /// Wrap in the shared handle
    #[must_use]
    pub fn into_shared(self) -> Shared {
        Arc::new(Mutex::new(self))
    }

    /// Replace the organization collection wholesale
    pub fn replace_organizations(&mut self, organizations: Vec<Organization>) {
        self.organizations = organizations
            .into_iter()
            .map(|org| (org.id.clone(), org))
            .collect();
    }

    /// Merge fetched devices by id; devices missing from `devices` are kept
    ///
    /// The device list query does not carry the next scheduled firmware, so a
    /// value collected by the poller survives the merge.
    pub fn merge_devices(&mut self, devices: Vec<Device>) {
        for mut device in devices {
            if device.next_firmware.is_none() {
                if let Some(previous) = self.devices.get(&device.id) {
                    device.next_firmware.clone_from(&previous.next_firmware);
                }
            }
            self.devices.insert(device.id.clone(), device);
        }
    }

    /// Drop the session, collections and poll bookkeeping
    pub fn reset(&mut self, now: Instant) {
        self.session.clear();
        self.organizations.clear();
        self.devices.clear();
        self.poll.reset(now);
    }
}

/// Lock the shared state, recovering from a poisoned mutex
pub fn lock(shared: &Shared) -> MutexGuard<'_, SharedState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
