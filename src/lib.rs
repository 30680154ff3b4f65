//! Workplace Connector - monitoring connector for Biamp Workplace
//!
//! This library keeps a host monitoring platform in sync with a Workplace
//! account:
//! - Account and organization statistics on every host call
//! - Per-device statistics refreshed by a background poller
//! - Device control (reboot)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Host platform                       │
//! │   get_statistics │ get_aggregated_devices │ control  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Coordinator                         │
//! │   Session  │  OutcomeLedger  │  Poller  │  State     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │            Transport + Mapper                        │
//! │   OAuth token endpoint  │  Workplace GraphQL API     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod mapper;
pub mod models;
pub mod poller;
pub mod properties;
pub mod session;
mod state;
pub mod transport;

pub use config::Config;
pub use coordinator::{ControlOutcome, ControlRequest, Coordinator, DeviceCommand};
pub use error::{Error, Result};
pub use ledger::OutcomeLedger;
pub use poller::{PollCycleState, PollSettings};
pub use properties::{AggregatedDevice, NOT_AVAILABLE, Statistics};
pub use session::Session;
pub use transport::{ApiRequest, Endpoint, HttpTransport, Transport};
