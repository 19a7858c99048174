#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Supervisory client core (transport-agnostic).
//!
//! Everything talks to the controller through `aqua_traits::Transport`.
//!
//! ## Architecture
//!
//! - **Model**: the status payload and its dosing channels (`model`)
//! - **Store**: one wholesale-replaced snapshot (`store`)
//! - **Sync**: initial pull, push subscription, health and UI mode (`sync`)
//! - **Commands**: validated fire-and-forget submissions (`dispatcher`)
//! - **Errors for the operator**: structured error events (`events`)
//! - **Derived values**: volumes, fullness, schedules, dosing time (`metrics`)
//! - **Calibration**: flow rate from a fixed test run (`calibration`)
//! - **Network scan**: polling state machine (`scan`)
//!
//! The store is written by the sync actor only. Commands never touch it; the
//! device's next push shows their effect.

pub mod calibration;
pub mod config;
pub mod conversions;
pub mod dispatcher;
pub mod error;
pub mod events;
mod fanout;
pub mod metrics;
pub mod mocks;
pub mod model;
pub mod scan;
pub mod session;
pub mod store;
pub mod sync;
pub mod transport_error;
pub mod util;

pub use calibration::{CalibrationSource, CalibrationTarget, CsvCalibrationSource, RunEstimate};
pub use config::{DisplayCfg, ScanCfg, SyncCfg};
pub use dispatcher::{AquariumConfig, Command, CommandDispatcher, Outcome, PendingCommand, TpaPump};
pub use error::{AquaError, BuildError, Result, ValidationError};
pub use events::{ErrorBus, ErrorEvent};
pub use fanout::Feed;
pub use metrics::DerivedMetrics;
pub use model::{Channel, DeviceStatus, PRIME_CHANNEL, TpaState};
pub use scan::{Network, ScanPoller, ScanState};
pub use session::{Session, SessionBuilder};
pub use store::{Snapshot, StatusStore};
pub use sync::{Health, Source, SyncChannel, SyncUpdate, UiMode};
