//! Discovery and connection core for a BLE device browser.
//!
//! [`domain`] holds the data model, error taxonomy, permission rules and
//! settings. [`infrastructure`] wires the scan session, connection bridge
//! and orchestrator to the platform collaborators and runs them on a single
//! event loop.

pub mod domain;
pub mod infrastructure;

pub use domain::error::{CoreError, CoreResult};
pub use infrastructure::bluetooth::{BluetoothService, Orchestrator};
