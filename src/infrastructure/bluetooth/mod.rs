//! Bluetooth Module
//!
//! Scan-and-connect core for the device browser screen.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    BluetoothService                      │
//! │  (Event loop - serialises commands and platform events)  │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Orchestrator                        │
//! │     Browsing -> Connecting -> {Operating | Browsing}     │
//! └───────┬─────────────────────────────────┬───────────────┘
//!         │                                 │
//!         ▼                                 ▼
//! ┌──────────────┐                 ┌─────────────────┐
//! │ ScanSession  │                 │ ConnectionEvent │
//! │              │                 │ Bridge          │
//! │ - Idle/Scan  │                 │ - Ready / Lost  │
//! │ - Device     │                 │ - Listener      │
//! │   store      │                 │   registry      │
//! └──────────────┘                 └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`platform`] - Collaborator traits and the platform event type
//! - [`protocol`] - Vendor service UUIDs and advertisement parsing
//! - [`scanner`] - Scan session state machine
//! - [`connection`] - Connection event bridge
//! - [`orchestrator`] - Screen-level flow
//! - [`service`] - Event loop
//! - [`simulated`] - In-memory platform for the demo and tests

pub mod connection;
pub mod orchestrator;
pub mod platform;
pub mod protocol;
pub mod scanner;
pub mod service;
pub mod simulated;

// Re-export main service for convenience
pub use orchestrator::Orchestrator;
pub use service::BluetoothService;
