use crate::domain::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Name shown when a device identity can't be read.
pub const PLACEHOLDER_DEVICE_NAME: &str = "device";

/// A discovered peripheral, keyed by its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralRecord {
    pub address: String,
    pub display_name: Option<String>,
    /// Raw advertisement bytes from the latest sighting
    pub payload: Vec<u8>,
    pub rssi: Option<i16>,
}

/// One advertisement as delivered by the radio.
pub type Advertisement = PeripheralRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScanFilter {
    #[default]
    None,
    ServiceUuid(Uuid),
}

impl fmt::Display for ScanFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanFilter::None => write!(f, "no filter"),
            ScanFilter::ServiceUuid(uuid) => write!(f, "service {}", uuid),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    #[default]
    Idle,
    Scanning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    #[default]
    LowLatency,
    Balanced,
    LowPower,
}

/// Best-effort identity of a remote device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub address: String,
    pub name: Option<String>,
}

impl DeviceIdentity {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    /// Name for user-facing notices, falling back to the placeholder.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(PLACEHOLDER_DEVICE_NAME)
    }
}

/// Opaque reference to an established connection, owned by the connection subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub id: u64,
    pub address: String,
}

/// Identifies one registered connection-event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorState {
    Browsing,
    Connecting { address: String },
    Operating { handle: SessionHandle },
}

/// Commands from the host UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Screen became visible
    Activate,
    /// Screen went to the background
    Deactivate,
    ToggleScan,
    SelectFilter(usize),
    SelectDevice(usize),
    Disconnect,
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    DeviceInserted(usize),
    DeviceUpdated(usize),
    DevicesCleared,
    ScanningStarted,
    ScanningStopped,
    FilterSelected(String),
    Ready(SessionHandle),
    Lost(DeviceIdentity),
    Failure(CoreError),
    /// Permission handling hit a state it can't reason about; rebuild the screen.
    RecreateRequested,
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Warning,
}
