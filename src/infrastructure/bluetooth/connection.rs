//! BLE Connection Event Bridge
//!
//! Folds the connection subsystem's low-level callbacks into two lifecycle
//! events, `Ready` and `Lost`, and delivers them to registered listeners.
//! Each tracked session produces at most one `Ready` and one `Lost`.

use crate::domain::models::{DeviceIdentity, ListenerId, SessionHandle};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Raw callbacks from the connection subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionCallback {
    Connected { address: String },
    MtuChanged { address: String, mtu: u16 },
    ServicesDiscovered { address: String },
    /// Connect plus internal negotiation finished.
    SetupComplete(SessionHandle),
    ConnectFailed { address: String, status: i32 },
    Disconnected { address: String, name: Option<String> },
}

impl ConnectionCallback {
    pub fn address(&self) -> &str {
        match self {
            Self::Connected { address }
            | Self::MtuChanged { address, .. }
            | Self::ServicesDiscovered { address }
            | Self::ConnectFailed { address, .. }
            | Self::Disconnected { address, .. } => address,
            Self::SetupComplete(handle) => &handle.address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Ready(SessionHandle),
    Lost(DeviceIdentity),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Pending,
    Ready(SessionHandle),
}

#[derive(Debug)]
struct TrackedSession {
    identity: DeviceIdentity,
    phase: SessionPhase,
}

#[derive(Debug, Default)]
pub struct ConnectionEventBridge {
    listeners: Vec<ListenerId>,
    sessions: HashMap<String, TrackedSession>,
}

impl ConnectionEventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the listener was already registered.
    pub fn register(&mut self, listener: ListenerId) -> bool {
        if self.listeners.contains(&listener) {
            return false;
        }
        self.listeners.push(listener);
        true
    }

    /// Returns `false` if the listener wasn't registered.
    pub fn unregister(&mut self, listener: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| *l != listener);
        self.listeners.len() != before
    }

    pub fn is_registered(&self, listener: ListenerId) -> bool {
        self.listeners.contains(&listener)
    }

    /// Start tracking a connection attempt to `identity`. The name it
    /// carries is what a later `Lost` reports when the callback has none.
    pub fn begin(&mut self, identity: &DeviceIdentity) {
        self.sessions.insert(
            identity.address.clone(),
            TrackedSession {
                identity: identity.clone(),
                phase: SessionPhase::Pending,
            },
        );
    }

    pub fn phase(&self, address: &str) -> Option<SessionPhase> {
        self.sessions.get(address).map(|s| s.phase.clone())
    }

    /// Translate one callback into deliveries for the registered listeners.
    ///
    /// `identity_visible` is false when the platform no longer lets us read
    /// device names; lost devices then carry only their address.
    pub fn dispatch(
        &mut self,
        callback: ConnectionCallback,
        identity_visible: bool,
    ) -> Vec<(ListenerId, LifecycleEvent)> {
        let Some(phase) = self.phase(callback.address()) else {
            debug!("Ignoring callback for untracked device: {:?}", callback);
            return Vec::new();
        };

        let event = match callback {
            ConnectionCallback::SetupComplete(handle) => {
                if let SessionPhase::Ready(_) = phase {
                    warn!("Duplicate setup completion for {}", handle.address);
                    return Vec::new();
                }
                info!("Connection setup complete: {}", handle.address);
                if let Some(session) = self.sessions.get_mut(&handle.address) {
                    session.phase = SessionPhase::Ready(handle.clone());
                }
                LifecycleEvent::Ready(handle)
            }
            ConnectionCallback::ConnectFailed { address, status } => {
                warn!("Connection to {} failed with status {}", address, status);
                self.forget(&address, None, identity_visible)
            }
            ConnectionCallback::Disconnected { address, name } => {
                info!("Disconnected from {}", address);
                self.forget(&address, name, identity_visible)
            }
            other => {
                debug!("Intermediate connection callback: {:?}", other);
                return Vec::new();
            }
        };

        self.listeners.iter().map(|l| (*l, event.clone())).collect()
    }

    fn forget(
        &mut self,
        address: &str,
        reported_name: Option<String>,
        identity_visible: bool,
    ) -> LifecycleEvent {
        let known_name = self
            .sessions
            .remove(address)
            .and_then(|s| s.identity.name);
        LifecycleEvent::Lost(DeviceIdentity {
            address: address.to_string(),
            name: reported_name.or(known_name).filter(|_| identity_visible),
        })
    }
}
