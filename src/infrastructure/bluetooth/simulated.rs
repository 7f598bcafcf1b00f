//! Simulated radio platform
//!
//! An in-memory stand-in for the OS Bluetooth stack. It records every call
//! the core makes and pushes [`PlatformEvent`]s onto the same queue a real
//! backend would, either automatically (auto-grant, auto-accept) or when a
//! driver calls one of the injection methods.

use crate::domain::models::{
    Advertisement, DeviceIdentity, ScanFilter, ScanMode, SessionHandle,
};
use crate::domain::permissions::{Authorizer, Grant, OsVersionClass, Permission};
use crate::infrastructure::bluetooth::connection::ConnectionCallback;
use crate::infrastructure::bluetooth::platform::{
    ConnectionSubsystem, PlatformEvent, RadioAdapter, ScanRadio,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

/// A call the core made into the platform.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    RequestAuthorization {
        request_id: u32,
        permissions: Vec<Permission>,
    },
    PromptEnableRadio,
    StartScan(ScanFilter),
    StopScan,
    Connect(String),
    Disconnect(SessionHandle),
}

struct SimState {
    os_class: OsVersionClass,
    granted: BTreeSet<Permission>,
    /// Denials the user asked not to be asked about again
    blocked: BTreeSet<Permission>,
    radio_enabled: bool,
    scanning: bool,
    scan_refusal: Option<i32>,
    grant_on_request: bool,
    enable_on_prompt: bool,
    auto_accept: bool,
    names: HashMap<String, String>,
    next_handle_id: u64,
    calls: Vec<PlatformCall>,
}

#[derive(Clone)]
pub struct SimulatedPlatform {
    inner: Arc<Mutex<SimState>>,
    event_sender: mpsc::UnboundedSender<PlatformEvent>,
}

impl SimulatedPlatform {
    /// A modern-class platform with nothing granted and the radio on.
    pub fn new(event_sender: mpsc::UnboundedSender<PlatformEvent>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                os_class: OsVersionClass::Modern,
                granted: BTreeSet::new(),
                blocked: BTreeSet::new(),
                radio_enabled: true,
                scanning: false,
                scan_refusal: None,
                grant_on_request: false,
                enable_on_prompt: false,
                auto_accept: false,
                names: HashMap::new(),
                next_handle_id: 1,
                calls: Vec::new(),
            })),
            event_sender,
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: PlatformEvent) {
        let _ = self.event_sender.send(event);
    }

    // Configuration

    pub fn set_os_class(&self, class: OsVersionClass) {
        self.state().os_class = class;
    }

    pub fn grant(&self, permissions: &[Permission]) {
        self.state().granted.extend(permissions.iter().copied());
    }

    pub fn revoke(&self, permission: Permission) {
        self.state().granted.remove(&permission);
    }

    /// Make future denials of `permission` permanent.
    pub fn block(&self, permission: Permission) {
        self.state().blocked.insert(permission);
    }

    pub fn set_radio_enabled(&self, enabled: bool) {
        self.state().radio_enabled = enabled;
    }

    pub fn set_scan_refusal(&self, code: Option<i32>) {
        self.state().scan_refusal = code;
    }

    /// Grant every requested permission as soon as it is asked for.
    pub fn set_grant_on_request(&self, grant: bool) {
        self.state().grant_on_request = grant;
    }

    /// Accept the enable prompt as soon as it is shown.
    pub fn set_enable_on_prompt(&self, enable: bool) {
        self.state().enable_on_prompt = enable;
    }

    /// Run the whole setup sequence as soon as a connect is requested.
    pub fn set_auto_accept(&self, accept: bool) {
        self.state().auto_accept = accept;
    }

    // Event injection

    pub fn advertise(&self, address: &str, name: Option<&str>, rssi: i16, payload: &[u8]) {
        if let Some(name) = name {
            self.state()
                .names
                .insert(address.to_string(), name.to_string());
        }
        self.emit(PlatformEvent::Advertisement(Advertisement {
            address: address.to_string(),
            display_name: name.map(str::to_string),
            payload: payload.to_vec(),
            rssi: Some(rssi),
        }));
    }

    /// The radio kills the running scan.
    pub fn fail_scan(&self, code: i32) {
        self.state().scanning = false;
        self.emit(PlatformEvent::ScanFailed(code));
    }

    pub fn respond_to_authorization(&self, request_id: u32, results: Vec<(Permission, Grant)>) {
        {
            let mut state = self.state();
            for (permission, grant) in &results {
                match grant {
                    Grant::Granted => state.granted.insert(*permission),
                    Grant::Denied => state.granted.remove(permission),
                };
            }
        }
        self.emit(PlatformEvent::AuthorizationResult {
            request_id,
            results,
        });
    }

    pub fn respond_to_enable_prompt(&self, enabled: bool) {
        self.state().radio_enabled = enabled;
        self.emit(PlatformEvent::RadioEnableResult(enabled));
    }

    /// Finish the connect sequence for `address` and hand out a session handle.
    pub fn complete_setup(&self, address: &str) -> SessionHandle {
        let handle = {
            let mut state = self.state();
            let id = state.next_handle_id;
            state.next_handle_id += 1;
            SessionHandle {
                id,
                address: address.to_string(),
            }
        };
        for callback in [
            ConnectionCallback::Connected {
                address: address.to_string(),
            },
            ConnectionCallback::MtuChanged {
                address: address.to_string(),
                mtu: 247,
            },
            ConnectionCallback::ServicesDiscovered {
                address: address.to_string(),
            },
            ConnectionCallback::SetupComplete(handle.clone()),
        ] {
            self.emit(PlatformEvent::Connection(callback));
        }
        handle
    }

    pub fn fail_connect(&self, address: &str, status: i32) {
        self.emit(PlatformEvent::Connection(ConnectionCallback::ConnectFailed {
            address: address.to_string(),
            status,
        }));
    }

    /// The remote side dropped the link.
    pub fn drop_connection(&self, address: &str) {
        let name = self.state().names.get(address).cloned();
        self.emit(PlatformEvent::Connection(ConnectionCallback::Disconnected {
            address: address.to_string(),
            name,
        }));
    }

    // Inspection

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<PlatformCall> {
        std::mem::take(&mut self.state().calls)
    }

    pub fn is_scanning(&self) -> bool {
        self.state().scanning
    }

    fn record(&self, call: PlatformCall) {
        debug!("Platform call: {:?}", call);
        self.state().calls.push(call);
    }
}

impl Authorizer for SimulatedPlatform {
    fn os_version_class(&self) -> OsVersionClass {
        self.state().os_class
    }

    fn is_granted(&self, permission: Permission) -> bool {
        self.state().granted.contains(&permission)
    }

    fn request_authorization(&self, request_id: u32, permissions: &[Permission]) {
        self.record(PlatformCall::RequestAuthorization {
            request_id,
            permissions: permissions.to_vec(),
        });
        let grant_on_request = self.state().grant_on_request;
        if grant_on_request {
            let results = permissions.iter().map(|p| (*p, Grant::Granted)).collect();
            self.respond_to_authorization(request_id, results);
        }
    }

    fn should_explain_before_request(&self, permission: Permission) -> bool {
        !self.state().blocked.contains(&permission)
    }
}

impl RadioAdapter for SimulatedPlatform {
    fn is_radio_enabled(&self) -> bool {
        self.state().radio_enabled
    }

    fn prompt_enable_radio(&self) {
        self.record(PlatformCall::PromptEnableRadio);
        let enable_on_prompt = self.state().enable_on_prompt;
        if enable_on_prompt {
            self.respond_to_enable_prompt(true);
        }
    }
}

impl ScanRadio for SimulatedPlatform {
    fn start_scan(&self, filter: &ScanFilter, mode: ScanMode) -> Result<(), i32> {
        self.record(PlatformCall::StartScan(*filter));
        let mut state = self.state();
        if let Some(code) = state.scan_refusal {
            return Err(code);
        }
        debug!("Simulated scan running in {:?} mode", mode);
        state.scanning = true;
        Ok(())
    }

    fn stop_scan(&self) {
        self.record(PlatformCall::StopScan);
        self.state().scanning = false;
    }
}

impl ConnectionSubsystem for SimulatedPlatform {
    fn connect(&self, device: &DeviceIdentity) {
        self.record(PlatformCall::Connect(device.address.clone()));
        if let Some(name) = &device.name {
            self.state()
                .names
                .insert(device.address.clone(), name.clone());
        }
        let auto_accept = self.state().auto_accept;
        if auto_accept {
            self.complete_setup(&device.address);
        }
    }

    fn disconnect(&self, handle: &SessionHandle) {
        self.record(PlatformCall::Disconnect(handle.clone()));
        self.drop_connection(&handle.address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::permissions::AuthorizationGate;

    #[test]
    fn test_grant_on_request_answers_immediately() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let platform = SimulatedPlatform::new(tx);
        platform.set_grant_on_request(true);

        assert!(!AuthorizationGate::is_authorized(&platform));
        platform.request_authorization(3, &[Permission::BluetoothScan, Permission::BluetoothConnect]);

        assert!(AuthorizationGate::is_authorized(&platform));
        match rx.try_recv().unwrap() {
            PlatformEvent::AuthorizationResult { request_id, results } => {
                assert_eq!(request_id, 3);
                assert_eq!(results.len(), 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_auto_accept_runs_setup_sequence() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let platform = SimulatedPlatform::new(tx);
        platform.set_auto_accept(true);
        platform.connect(&DeviceIdentity::new("AA:BB"));

        let mut callbacks = Vec::new();
        while let Ok(PlatformEvent::Connection(cb)) = rx.try_recv() {
            callbacks.push(cb);
        }
        assert_eq!(callbacks.len(), 4);
        assert!(matches!(
            callbacks.last(),
            Some(ConnectionCallback::SetupComplete(h)) if h.address == "AA:BB"
        ));
    }
}
