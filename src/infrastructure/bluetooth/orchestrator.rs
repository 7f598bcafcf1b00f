//! Screen-level coordinator
//!
//! Owns the scan session and the connection bridge, and drives the
//! `Browsing -> Connecting -> {Operating | Browsing}` flow. Every outcome is
//! reported to the host through [`UiEvent`]s; nothing here panics or blocks.

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::{
    DeviceIdentity, ListenerId, MessageSeverity, OrchestratorState, PeripheralRecord,
    StatusMessage, UiEvent, UserCommand,
};
use crate::domain::permissions::{
    evaluate_grants, AuthorizationGate, Grant, Permission, PermissionVerdict,
};
use crate::domain::settings::{FilterPreset, Settings};
use crate::infrastructure::bluetooth::connection::{
    ConnectionCallback, ConnectionEventBridge, LifecycleEvent, SessionPhase,
};
use crate::infrastructure::bluetooth::platform::{Platform, PlatformEvent};
use crate::infrastructure::bluetooth::scanner::ScanSession;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub struct Orchestrator<P: Platform> {
    platform: P,
    scan: ScanSession,
    bridge: ConnectionEventBridge,
    listener: ListenerId,
    state: OrchestratorState,
    /// Device of the pending or active session, as it was known at connect time.
    session_identity: Option<DeviceIdentity>,
    filter_presets: Vec<FilterPreset>,
    selected_filter: usize,
    reprompt_on_enable_denied: bool,
    pending_request: Option<u32>,
    next_request_id: u32,
    event_sender: mpsc::UnboundedSender<UiEvent>,
}

impl<P: Platform> Orchestrator<P> {
    pub fn new(
        platform: P,
        settings: &Settings,
        event_sender: mpsc::UnboundedSender<UiEvent>,
    ) -> Self {
        let filter_presets = if settings.filter_presets.is_empty() {
            warn!("No filter presets configured; using defaults");
            Settings::default().filter_presets
        } else {
            settings.filter_presets.clone()
        };
        let selected_filter = if settings.selected_filter < filter_presets.len() {
            settings.selected_filter
        } else {
            0
        };

        Self {
            platform,
            scan: ScanSession::new(event_sender.clone(), settings.scan_mode),
            bridge: ConnectionEventBridge::new(),
            listener: ListenerId::next(),
            state: OrchestratorState::Browsing,
            session_identity: None,
            filter_presets,
            selected_filter,
            reprompt_on_enable_denied: settings.reprompt_on_enable_denied,
            pending_request: None,
            next_request_id: 1,
            event_sender,
        }
    }

    pub fn handle_command(&mut self, command: UserCommand) {
        debug!("Command: {:?}", command);
        let result = match command {
            UserCommand::Activate => {
                self.activate();
                Ok(())
            }
            UserCommand::Deactivate => {
                self.deactivate();
                Ok(())
            }
            UserCommand::ToggleScan => self.toggle_scan(),
            UserCommand::SelectFilter(index) => self.select_filter(index),
            UserCommand::SelectDevice(index) => self.select_device(index),
            UserCommand::Disconnect => {
                self.disconnect();
                Ok(())
            }
        };
        match result {
            Ok(()) => {}
            Err(e @ (CoreError::UnknownDevice(_) | CoreError::UnknownFilter(_))) => {
                warn!("Command rejected: {}", e);
                self.send(UiEvent::Failure(e));
            }
            // Already reported by the operation itself.
            Err(e) => debug!("Command rejected: {}", e),
        }
    }

    pub fn handle_event(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::Advertisement(advertisement) => {
                self.scan.on_advertisement(advertisement);
            }
            PlatformEvent::ScanFailed(code) => self.scan.on_scan_failed(code),
            PlatformEvent::Connection(callback) => self.on_connection_callback(callback),
            PlatformEvent::AuthorizationResult {
                request_id,
                results,
            } => self.on_authorization_result(request_id, &results),
            PlatformEvent::RadioEnableResult(enabled) => self.on_radio_enable_result(enabled),
        }
    }

    /// The screen became visible.
    pub fn activate(&mut self) {
        if self.bridge.register(self.listener) {
            debug!("Connection listener registered");
        }
        self.reconcile_connection();
        self.prompt_enable_radio();
    }

    /// The screen went to the background. No lifecycle event reaches us
    /// until the next [`activate`](Self::activate).
    pub fn deactivate(&mut self) {
        self.stop_scan();
        if self.bridge.unregister(self.listener) {
            debug!("Connection listener unregistered");
        }
    }

    pub fn toggle_scan(&mut self) -> CoreResult<()> {
        if self.scan.is_scanning() {
            self.stop_scan();
            Ok(())
        } else {
            self.start_scan()
        }
    }

    pub fn start_scan(&mut self) -> CoreResult<()> {
        let filter = self.filter_presets[self.selected_filter].to_filter();
        let authorized = self.is_authorized();

        match self.scan.start(filter, authorized, &self.platform) {
            Ok(()) => Ok(()),
            Err(CoreError::Unauthorized) => {
                self.send(UiEvent::Failure(CoreError::Unauthorized));
                self.request_authorization();
                Err(CoreError::Unauthorized)
            }
            Err(CoreError::RadioDisabled) => {
                self.send(UiEvent::Failure(CoreError::RadioDisabled));
                self.prompt_enable_radio();
                Err(CoreError::RadioDisabled)
            }
            Err(e) => Err(e),
        }
    }

    pub fn stop_scan(&mut self) {
        let authorized = self.is_authorized();
        self.scan.stop(authorized, &self.platform);
    }

    /// Choose the filter for the next scan session. Stops any running scan.
    pub fn select_filter(&mut self, index: usize) -> CoreResult<()> {
        let Some(preset) = self.filter_presets.get(index) else {
            warn!("No filter preset at index {}", index);
            return Err(CoreError::UnknownFilter(index));
        };
        let label = preset.label.clone();

        self.selected_filter = index;
        self.stop_scan();
        info!("Filter selected: {}", label);
        self.send(UiEvent::FilterSelected(label));
        Ok(())
    }

    /// Connect to the device at `index` of the discovered list.
    pub fn select_device(&mut self, index: usize) -> CoreResult<()> {
        self.ensure_browsing(|| index.to_string())?;
        let address = self
            .scan
            .store()
            .get(index)
            .map(|r| r.address.clone())
            .ok_or(CoreError::UnknownDevice(index))?;
        self.connect(&address)
    }

    /// Request a connection. Only one session may be pending or active.
    pub fn connect(&mut self, address: &str) -> CoreResult<()> {
        self.ensure_browsing(|| address.to_string())?;

        // A scanning radio makes connecting unreliable.
        if self.scan.is_scanning() {
            self.stop_scan();
        }

        let identity = DeviceIdentity {
            address: address.to_string(),
            name: self
                .scan
                .store()
                .find(address)
                .and_then(|r| r.display_name.clone()),
        };

        info!("Connecting to {}", address);
        self.bridge.begin(&identity);
        self.platform.connect(&identity);
        self.session_identity = Some(identity);
        self.state = OrchestratorState::Connecting {
            address: address.to_string(),
        };
        Ok(())
    }

    /// Ask the subsystem to close the active session. The resulting
    /// disconnect callback returns us to `Browsing`.
    pub fn disconnect(&mut self) {
        match &self.state {
            OrchestratorState::Operating { handle } => {
                info!("Disconnecting from {}", handle.address);
                self.platform.disconnect(handle);
            }
            other => debug!("Nothing to disconnect in state {:?}", other),
        }
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn scan(&self) -> &ScanSession {
        &self.scan
    }

    pub fn devices(&self) -> Vec<PeripheralRecord> {
        self.scan.store().snapshot()
    }

    pub fn listener(&self) -> ListenerId {
        self.listener
    }

    pub fn selected_filter(&self) -> &FilterPreset {
        &self.filter_presets[self.selected_filter]
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    fn is_authorized(&self) -> bool {
        AuthorizationGate::is_authorized(&self.platform)
    }

    fn ensure_browsing(&self, requested: impl FnOnce() -> String) -> CoreResult<()> {
        let pending = match &self.state {
            OrchestratorState::Browsing => return Ok(()),
            OrchestratorState::Connecting { address } => address.clone(),
            OrchestratorState::Operating { handle } => handle.address.clone(),
        };
        let err = CoreError::ConcurrentConnectionRejected {
            pending,
            requested: requested(),
        };
        warn!("{}", err);
        self.send(UiEvent::Failure(err.clone()));
        Err(err)
    }

    /// Never ask to enable an adapter we aren't allowed to control.
    fn prompt_enable_radio(&self) {
        if self.is_authorized() && !self.platform.is_radio_enabled() {
            info!("Prompting to enable Bluetooth");
            self.platform.prompt_enable_radio();
        }
    }

    fn request_authorization(&mut self) {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.pending_request = Some(request_id);

        let permissions: Vec<Permission> = AuthorizationGate::required(&self.platform)
            .into_iter()
            .collect();
        if permissions
            .iter()
            .any(|p| self.platform.should_explain_before_request(*p))
        {
            self.send_log(
                "Bluetooth permissions are needed to scan for nearby devices",
                MessageSeverity::Warning,
            );
        }
        info!("Requesting permissions {:?} (request {})", permissions, request_id);
        self.platform.request_authorization(request_id, &permissions);
    }

    fn on_authorization_result(&mut self, request_id: u32, results: &[(Permission, Grant)]) {
        if self.pending_request != Some(request_id) {
            debug!("Ignoring result for stale permission request {}", request_id);
            return;
        }
        self.pending_request = None;

        let verdict = evaluate_grants(results, |p| self.platform.should_explain_before_request(p));
        match verdict {
            PermissionVerdict::Cancelled => {
                warn!("Permission request was interrupted");
            }
            PermissionVerdict::PermanentlyDenied => {
                error!("User permanently denied granting of permissions");
                self.send(UiEvent::Failure(CoreError::PermanentlyDenied));
            }
            PermissionVerdict::Denied => self.request_authorization(),
            PermissionVerdict::Granted if self.is_authorized() => {
                let _ = self.start_scan();
            }
            PermissionVerdict::Granted | PermissionVerdict::Unexpected => {
                error!("Unexpected scenario encountered when handling permissions");
                self.stop_scan();
                self.send(UiEvent::RecreateRequested);
            }
        }
    }

    fn on_radio_enable_result(&mut self, enabled: bool) {
        if enabled {
            info!("Bluetooth is enabled, good to go");
        } else {
            error!("User dismissed or denied Bluetooth prompt");
            if self.reprompt_on_enable_denied {
                self.prompt_enable_radio();
            }
        }
    }

    fn on_connection_callback(&mut self, callback: ConnectionCallback) {
        let identity_visible = self.is_authorized();
        let deliveries = self.bridge.dispatch(callback, identity_visible);
        for (listener, event) in deliveries {
            if listener == self.listener {
                self.on_lifecycle(event);
            }
        }
    }

    fn on_lifecycle(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Ready(handle) => {
                if self.session_address() != Some(handle.address.as_str()) {
                    warn!("Ready for unexpected device {}", handle.address);
                    return;
                }
                self.stop_scan();
                info!("Session ready: {}", handle.address);
                self.state = OrchestratorState::Operating {
                    handle: handle.clone(),
                };
                self.send(UiEvent::Ready(handle));
            }
            LifecycleEvent::Lost(identity) => {
                if self.session_address() != Some(identity.address.as_str()) {
                    warn!("Lost event for unexpected device {}", identity.address);
                    return;
                }
                self.state = OrchestratorState::Browsing;
                self.session_identity = None;
                self.send(UiEvent::Lost(identity));
            }
        }
    }

    /// Catch up on a session that finished while we weren't listening.
    fn reconcile_connection(&mut self) {
        let Some(address) = self.session_address().map(str::to_string) else {
            return;
        };
        let connecting = matches!(self.state, OrchestratorState::Connecting { .. });
        match self.bridge.phase(&address) {
            Some(SessionPhase::Ready(handle)) if connecting => {
                info!("Session with {} became ready while inactive", address);
                self.state = OrchestratorState::Operating {
                    handle: handle.clone(),
                };
                self.send(UiEvent::Ready(handle));
            }
            None => {
                info!("Session with {} ended while inactive", address);
                let name = self
                    .session_identity
                    .take()
                    .and_then(|identity| identity.name)
                    .filter(|_| self.is_authorized());
                self.state = OrchestratorState::Browsing;
                self.send(UiEvent::Lost(DeviceIdentity { address, name }));
            }
            _ => {}
        }
    }

    fn session_address(&self) -> Option<&str> {
        match &self.state {
            OrchestratorState::Browsing => None,
            OrchestratorState::Connecting { address } => Some(address),
            OrchestratorState::Operating { handle } => Some(&handle.address),
        }
    }

    fn send(&self, event: UiEvent) {
        let _ = self.event_sender.send(event);
    }

    fn send_log(&self, message: &str, severity: MessageSeverity) {
        self.send(UiEvent::LogMessage(StatusMessage {
            message: message.to_string(),
            severity,
        }));
    }
}
