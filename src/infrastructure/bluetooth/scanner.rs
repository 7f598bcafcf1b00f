//! BLE Scan Session
//!
//! Owns the discovered-device store and the `Idle`/`Scanning` state. Every
//! change is reported to the presentation layer as a [`UiEvent`] so the
//! device list can be patched by index.

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::{
    Advertisement, MessageSeverity, ScanFilter, ScanMode, ScanState, StatusMessage, UiEvent,
};
use crate::domain::store::{DeviceRecordStore, Upsert};
use crate::infrastructure::bluetooth::platform::{RadioAdapter, ScanRadio};
use crate::infrastructure::bluetooth::protocol;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

pub struct ScanSession {
    state: ScanState,
    /// Filter of the running session, fixed until it stops
    active_filter: Option<ScanFilter>,
    mode: ScanMode,
    store: DeviceRecordStore,
    event_sender: mpsc::UnboundedSender<UiEvent>,
}

impl ScanSession {
    pub fn new(event_sender: mpsc::UnboundedSender<UiEvent>, mode: ScanMode) -> Self {
        Self {
            state: ScanState::Idle,
            active_filter: None,
            mode,
            store: DeviceRecordStore::new(),
            event_sender,
        }
    }

    /// Start a scan session restricted to `filter`.
    ///
    /// A rejected start leaves both the store and the state untouched.
    pub fn start<R>(&mut self, filter: ScanFilter, authorized: bool, radio: &R) -> CoreResult<()>
    where
        R: RadioAdapter + ScanRadio + ?Sized,
    {
        if self.state == ScanState::Scanning {
            return Err(CoreError::AlreadyScanning);
        }
        if !authorized {
            warn!("Scan start refused: missing permissions");
            return Err(CoreError::Unauthorized);
        }
        if !radio.is_radio_enabled() {
            warn!("Scan start refused: adapter disabled");
            return Err(CoreError::RadioDisabled);
        }

        self.store.clear();
        self.send(UiEvent::DevicesCleared);

        info!("Starting BLE scan ({}, {:?})", filter, self.mode);
        if let Err(code) = radio.start_scan(&filter, self.mode) {
            error!("Scan start failed: code {}", code);
            self.send(UiEvent::Failure(CoreError::ScanHardwareFailure(code)));
            return Err(CoreError::ScanHardwareFailure(code));
        }

        self.state = ScanState::Scanning;
        self.active_filter = Some(filter);
        self.send(UiEvent::ScanningStarted);
        self.send_log("Scanning for devices...", MessageSeverity::Info);
        Ok(())
    }

    /// Stop the running scan. Safe to call repeatedly.
    ///
    /// Without authorization the platform has already torn the scan down,
    /// so this is a no-op.
    pub fn stop<R>(&mut self, authorized: bool, radio: &R)
    where
        R: ScanRadio + ?Sized,
    {
        if self.state == ScanState::Idle {
            trace!("Stop requested while idle");
            return;
        }
        if !authorized {
            warn!("Stop requested without permissions; leaving scan to the platform");
            return;
        }

        info!("Stopping BLE scan...");
        radio.stop_scan();
        self.state = ScanState::Idle;
        self.active_filter = None;
        self.send(UiEvent::ScanningStopped);
        self.send_log("Scan stopped.", MessageSeverity::Info);
    }

    /// Route one advertisement into the store.
    pub fn on_advertisement(&mut self, mut advertisement: Advertisement) -> Option<Upsert> {
        if self.state != ScanState::Scanning {
            trace!("Dropping advertisement from {} while idle", advertisement.address);
            return None;
        }
        if advertisement.display_name.is_none() {
            advertisement.display_name = protocol::local_name(&advertisement.payload);
        }

        let name = advertisement
            .display_name
            .clone()
            .unwrap_or_else(|| "Unnamed".to_string());
        let address = advertisement.address.clone();

        let outcome = self.store.upsert(advertisement);
        match outcome {
            Upsert::Inserted(index) => {
                info!("Found BLE device! Name: {}, address: {}", name, address);
                self.send(UiEvent::DeviceInserted(index));
            }
            Upsert::Updated(index) => {
                trace!("Updated {} at index {}", address, index);
                self.send(UiEvent::DeviceUpdated(index));
            }
        }
        Some(outcome)
    }

    /// The radio gave up on the scan. Falls back to `Idle` so the UI can't
    /// get stuck showing a dead scan.
    pub fn on_scan_failed(&mut self, code: i32) {
        error!("onScanFailed: code {}", code);
        if self.state != ScanState::Scanning {
            debug!("Ignoring scan failure while idle");
            return;
        }

        self.state = ScanState::Idle;
        self.active_filter = None;
        self.send(UiEvent::Failure(CoreError::ScanHardwareFailure(code)));
        self.send(UiEvent::ScanningStopped);
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn is_scanning(&self) -> bool {
        self.state == ScanState::Scanning
    }

    pub fn active_filter(&self) -> Option<ScanFilter> {
        self.active_filter
    }

    /// Read-only view for the orchestrator.
    pub fn store(&self) -> &DeviceRecordStore {
        &self.store
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::PeripheralRecord;
    use std::cell::{Cell, RefCell};
    use uuid::Uuid;

    #[derive(Default)]
    struct FakeRadio {
        disabled: Cell<bool>,
        refuse_with: Cell<Option<i32>>,
        started: RefCell<Vec<ScanFilter>>,
        stops: Cell<usize>,
    }

    impl RadioAdapter for FakeRadio {
        fn is_radio_enabled(&self) -> bool {
            !self.disabled.get()
        }
        fn prompt_enable_radio(&self) {}
    }

    impl ScanRadio for FakeRadio {
        fn start_scan(&self, filter: &ScanFilter, _mode: ScanMode) -> Result<(), i32> {
            match self.refuse_with.get() {
                Some(code) => Err(code),
                None => {
                    self.started.borrow_mut().push(*filter);
                    Ok(())
                }
            }
        }
        fn stop_scan(&self) {
            self.stops.set(self.stops.get() + 1);
        }
    }

    fn adv(address: &str, payload: &[u8]) -> Advertisement {
        PeripheralRecord {
            address: address.to_string(),
            display_name: None,
            payload: payload.to_vec(),
            rssi: Some(-50),
        }
    }

    fn session() -> (ScanSession, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ScanSession::new(tx, ScanMode::LowLatency), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if !matches!(event, UiEvent::LogMessage(_)) {
                events.push(event);
            }
        }
        events
    }

    #[test]
    fn test_filtered_scan_dedups_resightings() {
        let (mut scan, mut rx) = session();
        let radio = FakeRadio::default();
        let filter = ScanFilter::ServiceUuid(Uuid::from_u128(0x1234));

        scan.start(filter, true, &radio).unwrap();
        assert_eq!(radio.started.borrow().as_slice(), &[filter]);
        assert_eq!(scan.active_filter(), Some(filter));

        assert_eq!(scan.on_advertisement(adv("AA:BB", &[1])), Some(Upsert::Inserted(0)));
        assert_eq!(scan.on_advertisement(adv("AA:BB", &[2])), Some(Upsert::Updated(0)));

        assert_eq!(scan.store().len(), 1);
        assert_eq!(scan.store().get(0).unwrap().payload, vec![2]);
        assert_eq!(
            drain(&mut rx),
            vec![
                UiEvent::DevicesCleared,
                UiEvent::ScanningStarted,
                UiEvent::DeviceInserted(0),
                UiEvent::DeviceUpdated(0),
            ]
        );
    }

    #[test]
    fn test_unauthorized_start_changes_nothing() {
        let (mut scan, mut rx) = session();
        let radio = FakeRadio::default();
        scan.start(ScanFilter::None, true, &radio).unwrap();
        scan.on_advertisement(adv("AA:BB", &[]));
        scan.stop(true, &radio);
        drain(&mut rx);

        assert_eq!(
            scan.start(ScanFilter::None, false, &radio),
            Err(CoreError::Unauthorized)
        );
        assert_eq!(scan.state(), ScanState::Idle);
        assert_eq!(scan.store().len(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_disabled_radio_refuses_start() {
        let (mut scan, _rx) = session();
        let radio = FakeRadio::default();
        radio.disabled.set(true);

        assert_eq!(
            scan.start(ScanFilter::None, true, &radio),
            Err(CoreError::RadioDisabled)
        );
        assert!(radio.started.borrow().is_empty());
    }

    #[test]
    fn test_double_start_is_rejected() {
        let (mut scan, _rx) = session();
        let radio = FakeRadio::default();
        scan.start(ScanFilter::None, true, &radio).unwrap();
        assert_eq!(
            scan.start(ScanFilter::None, true, &radio),
            Err(CoreError::AlreadyScanning)
        );
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut scan, mut rx) = session();
        let radio = FakeRadio::default();
        scan.start(ScanFilter::None, true, &radio).unwrap();
        drain(&mut rx);

        scan.stop(true, &radio);
        scan.stop(true, &radio);

        assert_eq!(scan.state(), ScanState::Idle);
        assert_eq!(radio.stops.get(), 1);
        assert_eq!(drain(&mut rx), vec![UiEvent::ScanningStopped]);
    }

    #[test]
    fn test_stop_without_permission_is_noop() {
        let (mut scan, _rx) = session();
        let radio = FakeRadio::default();
        scan.start(ScanFilter::None, true, &radio).unwrap();

        scan.stop(false, &radio);
        assert_eq!(scan.state(), ScanState::Scanning);
        assert_eq!(radio.stops.get(), 0);
    }

    #[test]
    fn test_scan_failure_resets_to_idle_once() {
        let (mut scan, mut rx) = session();
        let radio = FakeRadio::default();
        scan.start(ScanFilter::None, true, &radio).unwrap();
        drain(&mut rx);

        scan.on_scan_failed(2);
        scan.on_scan_failed(2);

        assert_eq!(scan.state(), ScanState::Idle);
        assert_eq!(
            drain(&mut rx),
            vec![
                UiEvent::Failure(CoreError::ScanHardwareFailure(2)),
                UiEvent::ScanningStopped,
            ]
        );
        assert_eq!(scan.on_advertisement(adv("AA:BB", &[])), None);
        assert!(scan.store().is_empty());
    }

    #[test]
    fn test_hardware_refusal_stays_idle() {
        let (mut scan, mut rx) = session();
        let radio = FakeRadio::default();
        radio.refuse_with.set(Some(1));

        assert_eq!(
            scan.start(ScanFilter::None, true, &radio),
            Err(CoreError::ScanHardwareFailure(1))
        );
        assert_eq!(scan.state(), ScanState::Idle);
        assert!(drain(&mut rx).contains(&UiEvent::Failure(CoreError::ScanHardwareFailure(1))));
    }

    #[test]
    fn test_name_falls_back_to_payload() {
        let (mut scan, _rx) = session();
        let radio = FakeRadio::default();
        scan.start(ScanFilter::None, true, &radio).unwrap();
        scan.on_advertisement(adv("AA:BB", &[0x04, 0x09, b'M', b'C', b'P']));

        assert_eq!(
            scan.store().get(0).unwrap().display_name.as_deref(),
            Some("MCP")
        );
    }
}
