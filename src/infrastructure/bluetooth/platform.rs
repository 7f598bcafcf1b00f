//! Collaborator ports
//!
//! Every external subsystem the core talks to is a trait here. All of them
//! report back by pushing [`PlatformEvent`]s onto one queue, which the
//! service loop drains in order.

use crate::domain::models::{Advertisement, DeviceIdentity, ScanFilter, ScanMode, SessionHandle};
use crate::domain::permissions::{Grant, Permission};
use crate::infrastructure::bluetooth::connection::ConnectionCallback;

pub use crate::domain::permissions::Authorizer;

/// Adapter power state and the enable prompt.
pub trait RadioAdapter {
    fn is_radio_enabled(&self) -> bool;
    /// Asynchronous; answered with [`PlatformEvent::RadioEnableResult`].
    fn prompt_enable_radio(&self);
}

/// The hardware scanner.
pub trait ScanRadio {
    /// Start a scan. `Err` carries the platform failure code.
    fn start_scan(&self, filter: &ScanFilter, mode: ScanMode) -> Result<(), i32>;
    fn stop_scan(&self);
}

/// The connection subsystem. Outcomes arrive as [`PlatformEvent::Connection`].
pub trait ConnectionSubsystem {
    fn connect(&self, device: &DeviceIdentity);
    fn disconnect(&self, handle: &SessionHandle);
}

/// Everything the orchestrator needs from the platform.
pub trait Platform: Authorizer + RadioAdapter + ScanRadio + ConnectionSubsystem {}

impl<T> Platform for T where T: Authorizer + RadioAdapter + ScanRadio + ConnectionSubsystem {}

/// Events delivered asynchronously by the platform.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    Advertisement(Advertisement),
    ScanFailed(i32),
    Connection(ConnectionCallback),
    AuthorizationResult {
        request_id: u32,
        results: Vec<(Permission, Grant)>,
    },
    RadioEnableResult(bool),
}
