//! Error taxonomy for the scan/connect core.
//!
//! Nothing here is fatal: every variant has a resting state the
//! orchestrator drives back to, and most of them reach the host only as a
//! [`UiEvent::Failure`](crate::domain::models::UiEvent::Failure) notice.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Required radio permissions are missing. Re-request and retry.
    #[error("required Bluetooth permissions are not granted")]
    Unauthorized,

    /// The user refused with "don't ask again"; only a settings change helps.
    #[error("Bluetooth permissions permanently denied; grant them from app settings")]
    PermanentlyDenied,

    /// The adapter is switched off.
    #[error("Bluetooth adapter is disabled")]
    RadioDisabled,

    /// The radio reported a scan failure code.
    #[error("scan failed with code {0}")]
    ScanHardwareFailure(i32),

    /// A connection request arrived while another session was pending or active.
    #[error("connection to {requested} rejected: session with {pending} still in progress")]
    ConcurrentConnectionRejected { pending: String, requested: String },

    #[error("scan already in progress")]
    AlreadyScanning,

    #[error("no discovered device at index {0}")]
    UnknownDevice(usize),

    #[error("no filter preset at index {0}")]
    UnknownFilter(usize),

    #[error("invalid service UUID: {0}")]
    InvalidServiceUuid(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = CoreError::ConcurrentConnectionRejected {
            pending: "CC:DD".into(),
            requested: "AA:BB".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("CC:DD"));
        assert!(msg.contains("AA:BB"));
        assert_eq!(
            CoreError::ScanHardwareFailure(2).to_string(),
            "scan failed with code 2"
        );
    }
}
