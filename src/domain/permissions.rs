//! Authorization gate
//!
//! The set of permissions that guard the radio depends on the OS version
//! class, so it is recomputed from the collaborator on every check.

use std::collections::BTreeSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Permission {
    FineLocation,
    BluetoothScan,
    BluetoothConnect,
}

/// Which permission model the OS uses for the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsVersionClass {
    /// Location permission gates BLE scanning.
    Legacy,
    /// Dedicated scan/connect permissions.
    Modern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Granted,
    Denied,
}

/// Outcome of one authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionVerdict {
    /// Empty result; the request was interrupted.
    Cancelled,
    /// A denial the user asked not to be asked about again.
    PermanentlyDenied,
    /// Denied but still re-requestable.
    Denied,
    Granted,
    /// Neither granted nor denied. Should not happen.
    Unexpected,
}

/// The platform's permission system.
pub trait Authorizer {
    fn os_version_class(&self) -> OsVersionClass;
    fn is_granted(&self, permission: Permission) -> bool;
    /// Asynchronous; the result comes back as a platform event tagged with `request_id`.
    fn request_authorization(&self, request_id: u32, permissions: &[Permission]);
    fn should_explain_before_request(&self, permission: Permission) -> bool;
}

pub fn required_permissions(class: OsVersionClass) -> BTreeSet<Permission> {
    match class {
        OsVersionClass::Legacy => BTreeSet::from([Permission::FineLocation]),
        OsVersionClass::Modern => {
            BTreeSet::from([Permission::BluetoothScan, Permission::BluetoothConnect])
        }
    }
}

pub struct AuthorizationGate;

impl AuthorizationGate {
    pub fn required(authorizer: &dyn Authorizer) -> BTreeSet<Permission> {
        required_permissions(authorizer.os_version_class())
    }

    pub fn is_authorized(authorizer: &dyn Authorizer) -> bool {
        Self::required(authorizer)
            .into_iter()
            .all(|p| authorizer.is_granted(p))
    }
}

/// Classify the grant results of one request.
///
/// A denial counts as permanent when the platform no longer wants a
/// rationale shown for that permission.
pub fn evaluate_grants(
    results: &[(Permission, Grant)],
    should_explain: impl Fn(Permission) -> bool,
) -> PermissionVerdict {
    if results.is_empty() {
        warn!("Empty permission results; request was likely interrupted");
        return PermissionVerdict::Cancelled;
    }
    debug!("Permission results: {:?}", results);

    let permanent = results
        .iter()
        .any(|(p, g)| *g == Grant::Denied && !should_explain(*p));
    let denied = results.iter().any(|(_, g)| *g == Grant::Denied);
    let all_granted = results.iter().all(|(_, g)| *g == Grant::Granted);

    if permanent {
        PermissionVerdict::PermanentlyDenied
    } else if denied {
        PermissionVerdict::Denied
    } else if all_granted {
        PermissionVerdict::Granted
    } else {
        PermissionVerdict::Unexpected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FakeAuthorizer {
        class: Cell<OsVersionClass>,
        granted: BTreeSet<Permission>,
    }

    impl Authorizer for FakeAuthorizer {
        fn os_version_class(&self) -> OsVersionClass {
            self.class.get()
        }
        fn is_granted(&self, permission: Permission) -> bool {
            self.granted.contains(&permission)
        }
        fn request_authorization(&self, _request_id: u32, _permissions: &[Permission]) {}
        fn should_explain_before_request(&self, _permission: Permission) -> bool {
            true
        }
    }

    #[test]
    fn test_required_set_follows_version_class() {
        let auth = FakeAuthorizer {
            class: Cell::new(OsVersionClass::Legacy),
            granted: BTreeSet::from([Permission::FineLocation]),
        };
        assert!(AuthorizationGate::is_authorized(&auth));

        // Not cached: a reclassification is picked up by the next check.
        auth.class.set(OsVersionClass::Modern);
        assert!(!AuthorizationGate::is_authorized(&auth));
        assert_eq!(
            AuthorizationGate::required(&auth),
            BTreeSet::from([Permission::BluetoothScan, Permission::BluetoothConnect])
        );
    }

    #[test]
    fn test_verdict_precedence() {
        use Grant::*;
        use Permission::*;

        assert_eq!(evaluate_grants(&[], |_| true), PermissionVerdict::Cancelled);
        assert_eq!(
            evaluate_grants(&[(BluetoothScan, Granted), (BluetoothConnect, Granted)], |_| true),
            PermissionVerdict::Granted
        );
        assert_eq!(
            evaluate_grants(&[(BluetoothScan, Denied), (BluetoothConnect, Granted)], |_| true),
            PermissionVerdict::Denied
        );
        // Permanent denial wins over a plain denial.
        assert_eq!(
            evaluate_grants(&[(BluetoothScan, Denied), (BluetoothConnect, Denied)], |p| {
                p != BluetoothConnect
            }),
            PermissionVerdict::PermanentlyDenied
        );
    }
}
