//! Advertisement protocol helpers
//!
//! Well-known vendor service UUIDs used by the scan filter presets and a
//! minimal parser for the AD structures in a raw advertisement payload.

use crate::domain::error::{CoreError, CoreResult};
use uuid::Uuid;

/// Würth Elektronik Proteus transparent-UART service
pub const PROTEUS_SERVICE_UUID: &str = "6e400001-c352-11e5-953d-0002a5d5c51b";

/// Microchip transparent-UART service
pub const MICROCHIP_SERVICE_UUID: &str = "49535343-fe7d-4ae5-8fa9-9fafd205e455";

/// AD type: shortened local name
const AD_SHORT_NAME: u8 = 0x08;
/// AD type: complete local name
const AD_COMPLETE_NAME: u8 = 0x09;

/// Parse a UUID string, accepting hyphenated or plain forms
pub fn parse_uuid(uuid_str: &str) -> CoreResult<Uuid> {
    Uuid::parse_str(uuid_str.trim()).map_err(|_| CoreError::InvalidServiceUuid(uuid_str.to_string()))
}

/// Extract the local name from raw advertisement data.
///
/// A complete name is preferred over a shortened one.
pub fn local_name(payload: &[u8]) -> Option<String> {
    let mut short = None;
    for (ad_type, data) in ad_structures(payload) {
        match ad_type {
            AD_COMPLETE_NAME => return Some(String::from_utf8_lossy(data).into_owned()),
            AD_SHORT_NAME if short.is_none() => {
                short = Some(String::from_utf8_lossy(data).into_owned())
            }
            _ => {}
        }
    }
    short
}

/// Iterate `(type, data)` pairs, stopping at the first malformed entry
fn ad_structures(payload: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    let mut i = 0;
    std::iter::from_fn(move || {
        let len = *payload.get(i)? as usize;
        if len == 0 || i + len >= payload.len() {
            return None;
        }
        let ad_type = payload[i + 1];
        let data = &payload[i + 2..i + 1 + len];
        i += len + 1;
        Some((ad_type, data))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid() {
        let uuid = parse_uuid(PROTEUS_SERVICE_UUID).unwrap();
        assert_eq!(uuid.as_fields().0, 0x6e400001);
        assert_eq!(
            parse_uuid("49535343FE7D4AE58FA99FAFD205E455").unwrap(),
            parse_uuid(MICROCHIP_SERVICE_UUID).unwrap()
        );
        assert!(matches!(
            parse_uuid("not-a-uuid"),
            Err(CoreError::InvalidServiceUuid(_))
        ));
    }

    #[test]
    fn test_local_name() {
        // Flags, then shortened name "Pro", then complete name "Proteus".
        let payload = [
            0x02, 0x01, 0x06, 0x04, 0x08, b'P', b'r', b'o', 0x08, 0x09, b'P', b'r', b'o', b't',
            b'e', b'u', b's',
        ];
        assert_eq!(local_name(&payload).as_deref(), Some("Proteus"));
        assert_eq!(local_name(&payload[..8]).as_deref(), Some("Pro"));
    }

    #[test]
    fn test_truncated_payload_has_no_name() {
        assert_eq!(local_name(&[0x05, 0x09, b'A']), None);
        assert_eq!(local_name(&[]), None);
    }
}
