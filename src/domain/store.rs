//! Discovered-device store.
//!
//! Records keep first-seen order. The presentation layer patches its list
//! by the indices returned from [`DeviceRecordStore::upsert`], so an update
//! must never move a record.

use crate::domain::models::PeripheralRecord;

/// Where an upsert landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted(usize),
    Updated(usize),
}

impl Upsert {
    pub fn index(&self) -> usize {
        match self {
            Upsert::Inserted(i) | Upsert::Updated(i) => *i,
        }
    }
}

#[derive(Debug, Default)]
pub struct DeviceRecordStore {
    records: Vec<PeripheralRecord>,
}

impl DeviceRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, record: PeripheralRecord) -> Upsert {
        match self.position(&record.address) {
            Some(index) => {
                self.records[index] = record;
                Upsert::Updated(index)
            }
            None => {
                self.records.push(record);
                Upsert::Inserted(self.records.len() - 1)
            }
        }
    }

    /// Drops every record. Previously reported indices are invalid afterwards.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn get(&self, index: usize) -> Option<&PeripheralRecord> {
        self.records.get(index)
    }

    pub fn find(&self, address: &str) -> Option<&PeripheralRecord> {
        self.position(address).map(|i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn snapshot(&self) -> Vec<PeripheralRecord> {
        self.records.clone()
    }

    fn position(&self, address: &str) -> Option<usize> {
        self.records.iter().position(|r| r.address == address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(address: &str, payload: &[u8]) -> PeripheralRecord {
        PeripheralRecord {
            address: address.to_string(),
            display_name: None,
            payload: payload.to_vec(),
            rssi: Some(-60),
        }
    }

    #[test]
    fn test_resighting_updates_in_place() {
        let mut store = DeviceRecordStore::new();
        assert_eq!(store.upsert(record("AA:BB", &[1])), Upsert::Inserted(0));
        assert_eq!(store.upsert(record("AA:BB", &[2])), Upsert::Updated(0));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(0).unwrap().payload, vec![2]);
    }

    #[test]
    fn test_first_seen_order_is_kept() {
        let mut store = DeviceRecordStore::new();
        let sightings = ["A", "B", "A", "C", "B", "A", "D", "C"];
        for (n, address) in sightings.iter().enumerate() {
            store.upsert(record(address, &[n as u8]));
        }

        let order: Vec<_> = store.snapshot().into_iter().map(|r| r.address).collect();
        assert_eq!(order, vec!["A", "B", "C", "D"]);
        assert_eq!(store.find("C").unwrap().payload, vec![7]);
        assert_eq!(store.upsert(record("B", &[9])), Upsert::Updated(1));
    }

    #[test]
    fn test_clear_resets_indices() {
        let mut store = DeviceRecordStore::new();
        store.upsert(record("A", &[]));
        store.upsert(record("B", &[]));
        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.upsert(record("B", &[])), Upsert::Inserted(0));
    }
}
