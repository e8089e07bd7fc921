//! Nullable store: thread-safe in-memory node records for testing.

use std::collections::HashMap;

use parking_lot::Mutex;

use wotcrawl_store::{NodeRecord, NodeStore, StoreError};

/// An in-memory [`NodeStore`] keyed by currency.
#[derive(Default)]
pub struct NullNodeStore {
    records: Mutex<HashMap<String, Vec<NodeRecord>>>,
    saves: Mutex<u32>,
}

impl NullNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-filled with `records` for `currency`.
    pub fn with_records(currency: &str, records: Vec<NodeRecord>) -> Self {
        let store = Self::new();
        store.records.lock().insert(currency.to_string(), records);
        store
    }

    /// How many times `save_nodes` was called.
    pub fn save_count(&self) -> u32 {
        *self.saves.lock()
    }
}

impl NodeStore for NullNodeStore {
    fn load_nodes(&self, currency: &str) -> Result<Vec<NodeRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .get(currency)
            .cloned()
            .unwrap_or_default())
    }

    fn save_nodes(&self, currency: &str, nodes: &[NodeRecord]) -> Result<(), StoreError> {
        self.records
            .lock()
            .insert(currency.to_string(), nodes.to_vec());
        *self.saves.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wotcrawl_types::{NodeState, Timestamp};

    fn record(pubkey: &str) -> NodeRecord {
        NodeRecord {
            currency: "g1".into(),
            pubkey: pubkey.into(),
            endpoints: vec![],
            current_block: None,
            previous_block: None,
            state: NodeState::Offline,
            merkle_peers_root: None,
            merkle_peers_leaves: vec![],
            uid: String::new(),
            version: String::new(),
            software: String::new(),
            fork_window: 0,
            member: false,
            root: false,
            last_change: Timestamp::new(0),
        }
    }

    #[test]
    fn save_and_load() {
        let store = NullNodeStore::new();
        assert!(store.load_nodes("g1").unwrap().is_empty());
        store.save_nodes("g1", &[record("A")]).unwrap();
        assert_eq!(store.load_nodes("g1").unwrap().len(), 1);
        assert!(store.load_nodes("other").unwrap().is_empty());
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn prefilled_records_are_found() {
        let store = NullNodeStore::with_records("g1", vec![record("A"), record("B")]);
        assert!(store.get_node("g1", "B").unwrap().is_some());
        assert_eq!(store.save_count(), 0);
    }
}
