//! JSON file backend for [`NodeStore`].
//!
//! The file holds one object keyed by currency, each value being the list of
//! node records for that currency. Writes go to a sibling temporary file that
//! is renamed over the original, so a crash never leaves a half-written file.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{NodeRecord, NodeStore, StoreError};

type NodesFile = BTreeMap<String, Vec<NodeRecord>>;

/// Stores node records in a single JSON file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }

    fn read_all(&self) -> Result<NodesFile, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(NodesFile::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if content.trim().is_empty() {
            return Ok(NodesFile::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            StoreError::Corruption(format!("{}: {e}", self.path.display()))
        })
    }

    fn write_all(&self, nodes: &NodesFile) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(nodes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }
}

impl NodeStore for JsonFileStore {
    fn load_nodes(&self, currency: &str) -> Result<Vec<NodeRecord>, StoreError> {
        Ok(self.read_all()?.remove(currency).unwrap_or_default())
    }

    fn save_nodes(&self, currency: &str, nodes: &[NodeRecord]) -> Result<(), StoreError> {
        let mut all = self.read_all()?;
        all.insert(currency.to_string(), nodes.to_vec());
        self.write_all(&all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wotcrawl_types::{BlockHead, NodeState, Timestamp};

    fn record(currency: &str, pubkey: &str) -> NodeRecord {
        NodeRecord {
            currency: currency.into(),
            pubkey: pubkey.into(),
            endpoints: vec!["BASIC_MERKLED_API 10.0.0.1 10901".parse().unwrap()],
            current_block: Some(BlockHead {
                number: 10,
                hash: "A".repeat(64),
                median_time: 100,
                time: 110,
                pow_min: 70,
                issuer: String::new(),
            }),
            previous_block: None,
            state: NodeState::Online,
            merkle_peers_root: Some("ROOT".into()),
            merkle_peers_leaves: vec!["L1".into(), "L2".into()],
            uid: "alice".into(),
            version: "1.8.7".into(),
            software: "duniter".into(),
            fork_window: 100,
            member: true,
            root: true,
            last_change: Timestamp::new(1_000),
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nodes.json"));
        assert!(store.load_nodes("g1").unwrap().is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("nodes.json"));
        let nodes = vec![record("g1", "A"), record("g1", "B")];
        store.save_nodes("g1", &nodes).unwrap();
        assert_eq!(store.load_nodes("g1").unwrap(), nodes);
        assert_eq!(store.get_node("g1", "B").unwrap(), Some(nodes[1].clone()));
        assert_eq!(store.get_node("g1", "C").unwrap(), None);
    }

    #[test]
    fn currencies_are_kept_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nodes.json"));
        store.save_nodes("g1", &[record("g1", "A")]).unwrap();
        store.save_nodes("g1-test", &[record("g1-test", "B")]).unwrap();
        assert_eq!(store.load_nodes("g1").unwrap()[0].pubkey, "A");
        assert_eq!(store.load_nodes("g1-test").unwrap()[0].pubkey, "B");

        store.save_nodes("g1", &[]).unwrap();
        assert!(store.load_nodes("g1").unwrap().is_empty());
        assert_eq!(store.load_nodes("g1-test").unwrap().len(), 1);
    }

    #[test]
    fn garbage_file_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.json");
        fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStore::new(path);
        assert!(matches!(
            store.load_nodes("g1"),
            Err(StoreError::Corruption(_))
        ));
    }
}
