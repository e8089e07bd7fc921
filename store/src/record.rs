//! The persisted form of a crawled node.

use serde::{Deserialize, Serialize};

use wotcrawl_types::{BlockHead, BlockUid, Endpoint, NodeState, Timestamp};

/// Everything about a node that survives a restart.
///
/// Endpoints and blockstamps are stored in their text form so the file
/// stays readable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub currency: String,
    pub pubkey: String,
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub current_block: Option<BlockHead>,
    #[serde(default)]
    pub previous_block: Option<BlockUid>,
    pub state: NodeState,
    #[serde(default)]
    pub merkle_peers_root: Option<String>,
    #[serde(default)]
    pub merkle_peers_leaves: Vec<String>,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub software: String,
    #[serde(default)]
    pub fork_window: u64,
    #[serde(default)]
    pub member: bool,
    #[serde(default)]
    pub root: bool,
    pub last_change: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_record_uses_defaults() {
        let json = r#"{
            "currency": "g1",
            "pubkey": "8Fi1VSTbjkXguwThF4v2ZxC5whK7pwG2vcGTkPUPjPGU",
            "endpoints": ["BASIC_MERKLED_API g1.example.org 10901"],
            "state": "offline",
            "last_change": 1500000000
        }"#;
        let record: NodeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.state, NodeState::Offline);
        assert_eq!(record.current_block, None);
        assert!(record.merkle_peers_leaves.is_empty());
        assert!(!record.root);
        assert_eq!(record.endpoints[0].to_string(), "BASIC_MERKLED_API g1.example.org 10901");
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let json = r#"{
            "currency": "g1",
            "pubkey": "k",
            "endpoints": ["BASIC_MERKLED_API"],
            "state": "online",
            "last_change": 0
        }"#;
        assert!(serde_json::from_str::<NodeRecord>(json).is_err());
    }
}
