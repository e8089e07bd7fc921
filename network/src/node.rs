//! The crawler's view of one peer node.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;

use wotcrawl_documents::Peer;
use wotcrawl_store::NodeRecord;
use wotcrawl_types::{BlockHead, BlockUid, Endpoint, NodeState, Timestamp};

/// A node shared between its connector's tasks and the network registry.
///
/// The lock is only ever held for field reads and writes, never across an
/// await point.
pub type SharedNode = Arc<RwLock<Node>>;

/// Everything known about one peer node of a currency.
///
/// Block, peer and software fields are written by the node's connector; the
/// `state` field is also written by network-wide reconciliation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub currency: String,
    pub pubkey: String,
    pub endpoints: Vec<Endpoint>,
    pub current_block: Option<BlockHead>,
    /// Parent of `current_block`, used to tell a new head from a fork.
    pub previous_block: Option<BlockUid>,
    pub state: NodeState,
    pub merkle_peers_root: Option<String>,
    pub merkle_peers_leaves: BTreeSet<String>,
    pub uid: String,
    pub version: String,
    pub software: String,
    pub fork_window: u64,
    pub member: bool,
    pub root: bool,
    /// When `state` last changed.
    pub last_change: Timestamp,
}

impl Node {
    /// A freshly discovered node, optimistically online.
    pub fn new(
        currency: impl Into<String>,
        pubkey: impl Into<String>,
        endpoints: Vec<Endpoint>,
        now: Timestamp,
    ) -> Self {
        Self {
            currency: currency.into(),
            pubkey: pubkey.into(),
            endpoints,
            current_block: None,
            previous_block: None,
            state: NodeState::Online,
            merkle_peers_root: None,
            merkle_peers_leaves: BTreeSet::new(),
            uid: String::new(),
            version: String::new(),
            software: String::new(),
            fork_window: 0,
            member: false,
            root: false,
            last_change: now,
        }
    }

    pub fn from_peer(peer: &Peer, now: Timestamp) -> Self {
        Self::new(
            peer.currency.clone(),
            peer.pubkey.clone(),
            peer.endpoints.clone(),
            now,
        )
    }

    /// Pubkey prefix used in logs.
    pub fn short_pubkey(&self) -> &str {
        short(&self.pubkey)
    }

    /// Endpoints the crawler can talk to, in advertised order.
    pub fn supported_endpoints(&self) -> Vec<Endpoint> {
        self.endpoints
            .iter()
            .filter(|e| e.is_supported())
            .cloned()
            .collect()
    }

    /// Hash of the current block, if any.
    pub fn block_hash(&self) -> Option<&str> {
        self.current_block.as_ref().map(|b| b.hash.as_str())
    }

    /// Set the state, stamping `last_change` when it actually changes.
    /// Returns whether it changed.
    pub fn set_state(&mut self, state: NodeState, now: Timestamp) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state;
        self.last_change = now;
        true
    }

    /// The persisted form of this node.
    pub fn to_record(&self) -> NodeRecord {
        NodeRecord {
            currency: self.currency.clone(),
            pubkey: self.pubkey.clone(),
            endpoints: self.endpoints.clone(),
            current_block: self.current_block.clone(),
            previous_block: self.previous_block.clone(),
            state: self.state,
            merkle_peers_root: self.merkle_peers_root.clone(),
            merkle_peers_leaves: self.merkle_peers_leaves.iter().cloned().collect(),
            uid: self.uid.clone(),
            version: self.version.clone(),
            software: self.software.clone(),
            fork_window: self.fork_window,
            member: self.member,
            root: self.root,
            last_change: self.last_change,
        }
    }
}

impl From<NodeRecord> for Node {
    fn from(record: NodeRecord) -> Self {
        Self {
            currency: record.currency,
            pubkey: record.pubkey,
            endpoints: record.endpoints,
            current_block: record.current_block,
            previous_block: record.previous_block,
            state: record.state,
            merkle_peers_root: record.merkle_peers_root,
            merkle_peers_leaves: record.merkle_peers_leaves.into_iter().collect(),
            uid: record.uid,
            version: record.version,
            software: record.software,
            fork_window: record.fork_window,
            member: record.member,
            root: record.root,
            last_change: record.last_change,
        }
    }
}

pub(crate) fn short(pubkey: &str) -> &str {
    pubkey.get(..5).unwrap_or(pubkey)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(number: u64, hash: char) -> BlockHead {
        BlockHead {
            number,
            hash: hash.to_string().repeat(64),
            median_time: 1_500_000_000 + number,
            time: 1_500_000_100 + number,
            pow_min: 70,
            issuer: "HnFcSms8jzwngtVomTTnzudZx7SHUQY8sVE1y8yBmULk".into(),
        }
    }

    fn full_node() -> Node {
        let mut node = Node::new(
            "g1",
            "8Fi1VSTbjkXguwThF4v2ZxC5whK7pwG2vcGTkPUPjPGU",
            vec![
                "BASIC_MERKLED_API g1.example.org 10901".parse().unwrap(),
                "WS2P 3eaab4c7 g1.example.org 20901".parse().unwrap(),
            ],
            Timestamp::new(1_000),
        );
        node.current_block = Some(head(12, 'B'));
        node.previous_block = Some(BlockUid::new(11, "A".repeat(64)));
        node.state = NodeState::Desynced;
        node.merkle_peers_root = Some("ROOT".into());
        node.merkle_peers_leaves = ["L2", "L1"].iter().map(|s| s.to_string()).collect();
        node.uid = "alice".into();
        node.version = "1.8.7".into();
        node.software = "duniter".into();
        node.fork_window = 100;
        node.member = true;
        node.root = true;
        node
    }

    #[test]
    fn record_round_trip_is_lossless() {
        let node = full_node();
        assert_eq!(Node::from(node.to_record()), node);
    }

    #[test]
    fn set_state_stamps_only_real_changes() {
        let mut node = Node::new("g1", "abcdefgh", vec![], Timestamp::new(10));
        assert!(!node.set_state(NodeState::Online, Timestamp::new(20)));
        assert_eq!(node.last_change, Timestamp::new(10));

        assert!(node.set_state(NodeState::Offline, Timestamp::new(30)));
        assert_eq!(node.last_change, Timestamp::new(30));
    }

    #[test]
    fn only_supported_endpoints_are_used() {
        let node = full_node();
        let endpoints = node.supported_endpoints();
        assert_eq!(endpoints.len(), 1);
        assert!(endpoints[0].is_supported());
    }

    #[test]
    fn short_pubkey_is_a_prefix() {
        let node = full_node();
        assert_eq!(node.short_pubkey(), "8Fi1V");
        assert_eq!(short("abc"), "abc");
    }
}
