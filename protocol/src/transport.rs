//! The transport seam between the crawler and node software.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use wotcrawl_types::Endpoint;

use crate::codec::{BlockPayload, LeafPayload, MerklePayload, PeerPayload, SummaryPayload};
use crate::TransportError;

/// Push-subscription topics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    /// New head blocks.
    Block,
    /// Newly announced peers.
    Peer,
}

impl Topic {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Block => "/ws/block",
            Self::Peer => "/ws/peer",
        }
    }
}

/// One message received on a push subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionMessage {
    Text(String),
    Closed,
    Error(String),
}

/// Stream of messages for one open subscription.
pub type Subscription = BoxStream<'static, SubscriptionMessage>;

/// Requests and subscriptions against a single node endpoint.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    async fn current_block(&self, endpoint: &Endpoint) -> Result<BlockPayload, TransportError>;

    async fn block(&self, endpoint: &Endpoint, number: u64)
        -> Result<BlockPayload, TransportError>;

    async fn summary(&self, endpoint: &Endpoint) -> Result<SummaryPayload, TransportError>;

    /// The node's own signed peer document.
    async fn peering(&self, endpoint: &Endpoint) -> Result<PeerPayload, TransportError>;

    /// Merkle root and leaf hashes of the node's known-peers set.
    async fn peers_merkle(&self, endpoint: &Endpoint) -> Result<MerklePayload, TransportError>;

    async fn peer_leaf(&self, endpoint: &Endpoint, leaf: &str)
        -> Result<LeafPayload, TransportError>;

    async fn subscribe(&self, endpoint: &Endpoint, topic: Topic)
        -> Result<Subscription, TransportError>;

    /// Release pooled connections. Called once, after every task using this
    /// transport has stopped.
    async fn close(&self) {}
}

/// Hands each node connector its own transport instance.
pub trait TransportProvider: Send + Sync {
    fn open(&self) -> Result<Arc<dyn NodeTransport>, TransportError>;
}
