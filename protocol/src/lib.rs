//! Node API boundary: typed payloads, the transport trait, and the
//! production HTTP/WebSocket client.
//!
//! Everything the crawler learns about a peer comes through
//! [`NodeTransport`]: one-shot requests for the current block, a block by
//! number, the node summary, the peering document and the merkle-indexed
//! peer list, plus push subscriptions for new blocks and new peers.

pub mod bma;
pub mod codec;
pub mod error;
pub mod transport;

pub use bma::{BmaClient, BmaProvider, TransportSettings};
pub use codec::{
    decode, BlockPayload, ErrorPayload, LeafEntry, LeafPayload, MerklePayload, PeerPayload,
    SoftwareInfo, SummaryPayload,
};
pub use error::{TransportError, BLOCK_NOT_FOUND, NO_CURRENT_BLOCK};
pub use transport::{NodeTransport, Subscription, SubscriptionMessage, Topic, TransportProvider};
