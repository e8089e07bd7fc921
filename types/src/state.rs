//! Reachability and sync state of a peer node.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The state of a node as seen by the crawler.
///
/// `Online` and `Desynced` nodes answered their last request; the sync
/// check decides which of the two applies. `Offline` and `Corrupted` are
/// set by the node's connector when I/O fails or a payload is invalid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Reachable and reporting the canonical chain head.
    #[default]
    Online,
    /// Transport failure (timeout, refused connection, DNS).
    Offline,
    /// Reachable but reporting a non-canonical chain head.
    Desynced,
    /// Replied with a payload that failed validation.
    Corrupted,
}

impl NodeState {
    /// Whether the node is reachable (synced or not).
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online | Self::Desynced)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Desynced => "desynced",
            Self::Corrupted => "corrupted",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
