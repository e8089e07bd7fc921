//! JSON payloads of the node API and their validation.
//!
//! Decoding is the schema check: a body that does not deserialize into the
//! expected payload, or that carries an impossible value, is reported as
//! [`TransportError::InvalidPayload`].

use serde::de::DeserializeOwned;
use serde::Deserialize;

use wotcrawl_types::block::is_block_hash;
use wotcrawl_types::BlockHead;

use crate::TransportError;

/// Decode a JSON body into a typed payload.
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T, TransportError> {
    serde_json::from_str(body).map_err(|e| TransportError::InvalidPayload(e.to_string()))
}

/// Error body returned by a node: `{"ucode": 2011, "message": "Block not found"}`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorPayload {
    pub ucode: u32,
    pub message: String,
}

/// A block as returned by `/blockchain/current`, `/blockchain/block/{n}`
/// and pushed on `/ws/block`. Fields the crawler does not use are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPayload {
    pub number: u64,
    pub hash: String,
    pub median_time: u64,
    pub time: u64,
    pub pow_min: u32,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub previous_hash: Option<String>,
}

impl BlockPayload {
    /// Validate the block and convert it to the head a node reports.
    pub fn into_head(self) -> Result<BlockHead, TransportError> {
        if !is_block_hash(&self.hash) {
            return Err(TransportError::InvalidPayload(format!(
                "block #{} has malformed hash {:?}",
                self.number, self.hash
            )));
        }
        Ok(BlockHead {
            number: self.number,
            hash: self.hash,
            median_time: self.median_time,
            time: self.time,
            pow_min: self.pow_min,
            issuer: self.issuer,
        })
    }
}

/// Body of `/node/summary`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SummaryPayload {
    pub duniter: SoftwareInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareInfo {
    pub software: String,
    pub version: String,
    #[serde(default)]
    pub fork_window_size: u64,
}

/// A peer as served by `/network/peering`, inside a merkle leaf, or pushed
/// on `/ws/peer`. Only the signed text is kept; it is parsed as a document.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PeerPayload {
    #[serde(default)]
    pub pubkey: Option<String>,
    #[serde(default)]
    pub raw: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

impl PeerPayload {
    /// Raw text plus signature, when the payload carries both.
    pub fn signed_parts(&self) -> Option<(&str, &str)> {
        match (&self.raw, &self.signature) {
            (Some(raw), Some(signature)) => Some((raw.as_str(), signature.as_str())),
            _ => None,
        }
    }
}

/// Merkle summary of a node's known peers: `/network/peering/peers?leaves=true`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerklePayload {
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub nodes_count: u32,
    #[serde(default)]
    pub leaves_count: u32,
    pub root: String,
    pub leaves: Vec<String>,
}

/// One merkle leaf: `/network/peering/peers?leaf={hash}`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LeafPayload {
    pub root: String,
    pub leaf: LeafEntry,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LeafEntry {
    pub hash: String,
    pub value: PeerPayload,
}
