//! Blockstamps and block heads as reported by peer nodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// Hash of the empty string, used by the protocol as the "no block" hash.
pub const EMPTY_HASH: &str = "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855";

/// A `(number, hash)` pair identifying one block, written `number-HASH`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockUid {
    pub number: u64,
    pub hash: String,
}

impl BlockUid {
    pub fn new(number: u64, hash: impl Into<String>) -> Self {
        Self {
            number,
            hash: hash.into(),
        }
    }

    /// The blockstamp of a chain that has no block yet.
    pub fn empty() -> Self {
        Self::new(0, EMPTY_HASH)
    }

    pub fn is_empty(&self) -> bool {
        self.number == 0 && self.hash == EMPTY_HASH
    }
}

impl fmt::Display for BlockUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.number, self.hash)
    }
}

impl FromStr for BlockUid {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, hash) = s
            .split_once('-')
            .ok_or_else(|| TypesError::InvalidBlockUid(s.to_string()))?;
        let number = number
            .parse::<u64>()
            .map_err(|_| TypesError::InvalidBlockUid(s.to_string()))?;
        if !is_block_hash(hash) {
            return Err(TypesError::InvalidHash(hash.to_string()));
        }
        Ok(Self::new(number, hash))
    }
}

impl TryFrom<String> for BlockUid {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BlockUid> for String {
    fn from(uid: BlockUid) -> Self {
        uid.to_string()
    }
}

/// Whether `s` looks like a SHA-256 block hash (64 hex digits).
pub fn is_block_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// The head block a node currently reports.
///
/// Carries the fields the sync tie-break cascade needs (`pow_min`, `time`)
/// in addition to the blockstamp itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockHead {
    pub number: u64,
    pub hash: String,
    pub median_time: u64,
    pub time: u64,
    pub pow_min: u32,
    #[serde(default)]
    pub issuer: String,
}

impl BlockHead {
    pub fn uid(&self) -> BlockUid {
        BlockUid::new(self.number, self.hash.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "000003D02B95D3296A4F06DBAC51775C4336A4DC09D0E958DC40033BE7E20F3D";

    #[test]
    fn parse_and_display() {
        let uid: BlockUid = format!("42-{HASH}").parse().unwrap();
        assert_eq!(uid.number, 42);
        assert_eq!(uid.hash, HASH);
        assert_eq!(uid.to_string(), format!("42-{HASH}"));
    }

    #[test]
    fn empty_blockstamp() {
        let empty: BlockUid = format!("0-{EMPTY_HASH}").parse().unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty, BlockUid::empty());
        assert!(!BlockUid::new(1, EMPTY_HASH).is_empty());
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(matches!(
            "42".parse::<BlockUid>(),
            Err(TypesError::InvalidBlockUid(_))
        ));
    }

    #[test]
    fn rejects_bad_hash() {
        assert!(matches!(
            "42-XYZ".parse::<BlockUid>(),
            Err(TypesError::InvalidHash(_))
        ));
    }

    #[test]
    fn serializes_as_string() {
        let uid = BlockUid::new(7, HASH);
        let json = serde_json::to_string(&uid).unwrap();
        assert_eq!(json, format!("\"7-{HASH}\""));
        let back: BlockUid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uid);
    }
}
