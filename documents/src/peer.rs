//! Peer documents: a node's signed statement of its identity and endpoints.
//!
//! Signed raw form:
//!
//! ```text
//! Version: 10
//! Type: Peer
//! Currency: g1
//! PublicKey: 8Fi1VSTbjkXguwThF4v2ZxC5whK7pwG2vcGTkPUPjPGU
//! Block: 92618-000003D5C6B7A2E7B3F4B3F8E5B6A4D3C2B1A0F9E8D7C6B5A4F3E2D1C0B9A8F7
//! Endpoints:
//! BASIC_MERKLED_API g1.example.org 10901
//! <base64 signature>
//! ```

use wotcrawl_types::{BlockUid, Endpoint};

use crate::DocumentError;

const MIN_VERSION: u32 = 2;
const MAX_VERSION: u32 = 10;

/// A parsed peer document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Peer {
    pub version: u32,
    pub currency: String,
    pub pubkey: String,
    pub block: BlockUid,
    pub endpoints: Vec<Endpoint>,
    pub signature: String,
}

impl Peer {
    /// Parse the API form of a document: the unsigned `raw` text plus its signature.
    pub fn from_raw_and_signature(raw: &str, signature: &str) -> Result<Self, DocumentError> {
        Self::from_signed_raw(&format!("{raw}{signature}\n"))
    }

    /// Parse a signed raw document.
    pub fn from_signed_raw(text: &str) -> Result<Self, DocumentError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let version = field(lines.next(), "Version")?
            .parse::<u32>()
            .map_err(|e| DocumentError::InvalidField {
                field: "Version",
                reason: e.to_string(),
            })?;
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(DocumentError::UnsupportedVersion(version));
        }

        let doc_type = field(lines.next(), "Type")?;
        if doc_type != "Peer" {
            return Err(DocumentError::WrongType {
                expected: "Peer".into(),
                found: doc_type.to_string(),
            });
        }

        let currency = field(lines.next(), "Currency")?.to_string();
        if currency.is_empty() {
            return Err(DocumentError::InvalidField {
                field: "Currency",
                reason: "empty".into(),
            });
        }

        let pubkey = field(lines.next(), "PublicKey")?.to_string();
        if !is_pubkey(&pubkey) {
            return Err(DocumentError::InvalidField {
                field: "PublicKey",
                reason: format!("not a base58 key: {pubkey}"),
            });
        }

        let block = field(lines.next(), "Block")?
            .parse::<BlockUid>()
            .map_err(|e| DocumentError::InvalidField {
                field: "Block",
                reason: e.to_string(),
            })?;

        match lines.next() {
            Some(line) if line.trim() == "Endpoints:" => {}
            other => {
                return Err(DocumentError::Malformed(format!(
                    "expected Endpoints: section, got {:?}",
                    other.unwrap_or_default()
                )))
            }
        }

        let mut body: Vec<&str> = lines.map(str::trim).collect();
        let signature = body
            .pop()
            .ok_or_else(|| DocumentError::Malformed("missing signature".into()))?
            .to_string();
        if !is_signature(&signature) {
            return Err(DocumentError::InvalidField {
                field: "Signature",
                reason: format!("not base64: {signature}"),
            });
        }
        if body.is_empty() {
            return Err(DocumentError::Malformed("peer has no endpoint".into()));
        }

        let endpoints = body
            .into_iter()
            .map(|line| {
                line.parse::<Endpoint>()
                    .map_err(|e| DocumentError::InvalidField {
                        field: "Endpoints",
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            version,
            currency,
            pubkey,
            block,
            endpoints,
            signature,
        })
    }

    /// The unsigned text of the document.
    pub fn raw(&self) -> String {
        let mut raw = format!(
            "Version: {}\nType: Peer\nCurrency: {}\nPublicKey: {}\nBlock: {}\nEndpoints:\n",
            self.version, self.currency, self.pubkey, self.block
        );
        for endpoint in &self.endpoints {
            raw.push_str(&endpoint.to_string());
            raw.push('\n');
        }
        raw
    }

    pub fn signed_raw(&self) -> String {
        format!("{}{}\n", self.raw(), self.signature)
    }
}

fn field<'a>(line: Option<&'a str>, name: &'static str) -> Result<&'a str, DocumentError> {
    let line = line.ok_or_else(|| DocumentError::Malformed(format!("missing {name} field")))?;
    line.strip_prefix(name)
        .and_then(|rest| rest.strip_prefix(':'))
        .map(str::trim)
        .ok_or_else(|| DocumentError::Malformed(format!("expected {name}, got {line:?}")))
}

fn is_pubkey(s: &str) -> bool {
    (43..=44).contains(&s.len())
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() && !matches!(b, b'0' | b'O' | b'I' | b'l'))
}

fn is_signature(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
}
