use thiserror::Error;

use crate::codec::ErrorPayload;

/// Node error code: the node has no current block yet.
pub const NO_CURRENT_BLOCK: u32 = 2010;

/// Node error code: the requested block does not exist.
pub const BLOCK_NOT_FOUND: u32 = 2011;

/// Failure of a request or subscription against one node endpoint.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Timeout, refused connection, DNS failure, broken stream.
    #[error("node unreachable: {0}")]
    Unreachable(String),

    /// The push subscription could not be negotiated.
    #[error("subscription handshake failed: {0}")]
    Handshake(String),

    /// The node answered with a payload that does not match the schema.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The node reports that the requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other error reported by the node itself.
    #[error("node error {ucode}: {message}")]
    Api { ucode: u32, message: String },

    #[error("endpoint not supported: {0}")]
    UnsupportedEndpoint(String),

    #[error("client setup failed: {0}")]
    Setup(String),
}

impl TransportError {
    /// Whether this error is a legitimate empty result rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<ErrorPayload> for TransportError {
    fn from(payload: ErrorPayload) -> Self {
        match payload.ucode {
            NO_CURRENT_BLOCK | BLOCK_NOT_FOUND => Self::NotFound(payload.message),
            ucode => Self::Api {
                ucode,
                message: payload.message,
            },
        }
    }
}
