use thiserror::Error;

use wotcrawl_documents::DocumentError;
use wotcrawl_protocol::TransportError;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("node belongs to currency {found}, expected {expected}")]
    InvalidNodeCurrency { expected: String, found: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("malformed document: {0}")]
    Document(#[from] DocumentError),
}
