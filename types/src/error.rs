//! Parse errors for the fundamental types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid blockstamp: {0}")]
    InvalidBlockUid(String),

    #[error("invalid block hash: {0}")]
    InvalidHash(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}
