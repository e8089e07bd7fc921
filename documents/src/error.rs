use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("expected a {expected} document, got {found}")]
    WrongType { expected: String, found: String },

    #[error("unsupported document version: {0}")]
    UnsupportedVersion(u32),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}
