//! Signed documents exchanged between nodes.
//!
//! Only the structure of a document is checked here. Signature verification
//! belongs to the node software that produced and relayed the document.

pub mod error;
pub mod peer;

pub use error::DocumentError;
pub use peer::Peer;
