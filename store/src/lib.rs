//! Persistence of crawled node records.
//!
//! The crawler loads the nodes it knew about at startup and saves them on
//! shutdown. The rest of the codebase depends only on [`NodeStore`].

pub mod error;
pub mod json;
pub mod node;
pub mod record;

pub use error::StoreError;
pub use json::JsonFileStore;
pub use node::NodeStore;
pub use record::NodeRecord;
