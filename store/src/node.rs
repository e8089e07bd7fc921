//! Node record storage trait.

use crate::{NodeRecord, StoreError};

/// Trait for persisting known nodes across restarts, one list per currency.
pub trait NodeStore {
    /// All records saved for `currency`, in their saved order.
    fn load_nodes(&self, currency: &str) -> Result<Vec<NodeRecord>, StoreError>;

    /// Replace the saved records of `currency`.
    fn save_nodes(&self, currency: &str, nodes: &[NodeRecord]) -> Result<(), StoreError>;

    /// A single record by public key.
    fn get_node(&self, currency: &str, pubkey: &str) -> Result<Option<NodeRecord>, StoreError> {
        Ok(self
            .load_nodes(currency)?
            .into_iter()
            .find(|record| record.pubkey == pubkey))
    }
}
