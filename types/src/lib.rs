//! Fundamental types for the wotcrawl network crawler.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! blockstamps, block heads, peer endpoints, node states, and timestamps.

pub mod block;
pub mod endpoint;
pub mod error;
pub mod state;
pub mod time;

pub use block::{BlockHead, BlockUid, EMPTY_HASH};
pub use endpoint::Endpoint;
pub use error::TypesError;
pub use state::NodeState;
pub use time::{Clock, SystemClock, Timestamp};
