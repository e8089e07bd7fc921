//! Nullable infrastructure for deterministic testing.
//!
//! The crawler reaches the outside world through three seams: the clock, the
//! node transport, and the node store. This crate provides test-friendly
//! implementations of each that:
//! - Return scripted, deterministic values
//! - Can be controlled and inspected programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod bodies;
pub mod clock;
pub mod store;
pub mod transport;

pub use clock::NullClock;
pub use store::NullNodeStore;
pub use transport::{NullTransport, Request};
