//! Crawling the node network of one currency.
//!
//! A [`Network`] holds a [`NodeConnector`] per known node, grows the node set
//! from the peers those nodes report, elects the network head among the
//! online nodes (see [`reconciliation`]), and announces new blocks and
//! rollbacks through [`NetworkEvent`]s.

pub mod config;
pub mod connector;
pub mod error;
pub mod events;
pub mod network;
pub mod node;
pub mod reconciliation;

pub use config::{CrawlerConfig, NetworkSettings, RootAddress};
pub use connector::{ConnectorSignal, ConnectorWorker, NodeConnector, SUMMARY_REFRESH_EVERY};
pub use error::NetworkError;
pub use events::{EventBus, NetworkEvent};
pub use network::{BlockFound, CrawlHandle, Network};
pub use node::{Node, SharedNode};
pub use reconciliation::{elect_head, reconcile};
