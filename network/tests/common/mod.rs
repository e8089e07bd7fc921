//! Shared fixtures for network integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;

use wotcrawl_network::{Network, NetworkEvent, NetworkSettings, Node, NodeConnector};
use wotcrawl_nullables::{bodies, NullClock, NullTransport, Request};
use wotcrawl_types::{BlockHead, BlockUid, Endpoint, NodeState, Timestamp};

pub const START: u64 = 1_000_000;

/// A 44-character pubkey starting with `c`.
pub fn pubkey(c: char) -> String {
    format!("{c}{}", "1".repeat(43))
}

/// A 64-character block hash made of `c`, which must be a hex digit.
pub fn hash(c: char) -> String {
    c.to_string().repeat(64)
}

pub fn endpoint(i: u8) -> Endpoint {
    format!("BASIC_MERKLED_API 10.0.0.{i} 10901")
        .parse()
        .expect("valid endpoint")
}

pub fn head(number: u64, hash_char: char) -> BlockHead {
    BlockHead {
        number,
        hash: hash(hash_char),
        median_time: START,
        time: START,
        pow_min: 70,
        issuer: String::new(),
    }
}

pub fn node(c: char, i: u8) -> Node {
    Node::new("g1", pubkey(c), vec![endpoint(i)], Timestamp::new(START))
}

pub struct Fixture {
    pub transport: NullTransport,
    pub clock: Arc<NullClock>,
    pub network: Network,
    pub events: Arc<Mutex<Vec<NetworkEvent>>>,
}

impl Fixture {
    /// A network over `nodes`, none of them root.
    pub fn new(nodes: Vec<Node>) -> Self {
        Self::with_settings(nodes, NetworkSettings::default())
    }

    pub fn with_settings(nodes: Vec<Node>, settings: NetworkSettings) -> Self {
        let transport = NullTransport::new();
        let clock = Arc::new(NullClock::new(START));
        let mut network = Network::new("g1", Arc::new(transport.clone()), Vec::new())
            .expect("empty network")
            .with_settings(settings)
            .with_clock(clock.clone());
        for node in nodes {
            let connector = NodeConnector::new(node, Arc::new(transport.clone()));
            assert!(network.add_node(connector).expect("same currency"));
        }
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        network.subscribe(Box::new(move |event: &NetworkEvent| {
            sink.lock().push(event.clone())
        }));
        Self {
            transport,
            clock,
            network,
            events,
        }
    }

    /// Put `block` on the node as its connector would, without any I/O.
    pub fn set_block(&self, c: char, block: BlockHead, previous: Option<BlockUid>) {
        self.with_node(c, |node| {
            node.current_block = Some(block);
            node.previous_block = previous;
        });
    }

    pub fn set_state(&self, c: char, state: NodeState) {
        let now = Timestamp::new(START);
        self.with_node(c, |node| {
            node.set_state(state, now);
        });
    }

    pub fn with_node(&self, c: char, update: impl FnOnce(&mut Node)) {
        let shared = self
            .network
            .shared_node(&pubkey(c))
            .expect("known node");
        update(&mut shared.write());
    }

    pub fn state(&self, c: char) -> NodeState {
        self.network.node(&pubkey(c)).expect("known node").state
    }

    pub fn take_events(&self) -> Vec<NetworkEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Script a node that answers every pull: current block, its parent,
    /// summary, and an empty peer list.
    pub fn script_healthy(&self, i: u8, number: u64, hash_char: char) {
        let endpoint = endpoint(i);
        self.transport.respond(
            &endpoint,
            Request::CurrentBlock,
            bodies::block(number, &hash(hash_char), 70, START),
        );
        self.transport.respond(
            &endpoint,
            Request::Block(number - 1),
            bodies::block(number - 1, &hash('0'), 70, START - 300),
        );
        self.transport.respond(
            &endpoint,
            Request::Summary,
            bodies::summary("duniter", "1.8.7", 100),
        );
        self.transport
            .respond(&endpoint, Request::PeersMerkle, bodies::merkle(&hash('0'), &[]));
    }
}

/// Yield enough times for spawned connector tasks to run to completion.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
