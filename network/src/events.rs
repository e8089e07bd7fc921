//! Events raised by a [`Network`](crate::Network) for its consumers.

/// What a network tells the outside world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A node was added or removed, or its metadata changed.
    NodesChanged,
    /// The network head moved forward to this block number.
    NewBlockMined(u64),
    /// The network head moved to a block that does not descend from the
    /// previous head.
    BlockchainRollback(u64),
}

/// Synchronous fan-out event bus for network events.
///
/// Listeners are invoked inline from the crawl loop; keep handlers fast to
/// avoid stalling the crawl.
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&NetworkEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&NetworkEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &NetworkEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
