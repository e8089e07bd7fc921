//! The registry of known nodes for one currency, and its crawl loop.
//!
//! A [`Network`] owns a [`NodeConnector`] per known node. Connectors report
//! back over a channel; every report re-runs head reconciliation, may evict
//! a node that stayed unreachable too long, and may announce a new block or
//! a rollback to the registered listeners.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use wotcrawl_documents::Peer;
use wotcrawl_protocol::TransportProvider;
use wotcrawl_store::NodeRecord;
use wotcrawl_types::{BlockHead, BlockUid, Clock, NodeState, SystemClock, EMPTY_HASH};

use crate::config::NetworkSettings;
use crate::connector::{ConnectorSignal, NodeConnector};
use crate::events::{EventBus, NetworkEvent};
use crate::node::{short, Node, SharedNode};
use crate::reconciliation::reconcile;
use crate::NetworkError;

/// The head this network last announced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockFound {
    pub hash: String,
    pub number: Option<u64>,
}

/// Stops a running crawl from another task.
#[derive(Clone)]
pub struct CrawlHandle {
    crawling: Arc<watch::Sender<bool>>,
}

impl CrawlHandle {
    pub fn stop(&self) {
        self.crawling.send_replace(false);
    }

    pub fn is_crawling(&self) -> bool {
        *self.crawling.borrow()
    }
}

enum Step {
    Elapsed,
    Signal(Option<ConnectorSignal>),
    FlagChanged(bool),
}

/// All known nodes of one currency.
pub struct Network {
    currency: String,
    settings: NetworkSettings,
    provider: Arc<dyn TransportProvider>,
    clock: Arc<dyn Clock>,
    /// Every known node, in discovery order.
    connectors: Vec<NodeConnector>,
    /// Trusted nodes, never evicted. Each is also in `connectors`.
    root_pubkeys: Vec<String>,
    block_found: BlockFound,
    events: EventBus,
    signals_tx: UnboundedSender<ConnectorSignal>,
    signals_rx: UnboundedReceiver<ConnectorSignal>,
    crawling: Arc<watch::Sender<bool>>,
    /// Evicted connectors waiting for their tasks to be awaited.
    evicted: Vec<NodeConnector>,
}

impl Network {
    /// A network over the given root nodes.
    pub fn new(
        currency: impl Into<String>,
        provider: Arc<dyn TransportProvider>,
        roots: Vec<NodeConnector>,
    ) -> Result<Self, NetworkError> {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (crawling, _) = watch::channel(false);
        let mut network = Self {
            currency: currency.into(),
            settings: NetworkSettings::default(),
            provider,
            clock: Arc::new(SystemClock),
            connectors: Vec::new(),
            root_pubkeys: Vec::new(),
            block_found: BlockFound {
                hash: EMPTY_HASH.to_string(),
                number: None,
            },
            events: EventBus::new(),
            signals_tx,
            signals_rx,
            crawling: Arc::new(crawling),
            evicted: Vec::new(),
        };
        for connector in roots {
            network.add_root_node(connector)?;
        }
        network.refresh_block_found();
        Ok(network)
    }

    /// A network grown from a single known node.
    pub fn create(
        provider: Arc<dyn TransportProvider>,
        first: NodeConnector,
    ) -> Result<Self, NetworkError> {
        let currency = first.snapshot().currency;
        Self::new(currency, provider, vec![first])
    }

    /// A network restored from persisted records. Records flagged as root
    /// become root nodes.
    pub fn from_records(
        currency: impl Into<String>,
        provider: Arc<dyn TransportProvider>,
        records: Vec<NodeRecord>,
    ) -> Result<Self, NetworkError> {
        let mut network = Self::new(currency, provider, Vec::new())?;
        for record in records {
            network.check_currency(&record.currency)?;
            let transport = network.provider.open()?;
            network.push(NodeConnector::new(Node::from(record), transport));
        }
        network.refresh_block_found();
        Ok(network)
    }

    pub fn with_settings(mut self, settings: NetworkSettings) -> Self {
        self.settings = settings;
        self.reattach();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self.reattach();
        self
    }

    fn reattach(&mut self) {
        for connector in &mut self.connectors {
            connector.attach(
                self.signals_tx.clone(),
                Arc::clone(&self.clock),
                self.settings.summary_refresh_every,
            );
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    /// Register a listener for network events.
    pub fn subscribe(&mut self, listener: Box<dyn Fn(&NetworkEvent) + Send + Sync>) {
        self.events.subscribe(listener);
    }

    // ── Registry ───────────────────────────────────────────────────────

    fn check_currency(&self, currency: &str) -> Result<(), NetworkError> {
        if currency != self.currency {
            return Err(NetworkError::InvalidNodeCurrency {
                expected: self.currency.clone(),
                found: currency.to_string(),
            });
        }
        Ok(())
    }

    fn position(&self, pubkey: &str) -> Option<usize> {
        self.connectors
            .iter()
            .position(|c| c.node().read().pubkey == pubkey)
    }

    fn push(&mut self, mut connector: NodeConnector) {
        connector.attach(
            self.signals_tx.clone(),
            Arc::clone(&self.clock),
            self.settings.summary_refresh_every,
        );
        let (pubkey, root) = {
            let node = connector.node().read();
            (node.pubkey.clone(), node.root)
        };
        if root && !self.root_pubkeys.contains(&pubkey) {
            self.root_pubkeys.push(pubkey.clone());
        }
        debug!(node = %short(&pubkey), "node connected");
        self.connectors.push(connector);
    }

    /// Add a node. Returns `false` if a node with the same pubkey is known.
    pub fn add_node(&mut self, connector: NodeConnector) -> Result<bool, NetworkError> {
        let (currency, pubkey) = {
            let node = connector.node().read();
            (node.currency.clone(), node.pubkey.clone())
        };
        self.check_currency(&currency)?;
        if self.position(&pubkey).is_some() {
            return Ok(false);
        }
        self.push(connector);
        Ok(true)
    }

    /// Add a trusted node, or promote a known one.
    pub fn add_root_node(&mut self, connector: NodeConnector) -> Result<(), NetworkError> {
        let pubkey = connector.pubkey();
        if let Some(index) = self.position(&pubkey) {
            self.check_currency(&connector.snapshot().currency)?;
            self.connectors[index].node().write().root = true;
            if !self.root_pubkeys.contains(&pubkey) {
                self.root_pubkeys.push(pubkey);
            }
            return Ok(());
        }
        connector.node().write().root = true;
        self.add_node(connector).map(|_| ())
    }

    /// Demote a root node. The node itself stays known.
    pub fn remove_root_node(&mut self, pubkey: &str) -> bool {
        let Some(index) = self.root_pubkeys.iter().position(|p| p == pubkey) else {
            return false;
        };
        self.root_pubkeys.remove(index);
        if let Some(node) = self.position(pubkey) {
            self.connectors[node].node().write().root = false;
        }
        true
    }

    pub fn is_root_node(&self, pubkey: &str) -> bool {
        self.root_pubkeys.iter().any(|p| p == pubkey)
    }

    pub fn root_nodes(&self) -> Vec<Node> {
        self.root_pubkeys
            .iter()
            .filter_map(|pubkey| self.node(pubkey))
            .collect()
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    pub fn node(&self, pubkey: &str) -> Option<Node> {
        self.position(pubkey)
            .map(|index| self.connectors[index].snapshot())
    }

    /// The live node behind `pubkey`, as its connector sees it.
    pub fn shared_node(&self, pubkey: &str) -> Option<SharedNode> {
        self.position(pubkey)
            .map(|index| Arc::clone(self.connectors[index].node()))
    }

    /// Every known node, in discovery order.
    pub fn nodes(&self) -> Vec<Node> {
        self.connectors.iter().map(NodeConnector::snapshot).collect()
    }

    /// Nodes on the network head.
    pub fn synced_nodes(&self) -> Vec<Node> {
        self.nodes_where(|node| node.state == NodeState::Online)
    }

    /// Reachable nodes, synced or not.
    pub fn online_nodes(&self) -> Vec<Node> {
        self.nodes_where(|node| node.state.is_online())
    }

    fn nodes_where(&self, keep: impl Fn(&Node) -> bool) -> Vec<Node> {
        self.connectors
            .iter()
            .filter_map(|c| {
                let node = c.node().read();
                keep(&node).then(|| node.clone())
            })
            .collect()
    }

    /// Head of the synced node with the lowest pubkey.
    fn latest_block(&self) -> Option<(String, BlockHead)> {
        self.connectors
            .iter()
            .filter_map(|c| {
                let node = c.node().read();
                match &node.current_block {
                    Some(block) if node.state == NodeState::Online => {
                        Some((node.pubkey.clone(), block.clone()))
                    }
                    _ => None,
                }
            })
            .min_by(|a, b| a.0.cmp(&b.0))
    }

    pub fn latest_block_number(&self) -> Option<u64> {
        self.latest_block().map(|(_, block)| block.number)
    }

    pub fn latest_block_hash(&self) -> String {
        self.latest_block()
            .map(|(_, block)| block.hash)
            .unwrap_or_else(|| EMPTY_HASH.to_string())
    }

    pub fn block_found(&self) -> &BlockFound {
        &self.block_found
    }

    fn refresh_block_found(&mut self) {
        self.block_found = BlockFound {
            hash: self.latest_block_hash(),
            number: self.latest_block_number(),
        };
    }

    /// Share of known nodes that are synced, in `0.0..=1.0`.
    pub fn quality(&self) -> f64 {
        if self.connectors.is_empty() {
            return 0.0;
        }
        self.synced_nodes().len() as f64 / self.connectors.len() as f64
    }

    /// Median fork window of the online nodes run by `members`, counting only
    /// nodes whose software is known. 0 when there are none.
    pub fn fork_window(&self, members: &[String]) -> u64 {
        let mut windows: Vec<u64> = self
            .connectors
            .iter()
            .filter_map(|c| {
                let node = c.node().read();
                let counted = node.state.is_online()
                    && !node.software.is_empty()
                    && members.contains(&node.pubkey);
                counted.then_some(node.fork_window)
            })
            .collect();
        if windows.is_empty() {
            return 0;
        }
        windows.sort_unstable();
        let mid = windows.len() / 2;
        if windows.len() % 2 == 1 {
            windows[mid]
        } else {
            windows[mid - 1] + (windows[mid] - windows[mid - 1]) / 2
        }
    }

    /// Flag the nodes run by `members`, clearing the flag on every other
    /// node. Raises [`NetworkEvent::NodesChanged`] if any flag moved.
    pub fn mark_members(&self, members: &[String]) {
        let mut changed = false;
        for connector in &self.connectors {
            let mut node = connector.node().write();
            let member = members.contains(&node.pubkey);
            if node.member != member {
                node.member = member;
                changed = true;
            }
        }
        if changed {
            debug!(currency = %self.currency, members = members.len(), "membership updated");
            self.events.emit(&NetworkEvent::NodesChanged);
        }
    }

    // ── Reconciliation ─────────────────────────────────────────────────

    /// Re-elect the network head among online nodes and mark each of them
    /// synced or desynced.
    ///
    /// A node that went offline or reported another block after the
    /// snapshot was taken keeps what its connector wrote.
    pub fn check_nodes_sync(&self) {
        let online: Vec<(&NodeConnector, Option<BlockHead>)> = self
            .connectors
            .iter()
            .filter_map(|c| {
                let node = c.node().read();
                node.state
                    .is_online()
                    .then(|| (c, node.current_block.clone()))
            })
            .collect();
        let blocks: Vec<Option<&BlockHead>> = online.iter().map(|(_, b)| b.as_ref()).collect();
        let now = self.clock.now();
        for ((connector, block), state) in online.iter().zip(reconcile(&blocks)) {
            let mut node = connector.node().write();
            if node.state.is_online() && node.current_block == *block {
                node.set_state(state, now);
            }
        }
    }

    /// React to a change reported by the connector of `pubkey`.
    pub fn handle_change(&mut self, pubkey: &str) {
        let Some(index) = self.position(pubkey) else {
            return;
        };
        let node = Arc::clone(self.connectors[index].node());
        let (state, last_change) = {
            let node = node.read();
            (node.state, node.last_change)
        };

        if state.is_online() {
            self.check_nodes_sync();
        } else if !self.is_root_node(pubkey)
            && last_change.has_elapsed(self.settings.eviction_timeout_secs, self.clock.now())
        {
            warn!(node = %short(pubkey), %state, "evicting unreachable node");
            let mut connector = self.connectors.remove(index);
            connector.disconnect();
            self.evicted.push(connector);
        }

        self.events.emit(&NetworkEvent::NodesChanged);

        let (state, previous) = {
            let node = node.read();
            (node.state, node.previous_block.clone())
        };
        if state == NodeState::Online {
            self.check_head(previous.as_ref());
        }
    }

    /// Announce a new head or a rollback if the elected head moved.
    fn check_head(&mut self, previous: Option<&BlockUid>) {
        let latest_hash = self.latest_block_hash();
        if latest_hash == self.block_found.hash {
            return;
        }
        let latest_number = self.latest_block_number();
        let rollback = match (self.block_found.number, latest_number) {
            (Some(found), Some(number)) => {
                number <= found || previous.is_some_and(|p| p.hash != self.block_found.hash)
            }
            _ => false,
        };
        debug!(
            from = %short(&self.block_found.hash),
            to = %short(&latest_hash),
            "latest block changed"
        );
        self.refresh_block_found();

        let Some(number) = latest_number else {
            return;
        };
        if rollback {
            info!(currency = %self.currency, number, "blockchain rollback");
            self.events.emit(&NetworkEvent::BlockchainRollback(number));
        } else {
            info!(currency = %self.currency, number, "new block mined");
            self.events.emit(&NetworkEvent::NewBlockMined(number));
        }
    }

    /// Register a node a connector told us about, unless it is known already.
    pub fn handle_new_node(&mut self, peer: &Peer) {
        if peer.currency != self.currency {
            debug!(node = %short(&peer.pubkey), currency = %peer.currency, "ignoring peer of another currency");
            return;
        }
        if self.position(&peer.pubkey).is_some() {
            return;
        }
        let transport = match self.provider.open() {
            Ok(transport) => transport,
            Err(e) => {
                warn!(node = %short(&peer.pubkey), error = %e, "cannot open transport for new node");
                return;
            }
        };
        info!(node = %short(&peer.pubkey), "new node found");
        let node = Node::from_peer(peer, self.clock.now());
        self.push(NodeConnector::new(node, transport));
        self.events.emit(&NetworkEvent::NodesChanged);
    }

    fn handle_signal(&mut self, signal: ConnectorSignal) {
        match signal {
            ConnectorSignal::Changed { pubkey } => self.handle_change(&pubkey),
            ConnectorSignal::NeighbourFound { peer, .. } => self.handle_new_node(&peer),
        }
    }

    /// Process every connector signal already queued. Returns how many.
    pub fn drain_signals(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(signal) = self.signals_rx.try_recv() {
            self.handle_signal(signal);
            handled += 1;
        }
        handled
    }

    // ── Crawling ───────────────────────────────────────────────────────

    /// Refresh every known node now.
    pub fn refresh_once(&mut self, manual: bool) {
        for connector in &mut self.connectors {
            connector.refresh(manual);
        }
    }

    pub fn start_crawling(&self) {
        self.crawling.send_replace(true);
    }

    pub fn stop_crawling(&self) {
        self.crawling.send_replace(false);
    }

    pub fn continue_crawling(&self) -> bool {
        *self.crawling.borrow()
    }

    pub fn crawl_handle(&self) -> CrawlHandle {
        CrawlHandle {
            crawling: Arc::clone(&self.crawling),
        }
    }

    /// Crawl until stopped: refresh each known node in turn, one crawl
    /// interval apart, handling connector signals in between.
    ///
    /// The node list is taken at the start of each pass; nodes found during
    /// a pass are refreshed from the next one. Stopping takes effect at the
    /// next signal or pause and does not touch running subscriptions.
    pub async fn discover_network(&mut self) {
        self.start_crawling();
        let mut flag = self.crawling.subscribe();
        info!(currency = %self.currency, nodes = self.connectors.len(), "network discovery started");

        'crawl: while self.continue_crawling() {
            let pubkeys: Vec<String> = self.connectors.iter().map(NodeConnector::pubkey).collect();
            if pubkeys.is_empty() && !self.pause(&mut flag).await {
                break;
            }
            for pubkey in pubkeys {
                if !self.continue_crawling() {
                    break 'crawl;
                }
                let Some(index) = self.position(&pubkey) else {
                    continue;
                };
                self.connectors[index].refresh(false);
                if !self.pause(&mut flag).await {
                    break 'crawl;
                }
            }
        }
        debug!(currency = %self.currency, "end of network discovery");
    }

    /// Wait one crawl interval while handling signals. Returns `false` once
    /// crawling is stopped.
    async fn pause(&mut self, flag: &mut watch::Receiver<bool>) -> bool {
        let delay = tokio::time::sleep(self.settings.crawl_interval);
        tokio::pin!(delay);
        loop {
            let step = tokio::select! {
                _ = &mut delay => Step::Elapsed,
                signal = self.signals_rx.recv() => Step::Signal(signal),
                changed = flag.changed() => Step::FlagChanged(changed.is_ok()),
            };
            match step {
                Step::Elapsed => return true,
                Step::Signal(Some(signal)) => {
                    self.handle_signal(signal);
                    self.close_evicted().await;
                }
                Step::Signal(None) => {
                    (&mut delay).await;
                    return self.continue_crawling();
                }
                Step::FlagChanged(alive) => {
                    if !alive || !*flag.borrow() {
                        return false;
                    }
                }
            }
        }
    }

    async fn close_evicted(&mut self) {
        for mut connector in std::mem::take(&mut self.evicted) {
            connector.close().await;
        }
    }

    /// Stop crawling and tear down every connector. Nodes stay in the
    /// registry so they can be saved.
    pub async fn close(&mut self) {
        self.stop_crawling();
        self.close_evicted().await;
        for connector in &mut self.connectors {
            connector.close().await;
        }
        info!(currency = %self.currency, nodes = self.connectors.len(), "network closed");
    }

    // ── Persistence ────────────────────────────────────────────────────

    pub fn to_records(&self) -> Vec<NodeRecord> {
        self.connectors
            .iter()
            .map(|c| c.node().read().to_record())
            .collect()
    }

    /// Fold in nodes saved by a previous run.
    ///
    /// Unknown nodes are added (without their saved root flag: roots come
    /// from configuration). For a known node the informational fields are
    /// taken from the record, and so are the block, the state and the last
    /// change whenever the blocks differ or either side has none.
    pub fn merge_with_records(&mut self, records: Vec<NodeRecord>) -> Result<(), NetworkError> {
        for record in records {
            self.check_currency(&record.currency)?;
            let Some(index) = self.position(&record.pubkey) else {
                debug!(node = %short(&record.pubkey), "loading saved node");
                let mut node = Node::from(record);
                node.root = false;
                let transport = self.provider.open()?;
                self.push(NodeConnector::new(node, transport));
                continue;
            };
            let mut node = self.connectors[index].node().write();
            node.uid = record.uid;
            node.version = record.version;
            node.software = record.software;
            let switch = match (&node.current_block, &record.current_block) {
                (Some(known), Some(saved)) => known.hash != saved.hash,
                _ => true,
            };
            if switch {
                node.current_block = record.current_block;
                node.previous_block = record.previous_block;
                node.last_change = record.last_change;
                node.state = record.state;
            }
        }
        self.refresh_block_found();
        self.events.emit(&NetworkEvent::NodesChanged);
        Ok(())
    }
}
