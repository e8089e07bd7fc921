//! Connectivity and freshness of one node.
//!
//! A [`NodeConnector`] keeps at most one block subscription and one peer
//! subscription running against its node, falling back to one-shot requests
//! when a node refuses the subscription handshake. All I/O runs in spawned
//! tasks; results are written to the shared [`Node`] and reported to the
//! owning network as [`ConnectorSignal`]s. Failures never reach the caller:
//! they become node states.

use std::future::Future;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use wotcrawl_documents::Peer;
use wotcrawl_protocol::{
    decode, BlockPayload, NodeTransport, PeerPayload, Subscription, SubscriptionMessage, Topic,
    TransportError,
};
use wotcrawl_types::{BlockHead, BlockUid, Clock, Endpoint, NodeState, SystemClock};

use crate::node::{short, Node, SharedNode};
use crate::NetworkError;

/// Default number of refreshes between two summary pulls.
pub const SUMMARY_REFRESH_EVERY: u32 = 20;

/// What a connector reports to its network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectorSignal {
    /// Something about the node changed, or a request against it failed.
    Changed { pubkey: String },
    /// The node told us about a peer.
    NeighbourFound { pubkey: String, peer: Box<Peer> },
}

/// Node state for a failed request.
fn failure_state(error: &TransportError) -> NodeState {
    match error {
        TransportError::InvalidPayload(_) => NodeState::Corrupted,
        _ => NodeState::Offline,
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// The I/O half of a connector, cloned into every task it spawns.
#[derive(Clone)]
pub struct ConnectorWorker {
    node: SharedNode,
    transport: Arc<dyn NodeTransport>,
    clock: Arc<dyn Clock>,
    signals: UnboundedSender<ConnectorSignal>,
}

impl ConnectorWorker {
    fn pubkey(&self) -> String {
        self.node.read().pubkey.clone()
    }

    fn short(&self) -> String {
        short(&self.node.read().pubkey).to_string()
    }

    fn notify(&self) {
        let _ = self.signals.send(ConnectorSignal::Changed {
            pubkey: self.pubkey(),
        });
    }

    fn fail(&self, error: &TransportError) {
        let state = failure_state(error);
        debug!(node = %self.short(), %error, %state, "node request failed");
        self.node.write().set_state(state, self.clock.now());
        self.notify();
    }

    /// Bring an offline or corrupted node back online after it answered.
    /// A desynced node stays desynced until the network reconciles again.
    fn mark_reachable(&self) -> bool {
        let mut node = self.node.write();
        !node.state.is_online() && node.set_state(NodeState::Online, self.clock.now())
    }

    /// Run `request` on each supported endpoint in turn until one answers.
    ///
    /// A "not found" answer is final; any other failure moves on to the next
    /// endpoint. With no endpoint left, the last failure is returned.
    async fn on_endpoints<T, F, Fut>(&self, request: F) -> Result<(Endpoint, T), TransportError>
    where
        F: Fn(Arc<dyn NodeTransport>, Endpoint) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let endpoints = self.node.read().supported_endpoints();
        let mut last_error = TransportError::UnsupportedEndpoint("no supported endpoint".into());
        for endpoint in endpoints {
            match request(Arc::clone(&self.transport), endpoint.clone()).await {
                Ok(value) => return Ok((endpoint, value)),
                Err(e) if e.is_not_found() => return Err(e),
                Err(e) => {
                    debug!(node = %self.short(), %endpoint, error = %e, "endpoint failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// Open a subscription on the first endpoint that accepts one.
    ///
    /// `Ok(None)` means no endpoint accepted and at least one refused the
    /// handshake, so the caller should poll instead.
    async fn subscribe(&self, topic: Topic) -> Result<Option<Subscription>, TransportError> {
        let endpoints = self.node.read().supported_endpoints();
        let mut last_error = TransportError::UnsupportedEndpoint("no supported endpoint".into());
        let mut refused = false;
        for endpoint in endpoints {
            match self.transport.subscribe(&endpoint, topic).await {
                Ok(subscription) => {
                    debug!(node = %self.short(), %endpoint, path = topic.path(), "subscribed");
                    return Ok(Some(subscription));
                }
                Err(TransportError::Handshake(reason)) => {
                    debug!(node = %self.short(), %endpoint, path = topic.path(), %reason, "subscription refused");
                    refused = true;
                }
                Err(e) => last_error = e,
            }
        }
        if refused {
            Ok(None)
        } else {
            Err(last_error)
        }
    }

    // ── Blocks ─────────────────────────────────────────────────────────

    /// Follow the node's new blocks until the subscription ends.
    pub async fn connect_current_block(&self) {
        let mut subscription = match self.subscribe(Topic::Block).await {
            Ok(Some(subscription)) => subscription,
            Ok(None) => return self.request_current_block().await,
            Err(e) => return self.fail(&e),
        };
        while let Some(message) = subscription.next().await {
            match message {
                SubscriptionMessage::Text(body) => {
                    match decode::<BlockPayload>(&body).and_then(BlockPayload::into_head) {
                        Ok(head) => self.refresh_block(head).await,
                        Err(e) => return self.fail(&e),
                    }
                }
                SubscriptionMessage::Closed => break,
                SubscriptionMessage::Error(reason) => {
                    debug!(node = %self.short(), %reason, "block subscription error");
                    break;
                }
            }
        }
        debug!(node = %self.short(), "block subscription ended");
    }

    /// Pull the node's current block.
    pub async fn request_current_block(&self) {
        let result = self
            .on_endpoints(|t, e| async move { t.current_block(&e).await })
            .await
            .and_then(|(_, block)| block.into_head());
        match result {
            Ok(head) => self.refresh_block(head).await,
            Err(e) if e.is_not_found() => self.clear_block(),
            Err(e) => self.fail(&e),
        }
    }

    /// The node answered but has no block yet.
    fn clear_block(&self) {
        let had_block = {
            let mut node = self.node.write();
            node.previous_block = None;
            node.current_block.take().is_some()
        };
        let reachable = self.mark_reachable();
        debug!(node = %self.short(), "node has no block");
        if had_block || reachable {
            self.notify();
        }
    }

    /// Record a block reported by the node.
    ///
    /// When the hash is new, the parent block is fetched as well so the
    /// network can tell a new head from a fork. Notifies only when the
    /// stored block changes or the node comes back online.
    pub async fn refresh_block(&self, head: BlockHead) {
        let known = self.node.read().block_hash() == Some(head.hash.as_str());
        if known {
            if self.mark_reachable() {
                self.notify();
            }
            return;
        }

        let (previous, state) = match self.previous_of(&head).await {
            Ok(previous) => (previous, NodeState::Online),
            Err(e) => {
                debug!(node = %self.short(), error = %e, "parent block unavailable");
                (None, failure_state(&e))
            }
        };
        {
            let mut node = self.node.write();
            debug!(
                node = %short(&node.pubkey),
                from = ?node.current_block.as_ref().map(|b| b.number),
                to = head.number,
                "block changed"
            );
            node.current_block = Some(head);
            node.previous_block = previous;
            node.set_state(state, self.clock.now());
        }
        self.notify();
    }

    async fn previous_of(&self, head: &BlockHead) -> Result<Option<BlockUid>, TransportError> {
        let Some(number) = head.number.checked_sub(1) else {
            return Ok(None);
        };
        match self
            .on_endpoints(move |t, e| async move { t.block(&e, number).await })
            .await
        {
            Ok((_, block)) => Ok(Some(block.into_head()?.uid())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ── Summary ────────────────────────────────────────────────────────

    /// Pull the node's software, version and fork window.
    pub async fn refresh_summary(&self) {
        match self
            .on_endpoints(|t, e| async move { t.summary(&e).await })
            .await
        {
            Ok((_, summary)) => {
                {
                    let mut node = self.node.write();
                    node.software = summary.duniter.software;
                    node.version = summary.duniter.version;
                    node.fork_window = summary.duniter.fork_window_size;
                }
                self.mark_reachable();
                self.notify();
            }
            Err(e) => self.fail(&e),
        }
    }

    // ── Peers ──────────────────────────────────────────────────────────

    /// Follow the peers the node announces until the subscription ends.
    pub async fn connect_peers(&self) {
        let mut subscription = match self.subscribe(Topic::Peer).await {
            Ok(Some(subscription)) => subscription,
            Ok(None) => return self.request_peers().await,
            Err(e) => return self.fail(&e),
        };
        while let Some(message) = subscription.next().await {
            match message {
                SubscriptionMessage::Text(body) => match decode::<PeerPayload>(&body) {
                    Ok(payload) => self.refresh_peer_data(&payload),
                    Err(e) => return self.fail(&e),
                },
                SubscriptionMessage::Closed => break,
                SubscriptionMessage::Error(reason) => {
                    debug!(node = %self.short(), %reason, "peer subscription error");
                    break;
                }
            }
        }
        debug!(node = %self.short(), "peer subscription ended");
    }

    /// Pull the peers the node knows that we have not seen yet.
    ///
    /// Only leaves missing from the stored merkle cursor are fetched. If a
    /// leaf cannot be fetched the node goes offline, the other leaves are
    /// still processed, and the stored root is left unchanged so the missing
    /// leaf is fetched on the next pull.
    pub async fn request_peers(&self) {
        let (endpoint, merkle) = match self
            .on_endpoints(|t, e| async move { t.peers_merkle(&e).await })
            .await
        {
            Ok(found) => found,
            Err(e) if e.is_not_found() => return,
            Err(e) => return self.fail(&e),
        };
        let reachable = self.mark_reachable();

        let new_leaves: Option<Vec<String>> = {
            let node = self.node.read();
            if node.merkle_peers_root.as_deref() == Some(merkle.root.as_str()) {
                None
            } else {
                Some(
                    merkle
                        .leaves
                        .iter()
                        .filter(|leaf| !node.merkle_peers_leaves.contains(*leaf))
                        .cloned()
                        .collect(),
                )
            }
        };
        let Some(new_leaves) = new_leaves else {
            if reachable {
                self.notify();
            }
            return;
        };

        debug!(node = %self.short(), count = new_leaves.len(), "fetching new peer leaves");
        let mut fetched = Vec::new();
        let mut failed = false;
        for leaf in new_leaves {
            match self.transport.peer_leaf(&endpoint, &leaf).await {
                Ok(payload) => {
                    self.refresh_peer_data(&payload.leaf.value);
                    fetched.push(leaf);
                }
                Err(e) => {
                    debug!(node = %self.short(), %leaf, error = %e, "peer leaf unavailable");
                    failed = true;
                }
            }
        }

        {
            let mut node = self.node.write();
            if failed {
                node.merkle_peers_leaves.extend(fetched);
                node.set_state(NodeState::Offline, self.clock.now());
            } else {
                node.merkle_peers_root = Some(merkle.root);
                node.merkle_peers_leaves = merkle.leaves.into_iter().collect();
            }
        }
        self.notify();
    }

    /// Parse a peer payload and report it as a neighbour.
    pub fn refresh_peer_data(&self, payload: &PeerPayload) {
        let Some((raw, signature)) = payload.signed_parts() else {
            debug!(node = %self.short(), "peer payload without signed document");
            return;
        };
        match Peer::from_raw_and_signature(raw, signature) {
            Ok(peer) => {
                let _ = self.signals.send(ConnectorSignal::NeighbourFound {
                    pubkey: self.pubkey(),
                    peer: Box::new(peer),
                });
            }
            Err(e) => debug!(node = %self.short(), error = %e, "malformed peer document"),
        }
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Owns the I/O tasks of one node.
pub struct NodeConnector {
    node: SharedNode,
    transport: Arc<dyn NodeTransport>,
    clock: Arc<dyn Clock>,
    signals: UnboundedSender<ConnectorSignal>,
    block_task: Option<JoinHandle<()>>,
    peer_task: Option<JoinHandle<()>>,
    /// One-shot pulls started by `refresh`.
    pulls: Vec<JoinHandle<()>>,
    refresh_counter: u32,
    summary_every: u32,
    /// Set by `disconnect` and `close`; a stopped connector ignores `refresh`.
    stopped: bool,
    released: bool,
}

impl NodeConnector {
    /// A connector that is not attached to a network yet: its signals go
    /// nowhere until [`attach`](Self::attach) is called.
    pub fn new(node: Node, transport: Arc<dyn NodeTransport>) -> Self {
        let (signals, _) = mpsc::unbounded_channel();
        Self {
            node: Arc::new(parking_lot::RwLock::new(node)),
            transport,
            clock: Arc::new(SystemClock),
            signals,
            block_task: None,
            peer_task: None,
            pulls: Vec::new(),
            refresh_counter: 0,
            summary_every: SUMMARY_REFRESH_EVERY,
            stopped: false,
            released: false,
        }
    }

    /// A connector for a node known by its peer document.
    pub fn from_peer(
        currency: &str,
        peer: &Peer,
        transport: Arc<dyn NodeTransport>,
    ) -> Result<Self, NetworkError> {
        if peer.currency != currency {
            return Err(NetworkError::InvalidNodeCurrency {
                expected: currency.to_string(),
                found: peer.currency.clone(),
            });
        }
        Ok(Self::new(Node::from_peer(peer, SystemClock.now()), transport))
    }

    /// A connector for a node known only by address: its peer document is
    /// fetched first.
    pub async fn from_address(
        currency: &str,
        secured: bool,
        host: &str,
        port: u16,
        transport: Arc<dyn NodeTransport>,
    ) -> Result<Self, NetworkError> {
        let endpoint = Endpoint::from_address(secured, host, port);
        let payload = transport.peering(&endpoint).await?;
        let (raw, signature) = payload.signed_parts().ok_or_else(|| {
            TransportError::InvalidPayload(format!("{endpoint}: peering without signed document"))
        })?;
        let peer = Peer::from_raw_and_signature(raw, signature)?;
        Self::from_peer(currency, &peer, transport)
    }

    /// Route this connector's signals to a network and adopt its clock.
    pub fn attach(
        &mut self,
        signals: UnboundedSender<ConnectorSignal>,
        clock: Arc<dyn Clock>,
        summary_every: u32,
    ) {
        self.signals = signals;
        self.clock = clock;
        self.summary_every = summary_every.max(1);
    }

    pub fn node(&self) -> &SharedNode {
        &self.node
    }

    pub fn pubkey(&self) -> String {
        self.node.read().pubkey.clone()
    }

    /// A copy of the node as it is now.
    pub fn snapshot(&self) -> Node {
        self.node.read().clone()
    }

    pub fn worker(&self) -> ConnectorWorker {
        ConnectorWorker {
            node: Arc::clone(&self.node),
            transport: Arc::clone(&self.transport),
            clock: Arc::clone(&self.clock),
            signals: self.signals.clone(),
        }
    }

    fn slot(&self, topic: Topic) -> &Option<JoinHandle<()>> {
        match topic {
            Topic::Block => &self.block_task,
            Topic::Peer => &self.peer_task,
        }
    }

    /// Whether a subscription task of this kind is running.
    pub fn is_subscribed(&self, topic: Topic) -> bool {
        self.slot(topic).as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Refresh everything known about the node, in the background.
    ///
    /// Starts the block and peer subscriptions unless they are already
    /// running. The software summary is pulled on the first call and then
    /// once every `summary_every` calls; a manual refresh always pulls it,
    /// along with the peer list.
    pub fn refresh(&mut self, manual: bool) {
        if self.stopped {
            return;
        }
        if !self.is_subscribed(Topic::Block) {
            let worker = self.worker();
            self.block_task = Some(tokio::spawn(async move {
                worker.connect_current_block().await
            }));
        }
        if !self.is_subscribed(Topic::Peer) {
            let worker = self.worker();
            self.peer_task = Some(tokio::spawn(async move { worker.connect_peers().await }));
        }

        self.pulls.retain(|task| !task.is_finished());
        if manual {
            let worker = self.worker();
            self.pulls
                .push(tokio::spawn(async move { worker.request_peers().await }));
        }
        if manual || self.refresh_counter % self.summary_every == 0 {
            let worker = self.worker();
            self.pulls
                .push(tokio::spawn(async move { worker.refresh_summary().await }));
            if !manual {
                self.refresh_counter = 1;
            }
        } else {
            self.refresh_counter += 1;
        }
    }

    /// Abort every task without waiting for it.
    pub fn disconnect(&mut self) {
        self.stopped = true;
        let tasks = self
            .block_task
            .iter()
            .chain(self.peer_task.iter())
            .chain(self.pulls.iter());
        for task in tasks {
            task.abort();
        }
    }

    /// Stop every task, wait for each to finish, then release the transport.
    /// Safe to call more than once.
    pub async fn close(&mut self) {
        self.disconnect();
        let tasks: Vec<JoinHandle<()>> = self
            .block_task
            .take()
            .into_iter()
            .chain(self.peer_task.take())
            .chain(self.pulls.drain(..))
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(node = %short(&self.pubkey()), "connector task panicked");
                }
            }
        }
        if !self.released {
            self.released = true;
            self.transport.close().await;
        }
    }
}

impl Drop for NodeConnector {
    fn drop(&mut self) {
        self.disconnect();
    }
}
