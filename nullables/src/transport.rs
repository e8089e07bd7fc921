//! Nullable node transport: scripted responses, recorded requests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;

use wotcrawl_protocol::{
    decode, BlockPayload, LeafPayload, MerklePayload, NodeTransport, PeerPayload, Subscription,
    SubscriptionMessage, SummaryPayload, Topic, TransportError, TransportProvider,
};
use wotcrawl_types::Endpoint;

/// A one-shot request as seen by the transport.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Request {
    CurrentBlock,
    Block(u64),
    Summary,
    Peering,
    PeersMerkle,
    PeerLeaf(String),
}

enum ScriptedSubscription {
    /// Deliver the messages, then end the stream.
    Closing(Vec<SubscriptionMessage>),
    /// Deliver the messages, then stay open until dropped.
    Open(Vec<SubscriptionMessage>),
    Fail(TransportError),
}

#[derive(Default)]
struct Inner {
    responses: HashMap<(String, Request), Result<String, TransportError>>,
    subscriptions: HashMap<(String, Topic), VecDeque<ScriptedSubscription>>,
    requests: Vec<(String, Request)>,
    subscribe_calls: Vec<(String, Topic)>,
    opened: u32,
    closed: u32,
}

/// A transport that answers from a script instead of the network.
///
/// Responses are JSON bodies keyed by endpoint and request and are served
/// every time the request is made, so they go through the same decoding and
/// validation as real answers. An unscripted request fails as unreachable.
/// An unscripted subscription fails its handshake, which makes connectors
/// fall back to one-shot requests.
///
/// Clones share the same script, so one `NullTransport` can act as the
/// [`TransportProvider`] for every connector of a network.
#[derive(Clone, Default)]
pub struct NullTransport {
    inner: Arc<Mutex<Inner>>,
}

fn key(endpoint: &Endpoint) -> String {
    endpoint.to_string()
}

impl NullTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `request` on `endpoint` with `body`.
    pub fn respond(&self, endpoint: &Endpoint, request: Request, body: impl Into<String>) {
        self.inner
            .lock()
            .responses
            .insert((key(endpoint), request), Ok(body.into()));
    }

    /// Fail `request` on `endpoint` with `error`.
    pub fn fail(&self, endpoint: &Endpoint, request: Request, error: TransportError) {
        self.inner
            .lock()
            .responses
            .insert((key(endpoint), request), Err(error));
    }

    /// Forget the scripted answer, so the request fails as unreachable again.
    pub fn forget(&self, endpoint: &Endpoint, request: &Request) {
        self.inner
            .lock()
            .responses
            .remove(&(key(endpoint), request.clone()));
    }

    /// Queue a subscription that delivers `messages` and then ends.
    pub fn push_subscription(
        &self,
        endpoint: &Endpoint,
        topic: Topic,
        messages: Vec<SubscriptionMessage>,
    ) {
        self.queue(endpoint, topic, ScriptedSubscription::Closing(messages));
    }

    /// Queue a subscription that delivers `messages` and then stays open.
    pub fn push_open_subscription(
        &self,
        endpoint: &Endpoint,
        topic: Topic,
        messages: Vec<SubscriptionMessage>,
    ) {
        self.queue(endpoint, topic, ScriptedSubscription::Open(messages));
    }

    /// Queue a subscription attempt that fails with `error`.
    pub fn push_subscription_error(&self, endpoint: &Endpoint, topic: Topic, error: TransportError) {
        self.queue(endpoint, topic, ScriptedSubscription::Fail(error));
    }

    fn queue(&self, endpoint: &Endpoint, topic: Topic, script: ScriptedSubscription) {
        self.inner
            .lock()
            .subscriptions
            .entry((key(endpoint), topic))
            .or_default()
            .push_back(script);
    }

    /// Every one-shot request made so far, in order.
    pub fn requests(&self) -> Vec<(String, Request)> {
        self.inner.lock().requests.clone()
    }

    /// How many times `request` was made on `endpoint`.
    pub fn request_count(&self, endpoint: &Endpoint, request: &Request) -> usize {
        let endpoint = key(endpoint);
        self.inner
            .lock()
            .requests
            .iter()
            .filter(|(e, r)| *e == endpoint && r == request)
            .count()
    }

    /// How many subscriptions to `topic` were attempted on `endpoint`.
    pub fn subscribe_count(&self, endpoint: &Endpoint, topic: Topic) -> usize {
        let endpoint = key(endpoint);
        self.inner
            .lock()
            .subscribe_calls
            .iter()
            .filter(|(e, t)| *e == endpoint && *t == topic)
            .count()
    }

    /// How many transports were handed out through [`TransportProvider::open`].
    pub fn opened(&self) -> u32 {
        self.inner.lock().opened
    }

    /// How many times [`NodeTransport::close`] was called.
    pub fn closed(&self) -> u32 {
        self.inner.lock().closed
    }

    fn answer<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        request: Request,
    ) -> Result<T, TransportError> {
        let endpoint = key(endpoint);
        let scripted = {
            let mut inner = self.inner.lock();
            inner.requests.push((endpoint.clone(), request.clone()));
            inner.responses.get(&(endpoint.clone(), request.clone())).cloned()
        };
        match scripted {
            Some(Ok(body)) => decode(&body),
            Some(Err(e)) => Err(e),
            None => Err(TransportError::Unreachable(format!(
                "no scripted answer for {request:?} on {endpoint}"
            ))),
        }
    }
}

#[async_trait]
impl NodeTransport for NullTransport {
    async fn current_block(&self, endpoint: &Endpoint) -> Result<BlockPayload, TransportError> {
        self.answer(endpoint, Request::CurrentBlock)
    }

    async fn block(
        &self,
        endpoint: &Endpoint,
        number: u64,
    ) -> Result<BlockPayload, TransportError> {
        self.answer(endpoint, Request::Block(number))
    }

    async fn summary(&self, endpoint: &Endpoint) -> Result<SummaryPayload, TransportError> {
        self.answer(endpoint, Request::Summary)
    }

    async fn peering(&self, endpoint: &Endpoint) -> Result<PeerPayload, TransportError> {
        self.answer(endpoint, Request::Peering)
    }

    async fn peers_merkle(&self, endpoint: &Endpoint) -> Result<MerklePayload, TransportError> {
        self.answer(endpoint, Request::PeersMerkle)
    }

    async fn peer_leaf(
        &self,
        endpoint: &Endpoint,
        leaf: &str,
    ) -> Result<LeafPayload, TransportError> {
        self.answer(endpoint, Request::PeerLeaf(leaf.to_string()))
    }

    async fn subscribe(
        &self,
        endpoint: &Endpoint,
        topic: Topic,
    ) -> Result<Subscription, TransportError> {
        let endpoint = key(endpoint);
        let script = {
            let mut inner = self.inner.lock();
            inner.subscribe_calls.push((endpoint.clone(), topic));
            inner
                .subscriptions
                .get_mut(&(endpoint.clone(), topic))
                .and_then(|queue| queue.pop_front())
        };
        match script {
            Some(ScriptedSubscription::Closing(messages)) => Ok(stream::iter(messages).boxed()),
            Some(ScriptedSubscription::Open(messages)) => {
                Ok(stream::iter(messages).chain(stream::pending()).boxed())
            }
            Some(ScriptedSubscription::Fail(e)) => Err(e),
            None => Err(TransportError::Handshake(format!(
                "no scripted {} subscription on {endpoint}",
                topic.path()
            ))),
        }
    }

    async fn close(&self) {
        self.inner.lock().closed += 1;
    }
}

impl TransportProvider for NullTransport {
    fn open(&self) -> Result<Arc<dyn NodeTransport>, TransportError> {
        self.inner.lock().opened += 1;
        Ok(Arc::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodies;

    fn endpoint() -> Endpoint {
        "BASIC_MERKLED_API 10.0.0.1 10901".parse().unwrap()
    }

    #[tokio::test]
    async fn scripted_answers_are_decoded() {
        let transport = NullTransport::new();
        let hash = "A".repeat(64);
        transport.respond(&endpoint(), Request::CurrentBlock, bodies::block(5, &hash, 70, 100));

        let block = transport.current_block(&endpoint()).await.unwrap();
        assert_eq!(block.number, 5);
        assert_eq!(block.hash, hash);
        assert_eq!(transport.request_count(&endpoint(), &Request::CurrentBlock), 1);
    }

    #[tokio::test]
    async fn unscripted_request_is_unreachable() {
        let transport = NullTransport::new();
        assert!(matches!(
            transport.summary(&endpoint()).await,
            Err(TransportError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn unscripted_subscription_fails_handshake() {
        let transport = NullTransport::new();
        assert!(matches!(
            transport.subscribe(&endpoint(), Topic::Block).await,
            Err(TransportError::Handshake(_))
        ));
        assert_eq!(transport.subscribe_count(&endpoint(), Topic::Block), 1);
    }

    #[tokio::test]
    async fn closing_subscription_ends() {
        let transport = NullTransport::new();
        transport.push_subscription(
            &endpoint(),
            Topic::Peer,
            vec![SubscriptionMessage::Text("{}".into())],
        );
        let messages: Vec<_> = transport
            .subscribe(&endpoint(), Topic::Peer)
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(messages, vec![SubscriptionMessage::Text("{}".into())]);
    }

    #[test]
    fn provider_shares_the_script() {
        let transport = NullTransport::new();
        let opened = transport.open().unwrap();
        drop(opened);
        assert_eq!(transport.opened(), 1);
    }
}
