//! HTTP + WebSocket client for the node API.
//!
//! One-shot requests go through `reqwest`; push subscriptions are opened
//! with `tokio-tungstenite`. Errors are classified into the
//! [`TransportError`] taxonomy so that the caller can decide the node state
//! without looking at transport details.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use wotcrawl_types::Endpoint;

use crate::codec::{
    decode, BlockPayload, ErrorPayload, LeafPayload, MerklePayload, PeerPayload, SummaryPayload,
};
use crate::transport::{NodeTransport, Subscription, SubscriptionMessage, Topic, TransportProvider};
use crate::TransportError;

/// Default timeout for a whole request.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client-side transport settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportSettings {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// HTTP proxy for one-shot requests (`http://host:port`).
    pub proxy: Option<String>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            proxy: None,
        }
    }
}

/// Node API client owning one HTTP connection pool.
pub struct BmaClient {
    http_client: reqwest::Client,
    connect_timeout: Duration,
}

impl BmaClient {
    pub fn new(settings: &TransportSettings) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout);
        if let Some(proxy) = &settings.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| TransportError::Setup(format!("invalid proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let http_client = builder
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        Ok(Self {
            http_client,
            connect_timeout: settings.connect_timeout,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        path: &str,
    ) -> Result<T, TransportError> {
        let url = endpoint
            .http_url(path)
            .ok_or_else(|| TransportError::UnsupportedEndpoint(endpoint.to_string()))?;

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(classify_http)?;
        let status = response.status();
        let body = response.text().await.map_err(classify_http)?;

        if !status.is_success() {
            if let Ok(error) = decode::<ErrorPayload>(&body) {
                return Err(error.into());
            }
            return Err(TransportError::Unreachable(format!(
                "HTTP status {status} from {url}"
            )));
        }

        decode(&body)
    }
}

fn classify_http(e: reqwest::Error) -> TransportError {
    if e.is_decode() {
        TransportError::InvalidPayload(e.to_string())
    } else if e.is_timeout() {
        TransportError::Unreachable(format!("request timed out: {e}"))
    } else if e.is_connect() {
        TransportError::Unreachable(format!("connection failed: {e}"))
    } else {
        TransportError::Unreachable(e.to_string())
    }
}

fn classify_ws(e: WsError) -> TransportError {
    match e {
        WsError::Io(e) => TransportError::Unreachable(e.to_string()),
        WsError::Tls(e) => TransportError::Unreachable(e.to_string()),
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            TransportError::Unreachable("connection closed".into())
        }
        WsError::Http(response) => {
            TransportError::Handshake(format!("HTTP status {}", response.status()))
        }
        other => TransportError::Handshake(other.to_string()),
    }
}

#[async_trait]
impl NodeTransport for BmaClient {
    async fn current_block(&self, endpoint: &Endpoint) -> Result<BlockPayload, TransportError> {
        self.get(endpoint, "/blockchain/current").await
    }

    async fn block(
        &self,
        endpoint: &Endpoint,
        number: u64,
    ) -> Result<BlockPayload, TransportError> {
        self.get(endpoint, &format!("/blockchain/block/{number}"))
            .await
    }

    async fn summary(&self, endpoint: &Endpoint) -> Result<SummaryPayload, TransportError> {
        self.get(endpoint, "/node/summary").await
    }

    async fn peering(&self, endpoint: &Endpoint) -> Result<PeerPayload, TransportError> {
        self.get(endpoint, "/network/peering").await
    }

    async fn peers_merkle(&self, endpoint: &Endpoint) -> Result<MerklePayload, TransportError> {
        self.get(endpoint, "/network/peering/peers?leaves=true")
            .await
    }

    async fn peer_leaf(
        &self,
        endpoint: &Endpoint,
        leaf: &str,
    ) -> Result<LeafPayload, TransportError> {
        self.get(endpoint, &format!("/network/peering/peers?leaf={leaf}"))
            .await
    }

    async fn subscribe(
        &self,
        endpoint: &Endpoint,
        topic: Topic,
    ) -> Result<Subscription, TransportError> {
        let url = endpoint
            .ws_url(topic.path())
            .ok_or_else(|| TransportError::UnsupportedEndpoint(endpoint.to_string()))?;

        let (stream, _) = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(url.as_str()),
        )
        .await
        .map_err(|_| TransportError::Unreachable(format!("websocket connect timed out: {url}")))?
        .map_err(classify_ws)?;

        tracing::trace!(%url, "websocket opened");

        let messages = stream.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(SubscriptionMessage::Text(text)),
                Ok(Message::Close(_)) => Some(SubscriptionMessage::Closed),
                Ok(_) => None,
                Err(e) => Some(SubscriptionMessage::Error(e.to_string())),
            }
        });
        Ok(messages.boxed())
    }
}

/// Builds a fresh [`BmaClient`] for every connector.
#[derive(Clone, Debug, Default)]
pub struct BmaProvider {
    settings: TransportSettings,
}

impl BmaProvider {
    pub fn new(settings: TransportSettings) -> Self {
        Self { settings }
    }
}

impl TransportProvider for BmaProvider {
    fn open(&self) -> Result<Arc<dyn NodeTransport>, TransportError> {
        Ok(Arc::new(BmaClient::new(&self.settings)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_defaults() {
        assert!(BmaClient::new(&TransportSettings::default()).is_ok());
    }

    #[test]
    fn client_builds_behind_proxy() {
        let settings = TransportSettings {
            proxy: Some("http://127.0.0.1:3128".into()),
            ..TransportSettings::default()
        };
        assert!(BmaClient::new(&settings).is_ok());
    }

    #[tokio::test]
    async fn unsupported_endpoint_is_rejected_before_io() {
        let client = BmaClient::new(&TransportSettings::default()).unwrap();
        let endpoint = Endpoint::Other("WS2P 1be86653 g1.example.org 20901".into());
        assert!(matches!(
            client.current_block(&endpoint).await,
            Err(TransportError::UnsupportedEndpoint(_))
        ));
        assert!(matches!(
            client.subscribe(&endpoint, Topic::Block).await,
            Err(TransportError::UnsupportedEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let client = BmaClient::new(&TransportSettings::default()).unwrap();
        // Port 9 (discard) on loopback is not listening in test environments.
        let endpoint: Endpoint = "BASIC_MERKLED_API 127.0.0.1 9".parse().unwrap();
        assert!(matches!(
            client.summary(&endpoint).await,
            Err(TransportError::Unreachable(_))
        ));
    }
}
