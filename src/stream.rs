use crate::auth::AuthClient;
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tracing::debug;

/// Subscription request sent as the first frame of every session.
///
/// `start_cursor` takes precedence over `start_block_num` when non-empty;
/// fork steps and detail level are fixed for this client (new blocks only,
/// light blocks).
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    pub start_block_num: u64,
    pub start_cursor: String,
    pub fork_steps: Vec<String>,
    pub details: String,
    pub include_filter_expr: String,
}

impl SubscribeRequest {
    pub fn new(start_block_num: u64, start_cursor: String, filter: String) -> Self {
        SubscribeRequest {
            start_block_num,
            start_cursor,
            fork_steps: vec!["STEP_NEW".to_string()],
            details: "LIGHT".to_string(),
            include_filter_expr: filter,
        }
    }
}

/// One stream event: an opaque block payload plus the cursor to persist once
/// the block's side effects are done.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockEnvelope {
    pub block: serde_json::Value,
    pub cursor: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Clean end-of-stream. The subscription is never-ending by contract, so
    /// this is unexpected, but it is retried like any other session failure.
    #[error("stream closed by remote")]
    Closed,

    #[error("stream transport failure: {0}")]
    Transport(String),

    /// Malformed frame. Indicates a protocol version mismatch that retrying
    /// cannot fix; the ingest loop escalates this to a process-fatal error.
    #[error("unable to decode stream frame: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StreamError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StreamError::Decode(_))
    }
}

/// Opens logical sessions against the remote block stream. Abstracted so the
/// ingest loop can be driven by a scripted source in tests.
#[allow(async_fn_in_trait)]
pub trait BlockSource {
    type Session: BlockSession;

    async fn open(&mut self, request: SubscribeRequest) -> Result<Self::Session>;
}

/// One live subscription; yields block envelopes until the stream fails or
/// the remote closes it.
#[allow(async_fn_in_trait)]
pub trait BlockSession {
    async fn next_block(&mut self) -> Result<BlockEnvelope, StreamError>;
}

/// Production source: JSON frames over a WebSocket, bearer token re-acquired
/// before each session.
pub struct WsBlockSource {
    endpoint: String,
    auth: AuthClient,
    skip_tls_verify: bool,
}

impl WsBlockSource {
    pub fn new(endpoint: &str, auth: AuthClient, skip_tls_verify: bool) -> Self {
        WsBlockSource {
            endpoint: endpoint.to_string(),
            auth,
            skip_tls_verify,
        }
    }
}

impl BlockSource for WsBlockSource {
    type Session = WsBlockSession;

    async fn open(&mut self, request: SubscribeRequest) -> Result<WsBlockSession> {
        let token = self
            .auth
            .fetch_token()
            .await
            .context("unable to retrieve streaming API token")?;

        let mut ws_request = self
            .endpoint
            .as_str()
            .into_client_request()
            .with_context(|| format!("invalid stream endpoint {:?}", self.endpoint))?;
        ws_request.headers_mut().insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))
                .context("received a token that is not a valid header value")?,
        );

        let connector = if self.skip_tls_verify {
            let tls = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .build()
                .context("unable to build TLS connector")?;
            Some(Connector::NativeTls(tls))
        } else {
            None
        };

        let (mut ws, _) = connect_async_tls_with_config(ws_request, None, false, connector)
            .await
            .with_context(|| format!("unable to connect to {:?}", self.endpoint))?;

        let frame = serde_json::to_string(&request)
            .context("unable to encode subscription request")?;
        ws.send(Message::Text(frame))
            .await
            .context("unable to send subscription request")?;

        debug!(
            start_block_num = request.start_block_num,
            start_cursor = %request.start_cursor,
            "subscription request sent"
        );

        Ok(WsBlockSession { ws })
    }
}

pub struct WsBlockSession {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl BlockSession for WsBlockSession {
    async fn next_block(&mut self) -> Result<BlockEnvelope, StreamError> {
        loop {
            match self.ws.next().await {
                None | Some(Ok(Message::Close(_))) => return Err(StreamError::Closed),
                Some(Err(e)) => return Err(StreamError::Transport(e.to_string())),
                Some(Ok(Message::Text(text))) => {
                    return Ok(serde_json::from_str(&text)?);
                }
                // Keep-alive and non-text frames carry no block events.
                Some(Ok(_)) => continue,
            }
        }
    }
}
