//! WebSocket transport for the OpenAI Realtime API.
//!
//! Frames are exchanged through a spawned connection task so that the
//! session driver never awaits socket I/O. Outbound text is queued on a
//! bounded channel; inbound frames, errors and the final close are reported
//! as [`TransportEvent`]s in arrival order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use crate::core::realtime::base::{
    ConnectRequest, RealtimeError, RealtimeResult, Transport, TransportEvent,
};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// WebSocket implementation of [`Transport`].
pub struct WebSocketTransport {
    sender: Option<mpsc::Sender<String>>,
    open: Arc<AtomicBool>,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self {
            sender: None,
            open: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
            handle: None,
        }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the upgrade request with authentication headers.
pub(crate) fn build_request(request: &ConnectRequest) -> RealtimeResult<http::Request<()>> {
    let parsed = url::Url::parse(&request.url)
        .map_err(|e| RealtimeError::InvalidConfiguration(format!("Invalid URL: {e}")))?;

    if !matches!(parsed.scheme(), "ws" | "wss") {
        return Err(RealtimeError::InvalidConfiguration(format!(
            "Unsupported URL scheme: {}",
            parsed.scheme()
        )));
    }

    let host = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => {
            return Err(RealtimeError::InvalidConfiguration(
                "URL has no host".to_string(),
            ));
        }
    };

    http::Request::builder()
        .uri(request.url.as_str())
        .header("Authorization", format!("Bearer {}", request.api_key))
        .header("OpenAI-Beta", "realtime=v1")
        .header("Sec-WebSocket-Protocol", "realtime")
        .header(
            "Sec-WebSocket-Key",
            tungstenite::handshake::client::generate_key(),
        )
        .header("Sec-WebSocket-Version", "13")
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Host", host)
        .body(())
        .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(
        &mut self,
        request: ConnectRequest,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> RealtimeResult<()> {
        if self.is_open() {
            return Ok(());
        }

        let http_request = build_request(&request)?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(http_request)
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        tracing::info!("Connected to OpenAI Realtime API");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<String>(WS_CHANNEL_CAPACITY);

        self.sender = Some(tx);
        self.shutdown = CancellationToken::new();
        self.open.store(true, Ordering::SeqCst);
        let _ = events.send(TransportEvent::Opened);

        let open = self.open.clone();
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut reason = None;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        if let Err(e) = ws_sink.send(Message::Close(None)).await {
                            tracing::debug!("Failed to send close frame: {}", e);
                        }
                        reason = Some("closed by client".to_string());
                        break;
                    }

                    // Handle outgoing messages
                    outgoing = rx.recv() => {
                        let Some(text) = outgoing else {
                            let _ = ws_sink.send(Message::Close(None)).await;
                            break;
                        };
                        if let Err(e) = ws_sink.send(Message::Text(text.into())).await {
                            tracing::error!("Failed to send WebSocket message: {}", e);
                            let _ = events.send(TransportEvent::Error(format!(
                                "WebSocket connection error: {e}"
                            )));
                            break;
                        }
                    }

                    // Handle incoming messages
                    incoming = ws_stream.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                let _ = events.send(TransportEvent::Message(text.as_str().to_owned()));
                            }
                            Some(Ok(Message::Close(frame))) => {
                                tracing::info!("WebSocket closed by server");
                                reason = frame.map(|f| f.reason.as_str().to_owned());
                                break;
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    tracing::error!("Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::error!("WebSocket error: {}", e);
                                let _ = events.send(TransportEvent::Error(format!(
                                    "WebSocket connection error: {e}"
                                )));
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }

            open.store(false, Ordering::SeqCst);
            let _ = events.send(TransportEvent::Closed { reason });
        });

        self.handle = Some(handle);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send(&mut self, text: String) -> RealtimeResult<()> {
        if !self.is_open() {
            return Err(RealtimeError::NotConnected);
        }
        let Some(sender) = self.sender.as_ref() else {
            return Err(RealtimeError::NotConnected);
        };
        sender.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                RealtimeError::WebSocketError("Outbound queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => RealtimeError::NotConnected,
        })
    }

    async fn close(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
        self.sender = None;

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!("WebSocket task ended abnormally: {}", e);
            }
            tracing::info!("Disconnected from OpenAI Realtime API");
        }
    }
}
