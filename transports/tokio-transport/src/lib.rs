//! Tokio-based WebSocket transport for heydays-rust.
//!
//! Concrete implementation of the [`Transport`] trait over
//! `tokio-tungstenite`. The session token addresses the connection as a
//! query parameter; frames travel as text payloads.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use hdcore::net::{Transport, TransportEvent, TransportFactory};
use log::{debug, error, trace, warn};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type RawWs = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<RawWs, Message>;
type WsStream = SplitStream<RawWs>;

const EVENT_BUFFER: usize = 100;

/// Tokio WebSocket transport
pub struct TokioWebSocketTransport {
    ws_sink: Arc<Mutex<Option<WsSink>>>,
    is_connected: Arc<Mutex<bool>>,
}

impl TokioWebSocketTransport {
    fn new(sink: WsSink) -> Self {
        Self {
            ws_sink: Arc::new(Mutex::new(Some(sink))),
            is_connected: Arc::new(Mutex::new(true)),
        }
    }
}

#[async_trait]
impl Transport for TokioWebSocketTransport {
    async fn send(&self, data: &[u8]) -> Result<(), anyhow::Error> {
        let mut sink_guard = self.ws_sink.lock().await;
        let sink = sink_guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("socket is closed"))?;

        let text = std::str::from_utf8(data)
            .map_err(|e| anyhow::anyhow!("outbound frame is not UTF-8: {e}"))?;
        debug!("--> sending frame: {} bytes", data.len());
        sink.send(Message::text(text.to_string()))
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket send error: {e}"))?;
        Ok(())
    }

    async fn disconnect(&self) {
        let mut is_connected = self.is_connected.lock().await;
        if *is_connected {
            *is_connected = false;
            if let Some(mut sink) = self.ws_sink.lock().await.take() {
                let _ = sink.close().await;
            }
        }
    }
}

/// Factory for creating Tokio WebSocket transports
pub struct TokioWebSocketTransportFactory {
    push_url: String,
}

impl TokioWebSocketTransportFactory {
    /// `push_url` is the push endpoint without the token parameter,
    /// e.g. `ws://localhost:8080/ws`.
    pub fn new(push_url: impl Into<String>) -> Self {
        Self {
            push_url: push_url.into(),
        }
    }
}

#[async_trait]
impl TransportFactory for TokioWebSocketTransportFactory {
    async fn create_transport(
        &self,
        session_token: &str,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
        let url = format!("{}?token={}", self.push_url, urlencoding::encode(session_token));
        debug!("dialing {}", self.push_url);
        let (ws, _response) = connect_async(url.as_str()).await?;
        let (sink, stream) = ws.split();

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let transport = Arc::new(TokioWebSocketTransport::new(sink));

        events_tx
            .send(TransportEvent::Connected)
            .await
            .map_err(|_| anyhow::anyhow!("event receiver dropped before connect completed"))?;

        tokio::spawn(read_pump(stream, events_tx, transport.is_connected.clone()));

        Ok((transport, events_rx))
    }
}

async fn read_pump(
    mut stream: WsStream,
    events: mpsc::Sender<TransportEvent>,
    is_connected: Arc<Mutex<bool>>,
) {
    loop {
        match stream.next().await {
            Some(Ok(message)) => match message {
                Message::Text(text) => {
                    trace!("<-- received frame: {} bytes", text.len());
                    let data = Bytes::copy_from_slice(text.as_bytes());
                    if events.send(TransportEvent::DataReceived(data)).await.is_err() {
                        warn!("event receiver dropped, closing read pump");
                        break;
                    }
                }
                Message::Binary(data) => {
                    trace!("<-- received binary frame: {} bytes", data.len());
                    if events.send(TransportEvent::DataReceived(data)).await.is_err() {
                        warn!("event receiver dropped, closing read pump");
                        break;
                    }
                }
                Message::Close(_) => {
                    trace!("received close frame");
                    break;
                }
                // Ping/pong are answered by tungstenite itself.
                _ => {}
            },
            Some(Err(e)) => {
                error!("error reading from websocket: {e}");
                break;
            }
            None => {
                trace!("websocket stream ended");
                break;
            }
        }
    }

    *is_connected.lock().await = false;
    let _ = events.send(TransportEvent::Disconnected).await;
}
