//! WebSocket transport
//!
//! A `Connector` opens one socket and returns a `Connection`: a `Transport`
//! handle for outbound JSON plus a receiver of `TransportEvent`s. Reader and
//! writer halves run as their own tasks; malformed inbound frames become
//! `ParseError` events and never tear the reader down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt, SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::ClientError;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

const OUTBOUND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

/// Events surfaced by a live socket
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A JSON frame from the server
    Message(Value),
    /// A frame that was not valid JSON
    ParseError(String),
    /// Socket-level failure; `Closed` is not sent afterwards
    Error(String),
    /// The server closed the socket
    Closed,
}

/// Frames queued for the writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close,
}

/// Owning handle to one socket's outbound half.
///
/// Dropping the handle disconnects.
#[derive(Debug)]
pub struct Transport {
    connection_id: u64,
    outbound_tx: Option<mpsc::Sender<OutboundFrame>>,
}

impl Transport {
    pub fn new(outbound_tx: mpsc::Sender<OutboundFrame>) -> Self {
        Self {
            connection_id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            outbound_tx: Some(outbound_tx),
        }
    }

    pub fn id(&self) -> u64 {
        self.connection_id
    }

    pub fn is_open(&self) -> bool {
        self.outbound_tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Serialize `message` and queue it for the socket.
    pub async fn send<T: Serialize>(&self, message: &T) -> Result<(), ClientError> {
        let tx = self
            .outbound_tx
            .as_ref()
            .filter(|tx| !tx.is_closed())
            .ok_or(ClientError::NotConnected)?;
        let json = serde_json::to_string(message)?;
        tx.send(OutboundFrame::Text(json))
            .await
            .map_err(|_| ClientError::NotConnected)
    }

    /// Close the socket. Safe to call any number of times.
    pub fn disconnect(&mut self) {
        if let Some(tx) = self.outbound_tx.take() {
            debug!(
                component = "transport",
                event = "transport.disconnect",
                connection_id = self.connection_id,
                "Closing WebSocket connection"
            );
            let _ = tx.try_send(OutboundFrame::Close);
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// A freshly opened socket
#[derive(Debug)]
pub struct Connection {
    pub transport: Transport,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Opens sockets. Implemented over tokio-tungstenite for real use and by an
/// in-memory connector in tests.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Connection, ClientError>>;
}

/// Connect, optionally bounding the handshake.
pub async fn connect_with_timeout(
    connector: &dyn Connector,
    url: &str,
    timeout: Option<Duration>,
) -> Result<Connection, ClientError> {
    let connecting = connector.connect(url);
    match timeout {
        Some(limit) => tokio::time::timeout(limit, connecting)
            .await
            .map_err(|_| ClientError::Timeout("WebSocket connection"))?,
        None => connecting.await,
    }
}

/// tokio-tungstenite backed connector
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Connection, ClientError>> {
        let url = url.to_string();
        async move { connect_websocket(&url).await }.boxed()
    }
}

async fn connect_websocket(url: &str) -> Result<Connection, ClientError> {
    let (socket, _response) = tokio_tungstenite::connect_async(url).await?;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(EVENT_CAPACITY);
    let transport = Transport::new(outbound_tx);
    let connection_id = transport.id();

    info!(
        component = "transport",
        event = "transport.connected",
        connection_id,
        url = %url,
        "WebSocket connection established"
    );

    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            match frame {
                OutboundFrame::Text(json) => {
                    if let Err(e) = ws_tx.send(Message::Text(json.into())).await {
                        warn!(
                            component = "transport",
                            event = "transport.send_failed",
                            connection_id,
                            error = %e,
                            "Failed to write WebSocket frame"
                        );
                        break;
                    }
                }
                OutboundFrame::Close => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    tokio::spawn(async move {
        let terminal = loop {
            let event = match ws_rx.next().await {
                None | Some(Ok(Message::Close(_))) => break TransportEvent::Closed,
                Some(Ok(Message::Text(text))) => decode_frame(text.as_str()),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => decode_frame(text),
                    Err(e) => TransportEvent::ParseError(format!("Binary frame is not UTF-8: {e}")),
                },
                Some(Ok(_)) => continue,
                Some(Err(e)) => break TransportEvent::Error(e.to_string()),
            };
            if event_tx.send(event).await.is_err() {
                return;
            }
        };

        debug!(
            component = "transport",
            event = "transport.reader_finished",
            connection_id,
            terminal = ?terminal,
            "WebSocket reader finished"
        );
        let _ = event_tx.send(terminal).await;
    });

    Ok(Connection {
        transport,
        events: event_rx,
    })
}

/// Decode one text frame into an event.
pub fn decode_frame(text: &str) -> TransportEvent {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => TransportEvent::Message(value),
        Err(e) => {
            warn!(
                component = "transport",
                event = "transport.parse_failed",
                error = %e,
                "Error parsing WebSocket message"
            );
            TransportEvent::ParseError(format!("Failed to parse server message: {e}"))
        }
    }
}
