//! Reasoning sub-session client.
//!
//! Runs as an independent tokio task with its own socket. Callers talk to
//! it through `ReasoningClient`; server progress is pushed to the owner as
//! `ReasoningUpdate`s. Unexpected closes are retried with the shared
//! bounded backoff.

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use jobtrack_protocol::{ReasoningEvent, ReasoningRequest, ReasoningResult, ReasoningStep};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::reconnect::ReconnectPolicy;
use crate::transport::{connect_with_timeout, Connection, Connector, Transport, TransportEvent};

const PARSE_FAILED_MESSAGE: &str = "Failed to parse server message";
const SOCKET_ERROR_MESSAGE: &str = "WebSocket connection error";

/// Progress pushed by the reasoning server
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningUpdate {
    SessionCreated(String),
    Processing(String),
    Step(ReasoningStep),
    Complete(ReasoningResult),
    Error(String),
    Closed,
}

enum ReasoningCommand {
    Connect {
        reply: oneshot::Sender<Result<String, ClientError>>,
    },
    SendQuery {
        query: String,
        context: String,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the reasoning actor (cheap to Clone).
#[derive(Clone)]
pub struct ReasoningClient {
    command_tx: mpsc::Sender<ReasoningCommand>,
    session_id: Arc<ArcSwapOption<String>>,
    connect_timeout: Duration,
}

impl ReasoningClient {
    /// Spawn the actor. The receiver yields every server update.
    pub fn spawn(
        connector: Arc<dyn Connector>,
        config: &ClientConfig,
    ) -> (ReasoningClient, mpsc::Receiver<ReasoningUpdate>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (opened_tx, opened_rx) = mpsc::channel(16);
        let (updates_tx, updates_rx) = mpsc::channel(256);
        let session_id = Arc::new(ArcSwapOption::empty());

        let actor = ReasoningActor {
            connector,
            url: config.reasoning_url(),
            connect_timeout: config.reasoning_connect_timeout(),
            connect_generation: 0,
            connecting: false,
            opened_tx,
            transport: None,
            events: None,
            session_id: session_id.clone(),
            pending_connects: Vec::new(),
            updates_tx,
            reconnect: ReconnectPolicy::from_config(config),
            reconnect_at: None,
        };
        tokio::spawn(actor.run(command_rx, opened_rx));

        (
            ReasoningClient {
                command_tx,
                session_id,
                connect_timeout: config.reasoning_connect_timeout(),
            },
            updates_rx,
        )
    }

    /// Socket is open and the server has assigned a session.
    pub fn is_connected(&self) -> bool {
        self.session_id.load().is_some()
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.load_full().map(|id| id.as_ref().clone())
    }

    /// Open the socket (if needed) and wait for `session_created`.
    pub async fn connect(&self) -> Result<String, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(ReasoningCommand::Connect { reply })
            .await
            .map_err(|_| ClientError::ChannelClosed)?;

        match tokio::time::timeout(self.connect_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::ChannelClosed),
            Err(_) => {
                warn!(
                    component = "reasoning",
                    event = "reasoning.connect.timeout",
                    timeout_ms = self.connect_timeout.as_millis() as u64,
                    "Reasoning session was not created in time"
                );
                Err(ClientError::Timeout("Reasoning WebSocket connection"))
            }
        }
    }

    /// Send a query on the active session. Fails locally without a session.
    pub async fn send_query(&self, query: &str, context: &str) -> Result<(), ClientError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(ReasoningCommand::SendQuery {
                query: query.to_string(),
                context: context.to_string(),
                reply,
            })
            .await
            .map_err(|_| ClientError::ChannelClosed)?;
        rx.await.map_err(|_| ClientError::ChannelClosed)?
    }

    /// Close the session and socket. Safe to call when not connected.
    pub async fn close(&self) {
        let (reply, rx) = oneshot::channel();
        if self
            .command_tx
            .send(ReasoningCommand::Close { reply })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    /// Queue a close without waiting for the actor to act on it.
    pub fn close_in_background(&self) {
        let (reply, _) = oneshot::channel();
        if self
            .command_tx
            .try_send(ReasoningCommand::Close { reply })
            .is_err()
        {
            warn!(
                component = "reasoning",
                event = "reasoning.close.dropped",
                "Reasoning actor busy or gone, close not queued"
            );
        }
    }
}

/// A handshake spawned off the actor task.
struct Opened {
    generation: u64,
    reconnect: bool,
    result: Result<Connection, ClientError>,
}

struct ReasoningActor {
    connector: Arc<dyn Connector>,
    url: String,
    connect_timeout: Duration,
    /// Bumped on every open and close; stale handshakes are dropped.
    connect_generation: u64,
    connecting: bool,
    opened_tx: mpsc::Sender<Opened>,
    transport: Option<Transport>,
    events: Option<mpsc::Receiver<TransportEvent>>,
    session_id: Arc<ArcSwapOption<String>>,
    pending_connects: Vec<oneshot::Sender<Result<String, ClientError>>>,
    updates_tx: mpsc::Sender<ReasoningUpdate>,
    reconnect: ReconnectPolicy,
    reconnect_at: Option<Pin<Box<Sleep>>>,
}

impl ReasoningActor {
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<ReasoningCommand>,
        mut opened_rx: mpsc::Receiver<Opened>,
    ) {
        loop {
            tokio::select! {
                cmd = command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                Some(opened) = opened_rx.recv() => self.handle_opened(opened).await,
                event = next_event(&mut self.events) => self.handle_event(event).await,
                _ = reconnect_due(&mut self.reconnect_at) => {
                    info!(
                        component = "reasoning",
                        event = "reasoning.reconnect.attempt",
                        attempt = self.reconnect.attempts(),
                        max_attempts = self.reconnect.max_attempts(),
                        "Attempting to reconnect"
                    );
                    self.open(true);
                }
            }
        }

        if let Some(mut transport) = self.transport.take() {
            transport.disconnect();
        }
        debug!(
            component = "reasoning",
            event = "reasoning.actor.ended",
            "Reasoning actor ended"
        );
    }

    async fn handle_command(&mut self, cmd: ReasoningCommand) {
        match cmd {
            ReasoningCommand::Connect { reply } => {
                if let Some(id) = self.session_id.load_full() {
                    let _ = reply.send(Ok(id.as_ref().clone()));
                    return;
                }
                self.pending_connects.push(reply);
                if self.transport.is_none() && !self.connecting {
                    self.open(false);
                }
            }

            ReasoningCommand::SendQuery {
                query,
                context,
                reply,
            } => {
                let result = match (&self.transport, self.session_id.load_full()) {
                    (Some(transport), Some(session_id)) if transport.is_open() => {
                        transport
                            .send(&ReasoningRequest::Query {
                                session_id: session_id.as_ref().clone(),
                                query,
                                context,
                            })
                            .await
                    }
                    (Some(transport), None) if transport.is_open() => {
                        Err(ClientError::NoActiveSession)
                    }
                    _ => Err(ClientError::NotConnected),
                };
                let _ = reply.send(result);
            }

            ReasoningCommand::Close { reply } => {
                self.connect_generation += 1;
                self.connecting = false;
                self.reconnect_at = None;
                self.reconnect.reset();
                if let Some(mut transport) = self.transport.take() {
                    let session_id = self.session_id.load_full().map(|id| id.as_ref().clone());
                    if let Err(e) = transport.send(&ReasoningRequest::Close { session_id }).await {
                        warn!(
                            component = "reasoning",
                            event = "reasoning.close.send_failed",
                            error = %e,
                            "Error sending close message"
                        );
                    }
                    transport.disconnect();
                }
                self.events = None;
                self.session_id.store(None);
                self.fail_pending(|| ClientError::NotConnected);
                let _ = reply.send(());
            }
        }
    }

    /// Start a bounded handshake off the actor task. `Close` supersedes it.
    fn open(&mut self, reconnect: bool) {
        self.connect_generation += 1;
        let generation = self.connect_generation;
        self.connecting = true;
        self.reconnect_at = None;

        info!(
            component = "reasoning",
            event = "reasoning.connecting",
            url = %self.url,
            reconnect,
            "Connecting to reasoning WebSocket"
        );

        let connector = self.connector.clone();
        let url = self.url.clone();
        let timeout = self.connect_timeout;
        let opened_tx = self.opened_tx.clone();
        tokio::spawn(async move {
            let result = connect_with_timeout(connector.as_ref(), &url, Some(timeout)).await;
            let _ = opened_tx
                .send(Opened {
                    generation,
                    reconnect,
                    result,
                })
                .await;
        });
    }

    async fn handle_opened(&mut self, opened: Opened) {
        if opened.generation != self.connect_generation {
            debug!(
                component = "reasoning",
                event = "reasoning.connect.stale",
                generation = opened.generation,
                "Discarding superseded connection"
            );
            return;
        }
        self.connecting = false;

        match opened.result {
            Ok(connection) => {
                self.transport = Some(connection.transport);
                self.events = Some(connection.events);
            }
            Err(e) if opened.reconnect => {
                error!(
                    component = "reasoning",
                    event = "reasoning.reconnect.failed",
                    error = %e,
                    "Failed to reconnect"
                );
                self.connection_lost().await;
            }
            Err(e) => {
                error!(
                    component = "reasoning",
                    event = "reasoning.connect.failed",
                    error = %e,
                    "Reasoning WebSocket connection failed"
                );
                match e {
                    ClientError::Timeout(what) => self.fail_pending(|| ClientError::Timeout(what)),
                    ClientError::Transport(reason) => {
                        self.fail_pending(|| ClientError::Transport(reason.clone()))
                    }
                    other => {
                        let reason = other.to_string();
                        self.fail_pending(|| ClientError::Transport(reason.clone()))
                    }
                }
            }
        }
    }

    async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(value) => match serde_json::from_value::<ReasoningEvent>(value) {
                Ok(event) => self.handle_server_event(event).await,
                Err(e) => {
                    error!(
                        component = "reasoning",
                        event = "reasoning.message.malformed",
                        error = %e,
                        "Error parsing WebSocket message"
                    );
                    self.emit(ReasoningUpdate::Error(PARSE_FAILED_MESSAGE.to_string()))
                        .await;
                }
            },
            TransportEvent::ParseError(_) => {
                self.emit(ReasoningUpdate::Error(PARSE_FAILED_MESSAGE.to_string()))
                    .await;
            }
            TransportEvent::Error(reason) => {
                error!(
                    component = "reasoning",
                    event = "reasoning.transport.error",
                    error = %reason,
                    "Reasoning WebSocket error"
                );
                self.emit(ReasoningUpdate::Error(SOCKET_ERROR_MESSAGE.to_string()))
                    .await;
                self.fail_pending(|| ClientError::Transport(reason.clone()));
                self.connection_lost().await;
            }
            TransportEvent::Closed => {
                info!(
                    component = "reasoning",
                    event = "reasoning.transport.closed",
                    "Reasoning WebSocket connection closed"
                );
                self.connection_lost().await;
            }
        }
    }

    async fn handle_server_event(&mut self, event: ReasoningEvent) {
        match event {
            ReasoningEvent::SessionCreated {
                session_id: Some(session_id),
            } => {
                info!(
                    component = "reasoning",
                    event = "reasoning.session.created",
                    session_id = %session_id,
                    "Reasoning session created"
                );
                self.session_id.store(Some(Arc::new(session_id.clone())));
                self.reconnect.reset();
                for reply in self.pending_connects.drain(..) {
                    let _ = reply.send(Ok(session_id.clone()));
                }
                self.emit(ReasoningUpdate::SessionCreated(session_id)).await;
            }
            ReasoningEvent::Processing {
                message: Some(message),
            } => self.emit(ReasoningUpdate::Processing(message)).await,
            ReasoningEvent::ReasoningStep { step: Some(step) } => {
                self.emit(ReasoningUpdate::Step(step)).await
            }
            ReasoningEvent::ReasoningComplete {
                result: Some(result),
            } => self.emit(ReasoningUpdate::Complete(result)).await,
            ReasoningEvent::Error { error: Some(error) } => {
                error!(
                    component = "reasoning",
                    event = "reasoning.server.error",
                    error = %error,
                    "Reasoning service error"
                );
                self.emit(ReasoningUpdate::Error(error)).await;
            }
            ReasoningEvent::SessionClosed { session_id } => {
                info!(
                    component = "reasoning",
                    event = "reasoning.session.closed",
                    session_id = ?session_id,
                    "Reasoning session closed"
                );
                self.session_id.store(None);
                self.emit(ReasoningUpdate::Closed).await;
            }
            ReasoningEvent::Unknown => warn!(
                component = "reasoning",
                event = "reasoning.message.unknown",
                "Unknown message type"
            ),
            other => debug!(
                component = "reasoning",
                event = "reasoning.message.incomplete",
                message = ?other,
                "Reasoning message missing its payload"
            ),
        }
    }

    /// Socket is gone: clear the session, notify, maybe schedule a retry.
    async fn connection_lost(&mut self) {
        self.transport = None;
        self.events = None;
        self.session_id.store(None);
        self.emit(ReasoningUpdate::Closed).await;

        match self.reconnect.next_delay() {
            Some(delay) => {
                info!(
                    component = "reasoning",
                    event = "reasoning.reconnect.scheduled",
                    attempt = self.reconnect.attempts(),
                    max_attempts = self.reconnect.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Reconnect scheduled"
                );
                self.reconnect_at = Some(Box::pin(tokio::time::sleep(delay)));
            }
            None => {
                warn!(
                    component = "reasoning",
                    event = "reasoning.reconnect.exhausted",
                    "Giving up on reasoning WebSocket"
                );
                self.fail_pending(|| ClientError::NotConnected);
            }
        }
    }

    fn fail_pending<F>(&mut self, err: F)
    where
        F: Fn() -> ClientError,
    {
        for reply in self.pending_connects.drain(..) {
            let _ = reply.send(Err(err()));
        }
    }

    async fn emit(&self, update: ReasoningUpdate) {
        if self.updates_tx.send(update).await.is_err() {
            debug!(
                component = "reasoning",
                event = "reasoning.update.dropped",
                "No listener for reasoning updates"
            );
        }
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<TransportEvent>>) -> TransportEvent {
    match events {
        Some(rx) => rx.recv().await.unwrap_or(TransportEvent::Closed),
        None => pending().await,
    }
}

async fn reconnect_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}
