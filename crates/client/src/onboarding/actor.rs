//! Onboarding actor: owns one flow's state, its socket and its reconnects.
//!
//! The flow runs as an independent tokio task. External callers talk to it
//! through `OnboardingHandle`, which sends `OnboardingCommand`s over an mpsc
//! channel. Every mutation goes through `transition()`; the actor only
//! executes the returned effects. Lock-free reads go through `ArcSwap` and a
//! `watch` channel carries the revision for change notification.

use std::collections::VecDeque;
use std::future::pending;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use jobtrack_protocol::{new_id, OnboardingEvent, OnboardingRequest};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};

use super::command::OnboardingCommand;
use super::state::{OnboardingState, ResumeFile};
use super::transition::{transition, Effect, Input, TransportLoss};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::reasoning::{ReasoningClient, ReasoningState, ReasoningUpdate};
use crate::reconnect::ReconnectPolicy;
use crate::transport::{connect_with_timeout, Connection, Connector, Transport, TransportEvent};

/// Point-in-time view of a flow, published after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OnboardingSnapshot {
    pub revision: u64,
    pub state: OnboardingState,
    pub reasoning: ReasoningState,
}

/// Handle to a running onboarding actor (cheap to Clone).
#[derive(Clone)]
pub struct OnboardingHandle {
    command_tx: mpsc::Sender<OnboardingCommand>,
    snapshot: Arc<ArcSwap<OnboardingSnapshot>>,
    revision_rx: watch::Receiver<u64>,
}

impl OnboardingHandle {
    /// Spawn the actor with its own reasoning sub-session on `connector`.
    pub fn start(connector: Arc<dyn Connector>, config: ClientConfig) -> Self {
        let (reasoning, reasoning_updates) = ReasoningClient::spawn(connector.clone(), &config);
        Self::spawn(connector, reasoning, reasoning_updates, config)
    }

    /// Spawn the actor around an existing reasoning client.
    pub fn spawn(
        connector: Arc<dyn Connector>,
        reasoning: ReasoningClient,
        reasoning_updates: mpsc::Receiver<ReasoningUpdate>,
        config: ClientConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (internal_tx, internal_rx) = mpsc::channel(64);
        let (revision_tx, revision_rx) = watch::channel(0);
        let snapshot = Arc::new(ArcSwap::from_pointee(OnboardingSnapshot::default()));

        let actor = OnboardingActor {
            state: OnboardingState::default(),
            reasoning_state: ReasoningState::default(),
            revision: 0,
            dirty: false,
            reconnect: ReconnectPolicy::from_config(&config),
            reconnect_at: None,
            config,
            connector,
            reasoning,
            reasoning_updates,
            transport: None,
            events: None,
            connect_generation: 0,
            reasoning_generation: 0,
            internal_tx,
            snapshot: snapshot.clone(),
            revision_tx,
        };
        tokio::spawn(actor.run(command_rx, internal_rx));

        OnboardingHandle {
            command_tx,
            snapshot,
            revision_rx,
        }
    }

    /// Send a command to the actor (fire-and-forget).
    pub async fn send(&self, cmd: OnboardingCommand) {
        if self.command_tx.send(cmd).await.is_err() {
            warn!(
                component = "onboarding_actor",
                "Actor channel closed, command dropped"
            );
        }
    }

    pub async fn open_modal(&self) {
        self.send(OnboardingCommand::OpenModal).await;
    }

    pub async fn close_modal(&self) {
        self.send(OnboardingCommand::CloseModal).await;
    }

    pub async fn set_resume_file(&self, file: ResumeFile) {
        self.send(OnboardingCommand::SetResumeFile { file }).await;
    }

    /// Read a resume from disk and hand it to the flow. Non-PDF names are
    /// passed through unread so the flow can reject them.
    pub async fn set_resume_path(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let unread = ResumeFile::from_name_and_bytes(name.clone(), Vec::new());
        if !unread.is_pdf() {
            self.set_resume_file(unread).await;
            return;
        }

        match tokio::fs::read(path).await {
            Ok(content) => {
                self.set_resume_file(ResumeFile::from_name_and_bytes(name, content))
                    .await
            }
            Err(e) => {
                self.send(OnboardingCommand::ResumeReadFailed {
                    reason: e.to_string(),
                })
                .await
            }
        }
    }

    pub async fn submit_answer(&self, text: impl Into<String>) {
        self.send(OnboardingCommand::SubmitAnswer { text: text.into() })
            .await;
    }

    pub async fn start_reasoning(&self, query: impl Into<String>) {
        self.send(OnboardingCommand::StartReasoning {
            query: query.into(),
        })
        .await;
    }

    pub async fn stop_reasoning(&self) {
        self.send(OnboardingCommand::StopReasoning).await;
    }

    /// Lock-free snapshot read.
    pub fn snapshot(&self) -> Arc<OnboardingSnapshot> {
        self.snapshot.load_full()
    }

    /// Revision notifications; pair with `snapshot()`.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_rx.clone()
    }

    /// Snapshot taken after every previously sent command was applied.
    pub async fn state(&self) -> Result<Arc<OnboardingSnapshot>, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(OnboardingCommand::GetSnapshot { reply })
            .await
            .map_err(|_| ClientError::ChannelClosed)?;
        rx.await.map_err(|_| ClientError::ChannelClosed)
    }
}

/// Completions of work the actor spawned off its own task.
enum Internal {
    Connected {
        generation: u64,
        result: Result<Connection, ClientError>,
    },
    ReasoningConnected {
        generation: u64,
        query: String,
        result: Result<String, ClientError>,
    },
}

struct OnboardingActor {
    state: OnboardingState,
    reasoning_state: ReasoningState,
    revision: u64,
    dirty: bool,
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    reasoning: ReasoningClient,
    reasoning_updates: mpsc::Receiver<ReasoningUpdate>,
    transport: Option<Transport>,
    events: Option<mpsc::Receiver<TransportEvent>>,
    /// Bumped whenever the socket is replaced; stale connects are dropped.
    connect_generation: u64,
    /// Bumped on every start/stop; stale reasoning connects are dropped.
    reasoning_generation: u64,
    reconnect: ReconnectPolicy,
    reconnect_at: Option<Pin<Box<Sleep>>>,
    internal_tx: mpsc::Sender<Internal>,
    snapshot: Arc<ArcSwap<OnboardingSnapshot>>,
    revision_tx: watch::Sender<u64>,
}

impl OnboardingActor {
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<OnboardingCommand>,
        mut internal_rx: mpsc::Receiver<Internal>,
    ) {
        loop {
            tokio::select! {
                cmd = command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                Some(msg) = internal_rx.recv() => self.handle_internal(msg).await,
                event = next_event(&mut self.events) => self.handle_transport_event(event).await,
                Some(update) = self.reasoning_updates.recv() => self.handle_reasoning_update(update),
                _ = reconnect_due(&mut self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.reconnect_now();
                }
            }
            self.publish();
        }

        self.drop_socket();
        self.reasoning.close_in_background();
        debug!(
            component = "onboarding_actor",
            event = "onboarding.actor.ended",
            "Onboarding actor ended"
        );
    }

    async fn handle_command(&mut self, cmd: OnboardingCommand) {
        match cmd {
            OnboardingCommand::OpenModal => self.apply(Input::OpenModal).await,
            OnboardingCommand::CloseModal => self.apply(Input::CloseModal).await,
            OnboardingCommand::SetResumeFile { file } => {
                self.apply(Input::ResumeSelected {
                    file,
                    session_id: new_id(),
                })
                .await
            }
            OnboardingCommand::ResumeReadFailed { reason } => {
                self.apply(Input::ResumeReadFailed { reason }).await
            }
            OnboardingCommand::SubmitAnswer { text } => {
                self.apply(Input::SubmitAnswer { text }).await
            }
            OnboardingCommand::StartReasoning { query } => self.start_reasoning(query),
            OnboardingCommand::StopReasoning => self.stop_reasoning(),
            OnboardingCommand::GetSnapshot { reply } => {
                self.publish();
                let _ = reply.send(self.snapshot.load_full());
            }
        }
    }

    /// Run `input` through the transition function, then execute its
    /// effects. Effects may feed follow-up inputs back in.
    async fn apply(&mut self, input: Input) {
        let mut queue = VecDeque::from([input]);
        while let Some(input) = queue.pop_front() {
            let now = chrono_now();
            let state = std::mem::take(&mut self.state);
            let (next, effects) = transition(state, input, &now);
            self.state = next;
            self.dirty = true;

            for effect in effects {
                if let Some(follow_up) = self.execute(effect).await {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    async fn execute(&mut self, effect: Effect) -> Option<Input> {
        match effect {
            Effect::Connect { session_id } => {
                self.open_socket(&session_id);
                None
            }
            Effect::Send(request) => {
                let result = match &self.transport {
                    Some(transport) => transport.send(&request).await,
                    None => Err(ClientError::NotConnected),
                };
                match result {
                    Ok(()) => matches!(request, OnboardingRequest::StartWithResume { .. })
                        .then_some(Input::UploadDelivered),
                    Err(e) => {
                        error!(
                            component = "onboarding_actor",
                            event = "onboarding.send.failed",
                            session_id = ?self.state.session_id,
                            error = %e,
                            "Failed to send onboarding message"
                        );
                        Some(Input::SendFailed { request })
                    }
                }
            }
            Effect::Disconnect => {
                self.drop_socket();
                None
            }
            Effect::StopReasoning => {
                self.stop_reasoning();
                None
            }
        }
    }

    fn open_socket(&mut self, session_id: &str) {
        self.connect_generation += 1;
        let generation = self.connect_generation;
        let url = self.config.onboarding_url(session_id);
        let timeout = self.config.onboarding_connect_timeout();
        let connector = self.connector.clone();
        let internal_tx = self.internal_tx.clone();

        info!(
            component = "onboarding_actor",
            event = "onboarding.connecting",
            session_id = %session_id,
            url = %url,
            "Connecting to onboarding WebSocket"
        );

        tokio::spawn(async move {
            let result = connect_with_timeout(connector.as_ref(), &url, timeout).await;
            let _ = internal_tx
                .send(Internal::Connected { generation, result })
                .await;
        });
    }

    /// Drop the socket and forget any pending connect or reconnect.
    fn drop_socket(&mut self) {
        self.connect_generation += 1;
        self.reconnect_at = None;
        self.reconnect.reset();
        self.events = None;
        if let Some(mut transport) = self.transport.take() {
            transport.disconnect();
        }
    }

    async fn handle_internal(&mut self, msg: Internal) {
        match msg {
            Internal::Connected { generation, result } => {
                if generation != self.connect_generation {
                    debug!(
                        component = "onboarding_actor",
                        event = "onboarding.connect.stale",
                        generation,
                        "Discarding superseded connection"
                    );
                    return;
                }
                match result {
                    Ok(connection) => {
                        info!(
                            component = "onboarding_actor",
                            event = "onboarding.connected",
                            session_id = ?self.state.session_id,
                            "Onboarding WebSocket connected"
                        );
                        self.transport = Some(connection.transport);
                        self.events = Some(connection.events);
                        self.apply(Input::TransportOpened).await;
                    }
                    Err(e) => {
                        error!(
                            component = "onboarding_actor",
                            event = "onboarding.connect.failed",
                            session_id = ?self.state.session_id,
                            error = %e,
                            "Failed to connect onboarding WebSocket"
                        );
                        self.connection_lost(TransportLoss::Error(e.to_string()))
                            .await;
                    }
                }
            }

            Internal::ReasoningConnected {
                generation,
                query,
                result,
            } => {
                if generation != self.reasoning_generation {
                    return;
                }
                let now = chrono_now();
                self.dirty = true;
                match result {
                    Ok(session_id) => {
                        debug!(
                            component = "onboarding_actor",
                            event = "onboarding.reasoning.ready",
                            reasoning_session_id = %session_id,
                            "Reasoning session ready"
                        );
                        self.reasoning_state
                            .query_sent(&mut self.state.transcript, &query, &now);
                        if let Err(e) = self
                            .reasoning
                            .send_query(&query, &self.config.reasoning_context)
                            .await
                        {
                            error!(
                                component = "onboarding_actor",
                                event = "onboarding.reasoning.send_failed",
                                error = %e,
                                "Failed to send reasoning query"
                            );
                            self.reasoning_state.apply(
                                ReasoningUpdate::Error(e.to_string()),
                                &mut self.state.transcript,
                                &now,
                            );
                        }
                    }
                    Err(e) => {
                        error!(
                            component = "onboarding_actor",
                            event = "onboarding.reasoning.connect_failed",
                            error = %e,
                            "Failed to connect to reasoning service"
                        );
                        self.reasoning_state
                            .connect_failed(&mut self.state.transcript, &now);
                    }
                }
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(value) => {
                match serde_json::from_value::<OnboardingEvent>(value) {
                    Ok(event) => {
                        // A socket that opens and drops without ever talking
                        // keeps spending the retry budget.
                        self.reconnect.reset();
                        self.apply(Input::Server(event)).await
                    }
                    Err(e) => {
                        self.apply(Input::Malformed {
                            reason: e.to_string(),
                        })
                        .await
                    }
                }
            }
            TransportEvent::ParseError(reason) => self.apply(Input::Malformed { reason }).await,
            TransportEvent::Error(reason) => {
                self.connection_lost(TransportLoss::Error(reason)).await
            }
            TransportEvent::Closed => self.connection_lost(TransportLoss::Closed).await,
        }
    }

    /// The socket is gone (or never came up). Retry while the flow still
    /// wants it and the budget allows, otherwise let the flow fail.
    async fn connection_lost(&mut self, loss: TransportLoss) {
        self.transport = None;
        self.events = None;

        if self.state.expects_connection() {
            if let Some(delay) = self.reconnect.next_delay() {
                info!(
                    component = "onboarding_actor",
                    event = "onboarding.reconnect.scheduled",
                    session_id = ?self.state.session_id,
                    attempt = self.reconnect.attempts(),
                    max_attempts = self.reconnect.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    loss = ?loss,
                    "Attempting to reconnect"
                );
                self.reconnect_at = Some(Box::pin(tokio::time::sleep(delay)));
                self.apply(Input::TransportInterrupted).await;
                return;
            }
            warn!(
                component = "onboarding_actor",
                event = "onboarding.reconnect.exhausted",
                session_id = ?self.state.session_id,
                max_attempts = self.reconnect.max_attempts(),
                "Max reconnection attempts reached"
            );
        }

        self.apply(Input::TransportLost(loss)).await;
    }

    fn reconnect_now(&mut self) {
        match self.state.session_id.clone() {
            Some(session_id) if self.state.expects_connection() => self.open_socket(&session_id),
            _ => debug!(
                component = "onboarding_actor",
                event = "onboarding.reconnect.skipped",
                "Flow no longer needs a socket"
            ),
        }
    }

    fn start_reasoning(&mut self, query: String) {
        self.reasoning_generation += 1;
        let generation = self.reasoning_generation;
        self.reasoning_state.begin();
        self.dirty = true;

        info!(
            component = "onboarding_actor",
            event = "onboarding.reasoning.start",
            "Starting reasoning query"
        );

        let reasoning = self.reasoning.clone();
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = reasoning.connect().await;
            let _ = internal_tx
                .send(Internal::ReasoningConnected {
                    generation,
                    query,
                    result,
                })
                .await;
        });
    }

    fn stop_reasoning(&mut self) {
        self.reasoning_generation += 1;
        self.reasoning_state.stop();
        self.dirty = true;
        self.reasoning.close_in_background();
    }

    fn handle_reasoning_update(&mut self, update: ReasoningUpdate) {
        if !self.reasoning_state.active {
            debug!(
                component = "onboarding_actor",
                event = "onboarding.reasoning.update_ignored",
                update = ?update,
                "Reasoning update without an active query"
            );
            return;
        }
        let now = chrono_now();
        self.reasoning_state
            .apply(update, &mut self.state.transcript, &now);
        self.dirty = true;
    }

    fn publish(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        self.revision += 1;
        self.snapshot.store(Arc::new(OnboardingSnapshot {
            revision: self.revision,
            state: self.state.clone(),
            reasoning: self.reasoning_state.clone(),
        }));
        self.revision_tx.send_replace(self.revision);
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

fn chrono_now() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}Z", secs)
}
