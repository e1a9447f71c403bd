//! The resilient control channel.
//!
//! A [`Channel`] is a cheap, cloneable handle to a worker task that owns one
//! logical connection: the transport, the outbound queue, the reconnect
//! counter and timer, the pending-action tag and its recovery timer, and the
//! event log. The worker handles one event at a time (caller request,
//! transport event, timer), so a channel's state is never mutated
//! concurrently. Observers read [`ChannelSnapshot`]s through a
//! [`watch`] receiver and follow activity on the shared [`EventBus`].
//!
//! ```text
//!  connecting ──open──▶ open ──close/error──▶ closed
//!      ▲                                        │
//!      └──────── reconnect after backoff ◀──────┘
//! ```

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Sleep, sleep};
use utoipa::ToSchema;

use super::correlation::{Correlator, Inbound, InboundKind};
use super::queue::OutboundQueue;
use super::settings::ChannelSettings;
use super::transport::{Connector, TransportEvent, TransportHandle, WsConnector};
use crate::domain::{
    ChannelEvent, ChannelRole, ChannelSnapshot, Command, ConnectionState, EventBus, EventLog,
    LogLevel, PendingAction,
};
use crate::error::ChannelError;

/// What happened to a command handed to [`Channel::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    /// Handed to an open transport.
    Sent,
    /// Stored until the transport opens.
    Queued,
}

/// Requests from handles to the worker.
#[derive(Debug)]
enum Request {
    Send {
        command: Command,
        action: Option<String>,
        reply: oneshot::Sender<Result<SendOutcome, ChannelError>>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Handle to a running control channel.
///
/// Dropping the last handle tears the channel down.
#[derive(Debug, Clone)]
pub struct Channel {
    name: String,
    role: ChannelRole,
    requests: mpsc::UnboundedSender<Request>,
    snapshot: watch::Receiver<ChannelSnapshot>,
}

impl Channel {
    /// Starts a channel that connects over WebSocket.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn connect(settings: ChannelSettings, bus: EventBus) -> Self {
        Self::spawn(settings, Arc::new(WsConnector::new()), bus)
    }

    /// Starts a channel using `connector` to construct transports.
    ///
    /// The channel begins in [`ConnectionState::Connecting`] with its first
    /// transport already under construction. Must be called from within a
    /// tokio runtime.
    #[must_use]
    pub fn spawn(settings: ChannelSettings, connector: Arc<dyn Connector>, bus: EventBus) -> Self {
        let (requests, requests_rx) = mpsc::unbounded_channel();
        let worker = Worker::new(settings, connector, bus);
        let (snapshot_tx, snapshot) = watch::channel(worker.snapshot());
        let handle = Self {
            name: worker.settings.name.clone(),
            role: worker.settings.role,
            requests,
            snapshot,
        };
        tokio::spawn(worker.run(requests_rx, snapshot_tx));
        handle
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Control or broadcast.
    #[must_use]
    pub fn role(&self) -> ChannelRole {
        self.role
    }

    /// Sends `command` now if the transport is open, otherwise queues it.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ReceiveOnly`] on broadcast channels and
    /// [`ChannelError::ShutDown`] after teardown.
    pub async fn send(&self, command: Command) -> Result<SendOutcome, ChannelError> {
        self.request(command, None).await
    }

    /// Sends `command` as the pending action `action`.
    ///
    /// Sets the pending tag (replacing any current one) and arms the
    /// recovery timer before handing the command to [`Channel::send`]'s
    /// path. The tag clears on a correlated reply, a close, or the timeout.
    ///
    /// # Errors
    ///
    /// Same as [`Channel::send`].
    pub async fn issue(
        &self,
        action: impl Into<String>,
        command: Command,
    ) -> Result<SendOutcome, ChannelError> {
        self.request(command, Some(action.into())).await
    }

    /// Returns the latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ChannelSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.snapshot.borrow().state
    }

    /// Returns a receiver that is notified on every snapshot change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ChannelSnapshot> {
        self.snapshot.clone()
    }

    /// Tears the channel down: cancels both timers, closes the transport
    /// and stops reconnecting. Idempotent.
    pub async fn shutdown(&self) {
        let (done, done_rx) = oneshot::channel();
        if self.requests.send(Request::Shutdown { done }).is_ok() {
            let _ = done_rx.await;
        }
    }

    async fn request(
        &self,
        command: Command,
        action: Option<String>,
    ) -> Result<SendOutcome, ChannelError> {
        if self.role == ChannelRole::Broadcast {
            return Err(ChannelError::ReceiveOnly(self.name.clone()));
        }
        let (reply, reply_rx) = oneshot::channel();
        self.requests
            .send(Request::Send {
                command,
                action,
                reply,
            })
            .map_err(|_| ChannelError::ShutDown(self.name.clone()))?;
        reply_rx
            .await
            .map_err(|_| ChannelError::ShutDown(self.name.clone()))?
    }
}

/// Owns all mutable state of one channel. Runs on its own task.
struct Worker {
    settings: ChannelSettings,
    connector: Arc<dyn Connector>,
    bus: EventBus,
    correlator: Correlator,
    state: ConnectionState,
    attempt: u32,
    transport: Option<TransportHandle>,
    queue: OutboundQueue,
    pending: Option<PendingAction>,
    last_message: Option<String>,
    last_state: Option<Value>,
    identity: Option<String>,
    log: EventLog,
    reconnect: Option<Pin<Box<Sleep>>>,
    recovery: Option<Pin<Box<Sleep>>>,
    torn_down: bool,
}

impl Worker {
    fn new(settings: ChannelSettings, connector: Arc<dyn Connector>, bus: EventBus) -> Self {
        let correlator =
            Correlator::new(settings.domain.clone(), settings.correlation_field.clone());
        let log = EventLog::new(settings.log_capacity);
        Self {
            settings,
            connector,
            bus,
            correlator,
            state: ConnectionState::Connecting,
            attempt: 0,
            transport: None,
            queue: OutboundQueue::new(),
            pending: None,
            last_message: None,
            last_state: None,
            identity: None,
            log,
            reconnect: None,
            recovery: None,
            torn_down: false,
        }
    }

    async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<Request>,
        snapshot_tx: watch::Sender<ChannelSnapshot>,
    ) {
        self.connect();
        snapshot_tx.send_replace(self.snapshot());

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(Request::Send { command, action, reply }) => {
                        let outcome = self.handle_send(command, action);
                        // Callers read the snapshot right after the reply.
                        snapshot_tx.send_replace(self.snapshot());
                        let _ = reply.send(outcome);
                        continue;
                    }
                    Some(Request::Shutdown { done }) => {
                        self.teardown();
                        snapshot_tx.send_replace(self.snapshot());
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        self.teardown();
                        break;
                    }
                },
                event = next_event(&mut self.transport) => self.on_transport_event(event),
                () = expired(&mut self.reconnect) => {
                    self.reconnect = None;
                    self.connect();
                }
                () = expired(&mut self.recovery) => {
                    self.recovery = None;
                    self.on_timeout();
                }
            }
            snapshot_tx.send_replace(self.snapshot());
        }

        snapshot_tx.send_replace(self.snapshot());
        tracing::debug!(channel = %self.settings.name, "channel worker stopped");
    }

    fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            name: self.settings.name.clone(),
            endpoint: self.settings.endpoint.clone(),
            role: self.settings.role,
            state: self.state,
            attempt: self.attempt,
            queued: self.queue.len(),
            pending: self.pending.clone(),
            last_message: self.last_message.clone(),
            last_state: self.last_state.clone(),
            identity: self.identity.clone(),
            log: self.log.newest_first(),
            torn_down: self.torn_down,
        }
    }

    // ---- lifecycle -------------------------------------------------------

    /// Constructs a fresh transport. A construction failure counts as an
    /// immediate close.
    fn connect(&mut self) {
        if self.torn_down {
            return;
        }
        if let Some(old) = self.transport.take() {
            old.close();
        }
        self.set_state(ConnectionState::Connecting);

        match self.connector.connect(&self.settings.endpoint) {
            Ok(handle) => {
                self.transport = Some(handle);
                tracing::debug!(
                    channel = %self.settings.name,
                    url = %self.settings.endpoint,
                    attempt = self.attempt,
                    "connecting"
                );
            }
            Err(e) => {
                tracing::warn!(channel = %self.settings.name, error = %e, "connect failed");
                self.log(LogLevel::Warn, format!("connect error: {e}"));
                self.on_closed(Some(e.to_string()));
            }
        }
    }

    fn on_transport_event(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::Opened) => self.on_open(),
            Some(TransportEvent::Text(text)) => self.on_message(&text),
            Some(TransportEvent::Error(reason)) => {
                tracing::warn!(channel = %self.settings.name, %reason, "transport error");
                self.log(LogLevel::Warn, format!("transport error: {reason}"));
            }
            Some(TransportEvent::Closed { reason }) => self.on_closed(reason),
            None => self.on_closed(None),
        }
    }

    fn on_open(&mut self) {
        self.attempt = 0;
        self.set_state(ConnectionState::Open);
        tracing::info!(channel = %self.settings.name, url = %self.settings.endpoint, "connected");
        self.log(LogLevel::Info, "connected");

        let flushed = self.flush_queue();
        if flushed > 0 {
            self.log(LogLevel::Info, format!("flushed {flushed} queued command(s)"));
        }

        if self.settings.role == ChannelRole::Control
            && let Some(kind) = self.settings.status_request.clone()
        {
            self.transmit_or_queue(Command::new(kind));
        }
    }

    fn on_closed(&mut self, reason: Option<String>) {
        self.transport = None;
        self.set_state(ConnectionState::Closed);
        self.clear_pending("closed");

        match &reason {
            Some(reason) => self.log(LogLevel::Info, format!("disconnected: {reason}")),
            None => self.log(LogLevel::Info, "disconnected"),
        }
        tracing::info!(channel = %self.settings.name, reason = ?reason, "disconnected");

        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.torn_down || !self.settings.auto_reconnect || self.reconnect.is_some() {
            return;
        }
        self.attempt = self.attempt.saturating_add(1);
        let delay = self.settings.backoff.delay(self.attempt);
        self.reconnect = Some(Box::pin(sleep(delay)));

        let delay_ms = delay.as_millis();
        tracing::info!(
            channel = %self.settings.name,
            attempt = self.attempt,
            delay_ms = %delay_ms,
            "reconnect scheduled"
        );
        self.log(
            LogLevel::Info,
            format!("reconnecting in {delay_ms} ms (attempt {})", self.attempt),
        );
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.reconnect = None;
        self.recovery = None;
        self.pending = None;
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
        self.set_state(ConnectionState::Closed);
        self.log(LogLevel::Info, "shut down");
        tracing::info!(channel = %self.settings.name, "channel shut down");
    }

    // ---- outbound --------------------------------------------------------

    fn handle_send(
        &mut self,
        mut command: Command,
        action: Option<String>,
    ) -> Result<SendOutcome, ChannelError> {
        if self.torn_down {
            return Err(ChannelError::ShutDown(self.settings.name.clone()));
        }
        if self.settings.role == ChannelRole::Broadcast {
            return Err(ChannelError::ReceiveOnly(self.settings.name.clone()));
        }

        if let Some(tag) = action {
            let correlation_id = self.settings.correlation_field.clone().map(|field| {
                let id = uuid::Uuid::new_v4().to_string();
                command.insert(field, id.clone());
                id
            });
            let next = PendingAction::new(tag, correlation_id).superseding(self.pending.as_ref());
            if let Some(previous) = &next.superseded {
                self.log(
                    LogLevel::Warn,
                    format!("{} issued while {previous} still pending", next.tag),
                );
            }
            self.pending = Some(next);
            self.recovery = Some(Box::pin(sleep(self.settings.action_timeout)));
        }

        Ok(self.transmit_or_queue(command))
    }

    fn transmit_or_queue(&mut self, command: Command) -> SendOutcome {
        if self.state == ConnectionState::Open
            && let Some(transport) = &self.transport
            && let Ok(text) = command.to_json()
            && transport.transmit(text)
        {
            return SendOutcome::Sent;
        }
        self.queue.push(command);
        SendOutcome::Queued
    }

    /// Hands every queued command to the open transport, oldest first.
    fn flush_queue(&mut self) -> usize {
        let Some(transport) = &self.transport else {
            return 0;
        };
        let mut flushed = 0;
        while let Some(command) = self.queue.pop() {
            let Ok(text) = command.to_json() else {
                continue;
            };
            if !transport.transmit(text) {
                self.queue.requeue(command);
                break;
            }
            flushed += 1;
        }
        flushed
    }

    // ---- inbound ---------------------------------------------------------

    fn on_message(&mut self, text: &str) {
        let Ok(inbound) = self.correlator.classify(text) else {
            tracing::debug!(channel = %self.settings.name, "malformed payload");
            self.log(LogLevel::Info, format!("malformed payload: {text}"));
            return;
        };

        if let Some(identity) = &inbound.identity {
            self.identity = Some(identity.clone());
        }
        if inbound.reset {
            self.identity = None;
        }
        if let Some(message) = &inbound.message {
            self.last_message = Some(message.clone());
        } else if inbound.kind == InboundKind::ServerError {
            self.last_message = Some("error".to_string());
        }
        self.last_state = Some(inbound.payload.clone());

        let level = if inbound.kind == InboundKind::ServerError {
            LogLevel::Error
        } else {
            LogLevel::Info
        };
        self.log(level, inbound.describe());

        let completed = self.completes_pending(&inbound);
        if completed && let Some(done) = self.pending.take() {
            self.recovery = None;
            if let Some(earlier) = done.superseded {
                self.log(
                    LogLevel::Warn,
                    format!("reply cleared {} but may belong to earlier {earlier}", done.tag),
                );
            }
        }

        self.bus.publish(ChannelEvent::ServerMessage {
            channel: self.settings.name.clone(),
            payload: inbound.payload,
            completed_pending: completed,
            timestamp: Utc::now(),
        });
    }

    /// Exact match when both sides carry a correlation id, otherwise the
    /// shape heuristic.
    fn completes_pending(&mut self, inbound: &Inbound) -> bool {
        let Some(pending) = &self.pending else {
            return false;
        };
        if let (Some(expected), Some(received)) = (&pending.correlation_id, &inbound.correlation) {
            if pending.matches_correlation(received) {
                return true;
            }
            let stale = format!("stale reply {received} ignored (waiting for {expected})");
            self.log(LogLevel::Warn, stale);
            return false;
        }
        inbound.kind.completes_pending()
    }

    fn on_timeout(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let timeout_ms = self.settings.action_timeout.as_millis();
        tracing::warn!(
            channel = %self.settings.name,
            action = %pending.tag,
            timeout_ms = %timeout_ms,
            "no reply before timeout"
        );
        self.log(
            LogLevel::Warn,
            format!("no reply to {} within {timeout_ms} ms", pending.tag),
        );
        self.bus.publish(ChannelEvent::PendingCleared {
            channel: self.settings.name.clone(),
            tag: pending.tag,
            reason: "timeout",
            timestamp: Utc::now(),
        });
    }

    fn clear_pending(&mut self, reason: &'static str) {
        self.recovery = None;
        if let Some(pending) = self.pending.take() {
            self.bus.publish(ChannelEvent::PendingCleared {
                channel: self.settings.name.clone(),
                tag: pending.tag,
                reason,
                timestamp: Utc::now(),
            });
        }
    }

    // ---- observability ---------------------------------------------------

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state && state != ConnectionState::Connecting {
            return;
        }
        self.state = state;
        self.bus.publish(ChannelEvent::StateChanged {
            channel: self.settings.name.clone(),
            state,
            attempt: self.attempt,
            timestamp: Utc::now(),
        });
    }

    fn log(&mut self, level: LogLevel, text: impl Into<String>) {
        let entry = self.log.push(level, text);
        self.bus.publish(ChannelEvent::Logged {
            channel: self.settings.name.clone(),
            entry,
        });
    }
}

async fn next_event(transport: &mut Option<TransportHandle>) -> Option<TransportEvent> {
    match transport {
        Some(transport) => transport.next_event().await,
        None => pending().await,
    }
}

async fn expired(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}
