//! Transport abstraction: one full-duplex text connection per channel.
//!
//! A [`Connector`] constructs transports. Construction returns immediately
//! with a [`TransportHandle`]; establishment, inbound frames, errors and
//! closure then arrive as [`TransportEvent`]s. The far end of the handle is
//! a [`TransportPeer`], driven either by the WebSocket task spawned by
//! [`WsConnector`] or directly by a test through [`MemoryConnector`].
//!
//! Dropping a handle closes the transport and discards any events it still
//! had in flight, so a replaced transport can never act on its channel.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;

use crate::domain::Endpoint;
use crate::error::ChannelError;

/// Something that happened on a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established.
    Opened,
    /// A text frame arrived.
    Text(String),
    /// A transport-level error occurred. A [`TransportEvent::Closed`]
    /// follows when the error ends the connection.
    Error(String),
    /// The connection ended.
    Closed {
        /// Close reason, if the remote or the error supplied one.
        reason: Option<String>,
    },
}

/// Channel-side end of a transport.
#[derive(Debug)]
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    shutdown: Option<oneshot::Sender<()>>,
}

/// Remote-side end of a transport.
#[derive(Debug)]
pub struct TransportPeer {
    outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
    shutdown: oneshot::Receiver<()>,
}

impl TransportHandle {
    /// Creates a connected handle/peer pair.
    #[must_use]
    pub fn pair() -> (Self, TransportPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = oneshot::channel();
        (
            Self {
                outbound: outbound_tx,
                events: events_rx,
                shutdown: Some(close_tx),
            },
            TransportPeer {
                outbound: outbound_rx,
                events: events_tx,
                shutdown: close_rx,
            },
        )
    }

    /// Hands a text frame to the transport. Returns `false` if the
    /// transport is already gone.
    pub fn transmit(&self, text: String) -> bool {
        self.outbound.send(text).is_ok()
    }

    /// Waits for the next event. `None` means the peer vanished without
    /// reporting a close.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Requests an orderly close and drops the handle.
    pub fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

impl TransportPeer {
    /// Reports that the connection is established.
    pub fn open(&self) -> bool {
        self.emit(TransportEvent::Opened)
    }

    /// Delivers a text frame to the channel.
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.emit(TransportEvent::Text(text.into()))
    }

    /// Reports a transport error.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.emit(TransportEvent::Error(reason.into()))
    }

    /// Reports that the connection ended.
    pub fn close(&self, reason: Option<String>) -> bool {
        self.emit(TransportEvent::Closed { reason })
    }

    /// Waits for the next frame the channel transmits. `None` once the
    /// channel dropped its handle.
    pub async fn next_frame(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Returns a frame the channel already transmitted, without waiting.
    pub fn try_next_frame(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Resolves once the channel closed or dropped its handle.
    pub async fn closed_by_channel(&mut self) {
        let _ = (&mut self.shutdown).await;
    }

    /// Returns `true` if the channel side is gone.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.events.is_closed()
    }

    /// Sends an event; `false` if the channel no longer listens.
    fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }
}

/// Constructs transports for an endpoint.
pub trait Connector: Send + Sync + fmt::Debug {
    /// Starts connecting to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot even be constructed
    /// (invalid request, refused by the connector). The channel treats this
    /// as an immediate close.
    fn connect(&self, endpoint: &Endpoint) -> Result<TransportHandle, ChannelError>;
}

/// WebSocket connector backed by `tokio-tungstenite`.
///
/// Each call spawns a task that performs the handshake and pumps frames
/// between the socket and the returned handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Creates a WebSocket connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    fn connect(&self, endpoint: &Endpoint) -> Result<TransportHandle, ChannelError> {
        let mut request = endpoint.url().into_client_request()?;
        if !endpoint.protocols().is_empty() {
            let value = HeaderValue::from_str(&endpoint.protocols().join(", "))
                .map_err(|e| ChannelError::Connect(format!("invalid sub-protocol: {e}")))?;
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
        }
        tracing::debug!(%endpoint, secure = endpoint.is_secure(), "opening ws transport");
        let (handle, peer) = TransportHandle::pair();
        tokio::spawn(run_ws_transport(request, peer));
        Ok(handle)
    }
}

/// Drives one WebSocket connection until it ends or the channel lets go.
async fn run_ws_transport(request: Request, mut peer: TransportPeer) {
    let connected = tokio::select! {
        result = connect_async(request) => result,
        _ = &mut peer.shutdown => return,
    };
    let stream = match connected {
        Ok((stream, _response)) => stream,
        Err(e) => {
            let reason = e.to_string();
            peer.fail(reason.clone());
            peer.close(Some(reason));
            return;
        }
    };
    peer.open();

    let (mut sink, mut source) = stream.split();
    let reason = loop {
        tokio::select! {
            frame = peer.outbound.recv() => {
                let Some(text) = frame else {
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                };
                if let Err(e) = sink.send(Message::text(text)).await {
                    let reason = e.to_string();
                    peer.fail(reason.clone());
                    break Some(reason);
                }
            }
            _ = &mut peer.shutdown => {
                let _ = sink.send(Message::Close(None)).await;
                return;
            }
            msg = source.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        peer.push_text(text.as_str());
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        peer.push_text(String::from_utf8_lossy(&bytes).into_owned());
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map(|f| f.reason.as_str().to_owned()).filter(|r| !r.is_empty());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let reason = e.to_string();
                        peer.fail(reason.clone());
                        break Some(reason);
                    }
                    None => break None,
                }
            }
        }
    };

    tracing::debug!(reason = ?reason, "ws transport ended");
    peer.close(reason);
}

/// In-memory connector: every constructed transport's peer is handed to
/// the receiver returned by [`MemoryConnector::channel`].
///
/// Useful for driving channels deterministically in tests and demos.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<TransportPeer>,
    failures: Arc<AtomicUsize>,
}

impl MemoryConnector {
    /// Creates a connector and the receiver its peers are delivered to.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (
            Self {
                peers,
                failures: Arc::new(AtomicUsize::new(0)),
            },
            rx,
        )
    }

    /// Makes the next `count` constructions fail.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, endpoint: &Endpoint) -> Result<TransportHandle, ChannelError> {
        let refused = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ChannelError::Connect(format!("{endpoint}: refused")));
        }
        let (handle, peer) = TransportHandle::pair();
        self.peers
            .send(peer)
            .map_err(|_| ChannelError::Connect("memory connector has no receiver".to_string()))?;
        Ok(handle)
    }
}
