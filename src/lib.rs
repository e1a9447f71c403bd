//! # stream-control
//!
//! Resilient WebSocket control channels for a live-stream control panel,
//! plus a headless console that exposes them over HTTP and WebSocket.
//!
//! A [`channel::Channel`] keeps one logical connection to a control
//! endpoint alive. It queues commands while disconnected and reconnects
//! with capped exponential backoff. It also tracks one pending action that
//! clears on a recognizable server reply, on close, or after a recovery
//! timeout. Every state change lands in a bounded per-channel event log and
//! on a shared [`domain::EventBus`].
//!
//! ## Architecture
//!
//! ```text
//! Operators (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Event Feed (ws/)
//!     │
//!     ├── ChannelRegistry (channel/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── Channel workers (channel/client)
//!     │
//!     └── Connector ── tokio-tungstenite ── control servers
//! ```

pub mod api;
pub mod app_state;
pub mod channel;
pub mod config;
pub mod domain;
pub mod error;
pub mod ws;
