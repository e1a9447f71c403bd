//! WebSocket layer: the console's live event feed.
//!
//! The endpoint at `/ws` lets observers subscribe to channels by name and
//! receive every [`crate::domain::ChannelEvent`] those channels publish.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
