//! Channel lifecycle tests driven through the in-memory connector.
//!
//! Time is paused, so reconnect and recovery timers fire as soon as the
//! runtime has nothing else to do.

#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

use stream_control::channel::{
    Channel, ChannelSettings, MemoryConnector, SendOutcome, TransportPeer,
};
use stream_control::domain::{
    ChannelEvent, ChannelSnapshot, Command, ConnectionState, Endpoint, EventBus, LogLevel,
};
use stream_control::error::ChannelError;

fn settings(name: &str) -> ChannelSettings {
    let Ok(endpoint) = Endpoint::new(format!("ws://localhost:8000/ws/{name}")) else {
        panic!("valid endpoint");
    };
    ChannelSettings::new(name, endpoint).with_domain(name)
}

fn start(settings: ChannelSettings) -> (Channel, MemoryConnector, UnboundedReceiver<TransportPeer>) {
    let (connector, peers) = MemoryConnector::channel();
    let channel = Channel::spawn(settings, Arc::new(connector.clone()), EventBus::default());
    (channel, connector, peers)
}

async fn next_peer(peers: &mut UnboundedReceiver<TransportPeer>) -> TransportPeer {
    let Some(peer) = peers.recv().await else {
        panic!("connector dropped");
    };
    peer
}

async fn until(channel: &Channel, f: impl FnMut(&ChannelSnapshot) -> bool) -> ChannelSnapshot {
    let mut rx = channel.watch();
    let Ok(snapshot) = rx.wait_for(f).await else {
        panic!("channel worker stopped");
    };
    snapshot.clone()
}

async fn opened(channel: &Channel, peers: &mut UnboundedReceiver<TransportPeer>) -> TransportPeer {
    let peer = next_peer(peers).await;
    assert!(peer.open());
    until(channel, |s| s.state == ConnectionState::Open).await;
    peer
}

fn frame_json(frame: Option<String>) -> Value {
    let Some(text) = frame else {
        panic!("expected a transmitted frame");
    };
    let Ok(value) = serde_json::from_str(&text) else {
        panic!("frame is not JSON: {text}");
    };
    value
}

fn assert_between(elapsed: Duration, min_ms: u64, max_ms: u64) {
    assert!(
        elapsed >= Duration::from_millis(min_ms) && elapsed < Duration::from_millis(max_ms),
        "elapsed {elapsed:?} outside [{min_ms}, {max_ms}) ms"
    );
}

fn logged(snapshot: &ChannelSnapshot, needle: &str) -> usize {
    snapshot
        .log
        .iter()
        .filter(|e| e.text.contains(needle))
        .count()
}

#[tokio::test(start_paused = true)]
async fn starts_connecting() {
    let (channel, _connector, mut peers) = start(settings("crates"));
    let _peer = next_peer(&mut peers).await;
    let snapshot = channel.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Connecting);
    assert_eq!(snapshot.attempt, 0);
    assert!(snapshot.pending.is_none());
}

#[tokio::test(start_paused = true)]
async fn commands_queued_while_closed_are_flushed_in_order() {
    let (channel, _connector, mut peers) = start(settings("crates"));
    let first = opened(&channel, &mut peers).await;

    assert!(first.close(Some("server restart".to_string())));
    until(&channel, |s| s.state == ConnectionState::Closed).await;

    for kind in ["crates:start", "crates:open", "crates:stop"] {
        let outcome = assert_ok!(channel.send(Command::new(kind)).await);
        assert_eq!(outcome, SendOutcome::Queued);
    }
    assert_eq!(channel.snapshot().queued, 3);

    let mut second = opened(&channel, &mut peers).await;
    let kinds: Vec<Value> = (0..3)
        .map(|_| frame_json(second.try_next_frame()))
        .map(|v| v.get("type").cloned().unwrap_or_default())
        .collect();
    assert_eq!(
        kinds,
        [json!("crates:start"), json!("crates:open"), json!("crates:stop")]
    );
    assert!(second.try_next_frame().is_none());

    let snapshot = channel.snapshot();
    assert_eq!(snapshot.queued, 0);
    assert_eq!(logged(&snapshot, "flushed 3 queued command(s)"), 1);
}

#[tokio::test(start_paused = true)]
async fn ok_reply_clears_pending_with_one_log_entry() {
    let (channel, _connector, mut peers) = start(settings("crates"));
    let mut peer = opened(&channel, &mut peers).await;

    let outcome = assert_ok!(channel.issue("start", Command::new("crates:start")).await);
    assert_eq!(outcome, SendOutcome::Sent);
    assert_eq!(frame_json(peer.next_frame().await).get("type"), Some(&json!("crates:start")));

    let before = channel.snapshot();
    assert_eq!(before.pending.as_ref().map(|p| p.tag.as_str()), Some("start"));

    assert!(peer.push_text(r#"{"type":"ok","message":"done"}"#));
    let after = until(&channel, |s| s.pending.is_none()).await;

    assert_eq!(after.log.len(), before.log.len() + 1);
    assert_eq!(after.last_message.as_deref(), Some("done"));
    assert_eq!(after.state, ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn server_error_clears_pending_and_keeps_connection() {
    let (channel, _connector, mut peers) = start(settings("crates"));
    let mut peer = opened(&channel, &mut peers).await;

    assert_ok!(channel.issue("start", Command::new("crates:start")).await);
    let _ = peer.next_frame().await;
    let before = channel.snapshot();
    assert!(before.pending.is_some());

    assert!(peer.push_text(r#"{"type":"error","message":"no game"}"#));
    let after = until(&channel, |s| s.pending.is_none()).await;

    assert_eq!(after.state, ConnectionState::Open);
    assert_eq!(after.last_message.as_deref(), Some("no game"));
    assert_eq!(after.log.len(), before.log.len() + 1);
    let Some(newest) = after.log.first() else {
        panic!("log is empty");
    };
    assert_eq!(newest.level, LogLevel::Error);
    assert_eq!(newest.text, "server error: no game");
}

#[tokio::test(start_paused = true)]
async fn timeout_clears_pending_and_later_sends_are_accepted() {
    let (channel, _connector, mut peers) = start(settings("crates"));
    let _peer = opened(&channel, &mut peers).await;

    assert_ok!(channel.issue("start", Command::new("crates:start")).await);
    let before = channel.snapshot();
    let issued = Instant::now();

    let after = until(&channel, |s| s.pending.is_none()).await;
    assert!(issued.elapsed() >= Duration::from_millis(6_000));
    assert_eq!(after.log.len(), before.log.len() + 1);
    assert_eq!(logged(&after, "no reply to start within 6000 ms"), 1);

    let outcome = assert_ok!(channel.issue("open", Command::new("crates:open")).await);
    assert_eq!(outcome, SendOutcome::Sent);
    assert_eq!(
        channel.snapshot().pending.map(|p| p.tag),
        Some("open".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn reply_after_timeout_has_nothing_to_clear() {
    let (channel, _connector, mut peers) = start(settings("crates"));
    let peer = opened(&channel, &mut peers).await;

    assert_ok!(channel.issue("start", Command::new("crates:start")).await);
    until(&channel, |s| s.pending.is_none()).await;

    assert!(peer.push_text(r#"{"type":"crates:result","message":"late"}"#));
    let snapshot = until(&channel, |s| s.last_message.as_deref() == Some("late")).await;
    assert!(snapshot.pending.is_none());
}

#[tokio::test(start_paused = true)]
async fn malformed_payload_changes_nothing() {
    let (channel, _connector, mut peers) = start(settings("crates"));
    let peer = opened(&channel, &mut peers).await;
    assert_ok!(channel.issue("start", Command::new("crates:start")).await);

    let before = channel.snapshot();
    assert!(peer.push_text("not json at all"));
    assert!(peer.push_text("[1, 2, 3]"));
    let after = until(&channel, |s| logged(s, "malformed payload") == 2).await;

    assert_eq!(after.state, before.state);
    assert_eq!(after.queued, before.queued);
    assert_eq!(after.pending, before.pending);
    assert_eq!(after.last_message, before.last_message);
    assert!(after.last_state.is_none());
    assert_eq!(logged(&after, "malformed payload: not json at all"), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_transport_cannot_reach_channel() {
    let (channel, _connector, mut peers) = start(settings("crates"));
    let first = opened(&channel, &mut peers).await;
    assert!(first.close(None));

    let second = next_peer(&mut peers).await;
    assert!(first.is_detached());
    assert!(!first.push_text(r#"{"type":"ok","message":"ghost"}"#));
    assert!(!first.open());

    let snapshot = channel.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Connecting);
    assert!(snapshot.last_message.is_none());
    assert!(!second.is_detached());
}

#[tokio::test(start_paused = true)]
async fn backoff_grows_and_resets_after_open() {
    let (channel, _connector, mut peers) = start(settings("crates"));
    let first = next_peer(&mut peers).await;

    let closed_at = Instant::now();
    assert!(first.close(None));
    let second = next_peer(&mut peers).await;
    assert_between(closed_at.elapsed(), 500, 800);
    assert_eq!(channel.snapshot().attempt, 1);

    let closed_at = Instant::now();
    assert!(second.close(None));
    let third = next_peer(&mut peers).await;
    assert_between(closed_at.elapsed(), 800, 1_280);
    assert_eq!(channel.snapshot().attempt, 2);

    assert!(third.open());
    let snapshot = until(&channel, |s| s.state == ConnectionState::Open).await;
    assert_eq!(snapshot.attempt, 0);

    let closed_at = Instant::now();
    assert!(third.close(None));
    let _fourth = next_peer(&mut peers).await;
    assert_between(closed_at.elapsed(), 500, 800);

    let snapshot = channel.snapshot();
    assert_eq!(logged(&snapshot, "reconnecting in 500 ms (attempt 1)"), 2);
    assert_eq!(logged(&snapshot, "reconnecting in 800 ms (attempt 2)"), 1);
}

#[tokio::test(start_paused = true)]
async fn construction_failure_schedules_reconnect() {
    let (connector, mut peers) = MemoryConnector::channel();
    connector.fail_next(1);
    let started = Instant::now();
    let channel = Channel::spawn(
        settings("crates"),
        Arc::new(connector),
        EventBus::default(),
    );

    let _peer = next_peer(&mut peers).await;
    assert_between(started.elapsed(), 500, 800);

    let snapshot = channel.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Connecting);
    assert_eq!(logged(&snapshot, "connect error"), 1);
}

#[tokio::test(start_paused = true)]
async fn close_clears_pending() {
    let (channel, _connector, mut peers) = start(settings("crates"));
    let peer = opened(&channel, &mut peers).await;
    assert_ok!(channel.issue("start", Command::new("crates:start")).await);

    assert!(peer.close(Some("going away".to_string())));
    let snapshot = until(&channel, |s| s.state == ConnectionState::Closed).await;
    assert!(snapshot.pending.is_none());
    assert_eq!(logged(&snapshot, "disconnected: going away"), 1);
}

#[tokio::test(start_paused = true)]
async fn transport_error_only_logs() {
    let (channel, _connector, mut peers) = start(settings("crates"));
    let peer = opened(&channel, &mut peers).await;
    assert_ok!(channel.issue("start", Command::new("crates:start")).await);

    assert!(peer.fail("connection reset"));
    let snapshot = until(&channel, |s| logged(s, "transport error") == 1).await;
    assert_eq!(snapshot.state, ConnectionState::Open);
    assert!(snapshot.pending.is_some());
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_idempotent_and_stops_reconnecting() {
    let (channel, connector, mut peers) = start(settings("crates"));
    let mut peer = opened(&channel, &mut peers).await;
    drop(connector);

    channel.shutdown().await;
    channel.shutdown().await;
    peer.closed_by_channel().await;

    let snapshot = channel.snapshot();
    assert!(snapshot.torn_down);
    assert_eq!(snapshot.state, ConnectionState::Closed);
    assert_eq!(logged(&snapshot, "shut down"), 1);

    let next = tokio::time::timeout(Duration::from_secs(30), peers.recv()).await;
    assert!(!matches!(next, Ok(Some(_))));

    let err = assert_err!(channel.send(Command::new("crates:start")).await);
    assert!(matches!(err, ChannelError::ShutDown(_)));
}

#[tokio::test(start_paused = true)]
async fn no_reconnect_when_disabled() {
    let (channel, _connector, mut peers) =
        start(settings("crates").with_auto_reconnect(false));
    let peer = opened(&channel, &mut peers).await;
    assert!(peer.close(None));

    let snapshot = until(&channel, |s| s.state == ConnectionState::Closed).await;
    assert_eq!(snapshot.attempt, 0);
    let next = tokio::time::timeout(Duration::from_secs(30), peers.recv()).await;
    assert!(next.is_err());
}

#[tokio::test(start_paused = true)]
async fn status_request_follows_flushed_queue() {
    let (channel, _connector, mut peers) =
        start(settings("crates").with_status_request("crates:status:get"));
    let mut peer = next_peer(&mut peers).await;

    let outcome = assert_ok!(channel.send(Command::new("crates:start")).await);
    assert_eq!(outcome, SendOutcome::Queued);
    assert!(peer.open());
    until(&channel, |s| s.state == ConnectionState::Open).await;

    assert_eq!(frame_json(peer.try_next_frame()), json!({"type": "crates:start"}));
    assert_eq!(frame_json(peer.try_next_frame()), json!({"type": "crates:status:get"}));

    assert!(peer.push_text(r#"{"type":"crates:status","active":true,"opened":false}"#));
    let snapshot = until(&channel, |s| s.last_state.is_some()).await;
    assert_eq!(logged(&snapshot, "status: active"), 1);
    assert_eq!(
        snapshot.last_state.and_then(|v| v.get("active").cloned()),
        Some(json!(true))
    );
}

#[tokio::test(start_paused = true)]
async fn identity_tracks_and_resets() {
    let (channel, _connector, mut peers) = start(settings("character"));
    let peer = opened(&channel, &mut peers).await;

    assert!(peer.push_text(r#"{"type":"character:picked","username":"viewer42"}"#));
    until(&channel, |s| s.identity.as_deref() == Some("viewer42")).await;

    assert!(peer.push_text(r#"{"status":"Reset complete"}"#));
    let snapshot = until(&channel, |s| s.identity.is_none()).await;
    assert_eq!(logged(&snapshot, "status: Reset complete"), 1);
}

#[tokio::test(start_paused = true)]
async fn correlation_ids_match_exactly() {
    let (channel, _connector, mut peers) =
        start(settings("crates").with_correlation_field("request_id"));
    let mut peer = opened(&channel, &mut peers).await;

    assert_ok!(channel.issue("start", Command::new("crates:start")).await);
    let sent = frame_json(peer.next_frame().await);
    let Some(id) = sent.get("request_id").and_then(Value::as_str) else {
        panic!("command should carry a correlation id");
    };
    let id = id.to_string();
    assert_eq!(
        channel.snapshot().pending.and_then(|p| p.correlation_id),
        Some(id.clone())
    );

    assert!(peer.push_text(r#"{"type":"crates:result","message":"old","request_id":"other"}"#));
    let snapshot = until(&channel, |s| logged(s, "stale reply other") == 1).await;
    assert!(snapshot.pending.is_some());

    let reply = json!({"type": "crates:result", "message": "opened", "request_id": id});
    assert!(peer.push_text(reply.to_string()));
    let snapshot = until(&channel, |s| s.pending.is_none()).await;
    assert_eq!(snapshot.last_message.as_deref(), Some("opened"));
}

#[tokio::test(start_paused = true)]
async fn superseded_action_is_logged() {
    let (channel, _connector, mut peers) = start(settings("crates"));
    let _peer = opened(&channel, &mut peers).await;

    assert_ok!(channel.issue("start", Command::new("crates:start")).await);
    assert_ok!(channel.issue("open", Command::new("crates:open")).await);

    let snapshot = channel.snapshot();
    assert_eq!(logged(&snapshot, "open issued while start still pending"), 1);
    let Some(pending) = snapshot.pending else {
        panic!("pending action expected");
    };
    assert_eq!(pending.tag, "open");
    assert_eq!(pending.superseded.as_deref(), Some("start"));
}

#[tokio::test(start_paused = true)]
async fn broadcast_channel_is_receive_only() {
    let (channel, _connector, mut peers) = start(settings("overlay").broadcast());
    let peer = opened(&channel, &mut peers).await;

    let err = assert_err!(channel.send(Command::new("overlay:set")).await);
    assert!(matches!(err, ChannelError::ReceiveOnly(_)));

    assert!(peer.push_text(r#"{"type":"overlay:state","scene":"intro"}"#));
    let snapshot = until(&channel, |s| s.last_state.is_some()).await;
    assert_eq!(
        snapshot.last_state.and_then(|v| v.get("scene").cloned()),
        Some(json!("intro"))
    );
}

#[tokio::test(start_paused = true)]
async fn events_reach_the_bus() {
    let (connector, mut peers) = MemoryConnector::channel();
    let bus = EventBus::default();
    let mut events = bus.subscribe();
    let channel = Channel::spawn(settings("crates"), Arc::new(connector), bus);
    let _peer = opened(&channel, &mut peers).await;

    let mut saw_open = false;
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.channel(), "crates");
        if matches!(
            event,
            ChannelEvent::StateChanged {
                state: ConnectionState::Open,
                ..
            }
        ) {
            saw_open = true;
        }
    }
    assert!(saw_open);
}

#[tokio::test(start_paused = true)]
async fn event_log_is_bounded() {
    let (channel, _connector, mut peers) =
        start(settings("crates").with_log_capacity(5));
    let peer = opened(&channel, &mut peers).await;

    for i in 0..20 {
        assert!(peer.push_text(json!({"type": "crates:tick", "message": i.to_string()}).to_string()));
    }
    let snapshot = until(&channel, |s| s.last_message.as_deref() == Some("19")).await;
    assert_eq!(snapshot.log.len(), 5);
    assert_eq!(
        snapshot.log.first().map(|e| e.text.as_str()),
        Some("crates:tick: 19")
    );
}
