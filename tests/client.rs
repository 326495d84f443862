//! End-to-end tests for the Bellhop client over the in-process transport.
//!
//! Each test injects a `MemoryTransport` and plays the server side by hand,
//! so connection churn, backoff, and ordering are exercised hermetically.
//! Timing-sensitive tests run under a paused clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

use bellhop::{
    BellhopClient, BellhopConfig, BellhopError, ConnectionEvent, ConnectionState, Frame,
    MemoryServer, MemoryTransport, Notification, NotificationPresenter,
};

fn test_config() -> BellhopConfig {
    BellhopConfig::new("ws://notify.test/ws")
}

fn memory_client(
    config: BellhopConfig,
) -> (
    BellhopClient,
    UnboundedReceiver<MemoryServer>,
    Arc<MemoryTransport>,
) {
    let (transport, accepts) = MemoryTransport::new();
    let client = BellhopClient::with_transport(config, transport.clone());
    (client, accepts, transport)
}

async fn next_json(server: &mut MemoryServer) -> serde_json::Value {
    let raw = server.recv().await.expect("server side closed");
    serde_json::from_str(&raw).expect("client sent invalid JSON")
}

fn notification_json(id: &str, severity: &str) -> String {
    serde_json::json!({
        "type": "notification",
        "data": {
            "id": id,
            "user_id": "u-1",
            "title": "New application",
            "message": "Maria applied for Front Desk",
            "category": "applications",
            "severity": severity,
            "created_at": "2026-08-30T12:00:00Z"
        }
    })
    .to_string()
}

#[tokio::test]
async fn connect_embeds_token_and_reaches_connected() {
    let (client, mut accepts, _transport) = memory_client(test_config());

    client.connect("T1").await.unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);

    let server = accepts.recv().await.unwrap();
    assert_eq!(server.url().query(), Some("token=T1"));

    let status = client.connection_status();
    assert!(status.connected);
    assert!(!status.reconnecting);
    assert!(status.last_connected.is_some());
    assert_eq!(status.reconnect_attempts, 0);
}

#[tokio::test]
async fn connect_is_idempotent_when_connected() {
    let (client, mut accepts, _transport) = memory_client(test_config());

    client.connect("T1").await.unwrap();
    let _server = accepts.recv().await.unwrap();

    client.connect("T1").await.unwrap();
    assert!(accepts.try_recv().is_err(), "no second link was opened");
}

#[tokio::test(start_paused = true)]
async fn refused_handshake_rejects_connect_without_retry() {
    let (client, mut accepts, transport) = memory_client(test_config());
    transport.refuse_next(BellhopError::Connection("server down".into()));

    let result = client.connect("T1").await;
    assert!(matches!(result, Err(BellhopError::Connection(_))));
    assert!(!client.connection_status().connected);

    // a construction failure must not engage the retry loop
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(accepts.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn unresponsive_server_times_out_connect() {
    let config = test_config().connect_timeout(Duration::from_secs(5));
    let (client, _accepts, transport) = memory_client(config);
    transport.stall_next();

    let result = client.connect("T1").await;
    assert!(matches!(result, Err(BellhopError::Timeout)));
    assert!(!client.connection_status().connected);
}

#[tokio::test(start_paused = true)]
async fn unexpected_close_reconnects_with_distinct_events() {
    let (client, mut accepts, _transport) = memory_client(test_config());

    let events: Arc<Mutex<Vec<(ConnectionEvent, bool, u32)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let _sub = client.on_connection_change(move |event, status| {
        sink.lock()
            .push((event, status.reconnecting, status.reconnect_attempts));
    });

    client.connect("T1").await.unwrap();
    let server1 = accepts.recv().await.unwrap();

    server1.close(4000);
    let _server2 = accepts.recv().await.unwrap();

    let mut rx = client.state_receiver();
    rx.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();

    let recorded = events.lock().clone();
    assert_eq!(recorded[0].0, ConnectionEvent::Connected);
    assert_eq!(recorded[1], (ConnectionEvent::Reconnecting, true, 1));
    assert_eq!(recorded[2].0, ConnectionEvent::Reconnected);
    assert_ne!(recorded[0].0, recorded[2].0, "recovery is distinguishable");

    let status = client.connection_status();
    assert!(status.connected);
    assert!(!status.reconnecting);
    assert_eq!(status.reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn offline_sends_flush_in_order_before_new_traffic() {
    let (client, mut accepts, _transport) = memory_client(test_config());

    client.connect("T1").await.unwrap();
    let server1 = accepts.recv().await.unwrap();
    server1.close(4000);

    let mut rx = client.state_receiver();
    rx.wait_for(|s| *s == ConnectionState::Reconnecting).await.unwrap();

    for n in 1..=3 {
        client.send(Frame::new("telemetry", serde_json::json!({ "seq": n })));
    }

    let mut server2 = accepts.recv().await.unwrap();
    rx.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();
    client.send(Frame::new("telemetry", serde_json::json!({ "seq": 4 })));

    for expected in 1..=4u64 {
        let frame = next_json(&mut server2).await;
        assert_eq!(frame["type"], "telemetry");
        assert_eq!(frame["data"]["seq"], expected);
    }
}

#[tokio::test]
async fn queued_frames_past_capacity_are_dropped() {
    let config = test_config().queue_capacity(2);
    let (client, mut accepts, _transport) = memory_client(config);

    for n in 1..=3 {
        client.send(Frame::new("telemetry", serde_json::json!({ "seq": n })));
    }

    client.connect("T1").await.unwrap();
    let mut server = accepts.recv().await.unwrap();

    assert_eq!(next_json(&mut server).await["data"]["seq"], 1);
    assert_eq!(next_json(&mut server).await["data"]["seq"], 2);
    assert!(server.try_recv().is_none(), "third frame was dropped");
}

#[tokio::test(start_paused = true)]
async fn disconnect_suppresses_a_pending_reconnect() {
    let (client, mut accepts, _transport) = memory_client(test_config());

    client.connect("T1").await.unwrap();
    let server = accepts.recv().await.unwrap();

    server.close(4000);
    let mut rx = client.state_receiver();
    rx.wait_for(|s| *s == ConnectionState::Reconnecting).await.unwrap();

    // a retry is now scheduled; a requested disconnect must cancel it
    client.disconnect().await.unwrap();

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(accepts.try_recv().is_err(), "no reconnect after disconnect");
}

#[tokio::test(start_paused = true)]
async fn retries_stop_after_the_attempt_cap() {
    let config = test_config().max_reconnect_attempts(2);
    let (client, mut accepts, transport) = memory_client(config);

    client.connect("T1").await.unwrap();
    let server = accepts.recv().await.unwrap();

    transport.fail_all(true);
    server.close(4000);

    let mut rx = client.state_receiver();
    rx.wait_for(|s| *s == ConnectionState::Disconnected).await.unwrap();

    let status = client.connection_status();
    assert!(!status.connected);
    assert!(!status.reconnecting);
    assert_eq!(status.reconnect_attempts, 2);

    // terminal: nothing fires later
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn critical_notification_fans_out_exactly_once_each() {
    struct Counting(Arc<AtomicUsize>);
    impl NotificationPresenter for Counting {
        fn present(&self, _notification: &Notification) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let (client, mut accepts, _transport) = memory_client(test_config());
    let presented = Arc::new(AtomicUsize::new(0));
    client.set_presenter(Arc::new(Counting(presented.clone())));

    let generic = Arc::new(AtomicUsize::new(0));
    let dedicated = Arc::new(AtomicUsize::new(0));
    let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();

    let g = generic.clone();
    let gtx = done_tx.clone();
    let _sub = client.subscribe("notification", move |frame| {
        assert_eq!(frame.data["severity"], "critical");
        g.fetch_add(1, Ordering::SeqCst);
        let _ = gtx.send(());
    });
    let d = dedicated.clone();
    let dtx = done_tx;
    let _note = client.on_notification(move |notification| {
        assert_eq!(notification.id, "n-crit");
        d.fetch_add(1, Ordering::SeqCst);
        let _ = dtx.send(());
    });

    client.connect("T1").await.unwrap();
    let server = accepts.recv().await.unwrap();
    server.send_text(notification_json("n-crit", "critical"));

    done_rx.recv().await.unwrap();
    done_rx.recv().await.unwrap();

    assert_eq!(generic.load(Ordering::SeqCst), 1);
    assert_eq!(dedicated.load(Ordering::SeqCst), 1);
    assert_eq!(presented.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn malformed_frame_does_not_break_the_connection() {
    let (client, mut accepts, _transport) = memory_client(test_config());
    let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();

    let _sub = client.subscribe("shift_update", move |_| {
        let _ = done_tx.send(());
    });

    client.connect("T1").await.unwrap();
    let server = accepts.recv().await.unwrap();

    server.send_text("{not json");
    server.send_text(r#"{"data":{"missing":"type"}}"#);
    server.send_frame(&Frame::new("shift_update", serde_json::json!({})));

    done_rx.recv().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn unsubscribing_one_handler_leaves_its_sibling() {
    let (client, mut accepts, _transport) = memory_client(test_config());

    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();

    let f = first.clone();
    let sub1 = client.subscribe("x", move |_| {
        f.fetch_add(1, Ordering::SeqCst);
    });
    let s = second.clone();
    let _sub2 = client.subscribe("x", move |_| {
        s.fetch_add(1, Ordering::SeqCst);
        let _ = done_tx.send(());
    });

    client.connect("T1").await.unwrap();
    let server = accepts.recv().await.unwrap();

    server.send_frame(&Frame::new("x", serde_json::Value::Null));
    done_rx.recv().await.unwrap();
    assert_eq!(first.load(Ordering::SeqCst), 1);

    sub1.unsubscribe();
    server.send_frame(&Frame::new("x", serde_json::Value::Null));
    done_rx.recv().await.unwrap();

    assert_eq!(first.load(Ordering::SeqCst), 1, "unsubscribed handler is silent");
    assert_eq!(second.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn joined_rooms_are_rejoined_before_queued_frames() {
    let (client, mut accepts, _transport) = memory_client(test_config());

    client.connect("T1").await.unwrap();
    let server1 = accepts.recv().await.unwrap();

    client.join_room("hr_global");
    // room request flows on the live link

    server1.close(4000);
    let mut rx = client.state_receiver();
    rx.wait_for(|s| *s == ConnectionState::Reconnecting).await.unwrap();
    client.send(Frame::new("telemetry", serde_json::json!({ "seq": 1 })));

    let mut server2 = accepts.recv().await.unwrap();

    let first = next_json(&mut server2).await;
    assert_eq!(first["type"], "join_room");
    assert_eq!(first["data"]["room"], "hr_global");

    let second = next_json(&mut server2).await;
    assert_eq!(second["type"], "telemetry");
}

#[tokio::test(start_paused = true)]
async fn heartbeats_flow_and_server_pings_get_pongs() {
    let (client, mut accepts, _transport) = memory_client(test_config());

    client.connect("T1").await.unwrap();
    let mut server = accepts.recv().await.unwrap();

    // first liveness frame after one interval
    let frame = next_json(&mut server).await;
    assert_eq!(frame["type"], "heartbeat");

    server.send_frame(&Frame::new("ping", serde_json::Value::Null));
    let reply = next_json(&mut server).await;
    assert_eq!(reply["type"], "pong");
}

#[tokio::test(start_paused = true)]
async fn silent_server_is_declared_dead_and_replaced() {
    let (client, mut accepts, _transport) = memory_client(test_config());

    client.connect("T1").await.unwrap();
    let _server1 = accepts.recv().await.unwrap();

    // never answer anything; after the liveness window the client drops the
    // link and dials again
    let _server2 = accepts.recv().await.unwrap();

    let mut rx = client.state_receiver();
    rx.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();
    assert!(client.connection_status().connected);
}

#[tokio::test]
async fn read_and_dismiss_acks_hit_the_wire() {
    let (client, mut accepts, _transport) = memory_client(test_config());

    client.connect("T1").await.unwrap();
    let mut server = accepts.recv().await.unwrap();

    client.mark_notification_read("n-7");
    client.dismiss_notification("n-8");

    let read = next_json(&mut server).await;
    assert_eq!(read["type"], "mark_notification_read");
    assert_eq!(read["data"]["notification_id"], "n-7");

    let dismiss = next_json(&mut server).await;
    assert_eq!(dismiss["type"], "dismiss_notification");
    assert_eq!(dismiss["data"]["notification_id"], "n-8");
}

#[tokio::test]
async fn connection_established_records_the_server_id() {
    let (client, mut accepts, _transport) = memory_client(test_config());
    let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();

    let _sub = client.subscribe("noop", move |_| {
        let _ = done_tx.send(());
    });

    client.connect("T1").await.unwrap();
    let server = accepts.recv().await.unwrap();

    server.send_text(
        r#"{"type":"connection_established","data":{"connection_id":"c-42"}}"#,
    );
    // frames are processed in order, so once this lands the id is recorded
    server.send_frame(&Frame::new("noop", serde_json::Value::Null));
    done_rx.recv().await.unwrap();

    assert_eq!(client.connection_id(), Some("c-42".to_string()));
    assert_eq!(
        client.connection_status().connection_id,
        Some("c-42".to_string())
    );
}

#[tokio::test]
async fn server_clean_close_does_not_retry() {
    let (client, mut accepts, _transport) = memory_client(test_config());

    client.connect("T1").await.unwrap();
    let server = accepts.recv().await.unwrap();

    server.close(1000);
    let mut rx = client.state_receiver();
    rx.wait_for(|s| *s == ConnectionState::Disconnected).await.unwrap();

    let status = client.connection_status();
    assert!(!status.connected);
    assert!(!status.reconnecting);
    assert!(accepts.try_recv().is_err());
}

#[tokio::test]
async fn unauthorized_close_is_terminal() {
    let (client, mut accepts, _transport) = memory_client(test_config());

    client.connect("T1").await.unwrap();
    let server = accepts.recv().await.unwrap();

    server.close(4401);
    let mut rx = client.state_receiver();
    rx.wait_for(|s| *s == ConnectionState::Disconnected).await.unwrap();

    assert!(!client.connection_status().reconnecting);
    assert!(accepts.try_recv().is_err(), "auth rejection is not retried");
}

#[tokio::test(start_paused = true)]
async fn disconnect_after_auto_reconnect_tears_down_the_live_link() {
    let (client, mut accepts, _transport) = memory_client(test_config());
    let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();
    let _sub = client.subscribe("noop", move |_| {
        let _ = done_tx.send(());
    });

    client.connect("T1").await.unwrap();
    let server1 = accepts.recv().await.unwrap();
    server1.close(4000);

    let mut server2 = accepts.recv().await.unwrap();
    let mut rx = client.state_receiver();
    rx.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();

    server2.send_text(
        r#"{"type":"connection_established","data":{"connection_id":"c-42"}}"#,
    );
    server2.send_frame(&Frame::new("noop", serde_json::Value::Null));
    done_rx.recv().await.unwrap();
    assert_eq!(client.connection_id(), Some("c-42".to_string()));

    // the replacement link must go through the ordinary teardown, not be
    // aborted in place
    client.disconnect().await.unwrap();
    assert!(server2.recv().await.is_none(), "replacement link was closed");
    assert_eq!(client.connection_id(), None);
    assert_eq!(client.connection_status().connection_id, None);
    assert_eq!(client.state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(accepts.try_recv().is_err(), "no further link was opened");
}
