//! Bellhop client implementation
//!
//! One logical connection per client. A spawned connection task owns the
//! transport link, feeds inbound frames to the dispatcher, and forwards
//! outbound frames from the writer channel. Connection state is published
//! through a watch channel; unexpected closes engage the capped exponential
//! backoff retry loop.

use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, timeout, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::backoff;
use crate::config::BellhopConfig;
use crate::dispatch::{Dispatcher, LifecycleEvent};
use crate::error::{BellhopError, Result};
use crate::frame::Frame;
use crate::notification::Notification;
use crate::presenter::NotificationPresenter;
use crate::queue::OutboundQueue;
use crate::registry::{Subscription, SubscriptionRegistry};
use crate::transport::{LinkEvent, LinkPair, Transport, WsTransport, CLOSE_NORMAL, CLOSE_UNAUTHORIZED};

/// Connection state of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected; initial state, and terminal after a requested
    /// disconnect or exhausted retries
    Disconnected,
    /// A connection attempt is in flight
    Connecting,
    /// Connected and ready
    Connected,
    /// Waiting out a backoff delay before retrying
    Reconnecting,
}

/// Status transition delivered to connection subscribers.
///
/// `Reconnected` is distinct from `Connected` so dependent UI can show
/// recovery feedback after an outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Reconnected,
    Reconnecting,
    Disconnected,
}

/// Point-in-time connectivity snapshot, recomputed per transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub reconnecting: bool,
    pub last_connected: Option<DateTime<Utc>>,
    /// Server-assigned identifier, known once the server confirms the
    /// connection
    pub connection_id: Option<String>,
    pub reconnect_attempts: u32,
}

/// Writer channel plus the offline buffer, under one lock so a send can
/// never slip between a queue drain and the flip to `Connected`
struct LinkState {
    writer: Option<mpsc::UnboundedSender<Frame>>,
    queue: OutboundQueue,
}

struct ClientInner {
    config: BellhopConfig,
    transport: Arc<dyn Transport>,
    registry: Arc<SubscriptionRegistry>,
    dispatcher: Dispatcher,
    state: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    link: Mutex<LinkState>,
    token: Mutex<Option<String>>,
    rooms: Mutex<BTreeSet<String>>,
    connection_id: Mutex<Option<String>>,
    last_connected: Mutex<Option<DateTime<Utc>>>,
    last_error: Mutex<Option<BellhopError>>,
    reconnect_attempts: AtomicU32,
    /// Set by `disconnect()` before anything else, and checked first in the
    /// close path so a requested close never schedules a retry
    caller_closed: AtomicBool,
    reconnect_timer: Mutex<Option<tokio::task::JoinHandle<()>>>,
    /// Refreshed on every inbound event; the heartbeat loop declares the
    /// link dead when it goes stale
    activity: Arc<Mutex<Instant>>,
}

/// Real-time notification delivery client.
///
/// Cheaply cloneable; all clones share one logical connection.
#[derive(Clone)]
pub struct BellhopClient {
    inner: Arc<ClientInner>,
}

impl BellhopClient {
    /// Create a client that connects over WebSocket
    pub fn new(config: BellhopConfig) -> Self {
        Self::with_transport(config, Arc::new(WsTransport))
    }

    /// Create a client over an injected transport; the seam for tests and
    /// embedding
    pub fn with_transport(config: BellhopConfig, transport: Arc<dyn Transport>) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let registry = Arc::new(SubscriptionRegistry::new());
        let queue_capacity = config.queue_capacity;

        let inner = Arc::new(ClientInner {
            config,
            transport,
            registry: registry.clone(),
            dispatcher: Dispatcher::new(registry),
            state: state_tx,
            state_rx,
            link: Mutex::new(LinkState {
                writer: None,
                queue: OutboundQueue::new(queue_capacity),
            }),
            token: Mutex::new(None),
            rooms: Mutex::new(BTreeSet::new()),
            connection_id: Mutex::new(None),
            last_connected: Mutex::new(None),
            last_error: Mutex::new(None),
            reconnect_attempts: AtomicU32::new(0),
            caller_closed: AtomicBool::new(false),
            reconnect_timer: Mutex::new(None),
            activity: Arc::new(Mutex::new(Instant::now())),
        });

        Self { inner }
    }

    /// Install the presenter invoked for every inbound notification
    pub fn set_presenter(&self, presenter: Arc<dyn NotificationPresenter>) {
        self.inner.dispatcher.set_presenter(presenter);
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_rx.borrow()
    }

    /// Get a receiver for connection state changes
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_rx.clone()
    }

    /// Get the server-assigned connection identifier, if connected
    pub fn connection_id(&self) -> Option<String> {
        self.inner.connection_id.lock().clone()
    }

    /// Current connectivity snapshot
    pub fn connection_status(&self) -> ConnectionStatus {
        self.inner.status_snapshot()
    }

    /// Connect with the given bearer token, embedded as the `token` query
    /// parameter of the handshake URL.
    ///
    /// Resolves once the link is open. A transport construction or
    /// handshake error rejects the call and does not start the retry loop.
    /// Calling while already connected is a no-op; calling while an attempt
    /// is in flight awaits that attempt.
    pub async fn connect(&self, token: impl Into<String>) -> Result<()> {
        *self.inner.token.lock() = Some(token.into());

        if self.state() == ConnectionState::Connected {
            return Ok(());
        }

        // Claim the attempt atomically; a concurrent connect (or one racing
        // an in-flight reconnect) simply awaits the existing attempt.
        let mut started = false;
        self.inner.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                started = true;
                true
            } else {
                false
            }
        });

        if started {
            self.inner.caller_closed.store(false, Ordering::SeqCst);
            self.inner.reconnect_attempts.store(0, Ordering::SeqCst);
            let inner = self.inner.clone();
            tokio::spawn(connection_attempt(inner, false));
        }

        self.await_settled().await
    }

    /// Disconnect and stay disconnected.
    ///
    /// Marks the close as caller-initiated, cancels any pending reconnect
    /// timer, and lets the connection task close the link with the clean
    /// close code. No retry will follow.
    pub async fn disconnect(&self) -> Result<()> {
        self.inner.caller_closed.store(true, Ordering::SeqCst);

        if let Some(timer) = self.inner.reconnect_timer.lock().take() {
            timer.abort();
        }
        self.inner.link.lock().writer = None;

        let was_disconnected = self.state() == ConnectionState::Disconnected;
        self.inner.set_state(ConnectionState::Disconnected);
        if !was_disconnected {
            self.inner.notify_connection(ConnectionEvent::Disconnected);
        }
        Ok(())
    }

    /// Send a frame, fire-and-forget.
    ///
    /// Transmits immediately when connected; otherwise buffers in the
    /// bounded offline queue, to be flushed in order on the next connect.
    /// Never suspends. Past queue capacity the frame is dropped.
    pub fn send(&self, frame: Frame) {
        self.inner.send_frame(frame);
    }

    /// Register a handler for inbound frames of `event_type`; `"*"` matches
    /// every dispatched frame
    pub fn subscribe(
        &self,
        event_type: &str,
        handler: impl Fn(&Frame) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.registry.subscribe(event_type, handler)
    }

    /// Register a handler for decoded notifications
    pub fn on_notification(
        &self,
        handler: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.registry.on_notification(handler)
    }

    /// Register a handler for connection status transitions
    pub fn on_connection_change(
        &self,
        handler: impl Fn(ConnectionEvent, &ConnectionStatus) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.registry.on_connection_change(handler)
    }

    /// Optimistically mark a notification read; the server holds the
    /// authoritative state
    pub fn mark_notification_read(&self, notification_id: &str) {
        self.send(Frame::mark_read(notification_id));
    }

    /// Optimistically dismiss a notification
    pub fn dismiss_notification(&self, notification_id: &str) {
        self.send(Frame::dismiss(notification_id));
    }

    /// Request a server-side room subscription. Which rooms a caller may
    /// join is enforced server-side. Joined rooms are re-requested
    /// automatically after every reconnect.
    pub fn join_room(&self, room: &str) {
        self.inner.rooms.lock().insert(room.to_string());
        self.send(Frame::join_room(room));
    }

    /// Drop a server-side room subscription
    pub fn leave_room(&self, room: &str) {
        self.inner.rooms.lock().remove(room);
        self.send(Frame::leave_room(room));
    }

    /// Wait for the in-flight attempt to settle into Connected or
    /// Disconnected
    async fn await_settled(&self) -> Result<()> {
        let mut rx = self.inner.state_rx.clone();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Disconnected => {
                    return Err(self
                        .inner
                        .last_error
                        .lock()
                        .take()
                        .unwrap_or_else(|| {
                            BellhopError::Connection("connection attempt failed".into())
                        }));
                }
                _ => {}
            }
            if rx.changed().await.is_err() {
                return Err(BellhopError::Shutdown);
            }
        }
    }
}

impl ClientInner {
    fn set_state(&self, state: ConnectionState) {
        let _ = self.state.send(state);
    }

    fn connect_url(&self, token: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.url)
            .map_err(|e| BellhopError::InvalidUrl(format!("{}: {e}", self.config.url)))?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }

    fn send_frame(&self, mut frame: Frame) {
        let mut link = self.link.lock();
        if *self.state_rx.borrow() == ConnectionState::Connected {
            if let Some(writer) = &link.writer {
                match writer.send(frame) {
                    Ok(()) => return,
                    Err(returned) => {
                        // the task is tearing down; fall back to buffering
                        frame = returned.0;
                        link.writer = None;
                    }
                }
            }
        }
        if link.queue.push(frame) {
            debug!(queued = link.queue.len(), "buffered frame while offline");
        } else {
            warn!(
                capacity = link.queue.capacity(),
                "outbound queue full, dropping frame"
            );
        }
    }

    fn status_snapshot(&self) -> ConnectionStatus {
        let state = *self.state_rx.borrow();
        ConnectionStatus {
            connected: state == ConnectionState::Connected,
            reconnecting: state == ConnectionState::Reconnecting,
            last_connected: *self.last_connected.lock(),
            connection_id: self.connection_id.lock().clone(),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::SeqCst),
        }
    }

    fn notify_connection(&self, event: ConnectionEvent) {
        let status = self.status_snapshot();
        for handler in self.registry.connection_handlers() {
            if catch_unwind(AssertUnwindSafe(|| handler(event, &status))).is_err() {
                tracing::error!(?event, "connection handler panicked");
            }
        }
    }

    /// A connection attempt failed before the link opened
    fn fail_attempt(self: &Arc<Self>, err: BellhopError, is_retry: bool) {
        let unauthorized = matches!(err, BellhopError::Unauthorized(_));
        warn!(error = %err, is_retry, "connection attempt failed");
        *self.last_error.lock() = Some(err);

        if is_retry && !unauthorized {
            self.schedule_reconnect();
        } else {
            self.set_state(ConnectionState::Disconnected);
            if is_retry {
                self.notify_connection(ConnectionEvent::Disconnected);
            }
        }
    }

    /// Engage (or give up on) the backoff retry loop after an unexpected
    /// link loss
    fn schedule_reconnect(self: &Arc<Self>) {
        if self.caller_closed.load(Ordering::SeqCst) {
            self.set_state(ConnectionState::Disconnected);
            return;
        }

        let attempt = self.reconnect_attempts.load(Ordering::SeqCst) + 1;
        if attempt > self.config.max_reconnect_attempts {
            warn!(
                max = self.config.max_reconnect_attempts,
                "reconnect attempts exhausted"
            );
            self.set_state(ConnectionState::Disconnected);
            self.notify_connection(ConnectionEvent::Disconnected);
            return;
        }
        self.reconnect_attempts.store(attempt, Ordering::SeqCst);

        let delay = backoff::delay_for_attempt(
            self.config.reconnect_delay,
            self.config.max_reconnect_delay,
            attempt,
        );
        self.set_state(ConnectionState::Reconnecting);
        self.notify_connection(ConnectionEvent::Reconnecting);
        info!(attempt, ?delay, "scheduling reconnect");

        let inner = self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // From here the task becomes the live attempt; surrender the
            // abort handle so disconnect() tears the link down through the
            // connection task rather than killing it mid-flight.
            drop(inner.reconnect_timer.lock().take());
            if inner.caller_closed.load(Ordering::SeqCst) {
                return;
            }
            inner.set_state(ConnectionState::Connecting);
            connection_attempt(inner, true).await;
        });
        *self.reconnect_timer.lock() = Some(timer);
    }
}

/// One connection attempt: construct the link, then run it until it drops
async fn connection_attempt(inner: Arc<ClientInner>, is_retry: bool) {
    let token = inner.token.lock().clone().unwrap_or_default();
    let url = match inner.connect_url(&token) {
        Ok(url) => url,
        Err(err) => {
            inner.fail_attempt(err, is_retry);
            return;
        }
    };

    debug!(%url, "connecting");
    let pair = match timeout(inner.config.connect_timeout, inner.transport.connect(&url)).await {
        Ok(Ok(pair)) => pair,
        Ok(Err(err)) => {
            inner.fail_attempt(err, is_retry);
            return;
        }
        Err(_) => {
            inner.fail_attempt(BellhopError::Timeout, is_retry);
            return;
        }
    };

    connection_task(inner, pair).await;
}

/// Why the connection task stopped
enum LinkDown {
    /// `disconnect()` was called
    Requested,
    /// Server closed with the clean close code; no retry
    ServerClosed,
    /// Server rejected our credentials; no retry
    Unauthorized,
    /// Anything else; engages the retry loop
    Unexpected,
}

/// Owns an open link: drains the offline queue, runs the heartbeat, and
/// processes inbound frames sequentially until the link drops
async fn connection_task(inner: Arc<ClientInner>, (mut sink, mut source): LinkPair) {
    if inner.caller_closed.load(Ordering::SeqCst) {
        // disconnect() landed while the handshake was in flight
        let _ = sink.close(CLOSE_NORMAL).await;
        return;
    }

    let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Frame>();
    let was_retry = inner.reconnect_attempts.load(Ordering::SeqCst) > 0;

    // Server-side room state died with the old link; re-request before
    // anything queued flows.
    for room in inner.rooms.lock().iter() {
        let _ = writer_tx.send(Frame::join_room(room));
    }

    {
        // Drain and publish under the link lock: a caller send racing this
        // block either lands in the queue (drained here) or sees the writer,
        // in which case it is ordered after everything drained.
        let mut link = inner.link.lock();
        if !link.queue.is_empty() {
            debug!(count = link.queue.len(), "flushing offline queue");
        }
        for frame in link.queue.drain() {
            let _ = writer_tx.send(frame);
        }
        link.writer = Some(writer_tx.clone());
        inner.reconnect_attempts.store(0, Ordering::SeqCst);
        *inner.last_connected.lock() = Some(Utc::now());
        inner.set_state(ConnectionState::Connected);
    }
    *inner.activity.lock() = Instant::now();

    if was_retry {
        info!("reconnected");
        inner.notify_connection(ConnectionEvent::Reconnected);
    } else {
        info!("connected");
        inner.notify_connection(ConnectionEvent::Connected);
    }

    let mut heartbeat = tokio::spawn(heartbeat_loop(
        writer_tx.clone(),
        inner.activity.clone(),
        inner.config.heartbeat_interval,
        inner.config.liveness_timeout,
    ));

    let mut state_rx = inner.state_rx.clone();
    let down = loop {
        tokio::select! {
            // The watch guard must not live across the other arms' awaits;
            // drop it inside the branch and keep only the signal.
            _ = async {
                let _ = state_rx.wait_for(|s| *s == ConnectionState::Disconnected).await;
            } => {
                break LinkDown::Requested;
            }

            frame = writer_rx.recv() => {
                let Some(frame) = frame else { break LinkDown::Requested };
                match serde_json::to_string(&frame) {
                    Ok(text) => {
                        if let Err(err) = sink.send_text(text).await {
                            warn!(error = %err, "link write failed");
                            break LinkDown::Unexpected;
                        }
                    }
                    Err(err) => warn!(error = %err, "failed to serialize outbound frame"),
                }
            }

            event = source.next_event() => match event {
                Ok(LinkEvent::Text(raw)) => {
                    *inner.activity.lock() = Instant::now();
                    match inner.dispatcher.dispatch(&raw) {
                        Some(LifecycleEvent::Established { connection_id }) => {
                            debug!(?connection_id, "server confirmed connection");
                            *inner.connection_id.lock() = connection_id;
                        }
                        Some(LifecycleEvent::ReconnectAcknowledged) => {
                            debug!("server acknowledged reconnection");
                        }
                        Some(LifecycleEvent::PingReceived) => {
                            let _ = writer_tx.send(Frame::pong());
                        }
                        None => {}
                    }
                }
                Ok(LinkEvent::Closed { code }) => {
                    break match code {
                        CLOSE_NORMAL => LinkDown::ServerClosed,
                        CLOSE_UNAUTHORIZED => LinkDown::Unauthorized,
                        other => {
                            warn!(code = other, "link closed unexpectedly");
                            LinkDown::Unexpected
                        }
                    };
                }
                Err(err) => {
                    warn!(error = %err, "link read failed");
                    break LinkDown::Unexpected;
                }
            },

            outcome = &mut heartbeat => {
                if let Ok(HeartbeatOutcome::Stale) = outcome {
                    warn!("no inbound traffic within the liveness window, dropping link");
                }
                break LinkDown::Unexpected;
            }
        }
    };

    heartbeat.abort();
    {
        // Only clear our own writer; a newer task may have installed its own.
        let mut link = inner.link.lock();
        if link.writer.as_ref().is_some_and(|w| w.same_channel(&writer_tx)) {
            link.writer = None;
        }
    }
    *inner.connection_id.lock() = None;
    let _ = sink.close(CLOSE_NORMAL).await;

    match down {
        LinkDown::Requested => {
            // disconnect() already published the state and status
            debug!("link closed on request");
        }
        LinkDown::ServerClosed => {
            info!("server closed the connection");
            inner.set_state(ConnectionState::Disconnected);
            inner.notify_connection(ConnectionEvent::Disconnected);
        }
        LinkDown::Unauthorized => {
            warn!("server revoked authorization");
            *inner.last_error.lock() =
                Some(BellhopError::Unauthorized("connection closed by server".into()));
            inner.set_state(ConnectionState::Disconnected);
            inner.notify_connection(ConnectionEvent::Disconnected);
        }
        LinkDown::Unexpected => {
            if inner.caller_closed.load(Ordering::SeqCst) {
                inner.set_state(ConnectionState::Disconnected);
            } else {
                inner.schedule_reconnect();
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeartbeatOutcome {
    /// No inbound traffic within the liveness window
    Stale,
    /// The writer channel closed under us
    WriterGone,
}

/// Periodic liveness loop. Sends a heartbeat frame every `interval` and
/// declares the link stale when `activity` has not been refreshed within
/// `liveness_timeout`. Exactly one runs per connection task and it is
/// aborted when the task exits, so timers never overlap.
async fn heartbeat_loop(
    writer: mpsc::UnboundedSender<Frame>,
    activity: Arc<Mutex<Instant>>,
    interval: Duration,
    liveness_timeout: Duration,
) -> HeartbeatOutcome {
    let mut ticks = interval_at(Instant::now() + interval, interval);
    loop {
        ticks.tick().await;
        if activity.lock().elapsed() >= liveness_timeout {
            return HeartbeatOutcome::Stale;
        }
        if writer.send(Frame::heartbeat()).is_err() {
            return HeartbeatOutcome::WriterGone;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::types;

    fn test_client() -> BellhopClient {
        BellhopClient::new(BellhopConfig::new("wss://localhost:8080/ws"))
    }

    #[test]
    fn test_client_initial_state() {
        let client = test_client();

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.connection_id().is_none());

        let status = client.connection_status();
        assert!(!status.connected);
        assert!(!status.reconnecting);
        assert!(status.last_connected.is_none());
        assert_eq!(status.reconnect_attempts, 0);
    }

    #[test]
    fn test_state_receiver() {
        let client = test_client();
        let rx = client.state_receiver();
        assert_eq!(*rx.borrow(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_url_embeds_token() {
        let client = test_client();
        let url = client.inner.connect_url("tok-123").unwrap();

        assert_eq!(url.query(), Some("token=tok-123"));
        assert!(url.as_str().starts_with("wss://localhost:8080/ws"));
    }

    #[test]
    fn test_connect_url_rejects_bad_url() {
        let client = BellhopClient::new(BellhopConfig::new("not a url"));
        let result = client.inner.connect_url("t");
        assert!(matches!(result, Err(BellhopError::InvalidUrl(_))));
    }

    #[test]
    fn test_send_while_disconnected_buffers() {
        let client = test_client();
        client.send(Frame::new("telemetry", serde_json::json!({"n": 1})));
        client.send(Frame::new("telemetry", serde_json::json!({"n": 2})));

        assert_eq!(client.inner.link.lock().queue.len(), 2);
    }

    #[test]
    fn test_send_past_capacity_drops_silently() {
        let config = BellhopConfig::new("wss://localhost:8080/ws").queue_capacity(1);
        let client = BellhopClient::new(config);

        client.send(Frame::new("a", serde_json::Value::Null));
        client.send(Frame::new("b", serde_json::Value::Null));

        let mut link = client.inner.link.lock();
        assert_eq!(link.queue.len(), 1);
        assert_eq!(link.queue.drain()[0].kind, "a");
    }

    #[test]
    fn test_join_room_tracks_membership() {
        let client = test_client();
        client.join_room("hr_global");
        client.join_room("property_2");
        client.leave_room("hr_global");

        let rooms = client.inner.rooms.lock();
        assert!(rooms.contains("property_2"));
        assert!(!rooms.contains("hr_global"));
    }

    #[tokio::test]
    async fn test_disconnect_when_not_connected_is_ok() {
        let client = test_client();
        assert!(client.disconnect().await.is_ok());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_emits_on_interval() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let activity = Arc::new(Mutex::new(Instant::now()));

        // keep the link "alive" so staleness never trips
        let refresher = activity.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(10)).await;
                *refresher.lock() = Instant::now();
            }
        });

        let _hb = tokio::spawn(heartbeat_loop(
            tx,
            activity,
            Duration::from_secs(30),
            Duration::from_secs(90),
        ));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, types::HEARTBEAT);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, types::HEARTBEAT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_reports_stale_link() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let activity = Arc::new(Mutex::new(Instant::now()));

        let outcome = heartbeat_loop(
            tx,
            activity,
            Duration::from_secs(30),
            Duration::from_secs(90),
        )
        .await;

        assert_eq!(outcome, HeartbeatOutcome::Stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_stops_when_writer_closes() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let activity = Arc::new(Mutex::new(Instant::now()));

        let outcome = heartbeat_loop(
            tx,
            activity,
            Duration::from_secs(30),
            Duration::from_secs(90),
        )
        .await;

        assert_eq!(outcome, HeartbeatOutcome::WriterGone);
    }
}
