//! Transport seam for the client
//!
//! [`Transport`] abstracts link construction so the connection machinery can
//! run against a real WebSocket ([`WsTransport`]) or an in-process pair
//! ([`MemoryTransport`]) for hermetic tests. The bearer token is embedded in
//! the connect URL by the caller; this layer only moves text frames and
//! close codes.

use std::future;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::{BellhopError, Result};

/// Clean, caller-requested close. The one close code that must never
/// trigger the reconnection loop.
pub const CLOSE_NORMAL: u16 = 1000;
/// Server rejected the connection's credentials; not retryable.
pub const CLOSE_UNAUTHORIZED: u16 = 4401;
/// Synthesized when the link drops without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// One event read off the link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A text frame arrived
    Text(String),
    /// The peer closed the link
    Closed { code: u16 },
}

/// Write half of an established link
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;
    async fn close(&mut self, code: u16) -> Result<()>;
}

/// Read half of an established link
#[async_trait]
pub trait FrameSource: Send {
    async fn next_event(&mut self) -> Result<LinkEvent>;
}

/// A freshly established link, split into halves
pub type LinkPair = (Box<dyn FrameSink>, Box<dyn FrameSource>);

/// Constructs links; injected into the client
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<LinkPair>;
}

// ---------------------------------------------------------------------------
// WebSocket transport

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production transport over tokio-tungstenite
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &Url) -> Result<LinkPair> {
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(map_handshake_error)?;
        let (sink, source) = stream.split();
        Ok((Box::new(WsSink { sink }), Box::new(WsSource { source })))
    }
}

fn map_handshake_error(err: tungstenite::Error) -> BellhopError {
    match err {
        tungstenite::Error::Http(response)
            if matches!(response.status().as_u16(), 401 | 403) =>
        {
            BellhopError::Unauthorized(format!("handshake rejected: {}", response.status()))
        }
        other => BellhopError::Connection(other.to_string()),
    }
}

struct WsSink {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| BellhopError::Transport(e.to_string()))
    }

    async fn close(&mut self, code: u16) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| BellhopError::Transport(e.to_string()))
    }
}

struct WsSource {
    source: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_event(&mut self) -> Result<LinkEvent> {
        loop {
            match self.source.next().await {
                Some(Ok(Message::Text(text))) => return Ok(LinkEvent::Text(text.to_string())),
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.map(|f| u16::from(f.code)).unwrap_or(CLOSE_ABNORMAL);
                    return Ok(LinkEvent::Closed { code });
                }
                // protocol-level ping/pong and binary frames carry no
                // application messages on this wire
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(BellhopError::Transport(e.to_string())),
                None => return Ok(LinkEvent::Closed { code: CLOSE_ABNORMAL }),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// In-process transport

/// In-process transport; each `connect` hands the server half to whoever
/// holds the accept receiver.
pub struct MemoryTransport {
    accepts: mpsc::UnboundedSender<MemoryServer>,
    refuse: Mutex<Option<BellhopError>>,
    stall_next: AtomicBool,
    fail_all: AtomicBool,
}

impl MemoryTransport {
    /// Build a transport plus the receiver on which accepted connections
    /// (server halves) arrive.
    pub fn new() -> (std::sync::Arc<Self>, mpsc::UnboundedReceiver<MemoryServer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            std::sync::Arc::new(Self {
                accepts: tx,
                refuse: Mutex::new(None),
                stall_next: AtomicBool::new(false),
                fail_all: AtomicBool::new(false),
            }),
            rx,
        )
    }

    /// Make the next `connect` fail with the given error
    pub fn refuse_next(&self, err: BellhopError) {
        *self.refuse.lock() = Some(err);
    }

    /// Make the next `connect` hang forever (unresponsive server)
    pub fn stall_next(&self) {
        self.stall_next.store(true, Ordering::SeqCst);
    }

    /// Make every `connect` fail until cleared
    pub fn fail_all(&self, enabled: bool) {
        self.fail_all.store(enabled, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, url: &Url) -> Result<LinkPair> {
        if self.stall_next.swap(false, Ordering::SeqCst) {
            future::pending::<()>().await;
        }
        if let Some(err) = self.refuse.lock().take() {
            return Err(err);
        }
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(BellhopError::Connection("connection refused".into()));
        }

        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel();
        let (from_client_tx, from_client_rx) = mpsc::unbounded_channel();

        let server = MemoryServer {
            url: url.clone(),
            to_client: to_client_tx,
            from_client: from_client_rx,
        };
        self.accepts
            .send(server)
            .map_err(|_| BellhopError::Connection("memory peer gone".into()))?;

        Ok((
            Box::new(MemorySink {
                tx: Some(from_client_tx),
            }),
            Box::new(MemorySource { rx: to_client_rx }),
        ))
    }
}

/// Server half of an in-process link
pub struct MemoryServer {
    url: Url,
    to_client: mpsc::UnboundedSender<LinkEvent>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryServer {
    /// The URL the client connected with, including its query string
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Push a raw text frame to the client
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.to_client.send(LinkEvent::Text(text.into()));
    }

    /// Push a serialized frame to the client
    pub fn send_frame(&self, frame: &crate::frame::Frame) {
        if let Ok(text) = serde_json::to_string(frame) {
            self.send_text(text);
        }
    }

    /// Close the link with the given code
    pub fn close(&self, code: u16) {
        let _ = self.to_client.send(LinkEvent::Closed { code });
    }

    /// Receive the next text frame sent by the client.
    /// Returns `None` once the client side has closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Non-blocking receive of a client frame
    pub fn try_recv(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }
}

struct MemorySink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        match &self.tx {
            Some(tx) => tx
                .send(text)
                .map_err(|_| BellhopError::Transport("peer dropped".into())),
            None => Err(BellhopError::Transport("link closed".into())),
        }
    }

    async fn close(&mut self, _code: u16) -> Result<()> {
        self.tx = None;
        Ok(())
    }
}

struct MemorySource {
    rx: mpsc::UnboundedReceiver<LinkEvent>,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn next_event(&mut self) -> Result<LinkEvent> {
        match self.rx.recv().await {
            Some(event) => Ok(event),
            None => Ok(LinkEvent::Closed { code: CLOSE_ABNORMAL }),
        }
    }
}
