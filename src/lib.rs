//! Bellhop — real-time notification delivery client
//!
//! Maintains one persistent WebSocket connection to a notification server
//! that pushes dashboard events (new applications, status changes,
//! compliance alerts) to connected HR/Manager clients, with automatic
//! reconnection, heartbeat liveness, offline buffering of outbound frames,
//! and typed fan-out of inbound events to independently registered handlers.
//!
//! # Example
//!
//! ```no_run
//! use bellhop::{BellhopClient, BellhopConfig, Frame};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BellhopConfig::new("wss://hr.example.com/ws");
//!     let client = BellhopClient::new(config);
//!
//!     client.connect("your-token").await?;
//!
//!     // Typed event handlers; the returned subscription revokes exactly
//!     // this registration.
//!     let _sub = client.subscribe("application_submitted", |frame| {
//!         println!("new application: {}", frame.data);
//!     });
//!
//!     let _note = client.on_notification(|notification| {
//!         println!("{}: {}", notification.title, notification.message);
//!     });
//!
//!     // Fire-and-forget; buffered while offline and flushed in order on
//!     // reconnect.
//!     client.join_room("hr_global");
//!     client.send(Frame::new("dashboard_opened", serde_json::json!({})));
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

mod backoff;
mod client;
mod config;
mod dispatch;
mod error;
mod frame;
mod notification;
mod presenter;
mod queue;
mod registry;
mod transport;

pub use backoff::delay_for_attempt;
pub use client::{BellhopClient, ConnectionEvent, ConnectionState, ConnectionStatus};
pub use config::BellhopConfig;
pub use error::{BellhopError, Result};
pub use frame::{types, Frame, Priority};
pub use notification::{ActionStyle, DeliveryStatus, Notification, NotificationAction, Severity};
pub use presenter::{NoopPresenter, NotificationPresenter};
pub use registry::Subscription;
pub use transport::{
    FrameSink, FrameSource, LinkEvent, LinkPair, MemoryServer, MemoryTransport, Transport,
    WsTransport, CLOSE_ABNORMAL, CLOSE_NORMAL, CLOSE_UNAUTHORIZED,
};
