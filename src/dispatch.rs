//! Inbound frame dispatch
//!
//! Parses raw text frames and routes them: lifecycle frames surface to the
//! connection task as [`LifecycleEvent`] and are never forwarded to
//! subscribers; `notification` frames additionally fan out to the dedicated
//! notification registry and the presenter; everything else goes to the
//! exact-type handlers and then the wildcard handlers. A malformed frame or a
//! panicking handler never takes down the connection.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, warn};

use crate::frame::{types, Frame};
use crate::notification::Notification;
use crate::presenter::NotificationPresenter;
use crate::registry::SubscriptionRegistry;

/// Connection lifecycle extracted from reserved inbound frame types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Server accepted the connection; carries its assigned identifier
    Established { connection_id: Option<String> },
    /// Server recognized a returning client
    ReconnectAcknowledged,
    /// Server-initiated liveness probe; answer with `pong`
    PingReceived,
}

pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
    presenter: Mutex<Option<Arc<dyn NotificationPresenter>>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            registry,
            presenter: Mutex::new(None),
        }
    }

    pub fn set_presenter(&self, presenter: Arc<dyn NotificationPresenter>) {
        *self.presenter.lock() = Some(presenter);
    }

    /// Parse and route one raw inbound frame.
    ///
    /// Returns the lifecycle event for reserved frame types; `None` for
    /// application frames (dispatched to subscribers) and for malformed
    /// frames (logged and dropped).
    pub fn dispatch(&self, raw: &str) -> Option<LifecycleEvent> {
        let frame: Frame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "dropping malformed inbound frame");
                return None;
            }
        };
        if frame.kind.is_empty() {
            warn!("dropping inbound frame with empty type");
            return None;
        }

        match frame.kind.as_str() {
            types::CONNECTION_ESTABLISHED => {
                let connection_id = frame
                    .data
                    .get("connection_id")
                    .and_then(|v| v.as_str())
                    .map(String::from);
                return Some(LifecycleEvent::Established { connection_id });
            }
            types::RECONNECTION_SUCCESSFUL => return Some(LifecycleEvent::ReconnectAcknowledged),
            types::PING => return Some(LifecycleEvent::PingReceived),
            types::NOTIFICATION => self.dispatch_notification(&frame),
            _ => {}
        }

        self.dispatch_generic(&frame);
        None
    }

    fn dispatch_notification(&self, frame: &Frame) {
        let notification: Notification = match serde_json::from_value(frame.data.clone()) {
            Ok(notification) => notification,
            Err(err) => {
                // the raw frame still reaches generic subscribers
                warn!(error = %err, "notification payload failed to decode");
                return;
            }
        };

        let presenter = self.presenter.lock().clone();
        if let Some(presenter) = presenter {
            if catch_unwind(AssertUnwindSafe(|| presenter.present(&notification))).is_err() {
                error!(id = %notification.id, "notification presenter panicked");
            }
        }

        for handler in self.registry.notification_handlers() {
            if catch_unwind(AssertUnwindSafe(|| handler(&notification))).is_err() {
                error!(id = %notification.id, "notification handler panicked");
            }
        }
    }

    fn dispatch_generic(&self, frame: &Frame) {
        for handler in self.registry.handlers_for(&frame.kind) {
            if catch_unwind(AssertUnwindSafe(|| handler(frame))).is_err() {
                error!(kind = %frame.kind, "event handler panicked");
            }
        }
    }
}
