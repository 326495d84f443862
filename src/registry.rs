//! Handler registration tables
//!
//! Three independent registries: generic event handlers keyed by frame type
//! (with a `"*"` wildcard slot), notification handlers, and connection-status
//! handlers. Every grant returns a [`Subscription`] capability that removes
//! exactly that registration. Dispatch iterates over snapshots of the handler
//! lists, so a handler may unsubscribe itself (or anything else) mid-dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::client::{ConnectionEvent, ConnectionStatus};
use crate::frame::{types, Frame};
use crate::notification::Notification;

/// Handler for generic inbound frames
pub type EventHandler = Arc<dyn Fn(&Frame) + Send + Sync>;
/// Handler for decoded notification payloads
pub type NotificationHandler = Arc<dyn Fn(&Notification) + Send + Sync>;
/// Handler for connection status transitions
pub type ConnectionHandler = Arc<dyn Fn(ConnectionEvent, &ConnectionStatus) + Send + Sync>;

enum Slot {
    Event(String),
    Notification,
    Connection,
}

/// An active registration that can be revoked
pub struct Subscription {
    registry: Arc<SubscriptionRegistry>,
    slot: Slot,
    id: Uuid,
}

impl Subscription {
    /// Remove exactly this registration. Sibling handlers for the same
    /// event type are unaffected.
    pub fn unsubscribe(self) {
        self.registry.remove(&self.slot, self.id);
    }
}

/// Per-client handler registration tables
#[derive(Default)]
pub struct SubscriptionRegistry {
    events: Mutex<HashMap<String, Vec<(Uuid, EventHandler)>>>,
    notifications: Mutex<Vec<(Uuid, NotificationHandler)>>,
    connections: Mutex<Vec<(Uuid, ConnectionHandler)>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for frames of the given type. `"*"` receives
    /// every dispatched inbound frame.
    pub fn subscribe(
        self: &Arc<Self>,
        event_type: &str,
        handler: impl Fn(&Frame) + Send + Sync + 'static,
    ) -> Subscription {
        let id = Uuid::new_v4();
        self.events
            .lock()
            .entry(event_type.to_string())
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            registry: self.clone(),
            slot: Slot::Event(event_type.to_string()),
            id,
        }
    }

    /// Register a handler for decoded notification payloads
    pub fn on_notification(
        self: &Arc<Self>,
        handler: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> Subscription {
        let id = Uuid::new_v4();
        self.notifications.lock().push((id, Arc::new(handler)));

        Subscription {
            registry: self.clone(),
            slot: Slot::Notification,
            id,
        }
    }

    /// Register a handler for connection status transitions
    pub fn on_connection_change(
        self: &Arc<Self>,
        handler: impl Fn(ConnectionEvent, &ConnectionStatus) + Send + Sync + 'static,
    ) -> Subscription {
        let id = Uuid::new_v4();
        self.connections.lock().push((id, Arc::new(handler)));

        Subscription {
            registry: self.clone(),
            slot: Slot::Connection,
            id,
        }
    }

    /// Snapshot of the handlers for a frame type, exact matches first,
    /// wildcard handlers after, each in registration order.
    pub(crate) fn handlers_for(&self, event_type: &str) -> Vec<EventHandler> {
        let events = self.events.lock();
        let mut out = Vec::new();
        if let Some(handlers) = events.get(event_type) {
            out.extend(handlers.iter().map(|(_, h)| h.clone()));
        }
        if event_type != types::WILDCARD {
            if let Some(handlers) = events.get(types::WILDCARD) {
                out.extend(handlers.iter().map(|(_, h)| h.clone()));
            }
        }
        out
    }

    pub(crate) fn notification_handlers(&self) -> Vec<NotificationHandler> {
        self.notifications.lock().iter().map(|(_, h)| h.clone()).collect()
    }

    pub(crate) fn connection_handlers(&self) -> Vec<ConnectionHandler> {
        self.connections.lock().iter().map(|(_, h)| h.clone()).collect()
    }

    fn remove(&self, slot: &Slot, id: Uuid) {
        match slot {
            Slot::Event(event_type) => {
                let mut events = self.events.lock();
                if let Some(handlers) = events.get_mut(event_type) {
                    handlers.retain(|(handler_id, _)| *handler_id != id);
                    if handlers.is_empty() {
                        events.remove(event_type);
                    }
                }
            }
            Slot::Notification => {
                self.notifications.lock().retain(|(handler_id, _)| *handler_id != id);
            }
            Slot::Connection => {
                self.connections.lock().retain(|(handler_id, _)| *handler_id != id);
            }
        }
    }
}
