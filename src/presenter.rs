//! Presentation seam for notification side effects
//!
//! Sound, toast, and OS-notification effects are platform I/O and live behind
//! this capability trait so the dispatch path stays headless.

use crate::notification::Notification;

/// Receives every decoded inbound notification, before registered handlers run
pub trait NotificationPresenter: Send + Sync {
    fn present(&self, notification: &Notification);
}

/// Presenter that does nothing; the default when none is installed
pub struct NoopPresenter;

impl NotificationPresenter for NoopPresenter {
    fn present(&self, _notification: &Notification) {}
}
