//! Channel carrying user-visible outcomes (refresh results, search failures).

use tokio::sync::broadcast;
use tracing::trace;

use crate::{
    error::{ErrorKind, WeatherError},
    model::LocationId,
};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Failure,
    /// The provider had no match; rendered as its own state, not a toast.
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub location: Option<LocationId>,
}

impl Notification {
    pub fn success(message: impl Into<String>, location: Option<LocationId>) -> Self {
        Self { kind: NotificationKind::Success, message: message.into(), location }
    }

    pub fn from_error(err: &WeatherError, location: Option<LocationId>) -> Self {
        let kind = match err.kind() {
            ErrorKind::NotFound => NotificationKind::NotFound,
            _ => NotificationKind::Failure,
        };
        Self { kind, message: err.to_string(), location }
    }
}

/// Cloneable sender side. Sending with nobody listening is not an error.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn send(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            trace!("No notification subscribers");
        }
    }
}
