use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::TimeWindow;

#[allow(dead_code)]
const CHANNEL_CAPACITY: usize = 256;

/// Outcome categories the engine signals to parties. Delivery mechanics
/// (retry, backoff, channels) are the implementation's concern, not the
/// engine's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Accepted,
    Rejected,
    Promoted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub resource_id: Ulid,
    pub party: String,
    pub kind: NotifyKind,
    pub booking_id: Option<Ulid>,
    pub window: Option<TimeWindow>,
}

#[derive(Debug)]
pub struct NotifyError(pub String);

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// Signals accept/reject/promotion outcomes. A failure here never unwinds a
/// committed ledger mutation — booking state is authoritative, delivery is
/// best-effort.
pub trait Notifier: Send + Sync {
    fn notify(&self, note: &Notification) -> Result<(), NotifyError>;
}

/// Broadcast hub: one channel per resource, subscribe-on-demand.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Notification>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to notifications for a resource. Creates the channel if needed.
    pub fn subscribe(&self, resource_id: Ulid) -> broadcast::Receiver<Notification> {
        let sender = self
            .channels
            .entry(resource_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Remove a channel (e.g. when the resource is removed).
    pub fn remove(&self, resource_id: &Ulid) {
        self.channels.remove(resource_id);
    }
}

impl Notifier for NotifyHub {
    /// No-op if nobody is listening.
    fn notify(&self, note: &Notification) -> Result<(), NotifyError> {
        if let Some(sender) = self.channels.get(&note.resource_id) {
            let _ = sender.send(note.clone());
        }
        Ok(())
    }
}
