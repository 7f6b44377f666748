use crate::connection::CommandSender;
use crate::error::Result;
use crate::protocol::Command;
use crate::router::ResponseRouter;
use crate::subscription::{ChangeReceiver, PropertyChange};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared per-device state every node talks through
///
/// Holds the response router, the outbound command queue, the device-ready
/// flag and the change bus. Nodes hold an `Arc` to it; it never refers back
/// to nodes.
pub struct DeviceLink {
    key: String,
    router: ResponseRouter,
    sender: CommandSender,
    ready: AtomicBool,
    changes: broadcast::Sender<PropertyChange>,
}

impl DeviceLink {
    pub(crate) fn new(key: impl Into<String>, sender: CommandSender, change_buffer: usize) -> Arc<Self> {
        let key = key.into();
        let (changes, _) = broadcast::channel(change_buffer);
        Arc::new(Self {
            router: ResponseRouter::new(key.clone()),
            key,
            sender,
            ready: AtomicBool::new(false),
            changes,
        })
    }

    /// Device key used in logs and handed to response callbacks
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn router(&self) -> &ResponseRouter {
        &self.router
    }

    /// Whether the transport has signalled the device ready
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub(crate) fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    pub(crate) fn send(&self, command: &Command) -> Result<()> {
        self.sender.send(command)
    }

    pub(crate) fn publish_change(&self, change: PropertyChange) {
        // No receivers is fine
        let _ = self.changes.send(change);
    }

    pub fn subscribe_changes(&self) -> ChangeReceiver {
        ChangeReceiver::new(self.changes.subscribe())
    }
}
