//! "Catalog changed" notification.

use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEvent {
    /// Rows were removed; observers should re-query.
    CatalogChanged,
}

/// Fire-and-forget broadcast of [`CatalogEvent`]s.
#[derive(Debug, Clone)]
pub struct CatalogEvents {
    sender: broadcast::Sender<CatalogEvent>,
}

impl CatalogEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.sender.subscribe()
    }

    /// Returns how many observers received the event.
    pub fn notify_catalog_changed(&self) -> usize {
        match self.sender.send(CatalogEvent::CatalogChanged) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("Catalog changed, no observers subscribed");
                0
            }
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for CatalogEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
