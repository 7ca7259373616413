//! Origin-wide storage and browsing contexts.
//!
//! ## Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Origin: one durable store + one storage-event channel        │
//! │  ├── BrowsingContext #1 (tab)  ── set_item ──┐                │
//! │  ├── BrowsingContext #2 (tab)                │ StorageEvent   │
//! │  └── BrowsingContext #3 (window) ◄───────────┘ (source = #1)  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every write through a context lands in the shared store and is announced
//! to the other contexts. A context never hears about its own writes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::TrackerError;
use crate::storage::KeyValueStore;

/// Default capacity for the storage-event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Identifier of one open view over an origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// A change to one key, announced to every context except the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key that changed
    pub key: String,
    /// Raw value before the change
    pub old_value: Option<String>,
    /// Raw value after the change (`None` when the key was removed)
    pub new_value: Option<String>,
    /// Context that performed the write
    pub source: ContextId,
}

struct OriginShared {
    store: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<StorageEvent>,
    next_context: AtomicU64,
}

/// One origin: a shared durable store plus the cross-context notification bus.
#[derive(Clone)]
pub struct Origin {
    shared: Arc<OriginShared>,
}

impl Origin {
    /// Create an origin over the given store.
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self::from_shared_store(Arc::new(store))
    }

    /// Create an origin over an already shared store handle.
    pub fn from_shared_store(store: Arc<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(OriginShared {
                store,
                events,
                next_context: AtomicU64::new(1),
            }),
        }
    }

    /// Open a new view (tab/window) over this origin.
    pub fn open_context(&self) -> BrowsingContext {
        let id = ContextId(self.shared.next_context.fetch_add(1, Ordering::Relaxed));
        debug!(context = %id, "Opened browsing context");
        BrowsingContext {
            id,
            shared: self.shared.clone(),
        }
    }
}

/// A single open view over an origin.
///
/// Cloning a context yields a handle to the same view (same id).
#[derive(Clone)]
pub struct BrowsingContext {
    id: ContextId,
    shared: Arc<OriginShared>,
}

impl BrowsingContext {
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Read the raw value stored under `key`.
    pub fn get_item(&self, key: &str) -> Result<Option<String>, TrackerError> {
        self.shared.store.get_item(key)
    }

    /// Write `value` under `key` and notify the other contexts.
    pub fn set_item(&self, key: &str, value: &str) -> Result<(), TrackerError> {
        let old_value = self.shared.store.get_item(key)?;
        self.shared.store.set_item(key, value)?;

        if old_value.as_deref() != Some(value) {
            self.announce(StorageEvent {
                key: key.to_string(),
                old_value,
                new_value: Some(value.to_string()),
                source: self.id,
            });
        }
        Ok(())
    }

    /// Remove `key` and notify the other contexts if it existed.
    pub fn remove_item(&self, key: &str) -> Result<(), TrackerError> {
        let old_value = self.shared.store.get_item(key)?;
        if self.shared.store.remove_item(key)? {
            self.announce(StorageEvent {
                key: key.to_string(),
                old_value,
                new_value: None,
                source: self.id,
            });
        }
        Ok(())
    }

    /// All keys present in the origin's store.
    pub fn keys(&self) -> Result<Vec<String>, TrackerError> {
        self.shared.store.keys()
    }

    /// Subscribe to writes made by other contexts of this origin.
    pub fn storage_events(&self) -> StorageEvents {
        StorageEvents {
            own: self.id,
            rx: self.shared.events.subscribe(),
        }
    }

    fn announce(&self, event: StorageEvent) {
        // No receivers simply means no other context is listening
        let _ = self.shared.events.send(event);
    }
}

impl fmt::Debug for BrowsingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowsingContext").field("id", &self.id).finish()
    }
}

/// Stream of storage events written by peer contexts.
pub struct StorageEvents {
    own: ContextId,
    rx: broadcast::Receiver<StorageEvent>,
}

impl StorageEvents {
    /// Wait for the next peer write.
    ///
    /// Returns `None` once the origin is gone. Events lost to a slow reader
    /// are skipped; delivery across contexts is best-effort.
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.source == self.own => continue,
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(context = %self.own, skipped, "Storage events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.source == self.own => continue,
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(context = %self.own, skipped, "Storage events lagged");
                }
                Err(_) => return None,
            }
        }
    }
}
