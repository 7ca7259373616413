//! Persistent reactive cells.
//!
//! A [`PersistentCell`] wraps one named value, mirrors every local write to
//! the origin's durable store and, once [`subscribe_peers`] is called,
//! follows writes other contexts make to the same key.
//!
//! Failure policy:
//! - store unreachable at creation: the cell silently becomes in-memory only
//! - malformed record at creation: the default wins
//! - malformed record from a peer: the current value is kept
//!
//! [`subscribe_peers`]: PersistentCell::subscribe_peers

use std::fmt;
use std::sync::{Arc, Weak};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::TrackerError;
use crate::origin::{BrowsingContext, StorageEvent};

/// Bound shared by every value a cell can hold.
pub trait CellValue: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> CellValue for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

struct CellInner<T> {
    key: String,
    context: Option<BrowsingContext>,
    value: watch::Sender<T>,
}

/// A single named value backed by durable storage.
pub struct PersistentCell<T> {
    inner: Arc<CellInner<T>>,
}

impl<T> Clone for PersistentCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: CellValue> PersistentCell<T> {
    /// Create a cell for `key`, hydrated from durable storage when possible.
    ///
    /// Passing `None` for the context (no durable storage in this
    /// environment) yields a purely in-memory cell seeded with `default`.
    pub fn new(context: Option<&BrowsingContext>, key: impl Into<String>, default: T) -> Self {
        let key = key.into();
        let (context, initial) = match context {
            None => (None, default),
            Some(ctx) => match ctx.get_item(&key) {
                Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                    Ok(stored) => {
                        debug!(%key, "Hydrated cell from durable storage");
                        (Some(ctx.clone()), stored)
                    }
                    Err(e) => {
                        let err = TrackerError::MalformedRecord {
                            key: key.clone(),
                            reason: e.to_string(),
                        };
                        warn!(error = %err, "Discarding stored record, using default");
                        (Some(ctx.clone()), default)
                    }
                },
                Ok(None) => (Some(ctx.clone()), default),
                Err(e) => {
                    let err = TrackerError::StorageUnavailable(e.to_string());
                    warn!(%key, error = %err, "Cell kept in memory");
                    (None, default)
                }
            },
        };

        let (value, _) = watch::channel(initial);
        Self {
            inner: Arc::new(CellInner {
                key,
                context,
                value,
            }),
        }
    }

    /// Storage key of this cell.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Whether writes reach durable storage.
    pub fn is_persistent(&self) -> bool {
        self.inner.context.is_some()
    }

    /// Current value. Never touches durable storage.
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replace the value and write it through to durable storage.
    pub fn set(&self, value: T) {
        self.persist(&value);
        self.inner.value.send_replace(value);
    }

    /// Read-modify-write helper.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut value = self.get();
        f(&mut value);
        self.set(value);
    }

    /// Receiver notified on every local write and every applied peer update.
    pub fn watch(&self) -> watch::Receiver<T> {
        self.inner.value.subscribe()
    }

    /// Apply a storage event written by another context.
    ///
    /// Events for other keys are ignored, and so are removals and values
    /// that fail to parse. Returns whether the value changed.
    pub fn apply_storage_event(&self, event: &StorageEvent) -> bool {
        self.inner.apply_storage_event(event)
    }

    /// Follow writes that other contexts make to this cell's key.
    ///
    /// Returns `None` for in-memory cells and when no tokio runtime is running.
    /// The returned subscription must be disposed by the owner on teardown.
    pub fn subscribe_peers(&self) -> Option<PeerSubscription> {
        let ctx = self.inner.context.as_ref()?;
        let runtime = tokio::runtime::Handle::try_current().ok()?;

        let mut events = ctx.storage_events();
        let cell: Weak<CellInner<T>> = Arc::downgrade(&self.inner);
        let task = runtime.spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(inner) = cell.upgrade() else {
                    break;
                };
                inner.apply_storage_event(&event);
            }
        });

        Some(PeerSubscription {
            key: self.inner.key.clone(),
            task: Some(task),
        })
    }

    fn persist(&self, value: &T) {
        let Some(ctx) = self.inner.context.as_ref() else {
            return;
        };
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %self.inner.key, error = %e, "Failed to serialize cell value");
                return;
            }
        };
        if let Err(e) = ctx.set_item(&self.inner.key, &raw) {
            warn!(key = %self.inner.key, error = %e, "Failed to write cell to durable storage");
        }
    }
}

impl<T: CellValue> CellInner<T> {
    fn apply_storage_event(&self, event: &StorageEvent) -> bool {
        if event.key != self.key {
            return false;
        }
        let Some(raw) = event.new_value.as_deref() else {
            trace!(key = %self.key, "Ignoring peer removal");
            return false;
        };
        match serde_json::from_str::<T>(raw) {
            Ok(value) => {
                debug!(key = %self.key, source = %event.source, "Applied peer update");
                self.value.send_replace(value);
                true
            }
            Err(e) => {
                debug!(key = %self.key, error = %e, "Ignoring malformed peer update");
                false
            }
        }
    }
}

impl<T: CellValue + fmt::Debug> fmt::Debug for PersistentCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentCell")
            .field("key", &self.inner.key)
            .field("value", &*self.inner.value.borrow())
            .field("persistent", &self.inner.context.is_some())
            .finish()
    }
}

/// Disposer for a cell's peer-update listener.
pub struct PeerSubscription {
    key: String,
    task: Option<JoinHandle<()>>,
}

impl PeerSubscription {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stop following peer writes.
    pub fn dispose(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            trace!(key = %self.key, "Peer subscription disposed");
        }
    }
}

impl Drop for PeerSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::Origin;
    use crate::storage::{KeyValueStore, MemoryStore};

    fn peer_event(key: &str, value: Option<&str>) -> StorageEvent {
        StorageEvent {
            key: key.to_string(),
            old_value: None,
            new_value: value.map(str::to_string),
            source: Origin::new(MemoryStore::new()).open_context().id(),
        }
    }

    #[test]
    fn test_default_when_record_absent() {
        let origin = Origin::new(MemoryStore::new());
        let ctx = origin.open_context();

        let cell = PersistentCell::new(Some(&ctx), "life-1", 40i64);
        assert_eq!(cell.get(), 40);
        assert!(cell.is_persistent());
    }

    #[test]
    fn test_hydrates_from_store() {
        let store = MemoryStore::new();
        store.set_item("name-2", "\"Ezuri\"").unwrap();
        let origin = Origin::new(store);
        let ctx = origin.open_context();

        let cell = PersistentCell::new(Some(&ctx), "name-2", String::new());
        assert_eq!(cell.get(), "Ezuri");
    }

    #[test]
    fn test_malformed_record_falls_back_to_default() {
        let store = MemoryStore::new();
        store.set_item("life-1", "{not json").unwrap();
        store.set_item("life-2", "\"forty\"").unwrap();
        let origin = Origin::new(store);
        let ctx = origin.open_context();

        assert_eq!(PersistentCell::new(Some(&ctx), "life-1", 40i64).get(), 40);
        assert_eq!(PersistentCell::new(Some(&ctx), "life-2", 40i64).get(), 40);
    }

    #[test]
    fn test_set_writes_through_and_reads_back() {
        let store = MemoryStore::new();
        let origin = Origin::new(store.clone());
        let ctx = origin.open_context();

        let cell = PersistentCell::new(Some(&ctx), "life-1", 40i64);
        cell.set(-3);

        assert_eq!(cell.get(), -3);
        assert_eq!(store.get_item("life-1").unwrap().as_deref(), Some("-3"));
    }

    #[test]
    fn test_update_and_watch() {
        let cell = PersistentCell::new(None, "life-1", 40i64);
        let rx = cell.watch();

        cell.update(|life| *life -= 5);

        assert_eq!(cell.get(), 35);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow(), 35);
    }

    #[test]
    fn test_in_memory_cell_has_no_subscription() {
        let cell = PersistentCell::new(None, "life-1", 40i64);
        assert!(!cell.is_persistent());
        assert!(cell.subscribe_peers().is_none());
    }

    #[test]
    fn test_apply_storage_event_filters_key_and_garbage() {
        let cell = PersistentCell::new(None, "life-1", 40i64);

        assert!(!cell.apply_storage_event(&peer_event("life-2", Some("1"))));
        assert!(!cell.apply_storage_event(&peer_event("life-1", Some("oops"))));
        assert!(!cell.apply_storage_event(&peer_event("life-1", None)));
        assert_eq!(cell.get(), 40);

        assert!(cell.apply_storage_event(&peer_event("life-1", Some("12"))));
        assert_eq!(cell.get(), 12);
    }

    #[test]
    fn test_peer_event_does_not_write_back() {
        let store = MemoryStore::new();
        let origin = Origin::new(store.clone());
        let ctx = origin.open_context();
        let cell = PersistentCell::new(Some(&ctx), "life-1", 40i64);

        cell.apply_storage_event(&StorageEvent {
            key: "life-1".to_string(),
            old_value: None,
            new_value: Some("7".to_string()),
            source: ctx.id(),
        });

        assert_eq!(cell.get(), 7);
        assert!(store.get_item("life-1").unwrap().is_none());
    }
}
