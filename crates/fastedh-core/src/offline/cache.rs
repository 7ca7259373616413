//! Named cache regions of request/response pairs.
//!
//! A [`CacheStorage`] is origin-wide: every handle cloned from it sees the
//! same regions. Entries are keyed by URL with the fragment stripped.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use url::Url;

use super::http::Response;

type Entries = Arc<RwLock<BTreeMap<String, Response>>>;

/// All cache regions of one origin.
#[derive(Clone, Default)]
pub struct CacheStorage {
    regions: Arc<RwLock<BTreeMap<String, Entries>>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a region, creating it empty if needed.
    pub fn open(&self, name: &str) -> CacheRegion {
        let entries = self
            .regions
            .write()
            .entry(name.to_string())
            .or_default()
            .clone();
        CacheRegion {
            name: name.to_string(),
            entries,
        }
    }

    /// Open a region only if it already exists.
    pub fn get(&self, name: &str) -> Option<CacheRegion> {
        self.regions.read().get(name).map(|entries| CacheRegion {
            name: name.to_string(),
            entries: entries.clone(),
        })
    }

    pub fn has(&self, name: &str) -> bool {
        self.regions.read().contains_key(name)
    }

    /// Names of every region, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.regions.read().keys().cloned().collect()
    }

    /// Delete a region, returning whether it existed.
    pub fn delete(&self, name: &str) -> bool {
        let removed = self.regions.write().remove(name).is_some();
        if removed {
            debug!(cache = name, "Deleted cache region");
        }
        removed
    }
}

/// Handle to one named region.
#[derive(Clone)]
pub struct CacheRegion {
    name: String,
    entries: Entries,
}

impl CacheRegion {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the stored response for `url`.
    pub fn match_url(&self, url: &Url) -> Option<Response> {
        self.entries.read().get(&cache_key(url)).cloned()
    }

    /// Store a response for `url`, replacing any previous one.
    pub fn put(&self, url: &Url, response: Response) {
        self.entries.write().insert(cache_key(url), response);
    }

    /// Store several responses under a single lock.
    pub fn put_all(&self, items: impl IntoIterator<Item = (Url, Response)>) {
        let mut entries = self.entries.write();
        for (url, response) in items {
            entries.insert(cache_key(&url), response);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Stored URLs, sorted.
    pub fn urls(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

fn cache_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}
