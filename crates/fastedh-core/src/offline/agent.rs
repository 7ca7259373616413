//! One version of the offline cache agent.
//!
//! ## Lifecycle
//!
//! ```text
//! Parsed ── install() ──► Installing ──► Installed ── activate() ──► Activating ──► Activated
//!                              │
//!                              └── any asset fails ──► Redundant
//! ```
//!
//! ## Request strategy (GET, http/https only)
//!
//! 1. Manifest asset: serve from cache on hit
//! 2. Otherwise the network; cache complete same-origin 200 responses
//! 3. Network rejected: serve the exact request from cache
//! 4. Navigation or app root: offline page, then cached app root
//! 5. Synthetic plain-text 404

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::cache::{CacheRegion, CacheStorage};
use super::http::{Fetcher, Method, Request, Response};
use super::manifest::AssetManifest;
use crate::error::TrackerError;

/// Lifecycle state of one agent version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentState::Parsed => "parsed",
            AgentState::Installing => "installing",
            AgentState::Installed => "installed",
            AgentState::Activating => "activating",
            AgentState::Activated => "activated",
            AgentState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// What the agent did with an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDecision {
    /// Not handled; the request goes to the network untouched
    Passthrough,
    /// Handled; the page receives this response
    Respond(Response),
}

/// The offline cache agent for one deployed version.
pub struct CacheAgent {
    manifest: AssetManifest,
    scope: Url,
    caches: CacheStorage,
    network: Arc<dyn Fetcher>,
    state: RwLock<AgentState>,
}

impl CacheAgent {
    /// Create an agent for `manifest`, resolving asset paths against `scope`.
    pub fn new(
        manifest: AssetManifest,
        scope: Url,
        caches: CacheStorage,
        network: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            manifest,
            scope,
            caches,
            network,
            state: RwLock::new(AgentState::Parsed),
        }
    }

    pub fn version(&self) -> &str {
        self.manifest.version()
    }

    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    pub fn state(&self) -> AgentState {
        *self.state.read()
    }

    /// Fetch and store every manifest asset.
    ///
    /// Nothing is written unless every asset succeeds; on failure the agent
    /// becomes [`AgentState::Redundant`] and other regions are untouched.
    pub async fn install(&self) -> Result<(), TrackerError> {
        self.expect_state(AgentState::Parsed, "install")?;
        self.set_state(AgentState::Installing);

        match self.fetch_manifest().await {
            Ok(assets) => {
                let region = self.caches.open(&self.manifest.cache_name());
                region.put_all(assets);
                self.set_state(AgentState::Installed);
                info!(
                    version = self.version(),
                    assets = region.len(),
                    "Cache agent installed"
                );
                Ok(())
            }
            Err(e) => {
                self.set_state(AgentState::Redundant);
                warn!(version = self.version(), error = %e, "Cache agent install failed");
                Err(e)
            }
        }
    }

    /// Delete every cache region that does not belong to this version.
    ///
    /// Returns the number of regions removed.
    pub async fn activate(&self) -> Result<usize, TrackerError> {
        self.expect_state(AgentState::Installed, "activate")?;
        self.set_state(AgentState::Activating);

        let current = self.manifest.cache_name();
        let mut deleted = 0;
        for name in self.caches.keys() {
            if name != current && self.caches.delete(&name) {
                debug!(cache = %name, "Evicted stale cache region");
                deleted += 1;
            }
        }

        self.set_state(AgentState::Activated);
        info!(version = self.version(), deleted, "Cache agent activated");
        Ok(deleted)
    }

    /// Intercept one request issued by a page.
    pub async fn handle_fetch(&self, request: &Request) -> FetchDecision {
        if self.state() != AgentState::Activated {
            return FetchDecision::Passthrough;
        }
        if request.method != Method::Get || !request.is_http() {
            trace!(url = %request.url, method = %request.method, "Passing request through");
            return FetchDecision::Passthrough;
        }
        FetchDecision::Respond(self.respond(request).await)
    }

    pub(crate) fn retire(&self) {
        self.set_state(AgentState::Redundant);
    }

    async fn respond(&self, request: &Request) -> Response {
        let cache = self.caches.open(&self.manifest.cache_name());

        if self.manifest.contains(request.url.path()) {
            if let Some(hit) = cache.match_url(&request.url) {
                trace!(url = %request.url, "Serving precached asset");
                return hit;
            }
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    cache.put(&request.url, response.clone());
                }
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network failed, trying cache");
                self.offline_response(request, &cache)
            }
        }
    }

    fn offline_response(&self, request: &Request, cache: &CacheRegion) -> Response {
        if let Some(hit) = cache.match_url(&request.url) {
            return hit;
        }

        let root = self.manifest.root_path();
        if request.is_navigation() || request.url.path() == root {
            for path in [self.manifest.offline_page_path(), root] {
                let Ok(url) = self.scope.join(&path) else {
                    continue;
                };
                if let Some(hit) = cache.match_url(&url) {
                    debug!(url = %request.url, fallback = %path, "Serving offline fallback");
                    return hit;
                }
            }
        }

        warn!(url = %request.url, "No network and no cached copy");
        Response::offline_fallback()
    }

    async fn fetch_manifest(&self) -> Result<Vec<(Url, Response)>, TrackerError> {
        let mut fetched = Vec::with_capacity(self.manifest.len());
        for path in self.manifest.assets() {
            let url = self.scope.join(path)?;
            let request = Request::new(Method::Get, url.clone());
            let response = self.network.fetch(&request).await.map_err(|e| {
                TrackerError::AssetInstallFailure {
                    path: path.to_string(),
                    reason: e.to_string(),
                }
            })?;
            if !(200..300).contains(&response.status) {
                return Err(TrackerError::AssetInstallFailure {
                    path: path.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            fetched.push((url, response));
        }
        Ok(fetched)
    }

    fn expect_state(&self, expected: AgentState, operation: &str) -> Result<(), TrackerError> {
        let state = self.state();
        if state != expected {
            return Err(TrackerError::InvalidOperation(format!(
                "cannot {} agent {} while {}",
                operation,
                self.version(),
                state
            )));
        }
        Ok(())
    }

    fn set_state(&self, state: AgentState) {
        *self.state.write() = state;
    }
}

impl fmt::Debug for CacheAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheAgent")
            .field("version", &self.version())
            .field("scope", &self.scope.as_str())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Offline;

    #[async_trait]
    impl Fetcher for Offline {
        async fn fetch(&self, _request: &Request) -> Result<Response, TrackerError> {
            Err(TrackerError::NetworkFailure("offline".to_string()))
        }
    }

    fn agent() -> CacheAgent {
        CacheAgent::new(
            AssetManifest::new("v1", "/fast-edh"),
            Url::parse("https://example.org/").unwrap(),
            CacheStorage::new(),
            Arc::new(Offline),
        )
    }

    #[tokio::test]
    async fn test_install_failure_makes_agent_redundant() {
        let agent = agent();
        let err = agent.install().await.unwrap_err();
        assert!(matches!(err, TrackerError::AssetInstallFailure { .. }));
        assert_eq!(agent.state(), AgentState::Redundant);
    }

    #[tokio::test]
    async fn test_activate_requires_install() {
        let agent = agent();
        assert!(matches!(
            agent.activate().await,
            Err(TrackerError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_inactive_agent_passes_through() {
        let agent = agent();
        let request = Request::get("https://example.org/fast-edh/").unwrap();
        assert_eq!(agent.handle_fetch(&request).await, FetchDecision::Passthrough);
    }
}
