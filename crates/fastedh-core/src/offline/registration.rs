//! Active/waiting bookkeeping for cache agent versions.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::agent::{AgentState, CacheAgent, FetchDecision};
use super::cache::CacheStorage;
use super::http::{Fetcher, Request, Response};
use super::manifest::AssetManifest;
use crate::error::TrackerError;

/// When a freshly installed version takes over from the active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationPolicy {
    /// Activate as soon as install succeeds
    #[default]
    Immediate,
    /// Wait for a skip-waiting message or for every client to close
    WaitForSkip,
}

/// Control messages a page can post to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentMessage {
    /// Activate the waiting version now
    SkipWaiting,
}

/// The agent registration of one origin scope.
pub struct Registration {
    scope: Url,
    caches: CacheStorage,
    network: Arc<dyn Fetcher>,
    activation: ActivationPolicy,
    active: RwLock<Option<Arc<CacheAgent>>>,
    waiting: RwLock<Option<Arc<CacheAgent>>>,
}

impl Registration {
    pub fn new(
        scope: Url,
        caches: CacheStorage,
        network: Arc<dyn Fetcher>,
        activation: ActivationPolicy,
    ) -> Self {
        Self {
            scope,
            caches,
            network,
            activation,
            active: RwLock::new(None),
            waiting: RwLock::new(None),
        }
    }

    pub fn caches(&self) -> &CacheStorage {
        &self.caches
    }

    pub fn active(&self) -> Option<Arc<CacheAgent>> {
        self.active.read().clone()
    }

    pub fn waiting(&self) -> Option<Arc<CacheAgent>> {
        self.waiting.read().clone()
    }

    pub fn active_version(&self) -> Option<String> {
        self.active().map(|agent| agent.version().to_string())
    }

    pub fn waiting_version(&self) -> Option<String> {
        self.waiting().map(|agent| agent.version().to_string())
    }

    /// Install a deployed version and, per the activation policy, activate it.
    ///
    /// Registering the version that is already active is a no-op. A failed
    /// install leaves the active version serving and returns the error.
    pub async fn register(&self, manifest: AssetManifest) -> Result<AgentState, TrackerError> {
        if self.active_version().as_deref() == Some(manifest.version()) {
            debug!(version = manifest.version(), "Version already active");
            return Ok(AgentState::Activated);
        }

        let agent = Arc::new(CacheAgent::new(
            manifest,
            self.scope.clone(),
            self.caches.clone(),
            self.network.clone(),
        ));
        agent.install().await?;

        if self.activation == ActivationPolicy::Immediate || self.active().is_none() {
            self.promote(agent).await
        } else {
            info!(version = agent.version(), "New version waiting to activate");
            let replaced = self.waiting.write().replace(agent);
            if let Some(replaced) = replaced {
                replaced.retire();
            }
            Ok(AgentState::Installed)
        }
    }

    /// Handle a control message from a page.
    pub async fn post_message(&self, message: AgentMessage) -> Result<(), TrackerError> {
        match message {
            AgentMessage::SkipWaiting => {
                self.skip_waiting().await?;
            }
        }
        Ok(())
    }

    /// Activate the waiting version, if any. Returns whether one was promoted.
    pub async fn skip_waiting(&self) -> Result<bool, TrackerError> {
        let waiting = self.waiting.write().take();
        match waiting {
            Some(agent) => {
                self.promote(agent).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Every page under the scope has closed; a waiting version may take over.
    pub async fn clients_closed(&self) -> Result<bool, TrackerError> {
        self.skip_waiting().await
    }

    /// Route a page request through the active agent, or straight to the
    /// network when none is active or the agent passes it through.
    pub async fn fetch(&self, request: &Request) -> Result<Response, TrackerError> {
        if let Some(agent) = self.active() {
            if let FetchDecision::Respond(response) = agent.handle_fetch(request).await {
                return Ok(response);
            }
        }
        self.network.fetch(request).await
    }

    async fn promote(&self, agent: Arc<CacheAgent>) -> Result<AgentState, TrackerError> {
        agent.activate().await?;
        let previous = self.active.write().replace(agent);
        if let Some(previous) = previous {
            previous.retire();
        }
        Ok(AgentState::Activated)
    }
}
