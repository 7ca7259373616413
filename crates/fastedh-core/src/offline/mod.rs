//! Offline cache agent.
//!
//! A background agent, independent of any page, that keeps the app usable
//! without connectivity:
//!
//! - **Install**: precache every manifest asset into `cache-<version>`
//! - **Activate**: evict every other cache region
//! - **Fetch**: cache-first for manifest assets, network-first otherwise,
//!   with an offline page and a synthetic 404 as last resorts
//!
//! [`Registration`] tracks which version is active and which is waiting,
//! and accepts the skip-waiting control message.

pub mod agent;
pub mod cache;
pub mod http;
pub mod manifest;
pub mod registration;

pub use agent::{AgentState, CacheAgent, FetchDecision};
pub use cache::{CacheRegion, CacheStorage};
pub use http::{Fetcher, Method, Request, RequestMode, Response, ResponseType};
pub use manifest::{AssetManifest, CACHE_PREFIX, OFFLINE_PAGE};
pub use registration::{ActivationPolicy, AgentMessage, Registration};
