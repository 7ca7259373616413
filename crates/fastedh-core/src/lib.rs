//! Fast EDH Core Library
//!
//! Life, name and clock tracking for Commander games, with state that
//! survives reloads and follows the other open views of the same origin.
//!
//! ## Overview
//!
//! The tracker runs inside an origin: one durable key-value store shared by
//! every open view (tab, window, CLI invocation). Each view is a
//! [`BrowsingContext`]; writes made by one context are announced to the
//! others as [`StorageEvent`]s.
//!
//! - **Persistent cells**: a named value hydrated from the store on
//!   creation, written through on every set, and optionally following peers
//! - **Timers**: pause/resume/reset clocks whose time is a persistent cell
//! - **Players**: name, life and clock bundled under one id
//! - **Offline cache agent**: precaches a build and serves it without network
//!
//! ## Quick Start
//!
//! ```ignore
//! use fastedh_core::{Origin, Player, PlayerSeed, RedbStore, TimerOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let origin = Origin::new(RedbStore::open("~/.fastedh/data/local.redb")?);
//!     let tab = origin.open_context();
//!
//!     let player = Player::new(Some(&tab), PlayerSeed::new(1), TimerOptions::default());
//!     player.adjust_life(-3);
//!     player.timer().start()?;
//!
//!     println!("{}: {} ({})", player.name(), player.life(), player.timer().formatted());
//!     player.dispose();
//!     Ok(())
//! }
//! ```

pub mod cell;
pub mod config;
pub mod error;
pub mod logging;
pub mod matches;
pub mod offline;
pub mod origin;
pub mod player;
pub mod press;
pub mod storage;
pub mod timer;

// Re-exports
pub use cell::{CellValue, PeerSubscription, PersistentCell};
pub use config::TrackerConfig;
pub use error::{TrackerError, TrackerResult};
pub use matches::{load_matches, MatchRecord, MatchSource};
pub use offline::{
    ActivationPolicy, AgentMessage, AgentState, AssetManifest, CacheAgent, CacheRegion,
    CacheStorage, FetchDecision, Fetcher, Method, Registration, Request, RequestMode, Response,
    ResponseType,
};
pub use origin::{BrowsingContext, ContextId, Origin, StorageEvent, StorageEvents};
pub use player::{Player, PlayerId, PlayerSeed, Rotation, DEFAULT_LIFE};
pub use press::{PressDetector, PressEvent};
pub use storage::{KeyValueStore, MemoryStore, RedbStore};
pub use timer::{
    format_clock, ExpiryPolicy, TickOutcome, TimerDirection, TimerEngine, TimerOptions,
    TimerState,
};
