//! Player aggregate: one seat at the table.
//!
//! A player is a composition root. Its name, life total and clock live in
//! persistent cells keyed by the player id, so reopening the app reattaches
//! to the same records. Rotation and grid area are layout state and stay in
//! memory.

use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::cell::{PeerSubscription, PersistentCell};
use crate::error::TrackerError;
use crate::origin::BrowsingContext;
use crate::timer::{TimerEngine, TimerOptions};

/// Caller-assigned player id; must be unique among tracked players.
pub type PlayerId = u32;

/// Default starting life for a Commander game
pub const DEFAULT_LIFE: i64 = 40;

/// Seating orientation of a player's panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Next orientation, a quarter turn clockwise.
    pub fn rotate_clockwise(&self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg90,
            Rotation::Deg90 => Rotation::Deg180,
            Rotation::Deg180 => Rotation::Deg270,
            Rotation::Deg270 => Rotation::Deg0,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = TrackerError;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(TrackerError::InvalidOperation(format!(
                "rotation must be 0, 90, 180 or 270 degrees, got {}",
                other
            ))),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Everything needed to seat a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSeed {
    pub id: PlayerId,
    pub name: String,
    pub life: i64,
    pub rotation: Rotation,
    pub grid_area: String,
    pub initial_time: i64,
}

impl Default for PlayerSeed {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            life: DEFAULT_LIFE,
            rotation: Rotation::Deg0,
            grid_area: String::new(),
            initial_time: 0,
        }
    }
}

impl PlayerSeed {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

/// Storage key of a player's name.
pub fn name_key(id: PlayerId) -> String {
    format!("name-{}", id)
}

/// Storage key of a player's life total.
pub fn life_key(id: PlayerId) -> String {
    format!("life-{}", id)
}

/// One tracked participant.
pub struct Player {
    id: PlayerId,
    name: PersistentCell<String>,
    life: PersistentCell<i64>,
    rotation: RwLock<Rotation>,
    grid_area: RwLock<String>,
    timer: TimerEngine,
    subscriptions: Vec<PeerSubscription>,
}

impl Player {
    /// Seat a player, reattaching to any records stored under its id.
    ///
    /// Stored name, life and time take precedence over the seed. When a tokio
    /// runtime is running, the player also follows updates from other
    /// contexts until [`dispose`](Self::dispose) is called.
    pub fn new(context: Option<&BrowsingContext>, seed: PlayerSeed, options: TimerOptions) -> Self {
        let id = seed.id;
        let name = PersistentCell::new(context, name_key(id), seed.name);
        let life = PersistentCell::new(context, life_key(id), seed.life);
        let timer = TimerEngine::new(context, id, seed.initial_time, options);

        let subscriptions: Vec<PeerSubscription> = [
            name.subscribe_peers(),
            life.subscribe_peers(),
            timer.subscribe_peers(),
        ]
        .into_iter()
        .flatten()
        .collect();

        debug!(
            player = id,
            subscriptions = subscriptions.len(),
            "Seated player"
        );

        Self {
            id,
            name,
            life,
            rotation: RwLock::new(seed.rotation),
            grid_area: RwLock::new(seed.grid_area),
            timer,
            subscriptions,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> String {
        self.name.get()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.name.set(name.into());
    }

    pub fn life(&self) -> i64 {
        self.life.get()
    }

    /// Set the life total. Negative totals are allowed.
    pub fn set_life(&self, life: i64) {
        self.life.set(life);
    }

    /// Change life by `delta`, saturating at the `i64` bounds.
    pub fn adjust_life(&self, delta: i64) {
        self.life.update(|life| *life = life.saturating_add(delta));
    }

    pub fn watch_life(&self) -> watch::Receiver<i64> {
        self.life.watch()
    }

    pub fn rotation(&self) -> Rotation {
        *self.rotation.read()
    }

    pub fn set_rotation(&self, rotation: Rotation) {
        *self.rotation.write() = rotation;
    }

    pub fn grid_area(&self) -> String {
        self.grid_area.read().clone()
    }

    pub fn set_grid_area(&self, grid_area: impl Into<String>) {
        *self.grid_area.write() = grid_area.into();
    }

    pub fn timer(&self) -> &TimerEngine {
        &self.timer
    }

    /// Number of live peer subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Stop the clock and drop every peer subscription.
    pub fn dispose(self) {
        self.timer.pause();
        for subscription in self.subscriptions {
            subscription.dispose();
        }
        debug!(player = self.id, "Disposed player");
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("life", &self.life())
            .field("rotation", &self.rotation())
            .field("grid_area", &self.grid_area())
            .field("timer", &self.timer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::Origin;
    use crate::storage::{KeyValueStore, MemoryStore};
    use crate::timer::ExpiryPolicy;

    #[test]
    fn test_rotation_cycle_and_serde() {
        assert_eq!(Rotation::Deg270.rotate_clockwise(), Rotation::Deg0);
        assert_eq!(serde_json::to_string(&Rotation::Deg180).unwrap(), "180");
        assert_eq!(
            serde_json::from_str::<Rotation>("90").unwrap(),
            Rotation::Deg90
        );
        assert!(serde_json::from_str::<Rotation>("45").is_err());
    }

    #[test]
    fn test_seed_defaults() {
        let seed: PlayerSeed = serde_json::from_str(r#"{"id": 3}"#).unwrap();
        assert_eq!(seed.id, 3);
        assert_eq!(seed.life, DEFAULT_LIFE);
        assert_eq!(seed.rotation, Rotation::Deg0);
    }

    #[test]
    fn test_in_memory_player() {
        let player = Player::new(None, PlayerSeed::new(1), TimerOptions::default());

        player.adjust_life(-45);
        assert_eq!(player.life(), -5);
        player.set_rotation(Rotation::Deg90);
        player.set_grid_area("a");
        assert_eq!(player.rotation(), Rotation::Deg90);
        assert_eq!(player.grid_area(), "a");
        assert_eq!(player.subscription_count(), 0);
        player.dispose();
    }

    #[test]
    fn test_adjust_life_saturates() {
        let player = Player::new(None, PlayerSeed::new(1), TimerOptions::default());

        player.adjust_life(i64::MAX);
        player.adjust_life(i64::MAX);
        assert_eq!(player.life(), i64::MAX);
        player.set_life(i64::MIN + 1);
        player.adjust_life(-5);
        assert_eq!(player.life(), i64::MIN);
        player.dispose();
    }

    #[test]
    fn test_player_keys_derive_from_id() {
        let store = MemoryStore::new();
        let origin = Origin::new(store.clone());
        let ctx = origin.open_context();
        let options = TimerOptions {
            policy: ExpiryPolicy::Overtime,
            ..TimerOptions::default()
        };

        let seed = PlayerSeed {
            id: 7,
            name: "Kenrith".to_string(),
            initial_time: 90,
            ..PlayerSeed::default()
        };
        let player = Player::new(Some(&ctx), seed, options);
        player.set_name("Kenrith");
        player.adjust_life(-1);
        player.timer().tick();

        assert_eq!(
            store.get_item("name-7").unwrap().as_deref(),
            Some("\"Kenrith\"")
        );
        assert_eq!(store.get_item("life-7").unwrap().as_deref(), Some("39"));
        assert_eq!(store.get_item("timer-7").unwrap().as_deref(), Some("89"));
    }

    #[test]
    fn test_player_reattaches_to_stored_records() {
        let store = MemoryStore::new();
        let origin = Origin::new(store);

        {
            let ctx = origin.open_context();
            let player = Player::new(Some(&ctx), PlayerSeed::new(2), TimerOptions::default());
            player.set_name("Tymna");
            player.set_life(22);
            player.dispose();
        }

        let ctx = origin.open_context();
        let player = Player::new(Some(&ctx), PlayerSeed::new(2), TimerOptions::default());
        assert_eq!(player.name(), "Tymna");
        assert_eq!(player.life(), 22);
    }
}
