//! Pause/resume/reset clock built on a persistent cell.
//!
//! ## Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  TimerState                                                  │
//! │  ├── Paused  ── start() ──► Running                          │
//! │  ├── Running ── pause() ──► Paused                           │
//! │  └── any     ── reset() ──► Paused (time = initial)          │
//! │                                                              │
//! │  Running: one tokio task ticks every period,                 │
//! │           time += step  (step = +1 count-up, -1 countdown)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only the time value is persisted; a reloaded timer is always paused.
//! Ticks come from a fixed-period trigger rather than measured wall-clock
//! time, so pause/start cycles and host sleep may drift the displayed time.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cell::{PeerSubscription, PersistentCell};
use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::origin::BrowsingContext;

/// What a countdown does when it runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Keep counting past zero into negative time
    Overtime,
    /// Stop at zero and pause
    #[default]
    FloorAtZero,
}

impl ExpiryPolicy {
    /// Storage key prefix used by timers under this policy.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            ExpiryPolicy::Overtime => "timer",
            ExpiryPolicy::FloorAtZero => "countdown",
        }
    }
}

/// Direction the clock runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerDirection {
    CountUp,
    #[default]
    CountDown,
}

impl TimerDirection {
    pub fn step(&self) -> i64 {
        match self {
            TimerDirection::CountUp => 1,
            TimerDirection::CountDown => -1,
        }
    }
}

/// Whether a ticking process exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Paused,
    Running,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerState::Paused => write!(f, "Paused"),
            TimerState::Running => write!(f, "Running"),
        }
    }
}

/// Result of applying one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Time advanced by one step
    Advanced,
    /// Countdown hit zero under [`ExpiryPolicy::FloorAtZero`]; the timer paused
    Expired,
}

/// Construction options shared by every timer of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerOptions {
    pub direction: TimerDirection,
    pub policy: ExpiryPolicy,
    pub period: Duration,
}

impl Default for TimerOptions {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}

impl TimerOptions {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            direction: TimerDirection::CountDown,
            policy: config.expiry_policy,
            period: config.tick_period(),
        }
    }

    pub fn with_direction(mut self, direction: TimerDirection) -> Self {
        self.direction = direction;
        self
    }
}

#[derive(Default)]
struct TickerSlot {
    generation: u64,
    active: Option<JoinHandle<()>>,
}

struct TimerInner {
    id: String,
    time: PersistentCell<i64>,
    initial_time_seconds: i64,
    options: TimerOptions,
    ticker: Mutex<TickerSlot>,
}

/// A count-up or countdown clock whose time survives reloads.
///
/// Clones share the same clock. Owners call [`pause`](Self::pause) before
/// releasing a timer; the ticking task is also cancelled when the last
/// handle is dropped.
#[derive(Clone)]
pub struct TimerEngine {
    inner: Arc<TimerInner>,
}

impl TimerEngine {
    /// Create a paused timer whose time lives under `<prefix>-<id>`.
    pub fn new(
        context: Option<&BrowsingContext>,
        id: impl fmt::Display,
        initial_time_seconds: i64,
        options: TimerOptions,
    ) -> Self {
        let id = id.to_string();
        let key = storage_key(options.policy, &id);
        let time = PersistentCell::new(context, key, initial_time_seconds);
        Self {
            inner: Arc::new(TimerInner {
                id,
                time,
                initial_time_seconds,
                options,
                ticker: Mutex::new(TickerSlot::default()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Storage key of the persisted time.
    pub fn key(&self) -> &str {
        self.inner.time.key()
    }

    pub fn options(&self) -> TimerOptions {
        self.inner.options
    }

    pub fn time_seconds(&self) -> i64 {
        self.inner.time.get()
    }

    pub fn initial_time_seconds(&self) -> i64 {
        self.inner.initial_time_seconds
    }

    pub fn is_paused(&self) -> bool {
        self.inner.ticker.lock().active.is_none()
    }

    pub fn state(&self) -> TimerState {
        if self.is_paused() {
            TimerState::Paused
        } else {
            TimerState::Running
        }
    }

    /// `MM:SS`, prefixed with `-` when negative.
    pub fn formatted(&self) -> String {
        format_clock(self.time_seconds())
    }

    /// Receiver notified whenever the time changes.
    pub fn watch(&self) -> watch::Receiver<i64> {
        self.inner.time.watch()
    }

    /// Follow time updates written by other contexts.
    pub fn subscribe_peers(&self) -> Option<PeerSubscription> {
        self.inner.time.subscribe_peers()
    }

    /// Begin ticking. No-op when already running.
    ///
    /// Fails only when called outside a tokio runtime.
    pub fn start(&self) -> Result<(), TrackerError> {
        self.spawn_ticker(None)
    }

    /// Begin ticking and pause on its own after `ticks` ticks, or earlier
    /// if the countdown expires. No-op when already running.
    pub fn start_for(&self, ticks: u32) -> Result<(), TrackerError> {
        self.spawn_ticker(Some(ticks))
    }

    fn spawn_ticker(&self, limit: Option<u32>) -> Result<(), TrackerError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TrackerError::NoRuntime)?;
        if limit == Some(0) {
            return Ok(());
        }

        let mut slot = self.inner.ticker.lock();
        if slot.active.is_some() {
            return Ok(());
        }
        slot.generation += 1;
        let generation = slot.generation;

        let timer: Weak<TimerInner> = Arc::downgrade(&self.inner);
        let period = self.inner.options.period;
        let task = runtime.spawn(async move {
            let mut remaining = limit;
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(inner) = timer.upgrade() else {
                    break;
                };
                if !inner.scheduled_tick(generation, &mut remaining) {
                    break;
                }
            }
        });
        slot.active = Some(task);

        info!(timer = %self.inner.id, time = self.time_seconds(), ?limit, "Timer started");
        Ok(())
    }

    /// Stop ticking. Safe to call when already paused.
    ///
    /// No tick lands after this returns, even one already in flight.
    pub fn pause(&self) {
        let task = {
            let mut slot = self.inner.ticker.lock();
            slot.generation += 1;
            slot.active.take()
        };
        if let Some(task) = task {
            task.abort();
            info!(timer = %self.inner.id, time = self.time_seconds(), "Timer paused");
        }
    }

    /// Pause and return to the initial time.
    pub fn reset(&self) {
        self.pause();
        self.inner.time.set(self.inner.initial_time_seconds);
        debug!(timer = %self.inner.id, "Timer reset");
    }

    /// Apply one tick immediately, as the ticking task would.
    pub fn tick(&self) -> TickOutcome {
        let outcome = {
            let _slot = self.inner.ticker.lock();
            self.inner.apply_tick()
        };
        if outcome == TickOutcome::Expired {
            self.pause();
        }
        outcome
    }
}

impl TimerInner {
    /// Saturates at the `i64` bounds.
    fn apply_tick(&self) -> TickOutcome {
        let step = self.options.direction.step();
        let next = self.time.get().saturating_add(step);

        if self.options.policy == ExpiryPolicy::FloorAtZero && step < 0 && next <= 0 {
            self.time.set(0);
            info!(timer = %self.id, "Countdown expired");
            return TickOutcome::Expired;
        }

        self.time.set(next);
        TickOutcome::Advanced
    }

    /// One tick from the task started as `generation`. The tick is applied
    /// under the ticker lock and dropped if a pause or restart got there
    /// first. Returns whether the task should keep running.
    fn scheduled_tick(&self, generation: u64, remaining: &mut Option<u32>) -> bool {
        let mut slot = self.ticker.lock();
        if slot.generation != generation {
            return false;
        }

        let outcome = self.apply_tick();
        if let Some(left) = remaining.as_mut() {
            *left = left.saturating_sub(1);
        }
        if outcome == TickOutcome::Expired || *remaining == Some(0) {
            slot.active = None;
            debug!(timer = %self.id, time = self.time.get(), "Ticker finished");
            return false;
        }
        true
    }
}

impl Drop for TimerInner {
    fn drop(&mut self) {
        if let Some(task) = self.ticker.get_mut().active.take() {
            task.abort();
        }
    }
}

impl fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEngine")
            .field("id", &self.inner.id)
            .field("time_seconds", &self.time_seconds())
            .field("state", &self.state())
            .finish()
    }
}

/// Storage key for a timer id under a policy.
pub fn storage_key(policy: ExpiryPolicy, id: &str) -> String {
    format!("{}-{}", policy.key_prefix(), id)
}

/// Render seconds as `MM:SS`, with a leading `-` for negative values.
///
/// Minutes are not wrapped, so 100 minutes renders as `100:00`.
pub fn format_clock(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let magnitude = seconds.unsigned_abs();
    format!("{}{:02}:{:02}", sign, magnitude / 60, magnitude % 60)
}
