//! Press vs long-press detection for the life buttons.
//!
//! The detector is a pure state machine fed with timestamps, so the UI layer
//! can drive it from whatever event loop it has. Holding a button fires a
//! long press every `duration` until release; the click the platform emits
//! after such a hold is swallowed once.

use std::time::{Duration, Instant};

use crate::config::TrackerConfig;

/// Default hold time before a press becomes a long press
pub const DEFAULT_LONG_PRESS: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressEvent {
    Click,
    LongPress,
}

/// Tracks one pressable element.
#[derive(Debug, Clone)]
pub struct PressDetector {
    duration: Duration,
    next_long_press: Option<Instant>,
    ignore_click: bool,
}

impl Default for PressDetector {
    fn default() -> Self {
        Self::new(DEFAULT_LONG_PRESS)
    }
}

impl PressDetector {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            next_long_press: None,
            ignore_click: false,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.long_press())
    }

    pub fn is_held(&self) -> bool {
        self.next_long_press.is_some()
    }

    /// Pointer or touch went down.
    pub fn press_down(&mut self, at: Instant) {
        self.next_long_press = Some(at + self.duration);
    }

    /// Long presses due by `now`, one per elapsed `duration` of holding.
    pub fn poll(&mut self, now: Instant) -> Vec<PressEvent> {
        let mut events = Vec::new();
        while let Some(deadline) = self.next_long_press {
            if deadline > now {
                break;
            }
            self.ignore_click = true;
            events.push(PressEvent::LongPress);
            self.next_long_press = Some(deadline + self.duration);
        }
        events
    }

    /// Pointer or touch went up; pending long presses up to `at` still fire.
    pub fn release(&mut self, at: Instant) -> Vec<PressEvent> {
        let events = self.poll(at);
        self.next_long_press = None;
        events
    }

    /// The platform reported a click.
    pub fn click(&mut self) -> Option<PressEvent> {
        if self.ignore_click {
            self.ignore_click = false;
            return None;
        }
        Some(PressEvent::Click)
    }
}
