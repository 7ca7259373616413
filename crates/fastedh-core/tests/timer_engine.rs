//! Timer behaviour against tokio's paused clock.
//!
//! `start_paused` makes `sleep` advance virtual time instantly, so these
//! tests observe exact tick counts without waiting in real time.

use std::time::Duration;

use fastedh_core::{
    ExpiryPolicy, MemoryStore, Origin, TimerDirection, TimerEngine, TimerOptions, TimerState,
};
use tokio::time::sleep;

fn options(policy: ExpiryPolicy) -> TimerOptions {
    TimerOptions {
        direction: TimerDirection::CountDown,
        policy,
        period: Duration::from_secs(1),
    }
}

#[tokio::test(start_paused = true)]
async fn test_countdown_floors_at_zero_and_pauses() {
    let timer = TimerEngine::new(None, 1, 5, options(ExpiryPolicy::FloorAtZero));
    timer.start().unwrap();
    assert_eq!(timer.state(), TimerState::Running);

    sleep(Duration::from_millis(2500)).await;
    assert_eq!(timer.time_seconds(), 3);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(timer.time_seconds(), 0);
    assert!(timer.is_paused());
    assert_eq!(timer.formatted(), "00:00");
}

#[tokio::test(start_paused = true)]
async fn test_overtime_keeps_counting_negative() {
    let timer = TimerEngine::new(None, 2, 2, options(ExpiryPolicy::Overtime));
    timer.start().unwrap();

    sleep(Duration::from_millis(5500)).await;
    assert_eq!(timer.time_seconds(), -3);
    assert_eq!(timer.formatted(), "-00:03");
    assert!(!timer.is_paused());

    timer.pause();
}

#[tokio::test(start_paused = true)]
async fn test_double_start_then_single_pause_stops_ticking() {
    let timer = TimerEngine::new(None, 3, 60, options(ExpiryPolicy::Overtime));
    timer.start().unwrap();
    timer.start().unwrap();

    sleep(Duration::from_millis(3500)).await;
    // One ticking task, not two.
    assert_eq!(timer.time_seconds(), 57);

    timer.pause();
    assert!(timer.is_paused());
    sleep(Duration::from_secs(5)).await;
    assert_eq!(timer.time_seconds(), 57);
}

#[tokio::test(start_paused = true)]
async fn test_pause_resume_continues_from_current_time() {
    let timer = TimerEngine::new(None, 4, 30, options(ExpiryPolicy::FloorAtZero));
    timer.start().unwrap();
    sleep(Duration::from_millis(2100)).await;
    timer.pause();
    assert_eq!(timer.time_seconds(), 28);

    timer.start().unwrap();
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(timer.time_seconds(), 27);
    timer.pause();
}

#[tokio::test(start_paused = true)]
async fn test_reset_while_running() {
    let timer = TimerEngine::new(None, 5, 90, options(ExpiryPolicy::FloorAtZero));
    timer.start().unwrap();
    sleep(Duration::from_millis(4500)).await;

    timer.reset();
    assert!(timer.is_paused());
    assert_eq!(timer.time_seconds(), 90);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(timer.time_seconds(), 90);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_expiry_stays_at_zero() {
    let timer = TimerEngine::new(None, 6, 1, options(ExpiryPolicy::FloorAtZero));
    timer.start().unwrap();
    sleep(Duration::from_millis(1500)).await;
    assert!(timer.is_paused());

    timer.start().unwrap();
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(timer.time_seconds(), 0);
    assert!(timer.is_paused());
}

#[tokio::test(start_paused = true)]
async fn test_time_persists_but_state_does_not() {
    let origin = Origin::new(MemoryStore::new());
    let tab = origin.open_context();

    let timer = TimerEngine::new(Some(&tab), 7, 100, options(ExpiryPolicy::Overtime));
    assert_eq!(timer.key(), "timer-7");
    timer.start().unwrap();
    sleep(Duration::from_millis(3500)).await;
    drop(timer);

    let reloaded = TimerEngine::new(Some(&tab), 7, 100, options(ExpiryPolicy::Overtime));
    assert_eq!(reloaded.time_seconds(), 97);
    assert!(reloaded.is_paused());
    assert_eq!(reloaded.initial_time_seconds(), 100);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_last_handle_stops_ticking() {
    let origin = Origin::new(MemoryStore::new());
    let tab = origin.open_context();
    let mut time = {
        let timer = TimerEngine::new(Some(&tab), 8, 50, options(ExpiryPolicy::Overtime));
        timer.start().unwrap();
        timer.watch()
    };

    time.mark_unchanged();
    sleep(Duration::from_secs(3)).await;
    assert!(!time.has_changed().unwrap_or(false));
}

#[tokio::test(start_paused = true)]
async fn test_start_for_pauses_after_limit() {
    let timer = TimerEngine::new(None, 7, 10, options(ExpiryPolicy::Overtime));
    timer.start_for(3).unwrap();
    assert_eq!(timer.state(), TimerState::Running);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(timer.time_seconds(), 7);
    assert!(timer.is_paused());

    timer.start_for(0).unwrap();
    assert!(timer.is_paused());
}

#[tokio::test(start_paused = true)]
async fn test_start_for_stops_at_floor_before_limit() {
    let timer = TimerEngine::new(None, 8, 2, options(ExpiryPolicy::FloorAtZero));
    timer.start_for(10).unwrap();

    sleep(Duration::from_secs(20)).await;
    assert_eq!(timer.time_seconds(), 0);
    assert!(timer.is_paused());
}

/// Reset on one thread while the ticking task fires on another: once
/// `reset` returns, no tick from the old task may land.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reset_wins_against_in_flight_tick() {
    let options = TimerOptions {
        direction: TimerDirection::CountDown,
        policy: ExpiryPolicy::Overtime,
        period: Duration::from_millis(1),
    };
    let timer = TimerEngine::new(None, 9, 1_000, options);

    let mut violations = 0;
    for _ in 0..400 {
        timer.start().unwrap();
        sleep(Duration::from_millis(2)).await;
        timer.reset();
        if timer.time_seconds() != 1_000 || !timer.is_paused() {
            violations += 1;
        }
        sleep(Duration::from_millis(1)).await;
        if timer.time_seconds() != 1_000 || !timer.is_paused() {
            violations += 1;
        }
    }
    assert_eq!(violations, 0);
}
