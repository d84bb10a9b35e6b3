//! Integration tests for the tick scheduler.
//!
//! Every async test runs on a paused Tokio clock: sleeps resolve as soon as
//! the runtime is idle, and `advance` stands in for a slow simulation step.

use std::time::Duration;

use pestle_tick::{TickConfig, TickScheduler};
use tokio::time::{self, Instant};

fn no_jitter(rate: u32) -> TickConfig {
    TickConfig {
        initial_jitter_us: 0,
        ..TickConfig::with_rate(rate)
    }
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.tick_rate_hz, 30);
    assert_eq!(cfg.budget_warn_threshold, 0.80);
}

#[test]
fn test_tick_duration_20hz() {
    assert_eq!(
        TickConfig::with_rate(20).tick_duration(),
        Duration::from_millis(50)
    );
}

#[test]
fn test_out_of_range_rates_are_clamped() {
    assert_eq!(TickConfig::with_rate(0).validated().tick_rate_hz, 1);
    assert_eq!(TickConfig::with_rate(500).validated().tick_rate_hz, 128);
    assert_eq!(TickConfig::with_rate(64).validated().tick_rate_hz, 64);
}

#[test]
fn test_warn_threshold_is_clamped() {
    let cfg = TickConfig {
        budget_warn_threshold: 3.0,
        ..TickConfig::default()
    }
    .validated();
    assert_eq!(cfg.budget_warn_threshold, 1.0);
}

#[test]
fn test_scheduler_initial_state() {
    let s = TickScheduler::new(no_jitter(20));
    assert_eq!(s.tick_count(), 0);
    assert_eq!(s.tick_rate_hz(), 20);
    assert_eq!(s.tick_duration(), Duration::from_millis(50));
    assert_eq!(s.metrics().total_ticks, 0);
}

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_first_tick_fires_after_one_period() {
    let start = Instant::now();
    let mut s = TickScheduler::new(no_jitter(20));

    let info = s.wait_for_tick().await;

    assert_eq!(start.elapsed(), Duration::from_millis(50));
    assert_eq!(info.tick, 1);
    assert_eq!(info.dt, Duration::from_millis(50));
    assert!(!info.overrun);
    assert_eq!(info.ticks_skipped, 0);
}

#[tokio::test(start_paused = true)]
async fn test_jitter_delays_only_the_first_tick() {
    let start = Instant::now();
    let mut s = TickScheduler::new(TickConfig {
        initial_jitter_us: 10_000,
        ..TickConfig::with_rate(20)
    });

    s.wait_for_tick().await;
    let first = start.elapsed();
    assert!(first >= Duration::from_millis(50));
    assert!(first < Duration::from_millis(60));

    s.wait_for_tick().await;
    assert_eq!(start.elapsed() - first, Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_ticks_are_monotonic_with_fixed_dt() {
    let mut s = TickScheduler::new(no_jitter(20));

    for expected in 1..=5 {
        let info = s.wait_for_tick().await;
        assert_eq!(info.tick, expected);
        assert_eq!(info.dt, Duration::from_millis(50));
    }
    assert_eq!(s.tick_count(), 5);
    assert_eq!(s.metrics().total_ticks, 5);
}

// =========================================================================
// Overruns
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_late_tick_skips_missed_periods() {
    let mut s = TickScheduler::new(no_jitter(20));
    s.wait_for_tick().await; // t = 50ms, next due at 100ms

    time::advance(Duration::from_millis(175)).await; // now 225ms, 125ms late
    let info = s.wait_for_tick().await;

    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 2);
    assert_eq!(s.metrics().total_overruns, 1);
    assert_eq!(s.metrics().total_skipped, 2);

    // Rescheduled from the late wake-up, not the missed deadline.
    let before = Instant::now();
    let info = s.wait_for_tick().await;
    assert_eq!(before.elapsed(), Duration::from_millis(50));
    assert!(!info.overrun);
}

#[tokio::test(start_paused = true)]
async fn test_slightly_late_tick_is_not_an_overrun() {
    let mut s = TickScheduler::new(no_jitter(20));
    s.wait_for_tick().await;

    time::advance(Duration::from_millis(53)).await; // 3ms late, under 10%
    let info = s.wait_for_tick().await;
    assert!(!info.overrun);
    assert_eq!(s.metrics().total_overruns, 0);
}

// =========================================================================
// Budget and metrics
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_without_tick_is_noop() {
    let mut s = TickScheduler::new(no_jitter(20));
    s.record_tick_end();
    assert_eq!(s.metrics().max_tick_time, Duration::ZERO);
    assert_eq!(s.metrics().budget_utilization, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_step_time_is_tracked() {
    let mut s = TickScheduler::new(no_jitter(20));

    s.wait_for_tick().await;
    time::advance(Duration::from_millis(10)).await;
    s.record_tick_end();

    let m = s.metrics();
    assert_eq!(m.max_tick_time, Duration::from_millis(10));
    assert!((m.budget_utilization - 0.2).abs() < 1e-9);
    // First sample: 0.9 * 0 + 0.1 * 10ms.
    let avg_ms = m.avg_tick_time.as_secs_f64() * 1000.0;
    assert!((avg_ms - 1.0).abs() < 1e-3, "avg was {avg_ms}ms");
}

#[tokio::test(start_paused = true)]
async fn test_step_over_budget_is_recorded() {
    let mut s = TickScheduler::new(no_jitter(20));

    s.wait_for_tick().await;
    time::advance(Duration::from_millis(60)).await;
    s.record_tick_end();

    assert!(s.metrics().budget_utilization > 1.0);
    assert_eq!(s.metrics().max_tick_time, Duration::from_millis(60));

    // A second report for the same tick is ignored.
    s.record_tick_end();
    assert_eq!(s.metrics().max_tick_time, Duration::from_millis(60));
}

// =========================================================================
// select! usage
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_with_shutdown() {
    let mut s = TickScheduler::new(no_jitter(20));
    let shutdown = time::sleep(Duration::from_millis(160));
    tokio::pin!(shutdown);

    let mut ticks = 0u64;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            info = s.wait_for_tick() => {
                ticks += 1;
                s.record_tick_end();
                assert_eq!(info.tick, ticks);
            }
        }
    }

    assert_eq!(ticks, 3);
}
