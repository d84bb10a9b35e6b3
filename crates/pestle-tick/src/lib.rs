//! Fixed-timestep tick scheduler for the Pestle simulation.
//!
//! The simulation task advances the world once per tick, at a fixed rate
//! between 1 and 128 Hz. The scheduler decides when each tick fires,
//! detects late wake-ups, and watches how much of the tick budget the
//! simulation step actually used.
//!
//! # Overruns
//!
//! A tick that wakes more than 10% late counts as an overrun. Missed ticks
//! are skipped, never replayed: the next tick is scheduled one period after
//! the late one, so a slow step can't snowball into a burst of catch-up
//! steps.
//!
//! # Integration
//!
//! The scheduler sits in the server's `tokio::select!` loop next to the
//! accept and shutdown branches:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = &mut shutdown => break,
//!         accepted = listener.accept() => { /* queue for admission */ }
//!         _ = scheduler.wait_for_tick() => {
//!             simulation.step();
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tick scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickConfig {
    /// Ticks per second, clamped to `1..=128`.
    pub tick_rate_hz: u32,

    /// Fraction of the tick budget (0.0–1.0) above which a step logs a
    /// warning.
    pub budget_warn_threshold: f64,

    /// Upper bound of the random delay, in microseconds, added before the
    /// first tick only.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 30,
            budget_warn_threshold: 0.80,
            initial_jitter_us: 2_000,
        }
    }
}

impl TickConfig {
    pub const MIN_TICK_RATE_HZ: u32 = 1;
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    /// Default settings at the given rate.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Self::default()
        }
    }

    /// Clamps out-of-range values. Called by [`TickScheduler::new`].
    pub fn validated(mut self) -> Self {
        let clamped = self
            .tick_rate_hz
            .clamp(Self::MIN_TICK_RATE_HZ, Self::MAX_TICK_RATE_HZ);
        if clamped != self.tick_rate_hz {
            warn!(
                requested = self.tick_rate_hz,
                using = clamped,
                "tick rate out of range, clamping"
            );
            self.tick_rate_hz = clamped;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Length of one tick.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(Self::MIN_TICK_RATE_HZ)))
    }
}

// ---------------------------------------------------------------------------
// TickInfo
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::wait_for_tick`] each time a tick fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Fixed step length. Always `1 / tick_rate_hz`.
    pub dt: Duration,
    /// The tick woke more than 10% past its deadline.
    pub overrun: bool,
    /// Whole periods that were skipped because of the overrun.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters and timings accumulated over the scheduler's life.
///
/// Step timings come from [`TickScheduler::record_tick_end`]; they stay at
/// zero if the caller never reports.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Moving average of step time (α = 0.1).
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
    /// Last step's time over the budget. Above 1.0 means over budget.
    pub budget_utilization: f64,
}

const AVG_ALPHA: f64 = 0.1;

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Drives the simulation at a fixed rate.
pub struct TickScheduler {
    config: TickConfig,
    tick_duration: Duration,
    tick_count: u64,
    next_tick: Instant,
    /// Set when a tick fires, taken by `record_tick_end`.
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Creates a scheduler whose first tick is one period away, plus a
    /// random jitter of up to `initial_jitter_us`.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();

        let jitter = if config.initial_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..config.initial_jitter_us))
        } else {
            Duration::ZERO
        };

        debug!(
            rate_hz = config.tick_rate_hz,
            budget_ms = tick_duration.as_secs_f64() * 1000.0,
            jitter_us = jitter.as_micros() as u64,
            "tick scheduler created"
        );

        Self {
            next_tick: Instant::now() + tick_duration + jitter,
            config,
            tick_duration,
            tick_count: 0,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Sleeps until the next tick is due.
    ///
    /// Cancel-safe: if the future is dropped before it completes (another
    /// `select!` branch won), the deadline is unchanged and the next call
    /// waits for the same tick.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let deadline = self.next_tick;
        time::sleep_until(deadline).await;

        let now = Instant::now();
        self.tick_count += 1;
        self.tick_start = Some(now);

        let period = self.tick_duration;
        let late_by = now.saturating_duration_since(deadline);
        let overrun = late_by > period / 10;
        let ticks_skipped = if overrun {
            (late_by.as_nanos() / period.as_nanos().max(1)) as u64
        } else {
            0
        };

        if ticks_skipped > 0 {
            warn!(
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick overrun, skipping ahead"
            );
        }

        // Schedule from now rather than from the missed deadline.
        self.next_tick = if overrun { now + period } else { deadline + period };

        self.metrics.total_ticks += 1;
        self.metrics.total_skipped += ticks_skipped;
        if overrun {
            self.metrics.total_overruns += 1;
        }

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: period,
            overrun,
            ticks_skipped,
        }
    }

    /// Reports that the step for the current tick is done.
    ///
    /// Updates the step-time metrics and warns when the step used more than
    /// `budget_warn_threshold` of the period. Does nothing if no tick is in
    /// progress.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let budget = self.tick_duration;
        let utilization = elapsed.as_secs_f64() / budget.as_secs_f64();

        if utilization >= 1.0 {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = budget.as_secs_f64() * 1000.0,
                "simulation step exceeded tick budget"
            );
        } else if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "simulation step close to tick budget"
            );
        }

        let m = &mut self.metrics;
        m.budget_utilization = utilization;
        m.max_tick_time = m.max_tick_time.max(elapsed);
        m.avg_tick_time = Duration::from_secs_f64(
            m.avg_tick_time.as_secs_f64() * (1.0 - AVG_ALPHA) + elapsed.as_secs_f64() * AVG_ALPHA,
        );
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }
}
