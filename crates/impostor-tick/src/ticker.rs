//! Long-period maintenance ticker.

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

/// Configuration of a [`Ticker`].
#[derive(Debug, Clone)]
pub struct TickerConfig {
    /// Time between ticks. Must be non-zero.
    pub period: Duration,
    /// Upper bound of a random delay added to the first tick only, so that
    /// several processes started together do not sweep in lockstep.
    pub initial_jitter: Duration,
    /// Work taking longer than this fraction of the period logs a warning.
    pub budget_warn_threshold: f64,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(60 * 60),
            initial_jitter: Duration::from_secs(5),
            budget_warn_threshold: 0.5,
        }
    }
}

impl TickerConfig {
    /// Shortest accepted period.
    pub const MIN_PERIOD: Duration = Duration::from_millis(1);

    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values. Called by [`Ticker::new`].
    pub fn validated(mut self) -> Self {
        if self.period < Self::MIN_PERIOD {
            warn!(period = ?self.period, "ticker period too short, clamping");
            self.period = Self::MIN_PERIOD;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }
}

/// Returned by [`Ticker::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Starts at 1.
    pub tick: u64,
    /// The ticker woke up more than 10% of a period late.
    pub overrun: bool,
    /// Whole periods missed because of the overrun. They are not replayed.
    pub ticks_skipped: u64,
}

/// Periodic ticker with first-tick jitter and overrun detection.
///
/// A late tick never triggers a burst of catch-up ticks: the next one is
/// scheduled a full period after the late one fired.
pub struct Ticker {
    config: TickerConfig,
    tick_count: u64,
    next_tick: TokioInstant,
    work_start: Option<Instant>,
}

impl Ticker {
    pub fn new(config: TickerConfig) -> Self {
        let config = config.validated();
        let jitter = if config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max = config.initial_jitter.as_millis().max(1) as u64;
            Duration::from_millis(rand::rng().random_range(0..max))
        };
        debug!(period = ?config.period, ?jitter, "ticker created");

        Self {
            next_tick: TokioInstant::now() + config.period + jitter,
            config,
            tick_count: 0,
            work_start: None,
        }
    }

    /// Waits until the next tick is due.
    pub async fn tick(&mut self) -> TickInfo {
        let scheduled = self.next_tick;
        let period = self.config.period;
        time::sleep_until(scheduled).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.work_start = Some(Instant::now());
        self.next_tick = now + period;

        let late_by = now.saturating_duration_since(scheduled);
        let overrun = late_by > period / 10;
        let ticks_skipped = if overrun {
            (late_by.as_nanos() / period.as_nanos()) as u64
        } else {
            0
        };
        trace!(tick = self.tick_count, overrun, "ticker fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Reports that the work for the current tick is done. Returns how
    /// long it took.
    pub fn record_tick_end(&mut self) -> Option<Duration> {
        let elapsed = self.work_start.take()?.elapsed();
        let utilization = elapsed.as_secs_f64() / self.config.period.as_secs_f64();
        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed = ?elapsed,
                period = ?self.config.period,
                "tick work is taking a large share of the period"
            );
        }
        Some(elapsed)
    }
}
