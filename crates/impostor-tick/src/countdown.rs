//! The cosmetic reveal countdown.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::trace;

/// Shape of a reveal countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownConfig {
    /// Announced ticks before the final one (3 → "3, 2, 1", then done).
    pub ticks: u32,
    /// Gap between consecutive ticks.
    pub interval: Duration,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            ticks: 3,
            interval: Duration::from_secs(1),
        }
    }
}

impl CountdownConfig {
    /// Time from the first tick to the final one.
    pub fn total(&self) -> Duration {
        self.interval * self.ticks
    }
}

/// One step of a [`Countdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownTick {
    /// Ticks still to come after this one. 0 on the final tick.
    pub remaining: u32,
}

impl CountdownTick {
    /// The tick on which the deferred action should run.
    pub fn is_final(&self) -> bool {
        self.remaining == 0
    }
}

/// A fixed sequence of `ticks + 1` discrete ticks, one `interval` apart.
///
/// The first tick fires immediately with `remaining == ticks`, the last
/// one with `remaining == 0`; after that [`next_tick`](Self::next_tick)
/// returns `None`. Each tick is independent: the countdown holds no
/// reference to whatever it is counting down for.
#[derive(Debug)]
pub struct Countdown {
    config: CountdownConfig,
    next: Option<(u32, Instant)>,
}

impl Countdown {
    pub fn new(config: CountdownConfig) -> Self {
        Self {
            config,
            next: Some((config.ticks, Instant::now())),
        }
    }

    /// Waits for the next tick, or returns `None` once the countdown is over.
    pub async fn next_tick(&mut self) -> Option<CountdownTick> {
        let (remaining, deadline) = self.next?;
        time::sleep_until(deadline).await;

        self.next = remaining
            .checked_sub(1)
            .map(|r| (r, deadline + self.config.interval));
        trace!(remaining, "countdown tick");
        Some(CountdownTick { remaining })
    }

    /// Whether every tick has been handed out.
    pub fn is_done(&self) -> bool {
        self.next.is_none()
    }

    pub fn config(&self) -> &CountdownConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_three_seconds() {
        let cfg = CountdownConfig::default();
        assert_eq!(cfg.ticks, 3);
        assert_eq!(cfg.total(), Duration::from_secs(3));
    }

    #[test]
    fn test_final_tick() {
        assert!(CountdownTick { remaining: 0 }.is_final());
        assert!(!CountdownTick { remaining: 1 }.is_final());
    }
}
