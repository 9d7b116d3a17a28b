//! Timers for the impostor server.
//!
//! Two kinds of time-driven work exist next to the player actions:
//!
//! - [`Countdown`]: the short, cosmetic reveal countdown that runs between
//!   the host finalizing a vote and the votes being processed. It yields a
//!   fixed number of discrete ticks and then ends; it cannot be cancelled.
//!   Whoever drives it must re-check the room on every tick.
//! - [`Ticker`]: a long-period, jittered ticker for maintenance work such
//!   as the idle-room sweep.
//!
//! Neither type touches game state. They only decide *when* something
//! should run.
//!
//! ```ignore
//! let mut countdown = Countdown::new(CountdownConfig::default());
//! while let Some(tick) = countdown.next_tick().await {
//!     let mut store = rooms.lock().await;
//!     // room gone, phase moved on, or game and round changed: stop quietly
//!     if !still_relevant(&store) { break; }
//!     if tick.is_final() { store.process_votes(&code, key)?; }
//! }
//! ```

mod countdown;
mod ticker;

pub use countdown::{Countdown, CountdownConfig, CountdownTick};
pub use ticker::{TickInfo, Ticker, TickerConfig};
