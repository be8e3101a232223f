#![cfg_attr(not(any(feature = "std", test)), no_std)]

//! # Lapwatch Core
//!
//! Interrupt-driven stopwatch / lap-timer logic for small microcontrollers.
//! A four-mode state machine reacts to two keypad keys and a rotary switch,
//! a 100 ms time base feeds a four-digit multiplexed display, and five lap
//! splits can be browsed while paused.

pub mod types;
pub mod hal;
pub mod keypad;
pub mod timebase;
pub mod laps;
pub mod fsm;
pub mod display;
pub mod controller;

#[cfg(feature = "test-utils")]
pub mod test_utils;


pub use types::*;
pub use fsm::*;
pub use controller::*;
pub use display::{DigitDisplay, Frame};
pub use hal::*;
pub use keypad::{ButtonDecoder, KeyFlags, KeySample, RowScanner};
pub use laps::LapStore;
pub use timebase::{TickCounters, TimeBase};

/// Lapwatch library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// K1 start/pause, K9 lap/reset, 1 ms row scan, 80 ms key debounce
pub fn default_config() -> StopwatchConfig {
    StopwatchConfig::DEFAULT
}
