//! Time-base counter driven by the 100 ms tick interrupt

use core::cell::Cell;

use critical_section::{CriticalSection, Mutex};
use portable_atomic::{AtomicBool, Ordering};

use crate::types::{Digit, ElapsedTime};

/// Raw accumulators behind the displayed digits
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickCounters {
    /// Ticks since the last reset
    pub deciseconds: u32,
    /// Seconds within the current minute (0..=59)
    pub seconds: u32,
    /// Whole minutes since the last reset
    pub minutes: u32,
}

impl TickCounters {
    pub const ZERO: TickCounters = TickCounters {
        deciseconds: 0,
        seconds: 0,
        minutes: 0,
    };

    /// Counters after `ticks` ticks from zero
    pub const fn from_ticks(ticks: u32) -> Self {
        Self {
            deciseconds: ticks,
            seconds: (ticks / 10) % 60,
            minutes: ticks / 600,
        }
    }

    /// Counters one tick later
    pub const fn advanced(self) -> Self {
        let deciseconds = self.deciseconds.wrapping_add(1);
        let mut seconds = self.seconds;
        let mut minutes = self.minutes;

        if deciseconds % 10 == 0 {
            seconds += 1;
            if seconds == 60 {
                seconds = 0;
                minutes = minutes.wrapping_add(1);
            }
        }

        Self {
            deciseconds,
            seconds,
            minutes,
        }
    }

    /// Displayed digits; the minute digit wraps without carry
    pub const fn elapsed(&self) -> ElapsedTime {
        ElapsedTime {
            minutes: Digit::of(self.minutes),
            seconds_tens: Digit::of(self.seconds / 10),
            seconds_ones: Digit::of(self.seconds),
            deciseconds: Digit::of(self.deciseconds),
        }
    }
}

/// Elapsed-time state shared between the tick interrupt (writer), the
/// state machine (start/stop/clear) and the display loop (reader)
pub struct TimeBase {
    counters: Mutex<Cell<TickCounters>>,
    running: AtomicBool,
}

impl TimeBase {
    pub const fn new() -> Self {
        Self {
            counters: Mutex::new(Cell::new(TickCounters::ZERO)),
            running: AtomicBool::new(false),
        }
    }

    /// Tick handler body. Returns false if the time base is stopped and the
    /// tick was discarded (e.g. one already pending when it was stopped).
    pub fn tick(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        critical_section::with(|cs| {
            let counters = self.counters.borrow(cs);
            counters.set(counters.get().advanced());
        });
        true
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Zero every accumulator
    pub fn clear(&self) {
        critical_section::with(|cs| self.clear_in(cs));
    }

    pub fn counters(&self) -> TickCounters {
        critical_section::with(|cs| self.counters.borrow(cs).get())
    }

    /// Consistent snapshot of the displayed digits
    pub fn elapsed(&self) -> ElapsedTime {
        critical_section::with(|cs| self.elapsed_in(cs))
    }

    pub(crate) fn clear_in(&self, cs: CriticalSection<'_>) {
        self.counters.borrow(cs).set(TickCounters::ZERO);
    }

    pub(crate) fn elapsed_in(&self, cs: CriticalSection<'_>) -> ElapsedTime {
        self.counters.borrow(cs).get().elapsed()
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::new()
    }
}
