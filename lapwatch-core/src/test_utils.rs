//! Test utilities: a simulated board around one `Stopwatch`
//!
//! `Bench` owns the mocks every interrupt entry point needs and plays the
//! role of the interrupt controller: `press` raises a column edge, `rotate`
//! a rotary edge, `advance_ms` delivers time-base ticks while the mock timer
//! runs, and `scan` steps the row scanner.

use crate::controller::Stopwatch;
use crate::display::{DigitDisplay, Frame};
use crate::fsm::Transition;
use crate::hal::mock::*;
use crate::hal::HalError;
use crate::types::{Key, KeyPosition, Mode, StopwatchConfig, TICK_PERIOD_MS};

pub struct Bench {
    pub stopwatch: Stopwatch,
    pub keypad: MockKeypad,
    pub leds: MockLeds,
    pub timer: MockTickTimer,
    pub delay: CountingDelay,
    pub irq: MockInterrupts,
    pub display: DigitDisplay<MockPin, RecordingBus, [u8; 11]>,
    pub pins: PinLog,
    /// Busy-waits and acknowledgements from the edge and tick handlers, in order
    pub events: EventLog,
    /// Milliseconds carried over towards the next tick
    carry_ms: u32,
}

impl Bench {
    /// Booted bench with the default configuration
    pub fn new() -> Self {
        Self::with_config(StopwatchConfig::DEFAULT)
    }

    pub fn with_config(config: StopwatchConfig) -> Self {
        let pins = PinLog::default();
        let events = EventLog::default();
        let selects = [
            MockPin::new(0, pins.clone()),
            MockPin::new(1, pins.clone()),
            MockPin::new(2, pins.clone()),
            MockPin::new(3, pins.clone()),
        ];
        let mut bench = Self {
            stopwatch: Stopwatch::new(config),
            keypad: MockKeypad::new(),
            leds: MockLeds::new(),
            timer: MockTickTimer::new(),
            delay: CountingDelay::with_log(events.clone()),
            irq: MockInterrupts::with_log(events.clone()),
            display: DigitDisplay::new(selects, RecordingBus::new(), IDENTITY_GLYPHS, config.digit_dwell_us()),
            pins,
            events,
            carry_ms: 0,
        };
        // MockLeds cannot fail
        let _ = bench.stopwatch.boot(&mut bench.leds);
        bench
    }

    fn position(&self, key: Key) -> KeyPosition {
        let config = self.stopwatch.config();
        match key {
            Key::Primary => config.primary_key(),
            Key::Lap => config.lap_key(),
        }
    }

    /// Raise a column edge with the given keys held, then release them
    pub fn edge_with(&mut self, positions: &[KeyPosition]) -> Result<Transition, HalError> {
        for position in positions {
            self.keypad.set_pressed(*position, true);
        }
        let result = self.stopwatch.on_column_edge(
            &mut self.keypad,
            &mut self.leds,
            &mut self.timer,
            &mut self.delay,
            &mut self.irq,
        );
        self.keypad.release_all();
        result
    }

    /// Press and release one key
    pub fn press(&mut self, key: Key) -> Result<Transition, HalError> {
        let position = self.position(key);
        self.edge_with(&[position])
    }

    /// Press both tracked keys on the same edge
    pub fn press_both(&mut self) -> Result<Transition, HalError> {
        let positions = [self.position(Key::Primary), self.position(Key::Lap)];
        self.edge_with(&positions)
    }

    pub fn rotate(&mut self) -> Result<Transition, HalError> {
        self.stopwatch.on_rotary_edge(
            &mut self.leds,
            &mut self.timer,
            &mut self.delay,
            &mut self.irq,
        )
    }

    /// Let wall-clock time pass. Ticks fire every 100 ms of accumulated
    /// time while the time-base timer runs. Returns the ticks delivered.
    pub fn advance_ms(&mut self, ms: u32) -> Result<u32, HalError> {
        if !self.timer.is_running() {
            return Ok(0);
        }
        let total = self.carry_ms + ms;
        let ticks = total / TICK_PERIOD_MS;
        self.carry_ms = total % TICK_PERIOD_MS;
        for _ in 0..ticks {
            self.stopwatch.on_time_tick(&mut self.irq)?;
        }
        Ok(ticks)
    }

    /// Run `steps` row-scan interrupts
    pub fn scan(&mut self, steps: u32) -> Result<u8, HalError> {
        let mut row = self.stopwatch.active_row();
        for _ in 0..steps {
            row = self.stopwatch.on_scan_tick(&mut self.keypad, &mut self.irq)?;
        }
        Ok(row)
    }

    /// Run one main-loop refresh and return the segment patterns written
    pub fn refresh(&mut self) -> Result<[u8; 4], HalError> {
        let mut delay = CountingDelay::new();
        self.stopwatch.render(&mut self.display, &mut delay)?;
        Ok(self.last_patterns())
    }

    /// Last four patterns put on the segment bus
    pub fn last_patterns(&self) -> [u8; 4] {
        let writes = self.display.bus().writes();
        let mut out = [0u8; 4];
        if writes.len() >= 4 {
            out.copy_from_slice(&writes[writes.len() - 4..]);
        }
        out
    }

    pub fn mode(&self) -> Mode {
        self.stopwatch.mode()
    }

    pub fn frame(&self) -> Frame {
        self.stopwatch.frame()
    }

    /// Displayed digits as plain numbers (blank reads as 10)
    pub fn digits(&self) -> [u8; 4] {
        self.frame().0.map(|g| g.table_index() as u8)
    }
}

impl Default for Bench {
    fn default() -> Self {
        Self::new()
    }
}
