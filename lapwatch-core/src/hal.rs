//! Hardware Abstraction Layer for the stopwatch core
//!
//! Everything board-specific (pin modes, clock tree, the segment pattern
//! table and the busy-wait primitive) sits behind these traits. The busy-wait
//! itself is `embedded_hal::delay::DelayNs`.

use embedded_hal::digital::{InputPin, OutputPin, StatefulOutputPin};

use crate::types::{Glyph, Led, KEYPAD_COLUMNS, KEYPAD_ROWS};

/// Error types for HAL operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// GPIO operation failed
    GpioError,
    /// Timing operation failed
    TimingError,
    /// Interrupt configuration failed
    InterruptError,
    /// Hardware not initialized
    NotInitialized,
    /// Invalid configuration (row, column or digit out of range)
    InvalidConfig,
}

#[cfg(feature = "std")]
impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::GpioError => write!(f, "GPIO operation failed"),
            HalError::TimingError => write!(f, "Timing operation failed"),
            HalError::InterruptError => write!(f, "Interrupt configuration failed"),
            HalError::NotInitialized => write!(f, "Hardware not initialized"),
            HalError::InvalidConfig => write!(f, "Invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

/// Interrupt sources, in fixed priority order
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqSource {
    /// Falling edge on any keypad column
    ColumnEdge,
    /// Rotary select button edge
    RotaryEdge,
    /// 100 ms time-base timer
    TimeBaseTick,
    /// Keypad row scan timer
    RowScanTick,
}

impl IrqSource {
    pub const ALL: [IrqSource; 4] = [
        IrqSource::ColumnEdge,
        IrqSource::RotaryEdge,
        IrqSource::TimeBaseTick,
        IrqSource::RowScanTick,
    ];

    /// Lower value preempts higher
    pub const fn priority(&self) -> u8 {
        match self {
            IrqSource::ColumnEdge => 0,
            IrqSource::RotaryEdge => 1,
            IrqSource::TimeBaseTick => 2,
            IrqSource::RowScanTick => 3,
        }
    }
}

/// Keypad matrix lines: rows are driven, columns are sensed
pub trait KeypadMatrix {
    /// Drive `row` (1-based) active and every other row inactive
    fn drive_row(&mut self, row: u8) -> Result<(), HalError>;

    /// Drive every row inactive
    fn release_rows(&mut self) -> Result<(), HalError>;

    /// Check whether `column` (1-based) reads as pressed against the driven row
    fn column_active(&mut self, column: u8) -> Result<bool, HalError>;
}

/// Trait for status LED control
pub trait StatusLeds {
    /// Set LED state (true = lit)
    fn set_state(&mut self, led: Led, on: bool) -> Result<(), HalError>;

    /// Get current LED state
    fn get_state(&mut self, led: Led) -> Result<bool, HalError>;

    /// Toggle LED state
    fn toggle(&mut self, led: Led) -> Result<(), HalError> {
        let current = self.get_state(led)?;
        self.set_state(led, !current)
    }

    /// Switch every LED off
    fn all_off(&mut self) -> Result<(), HalError> {
        for led in Led::ALL {
            self.set_state(led, false)?;
        }
        Ok(())
    }
}

/// Time-base timer hardware
pub trait TickTimer {
    /// Start (or resume) counting towards the next tick
    fn start(&mut self) -> Result<(), HalError>;

    /// Stop counting, keeping the partial period
    fn stop(&mut self) -> Result<(), HalError>;

    /// Stop and clear the hardware counter
    fn reset(&mut self) -> Result<(), HalError>;
}

/// Trait for interrupt configuration
pub trait InterruptControl {
    /// Acknowledge the pending condition of `source`
    fn clear_pending(&mut self, source: IrqSource) -> Result<(), HalError>;

    /// Set interrupt priority
    fn set_priority(&mut self, source: IrqSource, priority: u8) -> Result<(), HalError>;

    /// Enable/disable a specific interrupt
    fn enable(&mut self, source: IrqSource, enable: bool) -> Result<(), HalError>;
}

/// Shared segment bus of the multiplexed display
pub trait SegmentBus {
    fn write(&mut self, pattern: u8) -> Result<(), HalError>;
}

/// Glyph to segment bitmask lookup (board specific)
pub trait GlyphTable {
    fn pattern_for(&self, glyph: Glyph) -> u8;
}

impl GlyphTable for [u8; 11] {
    fn pattern_for(&self, glyph: Glyph) -> u8 {
        self[glyph.table_index()]
    }
}

/// Keypad over embedded-hal pins: rows are active-low outputs, columns are
/// pulled-up inputs that read low while their key connects them to the
/// driven row.
pub struct EmbeddedHalKeypad<R, C> {
    rows: [R; KEYPAD_ROWS as usize],
    columns: [C; KEYPAD_COLUMNS as usize],
}

impl<R, C> EmbeddedHalKeypad<R, C>
where
    R: OutputPin,
    C: InputPin,
{
    pub fn new(rows: [R; KEYPAD_ROWS as usize], columns: [C; KEYPAD_COLUMNS as usize]) -> Self {
        Self { rows, columns }
    }

    /// Give the pins back
    pub fn release(self) -> ([R; KEYPAD_ROWS as usize], [C; KEYPAD_COLUMNS as usize]) {
        (self.rows, self.columns)
    }
}

impl<R, C> KeypadMatrix for EmbeddedHalKeypad<R, C>
where
    R: OutputPin,
    C: InputPin,
{
    fn drive_row(&mut self, row: u8) -> Result<(), HalError> {
        if row == 0 || row > KEYPAD_ROWS {
            return Err(HalError::InvalidConfig);
        }
        for (index, pin) in self.rows.iter_mut().enumerate() {
            let result = if index + 1 == row as usize {
                pin.set_low()
            } else {
                pin.set_high()
            };
            result.map_err(|_| HalError::GpioError)?;
        }
        Ok(())
    }

    fn release_rows(&mut self) -> Result<(), HalError> {
        for pin in self.rows.iter_mut() {
            pin.set_high().map_err(|_| HalError::GpioError)?;
        }
        Ok(())
    }

    fn column_active(&mut self, column: u8) -> Result<bool, HalError> {
        let pin = column
            .checked_sub(1)
            .and_then(|index| self.columns.get_mut(index as usize))
            .ok_or(HalError::InvalidConfig)?;
        pin.is_low().map_err(|_| HalError::GpioError)
    }
}

/// Status LEDs over embedded-hal stateful output pins
pub struct EmbeddedHalLeds<P> {
    pins: [P; 4],
    inverted: bool,
}

impl<P> EmbeddedHalLeds<P>
where
    P: StatefulOutputPin,
{
    /// `pins` in `Led::ALL` order; `inverted` for LEDs sinking into the pin
    pub fn new(pins: [P; 4], inverted: bool) -> Self {
        Self { pins, inverted }
    }
}

impl<P> StatusLeds for EmbeddedHalLeds<P>
where
    P: StatefulOutputPin,
{
    fn set_state(&mut self, led: Led, on: bool) -> Result<(), HalError> {
        let pin = &mut self.pins[led.index()];
        let level = if self.inverted { !on } else { on };
        if level {
            pin.set_high().map_err(|_| HalError::GpioError)
        } else {
            pin.set_low().map_err(|_| HalError::GpioError)
        }
    }

    fn get_state(&mut self, led: Led) -> Result<bool, HalError> {
        let high = self.pins[led.index()]
            .is_set_high()
            .map_err(|_| HalError::GpioError)?;
        Ok(high != self.inverted)
    }

    fn toggle(&mut self, led: Led) -> Result<(), HalError> {
        self.pins[led.index()]
            .toggle()
            .map_err(|_| HalError::GpioError)
    }
}

/// No-op interrupt controller for sources without a pending flag
pub struct NoOpInterruptController;

impl InterruptControl for NoOpInterruptController {
    fn clear_pending(&mut self, _source: IrqSource) -> Result<(), HalError> {
        Ok(())
    }

    fn set_priority(&mut self, _source: IrqSource, _priority: u8) -> Result<(), HalError> {
        Ok(())
    }

    fn enable(&mut self, _source: IrqSource, _enable: bool) -> Result<(), HalError> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! Mock implementations for testing

    use super::*;
    use core::cell::RefCell;
    use core::convert::Infallible;
    use embedded_hal::delay::DelayNs;
    use std::rc::Rc;
    use std::vec::Vec;

    use crate::types::KeyPosition;

    /// Simulated 3x3 matrix. A pressed key only shows on its column while
    /// its own row is the driven one.
    #[derive(Debug, Default)]
    pub struct MockKeypad {
        pressed: [[bool; KEYPAD_COLUMNS as usize]; KEYPAD_ROWS as usize],
        driven: Option<u8>,
        drive_log: Vec<u8>,
        faulty: bool,
    }

    impl MockKeypad {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_pressed(&mut self, position: KeyPosition, pressed: bool) {
            self.pressed[(position.row - 1) as usize][(position.column - 1) as usize] = pressed;
        }

        pub fn release_all(&mut self) {
            self.pressed = Default::default();
        }

        /// Currently driven row, if any
        pub fn driven_row(&self) -> Option<u8> {
            self.driven
        }

        /// Every row driven so far, oldest first
        pub fn drive_log(&self) -> &[u8] {
            &self.drive_log
        }

        /// Make every column read fail with `GpioError`
        pub fn set_faulty(&mut self, faulty: bool) {
            self.faulty = faulty;
        }
    }

    impl KeypadMatrix for MockKeypad {
        fn drive_row(&mut self, row: u8) -> Result<(), HalError> {
            if row == 0 || row > KEYPAD_ROWS {
                return Err(HalError::InvalidConfig);
            }
            self.driven = Some(row);
            self.drive_log.push(row);
            Ok(())
        }

        fn release_rows(&mut self) -> Result<(), HalError> {
            self.driven = None;
            Ok(())
        }

        fn column_active(&mut self, column: u8) -> Result<bool, HalError> {
            if column == 0 || column > KEYPAD_COLUMNS {
                return Err(HalError::InvalidConfig);
            }
            if self.faulty {
                return Err(HalError::GpioError);
            }
            Ok(match self.driven {
                Some(row) => self.pressed[(row - 1) as usize][(column - 1) as usize],
                None => false,
            })
        }
    }

    #[derive(Debug, Default)]
    pub struct MockLeds {
        states: [bool; 4],
        toggles: Vec<Led>,
        attempts: usize,
        fail_at: Option<usize>,
    }

    impl MockLeds {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn is_lit(&self, led: Led) -> bool {
            self.states[led.index()]
        }

        /// Lit state in `Led::ALL` order
        pub fn states(&self) -> [bool; 4] {
            self.states
        }

        pub fn toggle_log(&self) -> &[Led] {
            &self.toggles
        }

        pub fn clear_log(&mut self) {
            self.toggles.clear();
        }

        /// Fail the `n`th toggle from now (0-based) with `GpioError`
        pub fn fail_toggle(&mut self, n: usize) {
            self.fail_at = Some(self.attempts + n);
        }
    }

    impl StatusLeds for MockLeds {
        fn set_state(&mut self, led: Led, on: bool) -> Result<(), HalError> {
            self.states[led.index()] = on;
            Ok(())
        }

        fn get_state(&mut self, led: Led) -> Result<bool, HalError> {
            Ok(self.states[led.index()])
        }

        fn toggle(&mut self, led: Led) -> Result<(), HalError> {
            let attempt = self.attempts;
            self.attempts += 1;
            if self.fail_at == Some(attempt) {
                return Err(HalError::GpioError);
            }
            self.states[led.index()] = !self.states[led.index()];
            self.toggles.push(led);
            Ok(())
        }
    }

    /// Operations seen by the mock time-base timer
    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    pub enum TimerOp {
        Start,
        Stop,
        Reset,
    }

    #[derive(Debug, Default)]
    pub struct MockTickTimer {
        running: bool,
        ops: Vec<TimerOp>,
        fail_start: bool,
    }

    impl MockTickTimer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn is_running(&self) -> bool {
            self.running
        }

        pub fn ops(&self) -> &[TimerOp] {
            &self.ops
        }

        /// Make the next `start` fail with `TimingError`
        pub fn fail_next_start(&mut self) {
            self.fail_start = true;
        }

        pub fn clear_log(&mut self) {
            self.ops.clear();
        }
    }

    impl TickTimer for MockTickTimer {
        fn start(&mut self) -> Result<(), HalError> {
            if core::mem::take(&mut self.fail_start) {
                return Err(HalError::TimingError);
            }
            self.running = true;
            self.ops.push(TimerOp::Start);
            Ok(())
        }

        fn stop(&mut self) -> Result<(), HalError> {
            self.running = false;
            self.ops.push(TimerOp::Stop);
            Ok(())
        }

        fn reset(&mut self) -> Result<(), HalError> {
            self.running = false;
            self.ops.push(TimerOp::Reset);
            Ok(())
        }
    }

    /// Busy-waits and pending-flag acknowledgements in call order
    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    pub enum BoardEvent {
        DelayUs(u32),
        Cleared(IrqSource),
    }

    pub type EventLog = Rc<RefCell<Vec<BoardEvent>>>;

    #[derive(Debug, Default)]
    pub struct MockInterrupts {
        cleared: Vec<IrqSource>,
        priorities: [Option<u8>; 4],
        enabled: [bool; 4],
        events: Option<EventLog>,
    }

    impl MockInterrupts {
        pub fn new() -> Self {
            Self::default()
        }

        /// Also append every acknowledgement to `events`
        pub fn with_log(events: EventLog) -> Self {
            Self {
                events: Some(events),
                ..Self::default()
            }
        }

        /// Pending flags acknowledged so far, oldest first
        pub fn cleared(&self) -> &[IrqSource] {
            &self.cleared
        }

        pub fn priority_of(&self, source: IrqSource) -> Option<u8> {
            self.priorities[slot(source)]
        }

        pub fn is_enabled(&self, source: IrqSource) -> bool {
            self.enabled[slot(source)]
        }

        pub fn clear_log(&mut self) {
            self.cleared.clear();
        }
    }

    fn slot(source: IrqSource) -> usize {
        source.priority() as usize
    }

    impl InterruptControl for MockInterrupts {
        fn clear_pending(&mut self, source: IrqSource) -> Result<(), HalError> {
            self.cleared.push(source);
            if let Some(events) = &self.events {
                events.borrow_mut().push(BoardEvent::Cleared(source));
            }
            Ok(())
        }

        fn set_priority(&mut self, source: IrqSource, priority: u8) -> Result<(), HalError> {
            self.priorities[slot(source)] = Some(priority);
            Ok(())
        }

        fn enable(&mut self, source: IrqSource, enable: bool) -> Result<(), HalError> {
            self.enabled[slot(source)] = enable;
            Ok(())
        }
    }

    /// Segment bus remembering every pattern written
    #[derive(Debug, Default)]
    pub struct RecordingBus {
        writes: Vec<u8>,
    }

    impl RecordingBus {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn writes(&self) -> &[u8] {
            &self.writes
        }

        pub fn clear(&mut self) {
            self.writes.clear();
        }
    }

    impl SegmentBus for RecordingBus {
        fn write(&mut self, pattern: u8) -> Result<(), HalError> {
            self.writes.push(pattern);
            Ok(())
        }
    }

    /// Pattern table mapping each digit onto itself and blank onto 0xFF
    pub const IDENTITY_GLYPHS: [u8; 11] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0xFF];

    /// Busy-wait that returns immediately and keeps a tally
    #[derive(Debug, Default)]
    pub struct CountingDelay {
        calls: u32,
        total_ns: u64,
        events: Option<EventLog>,
    }

    impl CountingDelay {
        pub fn new() -> Self {
            Self::default()
        }

        /// Also append every wait to `events`
        pub fn with_log(events: EventLog) -> Self {
            Self {
                events: Some(events),
                ..Self::default()
            }
        }

        fn record(&mut self, ns: u64) {
            self.calls += 1;
            self.total_ns += ns;
            if let Some(events) = &self.events {
                events.borrow_mut().push(BoardEvent::DelayUs((ns / 1_000) as u32));
            }
        }

        pub fn calls(&self) -> u32 {
            self.calls
        }

        pub fn total_us(&self) -> u64 {
            self.total_ns / 1_000
        }
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.record(u64::from(ns));
        }

        fn delay_us(&mut self, us: u32) {
            self.record(u64::from(us) * 1_000);
        }
    }

    /// Level change on one of several mock pins sharing a log
    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    pub struct PinEvent {
        pub pin: u8,
        pub high: bool,
    }

    pub type PinLog = Rc<RefCell<Vec<PinEvent>>>;

    /// Output pin appending every level change to a shared log, so the
    /// relative order across several pins can be checked
    #[derive(Debug, Clone)]
    pub struct MockPin {
        id: u8,
        high: bool,
        log: PinLog,
    }

    impl MockPin {
        pub fn new(id: u8, log: PinLog) -> Self {
            Self { id, high: false, log }
        }

        pub fn is_high(&self) -> bool {
            self.high
        }
    }

    impl embedded_hal::digital::ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            self.log.borrow_mut().push(PinEvent { pin: self.id, high: false });
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            self.log.borrow_mut().push(PinEvent { pin: self.id, high: true });
            Ok(())
        }
    }

    impl StatefulOutputPin for MockPin {
        fn is_set_high(&mut self) -> Result<bool, Self::Error> {
            Ok(self.high)
        }

        fn is_set_low(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.high)
        }
    }

    /// Input pin with a settable level
    #[derive(Debug, Clone, Default)]
    pub struct MockInput {
        low: Rc<RefCell<bool>>,
    }

    impl MockInput {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_low(&self, low: bool) {
            *self.low.borrow_mut() = low;
        }
    }

    impl embedded_hal::digital::ErrorType for MockInput {
        type Error = Infallible;
    }

    impl InputPin for MockInput {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(!*self.low.borrow())
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(*self.low.borrow())
        }
    }
}
