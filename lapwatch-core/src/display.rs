//! Multiplexed four-digit seven-segment display

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::hal::{GlyphTable, HalError, SegmentBus};
use crate::types::{ElapsedTime, Glyph, LapIndex, LapRecord, DISPLAY_DIGITS};

/// Glyphs for one refresh, leftmost digit first
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame(pub [Glyph; DISPLAY_DIGITS]);

impl Frame {
    /// Minute, seconds tens, seconds ones, decisecond
    pub fn elapsed(time: ElapsedTime) -> Self {
        Self([
            time.minutes.into(),
            time.seconds_tens.into(),
            time.seconds_ones.into(),
            time.deciseconds.into(),
        ])
    }

    /// Lap number followed by that lap's three digits
    pub fn lap(index: LapIndex, lap: LapRecord) -> Self {
        Self([
            index.digit().into(),
            lap.seconds_tens.into(),
            lap.seconds_ones.into(),
            lap.deciseconds.into(),
        ])
    }

    pub const fn blank() -> Self {
        Self([Glyph::Blank; DISPLAY_DIGITS])
    }

    pub fn glyphs(&self) -> &[Glyph; DISPLAY_DIGITS] {
        &self.0
    }
}

/// Digit-select lines plus a shared segment bus.
/// Select lines are active-high; at most one is high at any instant.
pub struct DigitDisplay<D, B, T> {
    selects: [D; DISPLAY_DIGITS],
    bus: B,
    table: T,
    dwell_us: u32,
}

impl<D, B, T> DigitDisplay<D, B, T>
where
    D: OutputPin,
    B: SegmentBus,
    T: GlyphTable,
{
    pub fn new(selects: [D; DISPLAY_DIGITS], bus: B, table: T, dwell_us: u32) -> Self {
        Self {
            selects,
            bus,
            table,
            dwell_us,
        }
    }

    /// One full pass over the four digits
    pub fn render<W: DelayNs>(&mut self, frame: &Frame, delay: &mut W) -> Result<(), HalError> {
        for (position, glyph) in frame.0.iter().enumerate() {
            self.select(position)?;
            self.bus.write(self.table.pattern_for(*glyph))?;
            delay.delay_us(self.dwell_us);
            self.deselect_all()?;
        }
        Ok(())
    }

    /// Deselect every digit and put the blank pattern on the bus
    pub fn blank(&mut self) -> Result<(), HalError> {
        self.deselect_all()?;
        self.bus.write(self.table.pattern_for(Glyph::Blank))
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn release(self) -> ([D; DISPLAY_DIGITS], B, T) {
        (self.selects, self.bus, self.table)
    }

    fn select(&mut self, position: usize) -> Result<(), HalError> {
        let line = self.selects.get_mut(position).ok_or(HalError::InvalidConfig)?;
        line.set_high().map_err(|_| HalError::GpioError)
    }

    fn deselect_all(&mut self) -> Result<(), HalError> {
        for line in self.selects.iter_mut() {
            line.set_low().map_err(|_| HalError::GpioError)?;
        }
        Ok(())
    }
}
