//! Keypad row scanning and key decoding
//!
//! The scanner owns the active-row cursor and is the only context writing
//! it. The decoders run from the column-edge interrupt: each one drives its
//! own key's row and samples its key's column, so a key is only reported
//! when its row and column agree.

use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::hal::{HalError, KeypadMatrix};
use crate::types::{KeyPosition, KEYPAD_ROWS};

/// Cyclic row cursor advanced by the scan timer
pub struct RowScanner {
    row: AtomicU8,
}

impl RowScanner {
    pub const fn new() -> Self {
        Self {
            row: AtomicU8::new(1),
        }
    }

    /// Row currently driven by the scan (1-based)
    pub fn active_row(&self) -> u8 {
        self.row.load(Ordering::Acquire)
    }

    /// Move to the next row, wrapping after the last
    pub fn advance(&self) -> u8 {
        // Single writer: a plain load/store pair is enough
        let next = next_row(self.row.load(Ordering::Relaxed));
        self.row.store(next, Ordering::Release);
        next
    }

    /// One scan step: advance the cursor and drive that row
    pub fn scan<K: KeypadMatrix>(&self, keypad: &mut K) -> Result<u8, HalError> {
        let row = self.advance();
        keypad.drive_row(row)?;
        Ok(row)
    }
}

impl Default for RowScanner {
    fn default() -> Self {
        Self::new()
    }
}

const fn next_row(row: u8) -> u8 {
    if row >= KEYPAD_ROWS {
        1
    } else {
        row + 1
    }
}

/// Decoder for one tracked key
#[derive(Copy, Clone, Debug)]
pub struct ButtonDecoder {
    position: KeyPosition,
}

impl ButtonDecoder {
    pub const fn new(position: KeyPosition) -> Self {
        Self { position }
    }

    /// Drive this key's row and report whether its column reads pressed
    pub fn sample<K: KeypadMatrix>(&self, keypad: &mut K) -> Result<bool, HalError> {
        keypad.drive_row(self.position.row)?;
        keypad.column_active(self.position.column)
    }
}

/// Result of running both decoders on one column edge
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeySample {
    pub primary: bool,
    pub lap: bool,
}

impl KeySample {
    pub const NONE: KeySample = KeySample {
        primary: false,
        lap: false,
    };

    pub const fn any(&self) -> bool {
        self.primary || self.lap
    }
}

/// Atomic key press flags
/// Written by the column-edge decoders, read by the state machine
pub struct KeyFlags {
    primary: AtomicBool,
    lap: AtomicBool,
}

impl KeyFlags {
    pub const fn new() -> Self {
        Self {
            primary: AtomicBool::new(false),
            lap: AtomicBool::new(false),
        }
    }

    /// Overwrite both flags with a fresh decode
    pub fn store(&self, sample: KeySample) {
        self.primary.store(sample.primary, Ordering::Relaxed);
        self.lap.store(sample.lap, Ordering::Release);
    }

    pub fn primary(&self) -> bool {
        self.primary.load(Ordering::Relaxed)
    }

    pub fn lap(&self) -> bool {
        self.lap.load(Ordering::Acquire)
    }

    pub fn sample(&self) -> KeySample {
        KeySample {
            lap: self.lap(),
            primary: self.primary(),
        }
    }
}

impl Default for KeyFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// Run both decoders, primary first
pub fn decode_keys<K: KeypadMatrix>(
    primary: &ButtonDecoder,
    lap: &ButtonDecoder,
    keypad: &mut K,
) -> Result<KeySample, HalError> {
    let primary = primary.sample(keypad)?;
    let lap = lap.sample(keypad)?;
    Ok(KeySample { primary, lap })
}
