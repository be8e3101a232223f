//! Fixed-capacity lap record store

use crate::types::{LapIndex, LapRecord, LAP_SLOTS};

/// Five lap slots with independent write and read cursors.
/// Recording past the fifth lap silently overwrites slot 1 and onwards.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LapStore {
    slots: [LapRecord; LAP_SLOTS],
    write: LapIndex,
    read: LapIndex,
}

impl LapStore {
    pub const fn new() -> Self {
        Self {
            slots: [LapRecord::ZERO; LAP_SLOTS],
            write: LapIndex::FIRST,
            // First advance lands on slot 1
            read: LapIndex::LAST,
        }
    }

    /// Store a snapshot at the write cursor and advance it.
    /// Returns the slot written.
    pub fn record(&mut self, lap: LapRecord) -> LapIndex {
        let written = self.write;
        self.slots[written.slot()] = lap;
        self.write = written.next();
        written
    }

    /// Advance the read cursor and return the slot it now points at
    pub fn advance_and_get(&mut self) -> (LapIndex, LapRecord) {
        self.read = self.read.next();
        self.shown()
    }

    /// Slot under the read cursor
    pub fn shown(&self) -> (LapIndex, LapRecord) {
        (self.read, self.slots[self.read.slot()])
    }

    pub fn get(&self, index: LapIndex) -> LapRecord {
        self.slots[index.slot()]
    }

    /// Next slot `record` will write
    pub fn write_cursor(&self) -> LapIndex {
        self.write
    }

    pub fn read_cursor(&self) -> LapIndex {
        self.read
    }
}

impl Default for LapStore {
    fn default() -> Self {
        Self::new()
    }
}
