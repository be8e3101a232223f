//! Segment patterns for the board's common-anode display

/// Bit order `g e d b a f dp c`, active low. Index 10 is blank.
pub const SEGMENT_PATTERNS: [u8; 11] = [
    0b1000_0010, // 0
    0b1110_1110, // 1
    0b0000_0111, // 2
    0b0100_0110, // 3
    0b0110_1010, // 4
    0b0101_0010, // 5
    0b0001_0010, // 6
    0b1110_0110, // 7
    0b0000_0010, // 8
    0b0100_0010, // 9
    0b1111_1111, // blank
];
