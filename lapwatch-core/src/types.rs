//! Core data types for the stopwatch

/// Time-base tick period in milliseconds. Fixed: one tick is one decisecond.
pub const TICK_PERIOD_MS: u32 = 100;

/// Time-base tick period in microseconds
pub const TICK_PERIOD_US: u32 = TICK_PERIOD_MS * 1_000;

/// Keypad rows cycled by the scanner
pub const KEYPAD_ROWS: u8 = 3;

/// Keypad columns sensed by the decoders
pub const KEYPAD_COLUMNS: u8 = 3;

/// Lap record capacity
pub const LAP_SLOTS: usize = 5;

/// Multiplexed display positions
pub const DISPLAY_DIGITS: usize = 4;

/// Stopwatch operating modes
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Stopped at zero, waiting for the primary key
    Idle,
    /// Time base running
    Count,
    /// Time base held, elapsed time frozen on the display
    Pause,
    /// Browsing recorded laps with the rotary button
    Check,
}

impl Mode {
    /// Returns true if the display shows a lap record instead of elapsed time
    pub const fn shows_lap(&self) -> bool {
        matches!(self, Mode::Check)
    }
}

/// Inputs accepted by the mode state machine
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Start/pause key decoded on a column edge
    PrimaryKey,
    /// Lap/reset key decoded on a column edge
    LapKey,
    /// Rotary select button edge
    Rotary,
}

/// Keys tracked on the keypad matrix
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Key {
    /// Start / pause / resume
    Primary,
    /// Record lap / reset / leave lap view
    Lap,
}

/// Position in the keypad matrix, 1-based like the board silkscreen
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyPosition {
    pub row: u8,
    pub column: u8,
}

impl KeyPosition {
    pub const fn new(row: u8, column: u8) -> Self {
        Self { row, column }
    }

    /// Returns true if the position lies inside the scanned matrix
    pub const fn is_valid(&self) -> bool {
        self.row >= 1 && self.row <= KEYPAD_ROWS && self.column >= 1 && self.column <= KEYPAD_COLUMNS
    }
}

/// A single decimal display digit, always in 0..=9
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Digit(u8);

impl Digit {
    pub const ZERO: Digit = Digit(0);

    /// Create a digit, rejecting values above 9
    pub const fn new(value: u8) -> Option<Self> {
        if value <= 9 {
            Some(Digit(value))
        } else {
            None
        }
    }

    /// Least significant decimal digit of a counter
    pub const fn of(count: u32) -> Self {
        Digit((count % 10) as u8)
    }

    pub const fn value(&self) -> u8 {
        self.0
    }
}

/// Something the display can show in one position
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Glyph {
    Digit(Digit),
    /// All segments off
    Blank,
}

impl Glyph {
    /// Row in an 11-entry pattern table: digits first, blank last
    pub const fn table_index(&self) -> usize {
        match self {
            Glyph::Digit(digit) => digit.value() as usize,
            Glyph::Blank => 10,
        }
    }
}

impl From<Digit> for Glyph {
    fn from(digit: Digit) -> Self {
        Glyph::Digit(digit)
    }
}

/// Elapsed time as shown on the four display positions
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ElapsedTime {
    /// Ones of minutes (wraps after 9 minutes, no tens digit)
    pub minutes: Digit,
    pub seconds_tens: Digit,
    pub seconds_ones: Digit,
    pub deciseconds: Digit,
}

impl ElapsedTime {
    pub const ZERO: ElapsedTime = ElapsedTime {
        minutes: Digit::ZERO,
        seconds_tens: Digit::ZERO,
        seconds_ones: Digit::ZERO,
        deciseconds: Digit::ZERO,
    };

    /// Snapshot stored when a lap is recorded
    pub const fn lap_record(&self) -> LapRecord {
        LapRecord {
            seconds_tens: self.seconds_tens,
            seconds_ones: self.seconds_ones,
            deciseconds: self.deciseconds,
        }
    }
}

/// Recorded lap split: seconds and deciseconds only
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LapRecord {
    pub seconds_tens: Digit,
    pub seconds_ones: Digit,
    pub deciseconds: Digit,
}

impl LapRecord {
    pub const ZERO: LapRecord = LapRecord {
        seconds_tens: Digit::ZERO,
        seconds_ones: Digit::ZERO,
        deciseconds: Digit::ZERO,
    };

    /// Build a record from raw digits, e.g. `LapRecord::from_digits(0, 1, 2)` for 01.2 s
    pub const fn from_digits(tens: u8, ones: u8, deciseconds: u8) -> Option<Self> {
        match (Digit::new(tens), Digit::new(ones), Digit::new(deciseconds)) {
            (Some(seconds_tens), Some(seconds_ones), Some(deciseconds)) => Some(Self {
                seconds_tens,
                seconds_ones,
                deciseconds,
            }),
            _ => None,
        }
    }
}

/// 1-based lap slot number, wrapping 5 -> 1
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LapIndex(u8);

impl LapIndex {
    pub const FIRST: LapIndex = LapIndex(1);
    pub const LAST: LapIndex = LapIndex(LAP_SLOTS as u8);

    pub const fn new(number: u8) -> Option<Self> {
        if number >= 1 && number as usize <= LAP_SLOTS {
            Some(LapIndex(number))
        } else {
            None
        }
    }

    /// Following slot, wrapping after the last one
    pub const fn next(&self) -> Self {
        if self.0 as usize == LAP_SLOTS {
            Self::FIRST
        } else {
            LapIndex(self.0 + 1)
        }
    }

    pub const fn number(&self) -> u8 {
        self.0
    }

    /// Zero-based array slot
    pub const fn slot(&self) -> usize {
        (self.0 - 1) as usize
    }

    /// Lap number as a display digit
    pub const fn digit(&self) -> Digit {
        Digit::of(self.0 as u32)
    }
}

/// Status indicator LEDs
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Led {
    /// Lit while idle
    Idle,
    /// Lit while counting
    Running,
    /// Lit once paused
    Paused,
    /// Wired on the board, unused by the state machine
    Aux,
}

impl Led {
    pub const ALL: [Led; 4] = [Led::Idle, Led::Running, Led::Paused, Led::Aux];

    pub const fn index(&self) -> usize {
        match self {
            Led::Idle => 0,
            Led::Running => 1,
            Led::Paused => 2,
            Led::Aux => 3,
        }
    }
}

/// Stopwatch configuration parameters
///
/// Fields are only reachable through `new`, so every instance satisfies the
/// matrix and timing checks.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StopwatchConfig {
    primary_key: KeyPosition,
    lap_key: KeyPosition,
    scan_period_us: u32,
    key_debounce_us: u32,
    rotary_debounce_us: u32,
    digit_dwell_us: u32,
}

impl StopwatchConfig {
    /// K1 starts/pauses, K9 records/resets, 1 ms row scan, 80 ms key debounce
    pub const DEFAULT: StopwatchConfig = StopwatchConfig {
        primary_key: KeyPosition::new(1, 1),
        lap_key: KeyPosition::new(3, 3),
        scan_period_us: 1_000,
        key_debounce_us: 80_000,
        rotary_debounce_us: 16_000,
        digit_dwell_us: 400,
    };

    /// Create a new configuration with validation
    pub fn new(
        primary_key: KeyPosition,
        lap_key: KeyPosition,
        scan_period_us: u32,
        key_debounce_us: u32,
        rotary_debounce_us: u32,
        digit_dwell_us: u32,
    ) -> Result<Self, &'static str> {
        if !primary_key.is_valid() || !lap_key.is_valid() {
            return Err("Key positions must lie inside the 3x3 matrix");
        }
        if primary_key == lap_key {
            return Err("Primary and lap keys must differ");
        }
        if scan_period_us == 0 {
            return Err("Scan period must be non-zero");
        }
        // row scan << debounce << time-base tick
        if key_debounce_us <= scan_period_us || key_debounce_us >= TICK_PERIOD_US {
            return Err("Key debounce must lie between the scan period and the tick period");
        }
        if rotary_debounce_us <= scan_period_us || rotary_debounce_us >= TICK_PERIOD_US {
            return Err("Rotary debounce must lie between the scan period and the tick period");
        }
        if digit_dwell_us == 0 || digit_dwell_us > 5_000 {
            return Err("Digit dwell must be between 1 and 5000 us");
        }

        Ok(Self {
            primary_key,
            lap_key,
            scan_period_us,
            key_debounce_us,
            rotary_debounce_us,
            digit_dwell_us,
        })
    }

    /// Start / pause key position
    pub const fn primary_key(&self) -> KeyPosition {
        self.primary_key
    }

    /// Lap / reset key position
    pub const fn lap_key(&self) -> KeyPosition {
        self.lap_key
    }

    /// Row scan period in microseconds
    pub const fn scan_period_us(&self) -> u32 {
        self.scan_period_us
    }

    /// Busy-wait after a column edge before its flag is cleared
    pub const fn key_debounce_us(&self) -> u32 {
        self.key_debounce_us
    }

    /// Busy-wait after a rotary edge before its flag is cleared
    pub const fn rotary_debounce_us(&self) -> u32 {
        self.rotary_debounce_us
    }

    /// On-time of each display digit per refresh
    pub const fn digit_dwell_us(&self) -> u32 {
        self.digit_dwell_us
    }

    /// Full display refresh period (all digits once)
    pub const fn refresh_period_us(&self) -> u32 {
        self.digit_dwell_us * DISPLAY_DIGITS as u32
    }
}

impl Default for StopwatchConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
