//! Pin-level checks of the display driver and keypad adapter against
//! embedded-hal-mock transaction lists

use embedded_hal::delay::DelayNs;
use embedded_hal_mock::eh1::delay::NoopDelay;
use embedded_hal_mock::eh1::digital::{
    Mock as PinMock, State as PinState, Transaction as PinTransaction,
};
use lapwatch_core::keypad::decode_keys;
use lapwatch_core::mock::{
    MockInterrupts, MockLeds, MockTickTimer, RecordingBus, TimerOp, IDENTITY_GLYPHS,
};
use lapwatch_core::{
    ButtonDecoder, DigitDisplay, EmbeddedHalKeypad, Frame, IrqSource, KeyPosition, KeySample,
    KeypadMatrix, LapIndex, LapRecord, Mode, RowScanner, Stopwatch, StopwatchConfig,
};

type MockDisplay = DigitDisplay<PinMock, RecordingBus, [u8; 11]>;
type MockKeypad = EmbeddedHalKeypad<PinMock, PinMock>;

fn high() -> PinTransaction {
    PinTransaction::set(PinState::High)
}

fn low() -> PinTransaction {
    PinTransaction::set(PinState::Low)
}

/// What select line `line` sees over `passes` full refreshes: raised for its
/// own digit, lowered after every digit
fn select_expectations(line: usize, passes: usize) -> Vec<PinTransaction> {
    let mut expected = Vec::new();
    for _ in 0..passes {
        for position in 0..4 {
            if position == line {
                expected.push(high());
            }
            expected.push(low());
        }
    }
    expected
}

fn display_expecting(passes: usize) -> MockDisplay {
    let selects = [0, 1, 2, 3].map(|line| PinMock::new(&select_expectations(line, passes)));
    DigitDisplay::new(selects, RecordingBus::new(), IDENTITY_GLYPHS, 400)
}

/// Check every pin mock and hand back the bus writes
fn finish_display(display: MockDisplay) -> Vec<u8> {
    let (mut selects, bus, _) = display.release();
    for pin in selects.iter_mut() {
        pin.done();
    }
    bus.writes().to_vec()
}

fn keypad_expecting(rows: [Vec<PinTransaction>; 3], columns: [Vec<PinTransaction>; 3]) -> MockKeypad {
    EmbeddedHalKeypad::new(
        rows.map(|t| PinMock::new(&t)),
        columns.map(|t| PinMock::new(&t)),
    )
}

fn finish_keypad(keypad: MockKeypad) {
    let (mut rows, mut columns) = keypad.release();
    for pin in rows.iter_mut().chain(columns.iter_mut()) {
        pin.done();
    }
}

fn render_passes<W: DelayNs>(display: &mut MockDisplay, frame: &Frame, passes: usize, delay: &mut W) {
    for _ in 0..passes {
        display.render(frame, delay).unwrap();
    }
}

#[test]
fn display_lap_frame_sequence() {
    let mut display = display_expecting(1);
    let lap = LapRecord::from_digits(3, 1, 8).unwrap();

    render_passes(
        &mut display,
        &Frame::lap(LapIndex::new(2).unwrap(), lap),
        1,
        &mut NoopDelay::new(),
    );

    assert_eq!(finish_display(display), vec![2, 3, 1, 8]);
}

#[test]
fn display_same_frame_same_sequence() {
    let mut display = display_expecting(2);
    let lap = LapRecord::from_digits(5, 9, 9).unwrap();

    render_passes(
        &mut display,
        &Frame::lap(LapIndex::LAST, lap),
        2,
        &mut NoopDelay::new(),
    );

    let writes = finish_display(display);
    assert_eq!(writes[..4], writes[4..]);
}

#[test]
fn display_blank_lowers_every_select() {
    let selects = [0, 1, 2, 3].map(|_| PinMock::new(&[low()]));
    let mut display = DigitDisplay::new(selects, RecordingBus::new(), IDENTITY_GLYPHS, 400);

    display.blank().unwrap();

    assert_eq!(finish_display(display), vec![0xFF]);
}

#[test]
fn stopwatch_renders_idle_zeros() {
    let stopwatch = Stopwatch::new(StopwatchConfig::DEFAULT);
    stopwatch.boot(&mut MockLeds::new()).unwrap();
    let mut display = display_expecting(1);

    stopwatch.render(&mut display, &mut NoopDelay::new()).unwrap();

    assert_eq!(finish_display(display), vec![0, 0, 0, 0]);
}

#[test]
fn keypad_drives_row_and_reads_columns() {
    let mut keypad = keypad_expecting(
        [vec![high(), high()], vec![low(), high()], vec![high(), high()]],
        [
            vec![],
            vec![PinTransaction::get(PinState::Low)],
            vec![PinTransaction::get(PinState::High)],
        ],
    );

    keypad.drive_row(2).unwrap();
    assert!(keypad.column_active(2).unwrap());
    assert!(!keypad.column_active(3).unwrap());
    keypad.release_rows().unwrap();

    finish_keypad(keypad);
}

#[test]
fn decoders_sample_their_own_row() {
    let primary = ButtonDecoder::new(KeyPosition::new(1, 1));
    let lap = ButtonDecoder::new(KeyPosition::new(3, 3));
    let mut keypad = keypad_expecting(
        [vec![low(), high()], vec![high(), high()], vec![high(), low()]],
        [
            vec![PinTransaction::get(PinState::High)],
            vec![],
            vec![PinTransaction::get(PinState::Low)],
        ],
    );

    let sample = decode_keys(&primary, &lap, &mut keypad).unwrap();
    assert_eq!(sample, KeySample { primary: false, lap: true });

    finish_keypad(keypad);
}

#[test]
fn scanner_drives_next_row() {
    let scanner = RowScanner::new();
    let mut keypad = keypad_expecting(
        [vec![high()], vec![low()], vec![high()]],
        [vec![], vec![], vec![]],
    );

    assert_eq!(scanner.scan(&mut keypad).unwrap(), 2);

    finish_keypad(keypad);
}

#[test]
fn column_edge_through_pins_starts_the_stopwatch() {
    let stopwatch = Stopwatch::new(StopwatchConfig::DEFAULT);
    let mut leds = MockLeds::new();
    stopwatch.boot(&mut leds).unwrap();

    // K1 held: row 1 then row 3 driven, column 1 low, column 3 high
    let mut keypad = keypad_expecting(
        [vec![low(), high()], vec![high(), high()], vec![high(), low()]],
        [
            vec![PinTransaction::get(PinState::Low)],
            vec![],
            vec![PinTransaction::get(PinState::High)],
        ],
    );
    let mut timer = MockTickTimer::new();
    let mut irq = MockInterrupts::new();

    let transition = stopwatch
        .on_column_edge(&mut keypad, &mut leds, &mut timer, &mut NoopDelay::new(), &mut irq)
        .unwrap();

    assert_eq!(transition.to, Mode::Count);
    assert_eq!(stopwatch.keys(), KeySample { primary: true, lap: false });
    assert_eq!(timer.ops(), &[TimerOp::Start]);
    assert_eq!(irq.cleared(), &[IrqSource::ColumnEdge]);

    finish_keypad(keypad);
}
