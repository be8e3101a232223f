//! End-to-end stopwatch sessions on the simulated board

use lapwatch_core::mock::{BoardEvent, TimerOp};
use lapwatch_core::test_utils::Bench;
use lapwatch_core::{IrqSource, Key, LapIndex, LapRecord, Led, Mode};

use crate::scenarios::{lap_session, pause_resume, run, Step};

fn lap(tens: u8, ones: u8, deciseconds: u8) -> LapRecord {
    LapRecord::from_digits(tens, ones, deciseconds).unwrap()
}

fn index(number: u8) -> LapIndex {
    LapIndex::new(number).unwrap()
}

#[test]
fn first_lap_after_1230_ms() {
    let mut bench = Bench::new();

    bench.press(Key::Primary).unwrap();
    assert_eq!(bench.mode(), Mode::Count);
    assert_eq!(bench.advance_ms(1_230).unwrap(), 12);

    bench.press(Key::Lap).unwrap();
    assert_eq!(bench.mode(), Mode::Count);
    assert_eq!(bench.stopwatch.lap(LapIndex::FIRST), lap(0, 1, 2));
    assert_eq!(bench.stopwatch.write_cursor(), index(2));
    assert_eq!(bench.refresh().unwrap(), [0, 0, 1, 2]);
}

#[test]
fn lap_session_walkthrough() {
    let mut bench = Bench::new();
    let script = lap_session();

    // Up to and including the pause
    run(&mut bench, &script[..8]).unwrap();
    assert_eq!(bench.mode(), Mode::Pause);
    assert_eq!(bench.digits(), [0, 0, 5, 5]);

    let expected = [[1, 0, 1, 2], [2, 0, 4, 0], [3, 0, 5, 5]];
    for (step, digits) in script[8..11].iter().zip(expected) {
        run(&mut bench, &[*step]).unwrap();
        assert_eq!(bench.mode(), Mode::Check);
        assert_eq!(bench.digits(), digits);
    }

    // Lap key leaves check mode, elapsed time is back on the display
    run(&mut bench, &script[11..12]).unwrap();
    assert_eq!(bench.mode(), Mode::Pause);
    assert_eq!(bench.digits(), [0, 0, 5, 5]);

    run(&mut bench, &script[12..]).unwrap();
    assert_eq!(bench.mode(), Mode::Idle);
    assert_eq!(bench.digits(), [0, 0, 0, 0]);
    assert_eq!(bench.timer.ops().last(), Some(&TimerOp::Reset));
}

#[test]
fn pause_then_resume_keeps_elapsed() {
    let mut bench = Bench::new();
    bench.press(Key::Primary).unwrap();
    bench.advance_ms(700).unwrap();
    bench.leds.clear_log();
    bench.timer.clear_log();

    bench.press(Key::Primary).unwrap();
    assert_eq!(bench.mode(), Mode::Pause);
    assert_eq!(bench.advance_ms(3_000).unwrap(), 0);
    assert_eq!(bench.digits(), [0, 0, 0, 7]);

    bench.press(Key::Primary).unwrap();
    assert_eq!(bench.mode(), Mode::Count);
    assert_eq!(bench.digits(), [0, 0, 0, 7]);

    let running_toggles = bench
        .leds
        .toggle_log()
        .iter()
        .filter(|led| **led == Led::Running)
        .count();
    assert_eq!(running_toggles, 2);
    assert_eq!(bench.timer.ops(), &[TimerOp::Stop, TimerOp::Start]);

    bench.advance_ms(300).unwrap();
    assert_eq!(bench.digits(), [0, 0, 1, 0]);
}

#[test]
fn pause_resume_script_counts_only_running_time() {
    let mut bench = Bench::new();
    run(&mut bench, &pause_resume(450)).unwrap();

    assert_eq!(bench.mode(), Mode::Count);
    assert_eq!(bench.digits(), [0, 0, 0, 9]);
}

#[test]
fn sixth_lap_overwrites_first_slot() {
    let mut bench = Bench::new();
    bench.press(Key::Primary).unwrap();

    for _ in 0..6 {
        bench.advance_ms(100).unwrap();
        bench.press(Key::Lap).unwrap();
    }

    assert_eq!(bench.stopwatch.lap(index(1)), lap(0, 0, 6));
    for number in 2..=5 {
        assert_eq!(bench.stopwatch.lap(index(number)), lap(0, 0, number));
    }
    assert_eq!(bench.stopwatch.write_cursor(), index(2));
}

#[test]
fn check_mode_browses_and_wraps() {
    let mut bench = Bench::new();
    bench.press(Key::Primary).unwrap();
    for _ in 0..6 {
        bench.advance_ms(100).unwrap();
        bench.press(Key::Lap).unwrap();
    }
    bench.press(Key::Primary).unwrap();

    let shown = [[1, 0, 0, 6], [2, 0, 0, 2], [3, 0, 0, 3], [4, 0, 0, 4], [5, 0, 0, 5]];
    for digits in shown {
        bench.rotate().unwrap();
        assert_eq!(bench.mode(), Mode::Check);
        assert_eq!(bench.digits(), digits);
    }

    bench.rotate().unwrap();
    assert_eq!(bench.digits(), [1, 0, 0, 6]);

    // The read cursor survives a trip back to pause
    bench.press(Key::Lap).unwrap();
    assert_eq!(bench.mode(), Mode::Pause);
    bench.rotate().unwrap();
    assert_eq!(bench.stopwatch.read_cursor(), index(2));
}

#[test]
fn reset_returns_to_idle_and_keeps_laps() {
    let mut bench = Bench::new();
    bench.press(Key::Primary).unwrap();
    bench.advance_ms(1_230).unwrap();
    bench.press(Key::Lap).unwrap();
    bench.press(Key::Primary).unwrap();

    bench.press(Key::Lap).unwrap();
    assert_eq!(bench.mode(), Mode::Idle);
    assert_eq!(bench.digits(), [0, 0, 0, 0]);
    assert_eq!(bench.leds.states(), [true, false, false, false]);
    assert!(!bench.stopwatch.is_running());
    assert_eq!(bench.stopwatch.lap(LapIndex::FIRST), lap(0, 1, 2));

    bench.press(Key::Primary).unwrap();
    bench.advance_ms(200).unwrap();
    assert_eq!(bench.digits(), [0, 0, 0, 2]);
}

#[test]
fn ignored_events_change_nothing() {
    let mut bench = Bench::new();
    bench.leds.clear_log();

    assert!(bench.press(Key::Lap).unwrap().is_noop());
    assert!(bench.rotate().unwrap().is_noop());
    assert_eq!(bench.mode(), Mode::Idle);
    assert!(bench.leds.toggle_log().is_empty());
    assert!(bench.timer.ops().is_empty());
    assert_eq!(bench.stopwatch.write_cursor(), LapIndex::FIRST);

    bench.press(Key::Primary).unwrap();
    bench.advance_ms(400).unwrap();
    let before = bench.stopwatch.read_cursor();
    assert!(bench.rotate().unwrap().is_noop());
    assert_eq!(bench.mode(), Mode::Count);
    assert_eq!(bench.stopwatch.read_cursor(), before);
}

#[test]
fn primary_key_wins_on_simultaneous_press() {
    let mut bench = Bench::new();
    bench.press(Key::Primary).unwrap();
    bench.advance_ms(500).unwrap();

    // Count: pause rather than record
    bench.press_both().unwrap();
    assert_eq!(bench.mode(), Mode::Pause);
    assert_eq!(bench.stopwatch.write_cursor(), LapIndex::FIRST);

    // Pause: resume rather than reset
    bench.press_both().unwrap();
    assert_eq!(bench.mode(), Mode::Count);
    assert_eq!(bench.digits(), [0, 0, 0, 5]);

    // Check: primary is ignored, so the lap key gets its turn
    run(&mut bench, &[Step::Press(Key::Primary), Step::Rotate]).unwrap();
    assert_eq!(bench.mode(), Mode::Check);
    bench.press_both().unwrap();
    assert_eq!(bench.mode(), Mode::Pause);
}

#[test]
fn minute_rollover_and_wrap() {
    let mut bench = Bench::new();
    bench.press(Key::Primary).unwrap();

    bench.advance_ms(59_900).unwrap();
    assert_eq!(bench.digits(), [0, 5, 9, 9]);
    bench.advance_ms(100).unwrap();
    assert_eq!(bench.digits(), [1, 0, 0, 0]);

    // Ten minutes wrap the minute digit without a carry
    bench.advance_ms(540_000).unwrap();
    assert_eq!(bench.digits(), [0, 0, 0, 0]);
}

#[test]
fn each_handler_clears_its_own_source() {
    let mut bench = Bench::new();
    bench.irq.clear_log();

    bench.press(Key::Primary).unwrap();
    bench.advance_ms(200).unwrap();
    bench.rotate().unwrap();
    bench.scan(1).unwrap();

    assert_eq!(
        bench.irq.cleared(),
        &[
            IrqSource::ColumnEdge,
            IrqSource::TimeBaseTick,
            IrqSource::TimeBaseTick,
            IrqSource::RotaryEdge,
            IrqSource::RowScanTick,
        ]
    );
}

#[test]
fn every_edge_waits_out_the_debounce() {
    let mut bench = Bench::new();
    let config = *bench.stopwatch.config();

    bench.press(Key::Lap).unwrap();
    bench.press(Key::Primary).unwrap();
    bench.rotate().unwrap();

    let expected = 2 * u64::from(config.key_debounce_us()) + u64::from(config.rotary_debounce_us());
    assert_eq!(bench.delay.calls(), 3);
    assert_eq!(bench.delay.total_us(), expected);
}

#[test]
fn refresh_is_repeatable() {
    let mut bench = Bench::new();
    bench.press(Key::Primary).unwrap();
    bench.advance_ms(45_600).unwrap();

    let first = bench.refresh().unwrap();
    let second = bench.refresh().unwrap();
    assert_eq!(first, second);
    assert_eq!(bench.display.bus().writes(), &[0, 4, 5, 6, 0, 4, 5, 6]);
}

#[test]
fn edges_wait_out_debounce_before_acknowledging() {
    let mut bench = Bench::new();
    let config = *bench.stopwatch.config();

    bench.press(Key::Primary).unwrap();
    bench.advance_ms(100).unwrap();
    bench.press(Key::Primary).unwrap();
    bench.rotate().unwrap();

    assert_eq!(
        bench.events.borrow().as_slice(),
        &[
            BoardEvent::DelayUs(config.key_debounce_us()),
            BoardEvent::Cleared(IrqSource::ColumnEdge),
            BoardEvent::Cleared(IrqSource::TimeBaseTick),
            BoardEvent::DelayUs(config.key_debounce_us()),
            BoardEvent::Cleared(IrqSource::ColumnEdge),
            BoardEvent::DelayUs(config.rotary_debounce_us()),
            BoardEvent::Cleared(IrqSource::RotaryEdge),
        ]
    );
}

#[test]
fn failed_edge_is_still_acknowledged() {
    let mut bench = Bench::new();
    bench.keypad.set_faulty(true);

    assert!(bench.press(Key::Primary).is_err());
    assert_eq!(bench.mode(), Mode::Idle);
    assert_eq!(bench.irq.cleared(), &[IrqSource::ColumnEdge]);

    bench.keypad.set_faulty(false);
    bench.press(Key::Primary).unwrap();
    assert_eq!(bench.mode(), Mode::Count);
}
