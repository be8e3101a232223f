//! Table-driven checks of the mode transition matrix

use lapwatch_core::{transition_for, Action, Event, KeySample, Led, ModeMachine, Mode};
use rstest::rstest;

/// Machine driven into `mode` through legal transitions
fn machine_in(mode: Mode) -> ModeMachine {
    let path: &[Event] = match mode {
        Mode::Idle => &[],
        Mode::Count => &[Event::PrimaryKey],
        Mode::Pause => &[Event::PrimaryKey, Event::PrimaryKey],
        Mode::Check => &[Event::PrimaryKey, Event::PrimaryKey, Event::Rotary],
    };
    let mut machine = ModeMachine::new();
    for event in path {
        machine.handle(*event);
    }
    assert_eq!(machine.current_mode(), mode);
    machine
}

#[rstest]
#[case(Mode::Idle, Event::PrimaryKey, Some(Mode::Count))]
#[case(Mode::Idle, Event::LapKey, None)]
#[case(Mode::Idle, Event::Rotary, None)]
#[case(Mode::Count, Event::PrimaryKey, Some(Mode::Pause))]
#[case(Mode::Count, Event::LapKey, Some(Mode::Count))]
#[case(Mode::Count, Event::Rotary, None)]
#[case(Mode::Pause, Event::PrimaryKey, Some(Mode::Count))]
#[case(Mode::Pause, Event::LapKey, Some(Mode::Idle))]
#[case(Mode::Pause, Event::Rotary, Some(Mode::Check))]
#[case(Mode::Check, Event::PrimaryKey, None)]
#[case(Mode::Check, Event::LapKey, Some(Mode::Pause))]
#[case(Mode::Check, Event::Rotary, Some(Mode::Check))]
fn transition_matrix(#[case] mode: Mode, #[case] event: Event, #[case] expected: Option<Mode>) {
    assert_eq!(transition_for(mode, event).map(|(to, _)| to), expected);

    let mut machine = machine_in(mode);
    let transition = machine.handle(event);
    assert_eq!(transition.from, mode);
    match expected {
        Some(to) => {
            assert_eq!(transition.event, Some(event));
            assert_eq!(transition.to, to);
            assert_eq!(machine.current_mode(), to);
        }
        None => {
            assert!(transition.is_noop());
            assert!(transition.actions.is_empty());
            assert_eq!(machine.current_mode(), mode);
        }
    }
}

#[rstest]
#[case(
    Mode::Idle,
    Event::PrimaryKey,
    &[Action::ToggleLed(Led::Idle), Action::ToggleLed(Led::Running), Action::StartTimeBase]
)]
#[case(
    Mode::Count,
    Event::PrimaryKey,
    &[Action::ToggleLed(Led::Running), Action::ToggleLed(Led::Paused), Action::StopTimeBase]
)]
#[case(
    Mode::Pause,
    Event::PrimaryKey,
    &[Action::ToggleLed(Led::Running), Action::ResumeTimeBase]
)]
#[case(Mode::Count, Event::LapKey, &[Action::RecordLap])]
#[case(
    Mode::Pause,
    Event::LapKey,
    &[
        Action::ToggleLed(Led::Paused),
        Action::ToggleLed(Led::Idle),
        Action::ResetTimeBase,
        Action::ClearElapsed,
    ]
)]
#[case(Mode::Check, Event::LapKey, &[])]
#[case(Mode::Pause, Event::Rotary, &[Action::ShowNextLap])]
#[case(Mode::Check, Event::Rotary, &[Action::ShowNextLap])]
fn actions_in_application_order(
    #[case] mode: Mode,
    #[case] event: Event,
    #[case] expected: &[Action],
) {
    let transition = machine_in(mode).handle(event);
    assert_eq!(transition.actions.as_slice(), expected);
}

#[rstest]
#[case(Mode::Idle, true, true, Mode::Count)]
#[case(Mode::Count, true, true, Mode::Pause)]
#[case(Mode::Pause, true, true, Mode::Count)]
#[case(Mode::Check, true, true, Mode::Pause)]
#[case(Mode::Count, false, true, Mode::Count)]
#[case(Mode::Pause, false, true, Mode::Idle)]
#[case(Mode::Idle, false, true, Mode::Idle)]
#[case(Mode::Check, true, false, Mode::Check)]
#[case(Mode::Count, false, false, Mode::Count)]
fn key_precedence(
    #[case] mode: Mode,
    #[case] primary: bool,
    #[case] lap: bool,
    #[case] expected: Mode,
) {
    let mut machine = machine_in(mode);
    let transition = machine.handle_keys(KeySample { primary, lap });

    assert_eq!(machine.current_mode(), expected);
    if let Some(event) = transition.event {
        // Exactly one event fired, and primary only loses when it has no transition
        let primary_fires = primary && transition_for(mode, Event::PrimaryKey).is_some();
        let want = if primary_fires { Event::PrimaryKey } else { Event::LapKey };
        assert_eq!(event, want);
    }
}

#[rstest]
#[case(Mode::Count)]
#[case(Mode::Pause)]
#[case(Mode::Check)]
fn reset_returns_to_idle(#[case] mode: Mode) {
    let mut machine = machine_in(mode);
    machine.reset();
    assert_eq!(machine.current_mode(), Mode::Idle);
}
