//! Finite State Machine for the stopwatch operating mode
//!
//! The machine is pure: it decides the next mode and the ordered list of
//! side effects, and the `Stopwatch` container applies those effects to the
//! shared state and hardware in the same interrupt invocation.

use heapless::Vec;

use crate::keypad::KeySample;
use crate::types::{Event, Led, Mode};

/// Side effect attached to a transition, applied in list order
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    ToggleLed(Led),
    /// Arm the time base from zero
    StartTimeBase,
    /// Hold the time base
    StopTimeBase,
    /// Continue a held time base
    ResumeTimeBase,
    /// Reset the time-base timer hardware
    ResetTimeBase,
    /// Zero the elapsed-time accumulators
    ClearElapsed,
    /// Snapshot elapsed time into the next lap slot
    RecordLap,
    /// Advance the lap read cursor
    ShowNextLap,
}

/// Maximum number of actions on any transition
pub const MAX_ACTIONS: usize = 4;

/// Outcome of feeding one event to the machine
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition {
    /// Event that fired, `None` if nothing matched
    pub event: Option<Event>,
    pub from: Mode,
    pub to: Mode,
    pub actions: Vec<Action, MAX_ACTIONS>,
}

impl Transition {
    fn none(mode: Mode) -> Self {
        Self {
            event: None,
            from: mode,
            to: mode,
            actions: Vec::new(),
        }
    }

    /// Returns true if nothing changed
    pub fn is_noop(&self) -> bool {
        self.event.is_none()
    }
}

const START: &[Action] = &[
    Action::ToggleLed(Led::Idle),
    Action::ToggleLed(Led::Running),
    Action::StartTimeBase,
];
const PAUSE: &[Action] = &[
    Action::ToggleLed(Led::Running),
    Action::ToggleLed(Led::Paused),
    Action::StopTimeBase,
];
const RESUME: &[Action] = &[Action::ToggleLed(Led::Running), Action::ResumeTimeBase];
const RECORD: &[Action] = &[Action::RecordLap];
const RESET: &[Action] = &[
    Action::ToggleLed(Led::Paused),
    Action::ToggleLed(Led::Idle),
    Action::ResetTimeBase,
    Action::ClearElapsed,
];
const BROWSE: &[Action] = &[Action::ShowNextLap];
const NOTHING: &[Action] = &[];

/// Transition table. `None` means the event is ignored in that mode.
pub const fn transition_for(mode: Mode, event: Event) -> Option<(Mode, &'static [Action])> {
    match (mode, event) {
        (Mode::Idle, Event::PrimaryKey) => Some((Mode::Count, START)),
        (Mode::Count, Event::PrimaryKey) => Some((Mode::Pause, PAUSE)),
        (Mode::Pause, Event::PrimaryKey) => Some((Mode::Count, RESUME)),
        (Mode::Count, Event::LapKey) => Some((Mode::Count, RECORD)),
        (Mode::Pause, Event::LapKey) => Some((Mode::Idle, RESET)),
        (Mode::Check, Event::LapKey) => Some((Mode::Pause, NOTHING)),
        (Mode::Pause, Event::Rotary) | (Mode::Check, Event::Rotary) => Some((Mode::Check, BROWSE)),
        _ => None,
    }
}

/// Main stopwatch FSM
#[derive(Clone, Debug)]
pub struct ModeMachine {
    mode: Mode,
}

impl ModeMachine {
    /// Create new FSM in Idle
    pub const fn new() -> Self {
        Self { mode: Mode::Idle }
    }

    /// Get current mode
    pub fn current_mode(&self) -> Mode {
        self.mode
    }

    /// Feed a single event
    pub fn handle(&mut self, event: Event) -> Transition {
        let from = self.mode;
        match transition_for(from, event) {
            Some((to, actions)) => {
                self.mode = to;
                Transition {
                    event: Some(event),
                    from,
                    to,
                    actions: Vec::from_slice(actions).unwrap_or_default(),
                }
            }
            None => Transition::none(from),
        }
    }

    /// Feed a decoded column edge. Primary-key transitions take precedence;
    /// at most one transition fires.
    pub fn handle_keys(&mut self, keys: KeySample) -> Transition {
        if keys.primary && transition_for(self.mode, Event::PrimaryKey).is_some() {
            self.handle(Event::PrimaryKey)
        } else if keys.lap && transition_for(self.mode, Event::LapKey).is_some() {
            self.handle(Event::LapKey)
        } else {
            Transition::none(self.mode)
        }
    }

    /// Reset FSM to initial state
    pub fn reset(&mut self) {
        self.mode = Mode::Idle;
    }
}

impl Default for ModeMachine {
    fn default() -> Self {
        Self::new()
    }
}
