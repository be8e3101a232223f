//! Stopwatch shared state and interrupt entry points
//!
//! One `Stopwatch` lives in a `static`. Each interrupt handler calls exactly
//! one `on_*` method with the hardware it owns; the main loop calls
//! `render`. Mode and lap store sit behind `critical_section::Mutex`, so a
//! transition and its effects are applied atomically with respect to the
//! tick and scan interrupts.

use core::cell::RefCell;

use critical_section::{CriticalSection, Mutex};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::display::{DigitDisplay, Frame};
use crate::fsm::{Action, ModeMachine, Transition};
use crate::hal::{
    GlyphTable, HalError, InterruptControl, IrqSource, KeypadMatrix, SegmentBus, StatusLeds,
    TickTimer,
};
use crate::keypad::{decode_keys, ButtonDecoder, KeyFlags, KeySample, RowScanner};
use crate::laps::LapStore;
use crate::timebase::TimeBase;
use crate::types::{ElapsedTime, Event, LapIndex, LapRecord, Led, Mode, StopwatchConfig};

pub struct Stopwatch {
    config: StopwatchConfig,
    machine: Mutex<RefCell<ModeMachine>>,
    laps: Mutex<RefCell<LapStore>>,
    time: TimeBase,
    scanner: RowScanner,
    keys: KeyFlags,
    primary: ButtonDecoder,
    lap: ButtonDecoder,
}

impl Stopwatch {
    pub const fn new(config: StopwatchConfig) -> Self {
        Self {
            config,
            machine: Mutex::new(RefCell::new(ModeMachine::new())),
            laps: Mutex::new(RefCell::new(LapStore::new())),
            time: TimeBase::new(),
            scanner: RowScanner::new(),
            keys: KeyFlags::new(),
            primary: ButtonDecoder::new(config.primary_key()),
            lap: ButtonDecoder::new(config.lap_key()),
        }
    }

    /// Known indicator state before interrupts are enabled: every LED off,
    /// then the idle LED on
    pub fn boot<L: StatusLeds>(&self, leds: &mut L) -> Result<(), HalError> {
        leds.all_off()?;
        leds.toggle(Led::Idle)?;

        #[cfg(feature = "defmt")]
        defmt::info!("⏱️ Stopwatch ready: {}", self.config);

        Ok(())
    }

    /// Time-base interrupt body
    pub fn on_time_tick<I: InterruptControl>(&self, irq: &mut I) -> Result<bool, HalError> {
        let counted = self.time.tick();
        irq.clear_pending(IrqSource::TimeBaseTick)?;
        Ok(counted)
    }

    /// Row-scan interrupt body. Returns the row now driven.
    pub fn on_scan_tick<K, I>(&self, keypad: &mut K, irq: &mut I) -> Result<u8, HalError>
    where
        K: KeypadMatrix,
        I: InterruptControl,
    {
        let row = self.scanner.scan(keypad)?;
        irq.clear_pending(IrqSource::RowScanTick)?;
        Ok(row)
    }

    /// Column-edge interrupt body: decode both keys, run at most one
    /// transition, then hold off for the debounce window before clearing
    /// the pending flag. The wait and the clear happen even when decoding
    /// or the transition fails; the first error is returned afterwards.
    pub fn on_column_edge<K, L, T, W, I>(
        &self,
        keypad: &mut K,
        leds: &mut L,
        timer: &mut T,
        delay: &mut W,
        irq: &mut I,
    ) -> Result<Transition, HalError>
    where
        K: KeypadMatrix,
        L: StatusLeds,
        T: TickTimer,
        W: DelayNs,
        I: InterruptControl,
    {
        let outcome = decode_keys(&self.primary, &self.lap, keypad).and_then(|sample| {
            self.keys.store(sample);
            self.dispatch(|machine| machine.handle_keys(sample), leds, timer)
        });

        delay.delay_us(self.config.key_debounce_us());
        let cleared = irq.clear_pending(IrqSource::ColumnEdge);
        let transition = outcome?;
        cleared.map(|_| transition)
    }

    /// Rotary-edge interrupt body
    pub fn on_rotary_edge<L, T, W, I>(
        &self,
        leds: &mut L,
        timer: &mut T,
        delay: &mut W,
        irq: &mut I,
    ) -> Result<Transition, HalError>
    where
        L: StatusLeds,
        T: TickTimer,
        W: DelayNs,
        I: InterruptControl,
    {
        let outcome = self.dispatch(|machine| machine.handle(Event::Rotary), leds, timer);

        delay.delay_us(self.config.rotary_debounce_us());
        let cleared = irq.clear_pending(IrqSource::RotaryEdge);
        let transition = outcome?;
        cleared.map(|_| transition)
    }

    /// Plan a transition on a copy of the machine, drive the hardware, and
    /// only then commit the new mode and the software effects. If any
    /// hardware effect fails the ones already made are undone and the mode
    /// is left as it was.
    fn dispatch<F, L, T>(&self, plan: F, leds: &mut L, timer: &mut T) -> Result<Transition, HalError>
    where
        F: FnOnce(&mut ModeMachine) -> Transition,
        L: StatusLeds,
        T: TickTimer,
    {
        critical_section::with(|cs| {
            let mut machine = self.machine.borrow_ref_mut(cs);
            let mut next = machine.clone();
            let transition = plan(&mut next);
            if transition.is_noop() {
                return Ok(transition);
            }

            drive_hardware(&transition.actions, leds, timer)?;
            self.update(cs, &transition.actions);
            *machine = next;

            #[cfg(feature = "defmt")]
            defmt::debug!("🔀 {} -> {} on {}", transition.from, transition.to, transition.event);

            Ok(transition)
        })
    }

    /// Software side of the actions. Cannot fail.
    fn update(&self, cs: CriticalSection<'_>, actions: &[Action]) {
        for action in actions {
            match *action {
                Action::StartTimeBase | Action::ResumeTimeBase => self.time.start(),
                Action::StopTimeBase | Action::ResetTimeBase => self.time.stop(),
                Action::ClearElapsed => self.time.clear_in(cs),
                Action::RecordLap => {
                    let lap = self.time.elapsed_in(cs).lap_record();
                    let _slot = self.laps.borrow_ref_mut(cs).record(lap);

                    #[cfg(feature = "defmt")]
                    defmt::info!("🏁 Lap {} = {}", _slot.number(), lap);
                }
                Action::ShowNextLap => {
                    self.laps.borrow_ref_mut(cs).advance_and_get();
                }
                Action::ToggleLed(_) => {}
            }
        }
    }

    /// What the display should show right now
    pub fn frame(&self) -> Frame {
        critical_section::with(|cs| {
            if self.machine.borrow_ref(cs).current_mode().shows_lap() {
                let (index, lap) = self.laps.borrow_ref(cs).shown();
                Frame::lap(index, lap)
            } else {
                Frame::elapsed(self.time.elapsed_in(cs))
            }
        })
    }

    /// Main-loop body: one refresh of the current frame
    pub fn render<D, B, G, W>(
        &self,
        display: &mut DigitDisplay<D, B, G>,
        delay: &mut W,
    ) -> Result<(), HalError>
    where
        D: OutputPin,
        B: SegmentBus,
        G: GlyphTable,
        W: DelayNs,
    {
        let frame = self.frame();
        display.render(&frame, delay)
    }

    pub fn mode(&self) -> Mode {
        critical_section::with(|cs| self.machine.borrow_ref(cs).current_mode())
    }

    pub fn elapsed(&self) -> ElapsedTime {
        self.time.elapsed()
    }

    pub fn is_running(&self) -> bool {
        self.time.is_running()
    }

    pub fn lap(&self, index: LapIndex) -> LapRecord {
        critical_section::with(|cs| self.laps.borrow_ref(cs).get(index))
    }

    /// Next slot a lap will be written to
    pub fn write_cursor(&self) -> LapIndex {
        critical_section::with(|cs| self.laps.borrow_ref(cs).write_cursor())
    }

    /// Slot shown in check mode
    pub fn read_cursor(&self) -> LapIndex {
        critical_section::with(|cs| self.laps.borrow_ref(cs).read_cursor())
    }

    pub fn active_row(&self) -> u8 {
        self.scanner.active_row()
    }

    /// Flags from the most recent column edge
    pub fn keys(&self) -> KeySample {
        self.keys.sample()
    }

    pub fn config(&self) -> &StopwatchConfig {
        &self.config
    }
}

/// Hardware side of the actions, in order. On failure the effects already
/// made are undone in reverse, best effort.
fn drive_hardware<L, T>(actions: &[Action], leds: &mut L, timer: &mut T) -> Result<(), HalError>
where
    L: StatusLeds,
    T: TickTimer,
{
    for (done, action) in actions.iter().enumerate() {
        if let Err(e) = drive(*action, leds, timer) {
            #[cfg(feature = "defmt")]
            defmt::warn!("Undoing {} after {}", done, e);

            for made in actions[..done].iter().rev() {
                let _ = undo(*made, leds, timer);
            }
            return Err(e);
        }
    }
    Ok(())
}

fn drive<L, T>(action: Action, leds: &mut L, timer: &mut T) -> Result<(), HalError>
where
    L: StatusLeds,
    T: TickTimer,
{
    match action {
        Action::ToggleLed(led) => leds.toggle(led),
        Action::StartTimeBase | Action::ResumeTimeBase => timer.start(),
        Action::StopTimeBase => timer.stop(),
        Action::ResetTimeBase => timer.reset(),
        Action::ClearElapsed | Action::RecordLap | Action::ShowNextLap => Ok(()),
    }
}

fn undo<L, T>(action: Action, leds: &mut L, timer: &mut T) -> Result<(), HalError>
where
    L: StatusLeds,
    T: TickTimer,
{
    match action {
        Action::ToggleLed(led) => leds.toggle(led),
        Action::StartTimeBase | Action::ResumeTimeBase => timer.stop(),
        Action::StopTimeBase => timer.start(),
        // Only reached from Pause, where the timer is already stopped
        Action::ResetTimeBase => Ok(()),
        Action::ClearElapsed | Action::RecordLap | Action::ShowNextLap => Ok(()),
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new(StopwatchConfig::DEFAULT)
    }
}
