#![no_std]
#![no_main]

// Logging support
#[cfg(feature = "defmt")]
use defmt::{debug, info, warn};
#[cfg(feature = "defmt")]
use defmt_rtt as _;
use panic_halt as _;

// Define simple logging macros when defmt is not available
#[cfg(not(feature = "defmt"))]
macro_rules! info {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "defmt"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "defmt"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "tick-marker")]
use embedded_hal::digital::OutputPin;
use lapwatch_core::{
    InterruptControl, IrqSource, KeypadMatrix, Stopwatch, StopwatchConfig, TickTimer,
    TICK_PERIOD_US,
};
use lapwatch_firmware::*;
use riscv_rt::entry;

// Critical section implementation for RISC-V
struct RiscvCriticalSection;
critical_section::set_impl!(RiscvCriticalSection);

unsafe impl critical_section::Impl for RiscvCriticalSection {
    unsafe fn acquire() -> critical_section::RawRestoreState {
        let mstatus = riscv::register::mstatus::read();
        riscv::register::mstatus::clear_mie();
        mstatus.mie() as u8
    }

    unsafe fn release(was_enabled: critical_section::RawRestoreState) {
        if was_enabled != 0 {
            riscv::register::mstatus::set_mie();
        }
    }
}

/// All state shared between the interrupt handlers and the main loop
static STOPWATCH: Stopwatch = Stopwatch::new(StopwatchConfig::DEFAULT);

#[entry]
fn main() -> ! {
    let mut display = hardware_init();
    let mut delay = SysTickDelay::new();

    info!("⏱️ Lapwatch running");

    loop {
        if let Err(_e) = STOPWATCH.render(&mut display, &mut delay) {
            warn!("Display refresh failed: {}", _e);
        }
    }
}

/// Bring-up order: clocks, pins, blank display, LEDs, timers, interrupts.
/// Interrupts are enabled globally only once everything else is ready.
fn hardware_init() -> BoardDisplay {
    let config = *STOPWATCH.config();

    enable_peripheral_clocks();
    configure_gpio_pins();

    let mut display = display(config.digit_dwell_us());
    display.blank().ok();

    let mut keypad = keypad();
    keypad.drive_row(STOPWATCH.active_row()).ok();

    STOPWATCH.boot(&mut leds()).ok();

    PeriodicTimer::TIME_BASE.configure(TICK_PERIOD_US);
    let mut scan_timer = PeriodicTimer::ROW_SCAN;
    scan_timer.configure(config.scan_period_us());
    scan_timer.start().ok();

    configure_exti();

    let mut irq = BoardInterrupts;
    for source in IrqSource::ALL {
        irq.clear_pending(source).ok();
        irq.set_priority(source, source.priority()).ok();
        irq.enable(source, true).ok();
    }

    unsafe { riscv::register::mstatus::set_mie() };

    info!("✅ CH32V203 hardware initialized");
    display
}

// ========================================
// Interrupt Handlers
// ========================================

fn column_edge() {
    let mut timer = PeriodicTimer::TIME_BASE;
    let result = STOPWATCH.on_column_edge(
        &mut keypad(),
        &mut leds(),
        &mut timer,
        &mut SysTickDelay::new(),
        &mut BoardInterrupts,
    );
    match result {
        Ok(_t) => {
            debug!("🔑 Column edge: {}", _t);
        }
        Err(_e) => {
            warn!("Column edge failed: {}", _e);
        }
    }
}

/// Keypad column 3 (PA0)
#[no_mangle]
extern "C" fn EXTI0_IRQHandler() {
    column_edge();
}

/// Keypad column 2 (PA1)
#[no_mangle]
extern "C" fn EXTI1_IRQHandler() {
    column_edge();
}

/// Keypad column 1 (PA2)
#[no_mangle]
extern "C" fn EXTI2_IRQHandler() {
    column_edge();
}

/// Rotary select button (PB15)
#[no_mangle]
extern "C" fn EXTI15_10_IRQHandler() {
    let mut timer = PeriodicTimer::TIME_BASE;
    let result = STOPWATCH.on_rotary_edge(
        &mut leds(),
        &mut timer,
        &mut SysTickDelay::new(),
        &mut BoardInterrupts,
    );
    if let Err(_e) = result {
        warn!("Rotary edge failed: {}", _e);
    }
}

/// 100 ms time base
#[no_mangle]
extern "C" fn TIM2_IRQHandler() {
    #[cfg(feature = "tick-marker")]
    let mut marker = TICK_MARKER;
    #[cfg(feature = "tick-marker")]
    marker.set_low().ok();

    STOPWATCH.on_time_tick(&mut BoardInterrupts).ok();

    #[cfg(feature = "tick-marker")]
    marker.set_high().ok();
}

/// Keypad row scan
#[no_mangle]
extern "C" fn TIM3_IRQHandler() {
    STOPWATCH.on_scan_tick(&mut keypad(), &mut BoardInterrupts).ok();
}
