//! CH32V203 Hardware Implementation
//!
//! 64KB Flash / 20KB RAM, running from the 8 MHz HSI without the PLL.
//! Every handle here is a `Copy` wrapper around register addresses, so each
//! interrupt handler builds the ones it needs instead of sharing them.

use core::convert::Infallible;
use core::ptr::{read_volatile, write_volatile};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin, StatefulOutputPin};
use lapwatch_core::{
    DigitDisplay, EmbeddedHalKeypad, EmbeddedHalLeds, HalError, InterruptControl, IrqSource,
    SegmentBus, TickTimer, DISPLAY_DIGITS, KEYPAD_COLUMNS, KEYPAD_ROWS,
};

use crate::glyphs::SEGMENT_PATTERNS;

/// Core clock after reset
pub const HCLK_HZ: u32 = 8_000_000;

// RCC
const RCC_BASE: u32 = 0x4002_1000;
const RCC_APB2PCENR: u32 = 0x18;
const RCC_APB1PCENR: u32 = 0x1C;

// GPIO
pub const GPIOA_BASE: u32 = 0x4001_0800;
pub const GPIOB_BASE: u32 = 0x4001_0C00;
pub const GPIOC_BASE: u32 = 0x4001_1000;
const GPIO_CFGLR: u32 = 0x00;
const GPIO_CFGHR: u32 = 0x04;
const GPIO_INDR: u32 = 0x08;
const GPIO_OUTDR: u32 = 0x0C;
const GPIO_BSHR: u32 = 0x10;

/// CNF=00 MODE=11: push-pull output, 50 MHz
const CFG_OUTPUT_PP: u32 = 0x3;
/// CNF=10 MODE=00: input with pull-up/down (OUTDR selects up)
const CFG_INPUT_PULL: u32 = 0x8;

// AFIO / EXTI
const AFIO_BASE: u32 = 0x4001_0000;
const AFIO_EXTICR4: u32 = 0x14;
const EXTI_BASE: u32 = 0x4001_0400;
const EXTI_INTENR: u32 = 0x00;
const EXTI_FTENR: u32 = 0x0C;
const EXTI_INTFR: u32 = 0x14;

/// EXTI0..2 on PA0..PA2
const COLUMN_LINES: u32 = 0b111;
const ROTARY_LINE: u32 = 1 << 15;

// General purpose timers
const TIM2_BASE: u32 = 0x4000_0000;
const TIM3_BASE: u32 = 0x4000_0400;
const TIM_CTLR1: u32 = 0x00;
const TIM_DMAINTENR: u32 = 0x0C;
const TIM_INTFR: u32 = 0x10;
const TIM_SWEVGR: u32 = 0x14;
const TIM_CNT: u32 = 0x24;
const TIM_PSC: u32 = 0x28;
const TIM_ATRLR: u32 = 0x2C;
const TIM_CEN: u32 = 1 << 0;
const TIM_UIE: u32 = 1 << 0;
const TIM_UIF: u32 = 1 << 0;
const TIM_UG: u32 = 1 << 0;
/// Timer counter clock: 100 us resolution
const TIM_COUNT_HZ: u32 = 10_000;

// PFIC
const PFIC_BASE: u32 = 0xE000_E000;
const PFIC_IENR: u32 = 0x100;
const PFIC_IRER: u32 = 0x180;
const PFIC_IPRIOR: u32 = 0x400;

const IRQ_EXTI0: u32 = 22;
const IRQ_EXTI1: u32 = 23;
const IRQ_EXTI2: u32 = 24;
const IRQ_TIM2: u32 = 44;
const IRQ_TIM3: u32 = 45;
const IRQ_EXTI15_10: u32 = 56;

#[inline(always)]
fn reg(base: u32, offset: u32) -> *mut u32 {
    (base + offset) as *mut u32
}

#[inline(always)]
unsafe fn modify(addr: *mut u32, f: impl FnOnce(u32) -> u32) {
    write_volatile(addr, f(read_volatile(addr)));
}

// ========================================
// GPIO
// ========================================

/// One GPIO line
#[derive(Copy, Clone, Debug)]
pub struct Pin {
    port: u32,
    pin: u8,
}

impl Pin {
    pub const fn new(port: u32, pin: u8) -> Self {
        Self { port, pin }
    }

    fn mask(&self) -> u32 {
        1 << self.pin
    }

    fn configure(&self, cfg: u32) {
        let (offset, shift) = if self.pin < 8 {
            (GPIO_CFGLR, u32::from(self.pin) * 4)
        } else {
            (GPIO_CFGHR, u32::from(self.pin - 8) * 4)
        };
        unsafe {
            modify(reg(self.port, offset), |v| (v & !(0xF << shift)) | (cfg << shift));
        }
    }

    pub fn into_push_pull_output(self) -> Self {
        self.configure(CFG_OUTPUT_PP);
        self
    }

    pub fn into_pull_up_input(self) -> Self {
        self.configure(CFG_INPUT_PULL);
        unsafe { write_volatile(reg(self.port, GPIO_BSHR), self.mask()) };
        self
    }
}

impl ErrorType for Pin {
    type Error = Infallible;
}

impl OutputPin for Pin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        unsafe { write_volatile(reg(self.port, GPIO_BSHR), self.mask() << 16) };
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        unsafe { write_volatile(reg(self.port, GPIO_BSHR), self.mask()) };
        Ok(())
    }
}

impl StatefulOutputPin for Pin {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        let outdr = unsafe { read_volatile(reg(self.port, GPIO_OUTDR)) };
        Ok(outdr & self.mask() != 0)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        self.is_set_high().map(|high| !high)
    }
}

impl InputPin for Pin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let indr = unsafe { read_volatile(reg(self.port, GPIO_INDR)) };
        Ok(indr & self.mask() != 0)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

// Pin assignments:
// PA3..PA5  = keypad rows 1..3 (active low)
// PA2, PA1, PA0 = keypad columns 1..3 (pull-up, EXTI0..2 falling edge)
// PB15      = rotary select button (pull-up, EXTI15 falling edge)
// PA8..PA11 = digit select 1..4 (active high)
// PB0..PB7  = segment bus (active low)
// PB12..PB14 = idle / running / paused LEDs, PC13 = aux LED
// PB10      = time-base interrupt marker

pub const ROWS: [Pin; KEYPAD_ROWS as usize] = [
    Pin::new(GPIOA_BASE, 3),
    Pin::new(GPIOA_BASE, 4),
    Pin::new(GPIOA_BASE, 5),
];

pub const COLUMNS: [Pin; KEYPAD_COLUMNS as usize] = [
    Pin::new(GPIOA_BASE, 2),
    Pin::new(GPIOA_BASE, 1),
    Pin::new(GPIOA_BASE, 0),
];

pub const DIGIT_SELECTS: [Pin; DISPLAY_DIGITS] = [
    Pin::new(GPIOA_BASE, 8),
    Pin::new(GPIOA_BASE, 9),
    Pin::new(GPIOA_BASE, 10),
    Pin::new(GPIOA_BASE, 11),
];

/// In `Led::ALL` order
pub const LEDS: [Pin; 4] = [
    Pin::new(GPIOB_BASE, 12),
    Pin::new(GPIOB_BASE, 13),
    Pin::new(GPIOB_BASE, 14),
    Pin::new(GPIOC_BASE, 13),
];

pub const ROTARY: Pin = Pin::new(GPIOB_BASE, 15);
pub const TICK_MARKER: Pin = Pin::new(GPIOB_BASE, 10);

/// Eight segment lines on the low byte of one port
#[derive(Copy, Clone, Debug)]
pub struct PortSegmentBus {
    port: u32,
}

impl PortSegmentBus {
    pub const SEGMENTS: PortSegmentBus = PortSegmentBus { port: GPIOB_BASE };

    fn lines(&self) -> [Pin; 8] {
        [0, 1, 2, 3, 4, 5, 6, 7].map(|n| Pin::new(self.port, n))
    }
}

impl SegmentBus for PortSegmentBus {
    fn write(&mut self, pattern: u8) -> Result<(), HalError> {
        // Set the one bits and reset the zero bits in a single store
        let set = u32::from(pattern);
        let reset = u32::from(!pattern);
        unsafe { write_volatile(reg(self.port, GPIO_BSHR), set | (reset << 16)) };
        Ok(())
    }
}

pub type BoardKeypad = EmbeddedHalKeypad<Pin, Pin>;
pub type BoardLeds = EmbeddedHalLeds<Pin>;
pub type BoardDisplay = DigitDisplay<Pin, PortSegmentBus, [u8; 11]>;

pub fn keypad() -> BoardKeypad {
    EmbeddedHalKeypad::new(ROWS, COLUMNS)
}

pub fn leds() -> BoardLeds {
    EmbeddedHalLeds::new(LEDS, false)
}

pub fn display(dwell_us: u32) -> BoardDisplay {
    DigitDisplay::new(DIGIT_SELECTS, PortSegmentBus::SEGMENTS, SEGMENT_PATTERNS, dwell_us)
}

// ========================================
// Timers
// ========================================

/// TIM2/TIM3 used as periodic update-interrupt sources
#[derive(Copy, Clone, Debug)]
pub struct PeriodicTimer {
    base: u32,
}

impl PeriodicTimer {
    /// 100 ms stopwatch time base
    pub const TIME_BASE: PeriodicTimer = PeriodicTimer { base: TIM2_BASE };
    /// Keypad row scan
    pub const ROW_SCAN: PeriodicTimer = PeriodicTimer { base: TIM3_BASE };

    /// Program an update interrupt every `period_us`, leaving the counter
    /// stopped
    pub fn configure(&self, period_us: u32) {
        let reload = (period_us / (1_000_000 / TIM_COUNT_HZ)).max(1) - 1;
        unsafe {
            write_volatile(reg(self.base, TIM_CTLR1), 0);
            write_volatile(reg(self.base, TIM_PSC), HCLK_HZ / TIM_COUNT_HZ - 1);
            write_volatile(reg(self.base, TIM_ATRLR), reload);
            // Latch the prescaler; UG also raises UIF, so drop it again
            write_volatile(reg(self.base, TIM_SWEVGR), TIM_UG);
            write_volatile(reg(self.base, TIM_INTFR), 0);
            write_volatile(reg(self.base, TIM_DMAINTENR), TIM_UIE);
        }
    }

    fn clear_update(&self) {
        // rc_w0
        unsafe { write_volatile(reg(self.base, TIM_INTFR), !TIM_UIF) };
    }
}

impl TickTimer for PeriodicTimer {
    fn start(&mut self) -> Result<(), HalError> {
        unsafe { modify(reg(self.base, TIM_CTLR1), |v| v | TIM_CEN) };
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HalError> {
        unsafe { modify(reg(self.base, TIM_CTLR1), |v| v & !TIM_CEN) };
        Ok(())
    }

    fn reset(&mut self) -> Result<(), HalError> {
        self.stop()?;
        unsafe { write_volatile(reg(self.base, TIM_CNT), 0) };
        self.clear_update();
        Ok(())
    }
}

// ========================================
// Interrupts
// ========================================

fn irq_lines(source: IrqSource) -> &'static [u32] {
    match source {
        IrqSource::ColumnEdge => &[IRQ_EXTI0, IRQ_EXTI1, IRQ_EXTI2],
        IrqSource::RotaryEdge => &[IRQ_EXTI15_10],
        IrqSource::TimeBaseTick => &[IRQ_TIM2],
        IrqSource::RowScanTick => &[IRQ_TIM3],
    }
}

/// EXTI pending flags, timer update flags and the PFIC
#[derive(Copy, Clone, Debug, Default)]
pub struct BoardInterrupts;

/// IPRIOR bytes for logical priorities 0..=3. With two-level nesting only
/// bit 7 preempts, so column edges alone sit in the upper group and the rest
/// are ordered by sub-priority below it.
const PRIORITY_LEVELS: [u8; 4] = [0x00, 0x80, 0xA0, 0xC0];

impl InterruptControl for BoardInterrupts {
    fn clear_pending(&mut self, source: IrqSource) -> Result<(), HalError> {
        match source {
            // EXTI flags are write-one-to-clear
            IrqSource::ColumnEdge => unsafe {
                write_volatile(reg(EXTI_BASE, EXTI_INTFR), COLUMN_LINES)
            },
            IrqSource::RotaryEdge => unsafe {
                write_volatile(reg(EXTI_BASE, EXTI_INTFR), ROTARY_LINE)
            },
            IrqSource::TimeBaseTick => PeriodicTimer::TIME_BASE.clear_update(),
            IrqSource::RowScanTick => PeriodicTimer::ROW_SCAN.clear_update(),
        }
        Ok(())
    }

    fn set_priority(&mut self, source: IrqSource, priority: u8) -> Result<(), HalError> {
        let level = *PRIORITY_LEVELS
            .get(usize::from(priority))
            .ok_or(HalError::InvalidConfig)?;
        for &irq in irq_lines(source) {
            let addr = (PFIC_BASE + PFIC_IPRIOR + irq) as *mut u8;
            unsafe { write_volatile(addr, level) };
        }
        Ok(())
    }

    fn enable(&mut self, source: IrqSource, enable: bool) -> Result<(), HalError> {
        let bank = if enable { PFIC_IENR } else { PFIC_IRER };
        for &irq in irq_lines(source) {
            let addr = reg(PFIC_BASE, bank + (irq / 32) * 4);
            unsafe { write_volatile(addr, 1 << (irq % 32)) };
        }
        Ok(())
    }
}

// ========================================
// Bring-up
// ========================================

/// Clock every peripheral the board uses
pub fn enable_peripheral_clocks() {
    unsafe {
        // AFIO, GPIOA, GPIOB, GPIOC
        modify(reg(RCC_BASE, RCC_APB2PCENR), |v| {
            v | (1 << 0) | (1 << 2) | (1 << 3) | (1 << 4)
        });
        // TIM2, TIM3
        modify(reg(RCC_BASE, RCC_APB1PCENR), |v| v | (1 << 0) | (1 << 1));
    }
}

/// Pin modes and idle levels
pub fn configure_gpio_pins() {
    for row in ROWS {
        let mut row = row.into_push_pull_output();
        let _ = row.set_high();
    }
    for column in COLUMNS {
        column.into_pull_up_input();
    }
    ROTARY.into_pull_up_input();

    for select in DIGIT_SELECTS {
        let mut select = select.into_push_pull_output();
        let _ = select.set_low();
    }
    for line in PortSegmentBus::SEGMENTS.lines() {
        line.into_push_pull_output();
    }
    for led in LEDS {
        led.into_push_pull_output();
    }

    let mut marker = TICK_MARKER.into_push_pull_output();
    let _ = marker.set_high();
}

/// Falling-edge interrupts on the keypad columns and the rotary button
pub fn configure_exti() {
    unsafe {
        // EXTI15 from port B; EXTI0..2 stay on port A (reset value)
        modify(reg(AFIO_BASE, AFIO_EXTICR4), |v| (v & !(0xF << 12)) | (0x1 << 12));
        modify(reg(EXTI_BASE, EXTI_FTENR), |v| v | COLUMN_LINES | ROTARY_LINE);
        write_volatile(reg(EXTI_BASE, EXTI_INTFR), COLUMN_LINES | ROTARY_LINE);
        modify(reg(EXTI_BASE, EXTI_INTENR), |v| v | COLUMN_LINES | ROTARY_LINE);
    }

    #[cfg(feature = "defmt")]
    defmt::info!("🔌 EXTI configured: columns PA0-PA2, rotary PB15");
}
