//! Busy-wait on the QingKe V4 SysTick counter

use core::ptr::{read_volatile, write_volatile};

use embedded_hal::delay::DelayNs;

use crate::ch32v203_hardware::HCLK_HZ;

const STK_BASE: u32 = 0xE000_F000;
const STK_CTLR: u32 = 0x00;
const STK_SR: u32 = 0x04;
const STK_CNTL: u32 = 0x08;
const STK_CNTH: u32 = 0x0C;
const STK_CMPLR: u32 = 0x10;
const STK_CMPHR: u32 = 0x14;

/// Counter enable; STCLK left at 0 selects HCLK/8
const STK_STE: u32 = 1 << 0;
const STK_CNTIF: u32 = 1 << 0;

/// SysTick counts per microsecond
pub const TICKS_PER_US: u32 = HCLK_HZ / 8 / 1_000_000;

/// Shared by the main loop and every interrupt handler.
/// A wait that is preempted by another wait returns early, since the
/// preempting one leaves the compare flag set.
#[derive(Copy, Clone, Debug, Default)]
pub struct SysTickDelay;

impl SysTickDelay {
    pub const fn new() -> Self {
        Self
    }

    fn wait_ticks(&mut self, ticks: u32) {
        if ticks == 0 {
            return;
        }
        let stk = |offset: u32| (STK_BASE + offset) as *mut u32;
        unsafe {
            write_volatile(stk(STK_CTLR), 0);
            write_volatile(stk(STK_SR), 0);
            write_volatile(stk(STK_CNTL), 0);
            write_volatile(stk(STK_CNTH), 0);
            write_volatile(stk(STK_CMPLR), ticks);
            write_volatile(stk(STK_CMPHR), 0);
            write_volatile(stk(STK_CTLR), STK_STE);

            while read_volatile(stk(STK_SR)) & STK_CNTIF == 0 {}

            write_volatile(stk(STK_CTLR), 0);
        }
    }
}

impl DelayNs for SysTickDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.wait_ticks(ns.div_ceil(1_000).saturating_mul(TICKS_PER_US));
    }

    fn delay_us(&mut self, us: u32) {
        self.wait_ticks(us.saturating_mul(TICKS_PER_US));
    }
}
