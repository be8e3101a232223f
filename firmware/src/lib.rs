#![no_std]

//! CH32V203 board support for the lapwatch stopwatch

pub mod ch32v203_hardware;
pub mod delay;
pub mod glyphs;

pub use ch32v203_hardware::*;
pub use delay::SysTickDelay;
pub use glyphs::SEGMENT_PATTERNS;
