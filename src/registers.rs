//! PCA9685 register map (the subset needed for frequency and duty-cycle
//! control). See the PCA9685 datasheet, section 7.3.

use crate::{ChannelBank, ServoChannel};

pub const MODE1: u8 = 0x00;
pub const MODE2: u8 = 0x01;
pub const LED0_ON_L: u8 = 0x06;
pub const LED8_ON_L: u8 = 0x26;
pub const PRESCALE: u8 = 0xFE;

/// Distance between the register blocks of consecutive LED outputs.
pub const LED_REGISTER_STRIDE: u8 = 4;

pub const MODE1_RESTART: u8 = 0x80;
pub const MODE1_AI: u8 = 0x20;
pub const MODE1_SLEEP: u8 = 0x10;
pub const MODE1_ALLCALL: u8 = 0x01;

pub const MODE2_OUTDRV: u8 = 0x04;

pub const PRESCALE_MIN: u8 = 3;
pub const PRESCALE_MAX: u8 = 255;

/// Oscillator settle time after leaving sleep mode.
pub const OSCILLATOR_SETTLE_US: u16 = 500;

/// ON_L, ON_H, OFF_L and OFF_H register addresses of one LED output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedRegisters {
    pub on_l: u8,
    pub on_h: u8,
    pub off_l: u8,
    pub off_h: u8,
}

impl LedRegisters {
    pub fn new(bank: ChannelBank, channel: ServoChannel) -> LedRegisters {
        let base = match bank {
            ChannelBank::Low => LED0_ON_L,
            ChannelBank::High => LED8_ON_L,
        } + LED_REGISTER_STRIDE * channel.index();

        LedRegisters {
            on_l: base,
            on_h: base + 1,
            off_l: base + 2,
            off_h: base + 3,
        }
    }
}

/// Splits a 12-bit step into its (low, high) register bytes.
pub fn step_bytes(step: u16) -> (u8, u8) {
    ((step & 0xFF) as u8, ((step >> 8) & 0x0F) as u8)
}
