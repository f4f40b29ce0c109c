use std::fmt;

use crate::registers::LedRegisters;
use crate::{ArgumentError, ChannelBank, ServoDriverError, SERVO_CHANNEL_COUNT};

/// A servo output of the OC05, numbered 1-8 as printed on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoChannel(u8);

impl ServoChannel {
    pub fn number(&self) -> u8 {
        self.0
    }

    /// Zero-based index used for register addressing.
    pub fn index(&self) -> u8 {
        self.0 - 1
    }

    pub fn registers(&self, bank: ChannelBank) -> LedRegisters {
        LedRegisters::new(bank, *self)
    }
}

impl TryFrom<u8> for ServoChannel {
    type Error = ServoDriverError;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        if number < 1 || number > SERVO_CHANNEL_COUNT {
            return Err(ServoDriverError::InvalidArgument(
                ArgumentError::NoSuchChannel(number),
            ));
        }

        Ok(ServoChannel(number))
    }
}

impl fmt::Display for ServoChannel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Channel {}", self.0)
    }
}
