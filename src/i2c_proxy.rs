use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c::Write;
use linux_embedded_hal::{Delay, I2cdev};
use std::fmt::Debug;

use crate::{Config, RegisterProxy, ServoDriverError, ServoDriverResult};

/// [RegisterProxy] over any `embedded-hal` blocking I2C bus.
pub struct I2cProxy<I2C, D> {
    address: u8,
    i2c: I2C,
    delay: D,
}

impl<I2C, D, E> RegisterProxy for I2cProxy<I2C, D>
where
    I2C: Write<Error = E>,
    E: Debug,
    D: DelayUs<u16>,
{
    fn write_register(&mut self, register: u8, value: u8) -> ServoDriverResult<()> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|error| ServoDriverError::TransportError(format!("{:?}", error)))
    }

    fn delay_us(&mut self, us: u16) {
        self.delay.delay_us(us);
    }
}

impl<I2C, D> I2cProxy<I2C, D> {
    pub fn new(i2c: I2C, delay: D, address: u8) -> I2cProxy<I2C, D> {
        I2cProxy {
            address,
            i2c,
            delay,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Gives back the bus and delay provider.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}

impl I2cProxy<I2cdev, Delay> {
    pub(crate) fn open(config: &Config) -> ServoDriverResult<Box<dyn RegisterProxy>> {
        log::info!(target: "oc05", "Opening I2C device: {}", config.device);

        let dev = I2cdev::new(&config.device).map_err(|error| {
            ServoDriverError::ConnectionError(format!("{}: {:?}", config.device, error))
        })?;

        Ok(Box::new(I2cProxy::new(dev, Delay, config.address)))
    }
}

/// Accepts every write without touching hardware.
pub(crate) struct NullProxy;

impl RegisterProxy for NullProxy {
    fn write_register(&mut self, _register: u8, _value: u8) -> ServoDriverResult<()> {
        Ok(())
    }

    fn delay_us(&mut self, _us: u16) {}
}
