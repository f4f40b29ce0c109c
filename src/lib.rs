//! Driver for the OC05 8-channel servo board, built on the NXP PCA9685
//! 16-channel, 12-bit PWM controller and driven over I2C.
//!
//! A [ServoDriver] is created from a [Config], initialized once with
//! [ServoDriver::init] (which programs the PWM output frequency) and then
//! positions servos with [ServoDriver::set_pin_pulse_range],
//! [ServoDriver::set_servo_position] and [ServoDriver::set_cr_servo_position].
use serde::Deserialize;

mod channel;
mod i2c_proxy;
pub mod registers;
mod servo_driver;
pub mod utils;

pub use channel::ServoChannel;
pub use i2c_proxy::I2cProxy;

/// Number of steps in a single PWM period.
pub const PCA_PWM_RESOLUTION: u16 = 4096;

/// Largest ON/OFF step value accepted by the PCA9685.
pub const PCA_MAX_STEP: u16 = PCA_PWM_RESOLUTION - 1;

/// Number of servo outputs on the OC05 board.
pub const SERVO_CHANNEL_COUNT: u8 = 8;

/// Output frequency typically used for analog servos.
pub const DEFAULT_OUTPUT_FREQUENCY_HZ: u16 = 60;

/// Lowest output frequency, reached with prescale 253.
pub const MIN_OUTPUT_FREQUENCY_HZ: u16 = 24;

/// Highest output frequency, reached with prescale 3.
pub const MAX_OUTPUT_FREQUENCY_HZ: u16 = 1526;

/// Default 7-bit slave address of the OC05 board.
pub const DEFAULT_ADDRESS: u8 = 0x78;

/// Default I2C bus clock.
pub const DEFAULT_CLOCK_HZ: u32 = 100_000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Path to I2C device file (e.g, /dev/i2c-1)
    #[serde(default = "default_device")]
    pub device: String,

    /// Address of the OC05 (e.g, 0x78)
    #[serde(default = "default_address")]
    pub address: u8,

    /// I2C bus clock (Hz)
    #[serde(default = "default_clock_hz")]
    pub clock_hz: u32,

    /// PWM output frequency used when initializing the board
    #[serde(default = "default_output_frequency_hz")]
    pub output_frequency_hz: u16,

    /// Open drain (if not set, use Totem pole)
    #[serde(default)]
    pub open_drain: bool,

    /// Which half of the PCA9685 outputs channels 1-8 are wired to
    #[serde(default)]
    pub channel_bank: ChannelBank,

    #[serde(default)]
    pub servo_pulse: ServoPulseLimits,

    #[serde(default)]
    pub cr_servo_pulse: CrServoPulseLimits,
}

pub(crate) fn default_device() -> String {
    String::from("/dev/i2c-1")
}

fn default_address() -> u8 {
    DEFAULT_ADDRESS
}

fn default_clock_hz() -> u32 {
    DEFAULT_CLOCK_HZ
}

fn default_output_frequency_hz() -> u16 {
    DEFAULT_OUTPUT_FREQUENCY_HZ
}

/// Maps the board's channels 1-8 onto PCA9685 LED outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelBank {
    /// Channels 1-8 drive LED0-LED7
    #[default]
    Low,
    /// Channels 1-8 drive LED8-LED15
    High,
}

/// Pulse widths (ms) for a positional servo at 0 and 180 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ServoPulseLimits {
    pub min_on_ms: f64,
    pub max_on_ms: f64,
}

/// Pulse widths (ms) for a continuous-rotation servo at full reverse,
/// stop and full forward.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CrServoPulseLimits {
    pub min_on_ms: f64,
    pub neutral_ms: f64,
    pub max_on_ms: f64,
}

/// PWM timing derived from the output frequency programmed by
/// [ServoDriver::init].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputClock {
    pub output_frequency_hz: u16,
    pub prescale: u8,
    pub single_step_duration_ms: f64,
    pub max_pw_ms: f64,
}

/// Byte-level register access to a single PCA9685.
pub trait RegisterProxy {
    fn write_register(&mut self, register: u8, value: u8) -> ServoDriverResult<()>;
    fn delay_us(&mut self, us: u16);
}

pub struct ServoDriver {
    device: String,
    address: u8,
    clock_hz: u32,
    open_drain: bool,
    channel_bank: ChannelBank,
    servo_pulse: ServoPulseLimits,
    cr_servo_pulse: CrServoPulseLimits,
    clock: Option<OutputClock>,
    inner: Box<dyn RegisterProxy>,
}

#[derive(Clone, PartialEq)]
pub enum ArgumentError {
    NoSuchChannel(u8),
    StepRange(u16),
    PulseWidth(f64, f64),
    Degrees(f64),
    Speed(f64),
    Frequency(u16),
}

#[derive(Clone, PartialEq)]
pub enum ServoDriverError {
    ConnectionError(String),
    NotInitializedError,
    InvalidArgument(ArgumentError),
    TransportError(String),
    InvalidConfiguration(String),
}

pub type ServoDriverResult<T> = Result<T, ServoDriverError>;
