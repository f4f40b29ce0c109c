use std::{fmt, fs};

use crate::registers::{PRESCALE_MAX, PRESCALE_MIN};
use crate::{
    default_device, ArgumentError, Config, CrServoPulseLimits, OutputClock, ServoDriverError,
    ServoDriverResult, ServoPulseLimits, DEFAULT_ADDRESS, DEFAULT_CLOCK_HZ, DEFAULT_OUTPUT_FREQUENCY_HZ,
    MAX_OUTPUT_FREQUENCY_HZ, MIN_OUTPUT_FREQUENCY_HZ, PCA_MAX_STEP, PCA_PWM_RESOLUTION,
};

const INTERNAL_OSC_HZ: f64 = 25.0 * 1000.0 * 1000.0; // 25 MHz

const MAX_DEGREES: f64 = 180.0;
const MAX_SPEED: f64 = 100.0;

impl Config {
    pub fn load_from_file(path: &str) -> ServoDriverResult<Config> {
        let config = fs::read_to_string(path).map_err(|error| {
            ServoDriverError::InvalidConfiguration(format!("Unable to read {}: {}", path, error))
        })?;

        Config::from_yaml(&config)
    }

    pub fn from_yaml(yaml: &str) -> ServoDriverResult<Config> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|error| ServoDriverError::InvalidConfiguration(error.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> ServoDriverResult<()> {
        let servo = &self.servo_pulse;
        if !valid_pw(servo.min_on_ms) || !valid_pw(servo.max_on_ms) {
            return Err(ServoDriverError::InvalidConfiguration(format!(
                "servo_pulse limits must be non-negative: {:?}",
                servo
            )));
        }
        if servo.min_on_ms >= servo.max_on_ms {
            return Err(ServoDriverError::InvalidConfiguration(format!(
                "servo_pulse.min_on_ms must be less than max_on_ms: {:?}",
                servo
            )));
        }

        let cr = &self.cr_servo_pulse;
        if !valid_pw(cr.min_on_ms) || !valid_pw(cr.neutral_ms) || !valid_pw(cr.max_on_ms) {
            return Err(ServoDriverError::InvalidConfiguration(format!(
                "cr_servo_pulse limits must be non-negative: {:?}",
                cr
            )));
        }
        if cr.min_on_ms >= cr.neutral_ms || cr.neutral_ms >= cr.max_on_ms {
            return Err(ServoDriverError::InvalidConfiguration(format!(
                "cr_servo_pulse must satisfy min_on_ms < neutral_ms < max_on_ms: {:?}",
                cr
            )));
        }

        Ok(())
    }
}

fn valid_pw(pw_ms: f64) -> bool {
    pw_ms.is_finite() && pw_ms >= 0.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: default_device(),
            address: DEFAULT_ADDRESS,
            clock_hz: DEFAULT_CLOCK_HZ,
            output_frequency_hz: DEFAULT_OUTPUT_FREQUENCY_HZ,
            open_drain: false,
            channel_bank: Default::default(),
            servo_pulse: Default::default(),
            cr_servo_pulse: Default::default(),
        }
    }
}

impl Default for ServoPulseLimits {
    fn default() -> Self {
        Self {
            min_on_ms: 1.0,
            max_on_ms: 2.0,
        }
    }
}

impl Default for CrServoPulseLimits {
    fn default() -> Self {
        Self {
            min_on_ms: 1.0,
            neutral_ms: 1.5,
            max_on_ms: 2.0,
        }
    }
}

impl OutputClock {
    /// Derives the PWM timing for `output_frequency_hz`, clamped to the
    /// range the prescaler can produce.
    pub fn new(output_frequency_hz: u16) -> ServoDriverResult<OutputClock> {
        if output_frequency_hz == 0 {
            return Err(ServoDriverError::InvalidArgument(ArgumentError::Frequency(
                output_frequency_hz,
            )));
        }

        let clamped_hz = output_frequency_hz.clamp(MIN_OUTPUT_FREQUENCY_HZ, MAX_OUTPUT_FREQUENCY_HZ);
        if clamped_hz != output_frequency_hz {
            log::warn!(
                target: "oc05",
                "Output frequency {}Hz out of range, using {}Hz",
                output_frequency_hz,
                clamped_hz
            );
        }

        let cycle_duration_ms = 1000.0 / clamped_hz as f64;

        Ok(OutputClock {
            output_frequency_hz: clamped_hz,
            prescale: calculate_prescale(clamped_hz),
            single_step_duration_ms: cycle_duration_ms / PCA_PWM_RESOLUTION as f64,
            max_pw_ms: cycle_duration_ms,
        })
    }

    pub fn pw_to_step(&self, pw_ms: f64) -> ServoDriverResult<u16> {
        let step = (pw_ms / self.single_step_duration_ms).trunc();

        if !step.is_finite() || pw_ms < 0.0 || step > PCA_MAX_STEP as f64 {
            return Err(ServoDriverError::InvalidArgument(
                ArgumentError::PulseWidth(pw_ms, self.max_pw_ms),
            ));
        }

        Ok(step as u16)
    }

    pub fn step_to_pw(&self, step: u16) -> f64 {
        step as f64 * self.single_step_duration_ms
    }
}

pub fn calculate_prescale(output_frequency_hz: u16) -> u8 {
    // Per PCA 9685 Datasheet, 7.3.5 PWM frequency PRE_SCALE:
    //    prescale_value = round(internal_osc/(4096 * output_frequency_hz)) - 1
    let value = INTERNAL_OSC_HZ / (PCA_PWM_RESOLUTION as f64 * output_frequency_hz as f64);
    let value = value.round() - 1.0;

    value.clamp(PRESCALE_MIN as f64, PRESCALE_MAX as f64) as u8
}

impl ServoPulseLimits {
    pub fn degrees_to_pw(&self, degrees: f64) -> ServoDriverResult<f64> {
        if !degrees.is_finite() || degrees < 0.0 || degrees > MAX_DEGREES {
            return Err(ServoDriverError::InvalidArgument(ArgumentError::Degrees(
                degrees,
            )));
        }

        Ok(self.min_on_ms + degrees / MAX_DEGREES * (self.max_on_ms - self.min_on_ms))
    }
}

impl CrServoPulseLimits {
    pub fn speed_to_step(&self, speed: f64, clock: &OutputClock) -> ServoDriverResult<u16> {
        if !speed.is_finite() || speed < -MAX_SPEED || speed > MAX_SPEED {
            return Err(ServoDriverError::InvalidArgument(ArgumentError::Speed(speed)));
        }

        let neutral = clock.pw_to_step(self.neutral_ms)?;
        if speed == 0.0 {
            return Ok(neutral);
        }

        if speed < 0.0 {
            let spread = clock.pw_to_step(self.neutral_ms - self.min_on_ms)?;
            let offset = (-speed * spread as f64 / MAX_SPEED) as u16;

            Ok(neutral.saturating_sub(offset))
        } else {
            let spread = clock.pw_to_step(self.max_on_ms - self.neutral_ms)?;
            let offset = (speed * spread as f64 / MAX_SPEED) as u16;

            let step = neutral + offset;
            if step > PCA_MAX_STEP {
                return Err(ServoDriverError::InvalidArgument(
                    ArgumentError::PulseWidth(clock.step_to_pw(step), clock.max_pw_ms),
                ));
            }

            Ok(step)
        }
    }
}

impl fmt::Debug for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &*self {
            ArgumentError::NoSuchChannel(channel) => write!(
                f,
                "Invalid channel: {}.  Valid channels are [1,8].",
                channel
            ),
            ArgumentError::StepRange(value) => write!(
                f,
                "Step value ({}) must be within the limits [0, {}].",
                value, PCA_MAX_STEP
            ),
            ArgumentError::PulseWidth(value, max_pw_ms) => write!(
                f,
                "Pulse width value ({}ms) must be within the limits [0, {:0.4}ms).  Check output_frequency.",
                value, max_pw_ms
            ),
            ArgumentError::Degrees(value) => write!(
                f,
                "Degrees value ({}) must be within the limits [0, {}].",
                value, MAX_DEGREES
            ),
            ArgumentError::Speed(value) => write!(
                f,
                "Speed value ({}) must be within the limits [-{}, {}].",
                value, MAX_SPEED, MAX_SPEED
            ),
            ArgumentError::Frequency(value) => write!(
                f,
                "Output frequency ({}Hz) must be greater than 0.",
                value
            ),
        }
    }
}

impl fmt::Debug for ServoDriverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &*self {
            ServoDriverError::ConnectionError(msg) => {
                write!(f, "Unable to open I2C device: {}", msg)
            }
            ServoDriverError::NotInitializedError => write!(
                f,
                "Driver not initialized.  Call init() before positioning servos."
            ),
            ServoDriverError::InvalidArgument(error) => write!(f, "Invalid argument: {:?}", error),
            ServoDriverError::TransportError(msg) => write!(
                f,
                "An error occurred with the underlying I2C transport: {}",
                msg
            ),
            ServoDriverError::InvalidConfiguration(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
        }
    }
}

impl fmt::Display for ServoDriverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for ServoDriverError {}

pub mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

#[cfg(test)]
mod tests {
    use super::calculate_prescale;
    use crate::{
        ArgumentError, ChannelBank, Config, CrServoPulseLimits, OutputClock, ServoDriverError,
        ServoDriverResult, ServoPulseLimits,
    };

    #[test]
    fn prescale() {
        // per PCA9685 documented example using 200Hz
        assert_eq!(calculate_prescale(200), 30);

        assert_eq!(calculate_prescale(60), 101);
        assert_eq!(calculate_prescale(50), 121);
        assert_eq!(calculate_prescale(24), 253);
        assert_eq!(calculate_prescale(1526), 3);
    }

    #[test]
    fn output_clock() -> ServoDriverResult<()> {
        let clock = OutputClock::new(200)?;

        let expected_max_pw_ms = 1000.0 / 200.0;

        assert_eq!(clock.output_frequency_hz, 200);
        assert_eq!(clock.prescale, 30);
        assert_eq!(clock.max_pw_ms, expected_max_pw_ms);
        assert_eq!(clock.single_step_duration_ms, expected_max_pw_ms / 4096.0);

        Ok(())
    }

    #[test]
    fn output_clock_clamped() -> ServoDriverResult<()> {
        let clock = OutputClock::new(10)?;
        assert_eq!(clock.output_frequency_hz, 24);
        assert_eq!(clock.prescale, 253);

        let clock = OutputClock::new(5000)?;
        assert_eq!(clock.output_frequency_hz, 1526);
        assert_eq!(clock.prescale, 3);

        Ok(())
    }

    #[test]
    fn output_clock_zero() {
        assert_eq!(
            OutputClock::new(0),
            Err(ServoDriverError::InvalidArgument(ArgumentError::Frequency(0)))
        );
    }

    #[test]
    fn pw_to_step() -> ServoDriverResult<()> {
        let clock = OutputClock::new(60)?;

        assert_eq!(clock.pw_to_step(0.0)?, 0);

        // Test a specific value, using formula
        for test_pw_ms in [1.0, 1.5, 2.0] {
            // Hz to to millis, so to speak
            let expected_step = 1000.0 / 60.0;

            // Duration of each step, in millis
            let expected_step = expected_step / 4096.0;

            // Number of steps required for given test_pw_ms
            let expected_step = (test_pw_ms / expected_step) as u16;

            assert_eq!(clock.pw_to_step(test_pw_ms)?, expected_step);
        }

        assert_eq!(clock.pw_to_step(1.0)?, 245);
        assert_eq!(clock.pw_to_step(2.0)?, 491);

        Ok(())
    }

    #[test]
    #[should_panic(expected = "must be within the limits")]
    fn pw_to_step_negative() {
        let clock = OutputClock::new(60).unwrap();

        clock.pw_to_step(-1.0).unwrap();
    }

    #[test]
    #[should_panic(expected = "Check output_frequency")]
    fn pw_to_step_too_large() {
        // 1ms period at 1000Hz
        let clock = OutputClock::new(1000).unwrap();

        clock.pw_to_step(2.0).unwrap();
    }

    #[test]
    fn degrees_to_pw() -> ServoDriverResult<()> {
        let limits = ServoPulseLimits::default();

        assert_eq!(limits.degrees_to_pw(0.0)?, 1.0);
        assert_eq!(limits.degrees_to_pw(90.0)?, 1.5);
        assert_eq!(limits.degrees_to_pw(180.0)?, 2.0);

        Ok(())
    }

    #[test]
    fn degrees_out_of_range() {
        let limits = ServoPulseLimits::default();

        for degrees in [-0.5, 180.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                limits.degrees_to_pw(degrees),
                Err(ServoDriverError::InvalidArgument(ArgumentError::Degrees(_)))
            ));
        }
    }

    #[test]
    fn speed_to_step() -> ServoDriverResult<()> {
        let limits = CrServoPulseLimits::default();

        for output_frequency_hz in [50, 60] {
            let clock = OutputClock::new(output_frequency_hz)?;

            let neutral = limits.speed_to_step(0.0, &clock)?;
            let reverse = limits.speed_to_step(-100.0, &clock)?;
            let forward = limits.speed_to_step(100.0, &clock)?;

            assert_eq!(neutral, clock.pw_to_step(1.5)?);
            assert!(reverse < neutral && neutral < forward);
            assert_eq!(neutral - reverse, forward - neutral);

            let half_reverse = limits.speed_to_step(-50.0, &clock)?;
            let half_forward = limits.speed_to_step(50.0, &clock)?;
            assert!(reverse < half_reverse && half_reverse < neutral);
            assert!(neutral < half_forward && half_forward < forward);
        }

        Ok(())
    }

    #[test]
    #[should_panic(expected = "Speed value (101)")]
    fn speed_too_large() {
        let clock = OutputClock::new(60).unwrap();

        CrServoPulseLimits::default()
            .speed_to_step(101.0, &clock)
            .unwrap();
    }

    #[test]
    fn speed_beyond_period() {
        // 2ms period at 500Hz: neutral sits at step 3072 and full forward at 4096
        let clock = OutputClock::new(500).unwrap();
        let limits = CrServoPulseLimits::default();

        assert_eq!(limits.speed_to_step(-100.0, &clock), Ok(2048));
        assert!(matches!(
            limits.speed_to_step(100.0, &clock),
            Err(ServoDriverError::InvalidArgument(ArgumentError::PulseWidth(
                _,
                _
            )))
        ));
    }

    #[test]
    fn load_config() -> ServoDriverResult<()> {
        let config = Config::from_yaml(
            "device: /dev/i2c-3\n\
             address: 0x40\n\
             open_drain: true\n\
             channel_bank: high\n\
             servo_pulse:\n  min_on_ms: 0.5\n  max_on_ms: 2.5\n",
        )?;

        assert_eq!(config.device, "/dev/i2c-3");
        assert_eq!(config.address, 0x40);
        assert_eq!(config.clock_hz, 100_000);
        assert_eq!(config.output_frequency_hz, 60);
        assert!(config.open_drain);
        assert_eq!(config.channel_bank, ChannelBank::High);
        assert_eq!(
            config.servo_pulse,
            ServoPulseLimits {
                min_on_ms: 0.5,
                max_on_ms: 2.5
            }
        );
        assert_eq!(config.cr_servo_pulse, CrServoPulseLimits::default());

        Ok(())
    }

    #[test]
    fn load_sample_config() -> ServoDriverResult<()> {
        let config = Config::from_yaml(include_str!("../oc05.yaml"))?;

        assert_eq!(config.address, 0x78);
        assert_eq!(config.channel_bank, ChannelBank::High);

        Ok(())
    }

    #[test]
    fn load_config_defaults() -> ServoDriverResult<()> {
        assert_eq!(Config::from_yaml("{}")?, Config::default());

        Ok(())
    }

    #[test]
    #[should_panic(expected = "min_on_ms < neutral_ms < max_on_ms")]
    fn load_config_bad_neutral() {
        Config::from_yaml("cr_servo_pulse:\n  min_on_ms: 1.0\n  neutral_ms: 2.5\n  max_on_ms: 2.0\n")
            .unwrap();
    }

    #[test]
    #[should_panic(expected = "servo_pulse limits must be non-negative")]
    fn load_config_negative_pulse() {
        Config::from_yaml("servo_pulse:\n  min_on_ms: -1.0\n  max_on_ms: 2.0\n").unwrap();
    }

    #[test]
    #[should_panic(expected = "cr_servo_pulse limits must be non-negative")]
    fn load_config_nan_pulse() {
        Config::from_yaml(
            "cr_servo_pulse:\n  min_on_ms: 1.0\n  neutral_ms: .nan\n  max_on_ms: 2.0\n",
        )
        .unwrap();
    }

    #[test]
    #[should_panic(expected = "servo_pulse.min_on_ms must be less than max_on_ms")]
    fn load_config_servo_min_ge_max() {
        Config::from_yaml("servo_pulse:\n  min_on_ms: 2.0\n  max_on_ms: 2.0\n").unwrap();
    }

    #[test]
    #[should_panic(expected = "Unable to read")]
    fn load_config_missing_file() {
        Config::load_from_file("/nonexistent/oc05.yaml").unwrap();
    }
}
