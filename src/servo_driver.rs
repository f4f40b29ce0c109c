use crate::i2c_proxy::NullProxy;
use crate::registers::{
    step_bytes, MODE1, MODE1_AI, MODE1_ALLCALL, MODE1_RESTART, MODE1_SLEEP, MODE2, MODE2_OUTDRV,
    OSCILLATOR_SETTLE_US, PRESCALE,
};
use crate::{
    ArgumentError, ChannelBank, Config, I2cProxy, OutputClock, RegisterProxy, ServoChannel,
    ServoDriver, ServoDriverError, ServoDriverResult, PCA_MAX_STEP, PCA_PWM_RESOLUTION,
};

impl ServoDriver {
    /// Opens the I2C device named by the [Config]. No registers are written
    /// until [ServoDriver::init] is called.
    ///
    /// Error conditions:
    /// * [ServoDriverError::InvalidConfiguration] if the pulse limits are
    /// inconsistent
    /// * [ServoDriverError::ConnectionError] if the I2C device cannot be opened
    pub fn new(config: &Config) -> ServoDriverResult<ServoDriver> {
        config.validate()?;

        Ok(ServoDriver::with_proxy(config, I2cProxy::open(config)?))
    }

    /// Creates a **mock** [ServoDriver] utilizing the given [Config]. Register
    /// writes are accepted and discarded.
    pub fn mock(config: &Config) -> ServoDriverResult<ServoDriver> {
        config.validate()?;

        ServoDriver::from_proxy(config, Box::new(NullProxy))
    }

    /// Creates a [ServoDriver] over an already opened bus, e.g. an
    /// [I2cProxy] wrapping any `embedded-hal` I2C implementation. The
    /// device, address and clock in the [Config] are recorded only.
    pub fn from_proxy(
        config: &Config,
        inner: Box<dyn RegisterProxy>,
    ) -> ServoDriverResult<ServoDriver> {
        config.validate()?;

        Ok(ServoDriver::with_proxy(config, inner))
    }

    fn with_proxy(config: &Config, inner: Box<dyn RegisterProxy>) -> ServoDriver {
        log::info!(target: "oc05", "Device:           {}", config.device);
        log::info!(target: "oc05", "Address:          {:#04x}", config.address);
        log::info!(target: "oc05", "Clock:            {}Hz", config.clock_hz);
        log::info!(target: "oc05", "Channel bank:     {:?}", config.channel_bank);

        ServoDriver {
            device: config.device.clone(),
            address: config.address,
            clock_hz: config.clock_hz,
            open_drain: config.open_drain,
            channel_bank: config.channel_bank,
            servo_pulse: config.servo_pulse,
            cr_servo_pulse: config.cr_servo_pulse,
            clock: None,
            inner,
        }
    }

    /// Programs the PWM output frequency and wakes the PCA9685 with register
    /// auto-increment enabled. Must be called before positioning any servo;
    /// calling it again reprograms the frequency.
    ///
    /// Frequencies outside [24Hz, 1526Hz] are clamped to that range.
    ///
    /// Error conditions:
    /// * [ServoDriverError::InvalidArgument] if `output_frequency_hz` is 0
    /// * [ServoDriverError::TransportError] if a register write fails, in
    /// which case the driver is left uninitialized
    pub fn init(&mut self, output_frequency_hz: u16) -> ServoDriverResult<()> {
        let clock = OutputClock::new(output_frequency_hz)?;
        let mode2 = if self.open_drain { 0x00 } else { MODE2_OUTDRV };

        self.clock = None;

        // PRE_SCALE can only be written while the oscillator is off
        self.inner.write_register(MODE1, MODE1_ALLCALL | MODE1_SLEEP)?;
        self.inner.write_register(PRESCALE, clock.prescale)?;
        self.inner.write_register(MODE2, mode2)?;
        self.inner.write_register(MODE1, MODE1_ALLCALL | MODE1_AI)?;
        self.inner.delay_us(OSCILLATOR_SETTLE_US);
        self.inner
            .write_register(MODE1, MODE1_RESTART | MODE1_ALLCALL | MODE1_AI)?;

        log::info!(target: "oc05", "Output frequency: {}Hz", clock.output_frequency_hz);
        log::info!(target: "oc05", "Prescale:         {}", clock.prescale);
        log::info!(target: "oc05", "Max PW:           {:0.4}ms", clock.max_pw_ms);
        log::info!(target: "oc05", "Each step:        {:0.4}ms", clock.single_step_duration_ms);

        self.clock = Some(clock);

        Ok(())
    }

    /// Sets the points within the PWM cycle at which `pin_number` (1-8) turns
    /// on and off.
    ///
    /// Error conditions:
    /// * [ServoDriverError::NotInitializedError] if [ServoDriver::init] has
    /// not succeeded
    /// * [ServoDriverError::InvalidArgument] if `pin_number` is not within
    /// [1, 8] or either step is not within [0, 4095]
    /// * [ServoDriverError::TransportError] if a register write fails
    pub fn set_pin_pulse_range(
        &mut self,
        pin_number: u8,
        on_step: u16,
        off_step: u16,
    ) -> ServoDriverResult<()> {
        let clock = self.output_clock()?;
        let channel = ServoChannel::try_from(pin_number)?;

        for step in [on_step, off_step] {
            if step > PCA_MAX_STEP {
                return Err(ServoDriverError::InvalidArgument(
                    ArgumentError::StepRange(step),
                ));
            }
        }

        let registers = channel.registers(self.channel_bank);
        let (on_l, on_h) = step_bytes(on_step);
        let (off_l, off_h) = step_bytes(off_step);

        self.inner.write_register(registers.on_l, on_l)?;
        self.inner.write_register(registers.on_h, on_h)?;
        self.inner.write_register(registers.off_l, off_l)?;
        self.inner.write_register(registers.off_h, off_h)?;

        let high_steps = (off_step + PCA_PWM_RESOLUTION - on_step) % PCA_PWM_RESOLUTION;
        log::debug!(
            target: "oc05",
            "{}: ON at {}, OFF at {} ({:0.6}ms)",
            channel,
            on_step,
            off_step,
            clock.step_to_pw(high_steps)
        );

        Ok(())
    }

    /// Moves the servo on `channel_number` to `degrees` (0-180), returning
    /// the OFF step written.
    pub fn set_servo_position(
        &mut self,
        channel_number: u8,
        degrees: f64,
    ) -> ServoDriverResult<u16> {
        let clock = self.output_clock()?;
        ServoChannel::try_from(channel_number)?;

        let pw_ms = self.servo_pulse.degrees_to_pw(degrees)?;
        let off_step = clock.pw_to_step(pw_ms)?;

        self.set_pin_pulse_range(channel_number, 0, off_step)?;

        Ok(off_step)
    }

    /// Runs the continuous-rotation servo on `channel_number` at `speed`
    /// percent (-100 full reverse, 0 stop, 100 full forward), returning the
    /// OFF step written.
    pub fn set_cr_servo_position(
        &mut self,
        channel_number: u8,
        speed: f64,
    ) -> ServoDriverResult<u16> {
        let clock = self.output_clock()?;
        ServoChannel::try_from(channel_number)?;

        let off_step = self.cr_servo_pulse.speed_to_step(speed, &clock)?;

        self.set_pin_pulse_range(channel_number, 0, off_step)?;

        Ok(off_step)
    }

    fn output_clock(&self) -> ServoDriverResult<OutputClock> {
        self.clock.ok_or(ServoDriverError::NotInitializedError)
    }

    pub fn is_initialized(&self) -> bool {
        self.clock.is_some()
    }

    /// Returns the configured I2C device (e.g., `/dev/i2c-1`).
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the configured address (e.g., `0x78`) of the board.
    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    pub fn channel_bank(&self) -> ChannelBank {
        self.channel_bank
    }

    /// Returns the output frequency (in Hz) programmed by the last
    /// successful [ServoDriver::init].
    pub fn output_frequency_hz(&self) -> Option<u16> {
        self.clock.map(|clock| clock.output_frequency_hz)
    }

    pub fn prescale(&self) -> Option<u8> {
        self.clock.map(|clock| clock.prescale)
    }

    /// Returns the duration (in milliseconds) of a single step of the PWM
    /// cycle.
    pub fn single_step_duration_ms(&self) -> Option<f64> {
        self.clock.map(|clock| clock.single_step_duration_ms)
    }
}
