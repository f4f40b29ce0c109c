use clap::{Parser, Subcommand};
use env_logger;
use oc05::{utils, Config, ServoDriver, ServoDriverError, ServoDriverResult};
use std::process;

/// Simple program to position servos on an OC05
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "/etc/oc05.yaml")]
    config_file_path: String,

    /// PWM output frequency (Hz), overrides the configuration file
    #[arg(long)]
    output_frequency_hz: Option<u16>,

    /// Use a mock driver that performs no I2C transactions
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set the raw ON/OFF steps of a channel
    Pulse {
        #[arg(value_parser = clap::value_parser!(u8).range(1..=8))]
        channel: u8,

        #[arg(value_parser = clap::value_parser!(u16).range(..4096))]
        on_step: u16,

        #[arg(value_parser = clap::value_parser!(u16).range(..4096))]
        off_step: u16,
    },

    /// Move a positional servo to an angle (0-180 degrees)
    Angle {
        #[arg(value_parser = clap::value_parser!(u8).range(1..=8))]
        channel: u8,

        degrees: f64,
    },

    /// Run a continuous-rotation servo at a speed (-100 to 100 percent)
    Speed {
        #[arg(value_parser = clap::value_parser!(u8).range(1..=8))]
        channel: u8,

        #[arg(allow_negative_numbers = true)]
        speed: f64,
    },
}

fn run(args: &Args) -> ServoDriverResult<()> {
    let config = Config::load_from_file(&args.config_file_path)?;

    let mut driver = if args.mock {
        log::warn!(target: "oc05", "Using mock OC05 driver.");
        ServoDriver::mock(&config)?
    } else {
        ServoDriver::new(&config)?
    };

    driver.init(args.output_frequency_hz.unwrap_or(config.output_frequency_hz))?;

    match args.command {
        Command::Pulse {
            channel,
            on_step,
            off_step,
        } => driver.set_pin_pulse_range(channel, on_step, off_step),
        Command::Angle { channel, degrees } => driver
            .set_servo_position(channel, degrees)
            .map(|off_step| log::info!(target: "oc05", "OFF step: {}", off_step)),
        Command::Speed { channel, speed } => driver
            .set_cr_servo_position(channel, speed)
            .map(|off_step| log::info!(target: "oc05", "OFF step: {}", off_step)),
    }
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    log::info!(target: "oc05", "oc05-servo-tester {}", utils::built_info::PKG_VERSION);

    if let Err(error) = run(&args) {
        log::error!(target: "oc05", "{}", error);

        process::exit(match error {
            ServoDriverError::InvalidConfiguration(_) => exitcode::CONFIG,
            ServoDriverError::ConnectionError(_) => exitcode::UNAVAILABLE,
            ServoDriverError::TransportError(_) => exitcode::IOERR,
            ServoDriverError::InvalidArgument(_) | ServoDriverError::NotInitializedError => {
                exitcode::USAGE
            }
        });
    }
}
