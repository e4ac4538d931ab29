// Hardware layout defaults, runtime options and their loading
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::motor::maestro::MAX_CHANNEL as MAX_SERVO_CHANNEL;

// Motor controller serial port (udev symlink)
pub const MOTOR_PORT: &str = "/dev/roboclaw";
pub const MOTOR_BAUDRATE: u32 = 115_200;

// Bus addresses of the two dual-channel boards
pub const DRIVE_ADDRESS: u8 = 0x80; // M1 left, M2 right
pub const BUCKET_ADDRESS: u8 = 0x81; // M1 linear actuator, M2 bucket rotor

// Servo controller serial device (udev symlink) and channel
pub const SERVO_PORT: &str = "/dev/servo";
pub const SERVO_BAUDRATE: u32 = 9_600;
pub const SERVO_CHANNEL: u8 = 0;

// Pause after the zero-power pulse on a direction change
pub const BRAKE_PAUSE: Duration = Duration::from_millis(20);

/// Valid packet-serial address range for the motor boards
const ADDRESS_RANGE: std::ops::RangeInclusive<u8> = 0x80..=0x87;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Runtime configuration (JSON file, then CLI overrides)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub motor_port: String,
    pub baudrate: u32,
    pub drive_address: u8,
    pub bucket_address: u8,
    pub servo_port: String,
    pub servo_baudrate: u32,
    pub servo_channel: u8,
    pub brake_pause_ms: u64,
    /// Use simulated buses instead of the serial hardware
    pub simulate: bool,
    /// Stop all actuators when no line arrives for this long (0 = off)
    pub watchdog_ms: u64,
    /// Print a JSON status line to stdout after every command line
    pub report_status: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            motor_port: MOTOR_PORT.to_string(),
            baudrate: MOTOR_BAUDRATE,
            drive_address: DRIVE_ADDRESS,
            bucket_address: BUCKET_ADDRESS,
            servo_port: SERVO_PORT.to_string(),
            servo_baudrate: SERVO_BAUDRATE,
            servo_channel: SERVO_CHANNEL,
            brake_pause_ms: BRAKE_PAUSE.as_millis() as u64,
            simulate: false,
            watchdog_ms: 0,
            report_status: false,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Load from `args.config` (if any), apply CLI overrides, validate
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        args.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baudrate == 0 || self.servo_baudrate == 0 {
            return Err(ConfigError::Invalid("baud rate must be non-zero".into()));
        }
        for address in [self.drive_address, self.bucket_address] {
            if !ADDRESS_RANGE.contains(&address) {
                return Err(ConfigError::Invalid(format!(
                    "controller address 0x{:02X} outside 0x80..=0x87",
                    address
                )));
            }
        }
        if self.drive_address == self.bucket_address {
            return Err(ConfigError::Invalid(format!(
                "drive and bucket controllers share address 0x{:02X}",
                self.drive_address
            )));
        }
        if self.servo_channel > MAX_SERVO_CHANNEL {
            return Err(ConfigError::Invalid(format!(
                "servo channel {} above {}",
                self.servo_channel, MAX_SERVO_CHANNEL
            )));
        }
        Ok(())
    }

    pub fn brake_pause(&self) -> Duration {
        Duration::from_millis(self.brake_pause_ms)
    }

    pub fn watchdog(&self) -> Option<Duration> {
        (self.watchdog_ms > 0).then(|| Duration::from_millis(self.watchdog_ms))
    }
}

/// Command-line options; each one overrides the config file
#[derive(Debug, Default, Parser)]
#[command(version, about = "Reads motor command lines (e.g. `l50|r-30|s90|`) from stdin")]
pub struct Args {
    /// JSON config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Motor controller serial port
    #[arg(long)]
    pub port: Option<String>,

    /// Motor controller baud rate
    #[arg(long)]
    pub baudrate: Option<u32>,

    /// Drive controller address
    #[arg(long, value_parser = parse_address)]
    pub drive_address: Option<u8>,

    /// Bucket controller address
    #[arg(long, value_parser = parse_address)]
    pub bucket_address: Option<u8>,

    /// Servo controller serial device
    #[arg(long)]
    pub servo_port: Option<String>,

    /// Servo channel index
    #[arg(long)]
    pub servo_channel: Option<u8>,

    /// Pause after a direction-change stop pulse (ms)
    #[arg(long)]
    pub brake_pause_ms: Option<u64>,

    /// Run against simulated buses
    #[arg(long)]
    pub simulate: bool,

    /// Stop all actuators after this long without input (ms, 0 = off)
    #[arg(long)]
    pub watchdog_ms: Option<u64>,

    /// Print a JSON status line after each command line
    #[arg(long)]
    pub report_status: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(port) = &self.port {
            config.motor_port = port.clone();
        }
        if let Some(baudrate) = self.baudrate {
            config.baudrate = baudrate;
        }
        if let Some(address) = self.drive_address {
            config.drive_address = address;
        }
        if let Some(address) = self.bucket_address {
            config.bucket_address = address;
        }
        if let Some(port) = &self.servo_port {
            config.servo_port = port.clone();
        }
        if let Some(channel) = self.servo_channel {
            config.servo_channel = channel;
        }
        if let Some(ms) = self.brake_pause_ms {
            config.brake_pause_ms = ms;
        }
        if let Some(ms) = self.watchdog_ms {
            config.watchdog_ms = ms;
        }
        // flags can only switch on
        config.simulate |= self.simulate;
        config.report_status |= self.report_status;
    }
}

/// Accept `0x80` or `128`
fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}
