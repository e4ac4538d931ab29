// Driver seams: the engine only talks to hardware through these traits.

use std::fmt;

/// Motor channel on a dual-channel controller board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorChannel {
    M1,
    M2,
}

impl fmt::Display for MotorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorChannel::M1 => write!(f, "M1"),
            MotorChannel::M2 => write!(f, "M2"),
        }
    }
}

/// Error types for driver communication
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Port {port} is not open")]
    NotOpen { port: String },

    #[error("Controller 0x{address:02X} did not acknowledge (got {reply:?})")]
    NoAck { address: u8, reply: Option<u8> },

    #[error("Power {power} out of range for controller 0x{address:02X}")]
    InvalidPower { address: u8, power: u8 },

    #[error("Servo channel {channel} out of range")]
    InvalidChannel { channel: u8 },

    #[error("Simulated fault: {0}")]
    Simulated(String),
}

pub type Result<T> = std::result::Result<T, DriverError>;

/// Motor-controller driver (forward/backward power per channel)
pub trait MotorBus {
    /// Open, or re-open in place, the serial link
    fn open(&mut self) -> Result<()>;

    /// Drive a channel forward with power 0..=120
    fn forward(&mut self, address: u8, channel: MotorChannel, power: u8) -> Result<()>;

    /// Drive a channel backward with power 0..=120
    fn backward(&mut self, address: u8, channel: MotorChannel, power: u8) -> Result<()>;
}

/// Servo driver (angle set-points per channel)
pub trait ServoBus {
    /// Open, or re-open in place, the serial link
    fn open(&mut self) -> Result<()>;

    fn set_angle(&mut self, channel: u8, angle: i32) -> Result<()>;
}

impl<T: MotorBus + ?Sized> MotorBus for Box<T> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn forward(&mut self, address: u8, channel: MotorChannel, power: u8) -> Result<()> {
        (**self).forward(address, channel, power)
    }

    fn backward(&mut self, address: u8, channel: MotorChannel, power: u8) -> Result<()> {
        (**self).backward(address, channel, power)
    }
}

impl<T: ServoBus + ?Sized> ServoBus for Box<T> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn set_angle(&mut self, channel: u8, angle: i32) -> Result<()> {
        (**self).set_angle(channel, angle)
    }
}
