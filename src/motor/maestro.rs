// Pololu Maestro servo driver (compact protocol)
//
// Set Target: [0x84, channel, target & 0x7F, (target >> 7) & 0x7F]
// Target is in quarter-microseconds.

use serialport::{self, SerialPort};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::bus::{DriverError, Result, ServoBus};

pub const DEFAULT_BAUDRATE: u32 = 9_600;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

const SET_TARGET: u8 = 0x84;

/// Largest channel number on the 24-channel board
pub const MAX_CHANNEL: u8 = 23;

/// Pulse widths for 0 and 180 degrees
const MIN_PULSE_US: u32 = 1000;
const MAX_PULSE_US: u32 = 2000;
const MAX_ANGLE: i32 = 180;

pub struct MaestroBus {
    port_name: String,
    baudrate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl MaestroBus {
    pub fn new(port_name: &str, baudrate: u32) -> Self {
        Self {
            port_name: port_name.to_string(),
            baudrate,
            port: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Convert an angle (clamped to 0..=180) to a target in quarter-microseconds
    fn angle_to_target(angle: i32) -> u16 {
        let angle = angle.clamp(0, MAX_ANGLE) as u32;
        let pulse_us = MIN_PULSE_US + angle * (MAX_PULSE_US - MIN_PULSE_US) / MAX_ANGLE as u32;
        (pulse_us * 4) as u16
    }

    fn build_packet(channel: u8, target: u16) -> [u8; 4] {
        [
            SET_TARGET,
            channel,
            (target & 0x7F) as u8,
            ((target >> 7) & 0x7F) as u8,
        ]
    }
}

impl ServoBus for MaestroBus {
    fn open(&mut self) -> Result<()> {
        self.port = None;

        info!("Opening servo controller on {} @ {}", self.port_name, self.baudrate);
        let port = serialport::new(&self.port_name, self.baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        self.port = Some(port);
        Ok(())
    }

    fn set_angle(&mut self, channel: u8, angle: i32) -> Result<()> {
        if channel > MAX_CHANNEL {
            return Err(DriverError::InvalidChannel { channel });
        }

        let port = self.port.as_mut().ok_or_else(|| DriverError::NotOpen {
            port: self.port_name.clone(),
        })?;

        let target = Self::angle_to_target(angle);
        let packet = Self::build_packet(channel, target);
        debug!(
            "Servo channel {}: angle={} target={} packet={:02X?}",
            channel, angle, target, packet
        );

        // Set Target has no reply
        let result = port.write_all(&packet).and_then(|_| port.flush());
        if let Err(e) = result {
            warn!("Servo link on {} lost: {}", self.port_name, e);
            self.port = None;
            return Err(DriverError::Io(e));
        }
        Ok(())
    }
}
