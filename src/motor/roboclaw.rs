// Roboclaw packet-serial driver
//
// Packet format: [Address, Command, Value, CRC16 hi, CRC16 lo]
// The controller answers every write with a single 0xFF acknowledge byte.

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::bus::{DriverError, MotorBus, MotorChannel, Result};

/// Default serial configuration for the Roboclaw boards
pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Acknowledge byte sent back after a successful write
const ACK: u8 = 0xFF;

/// Highest power value the compatibility commands accept
const MAX_COMMAND_POWER: u8 = 127;

/// Compatibility command set (one byte power argument)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ForwardM1 = 0,
    BackwardM1 = 1,
    ForwardM2 = 4,
    BackwardM2 = 5,
}

impl Command {
    pub fn forward(channel: MotorChannel) -> Self {
        match channel {
            MotorChannel::M1 => Command::ForwardM1,
            MotorChannel::M2 => Command::ForwardM2,
        }
    }

    pub fn backward(channel: MotorChannel) -> Self {
        match channel {
            MotorChannel::M1 => Command::BackwardM1,
            MotorChannel::M2 => Command::BackwardM2,
        }
    }
}

/// Roboclaw bus - one serial port shared by every board on it
pub struct RoboclawBus {
    port_name: String,
    baudrate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl RoboclawBus {
    /// Create an unopened bus; call `open` before driving
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

    /// CRC16-CCITT (poly 0x1021, init 0) as computed by the controller
    fn crc16(data: &[u8]) -> u16 {
        let mut crc: u16 = 0;
        for &byte in data {
            crc ^= (byte as u16) << 8;
            for _ in 0..8 {
                if crc & 0x8000 != 0 {
                    crc = (crc << 1) ^ 0x1021;
                } else {
                    crc <<= 1;
                }
            }
        }
        crc
    }

    /// Build a packet with trailing checksum
    fn build_packet(address: u8, command: Command, value: u8) -> [u8; 5] {
        let crc = Self::crc16(&[address, command as u8, value]);
        [address, command as u8, value, (crc >> 8) as u8, (crc & 0xFF) as u8]
    }

    /// Send a command and wait for the acknowledge byte
    fn write_command(&mut self, address: u8, command: Command, value: u8) -> Result<()> {
        if value > MAX_COMMAND_POWER {
            return Err(DriverError::InvalidPower {
                address,
                power: value,
            });
        }

        let port = self.port.as_mut().ok_or_else(|| DriverError::NotOpen {
            port: self.port_name.clone(),
        })?;

        let packet = Self::build_packet(address, command, value);
        debug!(
            "Roboclaw 0x{:02X}: {:?} value={} packet={:02X?}",
            address, command, value, packet
        );

        let result = Self::exchange(port.as_mut(), address, &packet);
        if let Err(DriverError::Io(ref e)) = result {
            // The port is gone (unplugged, reset); force a reopen
            warn!("Roboclaw link on {} lost: {}", self.port_name, e);
            self.port = None;
        }
        result
    }

    fn exchange(port: &mut dyn SerialPort, address: u8, packet: &[u8]) -> Result<()> {
        port.write_all(packet)?;
        port.flush()?;

        let mut reply = [0u8; 1];
        match port.read_exact(&mut reply) {
            Ok(()) if reply[0] == ACK => Ok(()),
            Ok(()) => Err(DriverError::NoAck {
                address,
                reply: Some(reply[0]),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                Err(DriverError::NoAck { address, reply: None })
            }
            Err(e) => Err(DriverError::Io(e)),
        }
    }
}

impl MotorBus for RoboclawBus {
    fn open(&mut self) -> Result<()> {
        // Release the old handle first so the OS lets us reopen the device
        self.port = None;

        info!("Opening Roboclaw bus on {} @ {}", self.port_name, self.baudrate);
        let port = serialport::new(&self.port_name, self.baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        self.port = Some(port);
        Ok(())
    }

    fn forward(&mut self, address: u8, channel: MotorChannel, power: u8) -> Result<()> {
        self.write_command(address, Command::forward(channel), power)
    }

    fn backward(&mut self, address: u8, channel: MotorChannel, power: u8) -> Result<()> {
        self.write_command(address, Command::backward(channel), power)
    }
}
