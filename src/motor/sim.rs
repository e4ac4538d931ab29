// Simulated buses for running without hardware attached

use tracing::debug;

use super::bus::{MotorBus, MotorChannel, Result, ServoBus};

#[derive(Debug, Default)]
pub struct SimMotorBus;

impl MotorBus for SimMotorBus {
    fn open(&mut self) -> Result<()> {
        debug!("[sim] motor bus open");
        Ok(())
    }

    fn forward(&mut self, address: u8, channel: MotorChannel, power: u8) -> Result<()> {
        debug!("[sim] 0x{:02X} {} forward {}", address, channel, power);
        Ok(())
    }

    fn backward(&mut self, address: u8, channel: MotorChannel, power: u8) -> Result<()> {
        debug!("[sim] 0x{:02X} {} backward {}", address, channel, power);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SimServoBus;

impl ServoBus for SimServoBus {
    fn open(&mut self) -> Result<()> {
        debug!("[sim] servo bus open");
        Ok(())
    }

    fn set_angle(&mut self, channel: u8, angle: i32) -> Result<()> {
        debug!("[sim] servo channel {} angle {}", channel, angle);
        Ok(())
    }
}
