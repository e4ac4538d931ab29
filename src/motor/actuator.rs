// Per-actuator state and the direction-reversal braking protocol

use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use super::bus::{MotorBus, MotorChannel, ServoBus};
use super::power::{direction_of, map_speed_to_power};
use crate::connection::{ConnectionManager, LinkFault};
use crate::messages::Actuator;

/// One motor-driven actuator bound to a controller address and channel
#[derive(Debug, Clone)]
pub struct ActuatorState {
    actuator: Actuator,
    address: u8,
    channel: MotorChannel,
    current_speed: i32,
}

impl ActuatorState {
    pub fn new(actuator: Actuator, address: u8, channel: MotorChannel) -> Self {
        Self {
            actuator,
            address,
            channel,
            current_speed: 0,
        }
    }

    /// Last requested speed (percent)
    pub fn current_speed(&self) -> i32 {
        self.current_speed
    }

    pub fn actuator(&self) -> Actuator {
        self.actuator
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn channel(&self) -> MotorChannel {
        self.channel
    }

    /// Drive the actuator at `speed` percent.
    ///
    /// A change of direction first sends a zero-power pulse and waits `brake_pause`
    /// so the motor isn't reversed while spinning. Zero counts as forward, so
    /// negative -> 0 is not a reversal.
    ///
    /// The requested speed is recorded before the power command goes out; a
    /// failed command does not roll it back.
    pub fn drive<M, S>(
        &mut self,
        speed: i32,
        conn: &mut ConnectionManager<M, S>,
        brake_pause: Duration,
    ) -> Result<(), LinkFault>
    where
        M: MotorBus,
        S: ServoBus,
    {
        let (address, channel) = (self.address, self.channel);

        if direction_of(speed) != direction_of(self.current_speed) {
            info!("{} motor speed changed direction", self.actuator);
            conn.with_motor(|m| m.forward(address, channel, 0))?;
            if !brake_pause.is_zero() {
                thread::sleep(brake_pause);
            }
        }

        info!("{} motor at speed: {}%", self.actuator, speed);
        self.current_speed = speed;

        let power = map_speed_to_power(speed);
        debug!("{} motor at power: {}", self.actuator, power);

        // |power| <= MAX_POWER, fits in a byte
        let magnitude = power.unsigned_abs() as u8;
        if power >= 0 {
            conn.with_motor(|m| m.forward(address, channel, magnitude))
        } else {
            conn.with_motor(|m| m.backward(address, channel, magnitude))
        }
    }
}
