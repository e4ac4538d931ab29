// Motor control module for the rover
//
// Provides:
// - Speed -> power mapping
// - Per-actuator braking state machine
// - Driver traits plus Roboclaw / Maestro serial drivers and simulated buses

mod actuator;
mod bus;
pub mod maestro;
#[cfg(test)]
pub(crate) mod mock;
pub mod power;
pub mod roboclaw;
mod sim;

pub use actuator::ActuatorState;
pub use bus::{DriverError, MotorBus, MotorChannel, ServoBus};
pub use maestro::MaestroBus;
pub use power::{map_speed_to_power, MAX_POWER, MAX_SPEED};
pub use roboclaw::RoboclawBus;
pub use sim::{SimMotorBus, SimServoBus};
