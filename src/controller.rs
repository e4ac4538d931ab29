// Command dispatcher: decodes a line and routes each sub-command to its actuator
//
// All actuator and connection state lives in `Controller`; the runtime owns one.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::connection::{ConnectionManager, LinkFault, LinkStatus};
use crate::messages::{
    tokenize, Actuator, DispatchOutcome, DispatchReport, RuntimeStatus, SubCommand, Target,
};
use crate::motor::{ActuatorState, MotorBus, MotorChannel, ServoBus};

/// Full-line replays allowed after a reconnect
const MAX_REPLAYS: usize = 1;

/// Hardware layout: which board and channel each actuator is wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub drive_address: u8,
    pub bucket_address: u8,
    pub servo_channel: u8,
}

impl From<&Config> for Layout {
    fn from(config: &Config) -> Self {
        Self {
            drive_address: config.drive_address,
            bucket_address: config.bucket_address,
            servo_channel: config.servo_channel,
        }
    }
}

pub struct Controller<M: MotorBus, S: ServoBus> {
    conn: ConnectionManager<M, S>,
    actuators: [ActuatorState; 4],
    servo_channel: u8,
    brake_pause: Duration,
    last: Option<DispatchReport>,
}

impl<M: MotorBus, S: ServoBus> Controller<M, S> {
    pub fn new(conn: ConnectionManager<M, S>, layout: Layout, brake_pause: Duration) -> Self {
        // Drive board: left on M1, right on M2. Bucket board: actuator on M1, rotor on M2.
        let actuators = Actuator::ALL.map(|actuator| {
            let (address, channel) = match actuator {
                Actuator::LeftDrive => (layout.drive_address, MotorChannel::M1),
                Actuator::RightDrive => (layout.drive_address, MotorChannel::M2),
                Actuator::Linear => (layout.bucket_address, MotorChannel::M1),
                Actuator::Bucket => (layout.bucket_address, MotorChannel::M2),
            };
            ActuatorState::new(actuator, address, channel)
        });

        Self {
            conn,
            actuators,
            servo_channel: layout.servo_channel,
            brake_pause,
            last: None,
        }
    }

    /// Decode `line` and execute its sub-commands in order.
    ///
    /// If a driver call fails and the link comes back on the single reopen, the
    /// whole line runs again from its first sub-command (once). If the reopen
    /// fails, the rest of the line is dropped.
    pub fn dispatch(&mut self, line: &str) -> DispatchReport {
        let mut commands = Vec::new();
        let mut skipped = 0;
        for token in tokenize(line) {
            match token.parse() {
                Ok(cmd) => commands.push(cmd),
                Err(e) => {
                    warn!("Skipping sub-command: {}", e);
                    skipped += 1;
                }
            }
        }
        debug!("Decoded {} sub-commands from {:?}", commands.len(), line);

        let mut replays = 0;
        let report = loop {
            let (applied, result) = self.run_pass(&commands);
            match result {
                Ok(()) => {
                    let outcome = if replays == 0 {
                        DispatchOutcome::Completed
                    } else {
                        DispatchOutcome::Replayed
                    };
                    break DispatchReport { outcome, applied, skipped };
                }
                Err(fault) if fault.reconnected && replays < MAX_REPLAYS => {
                    info!("{} reconnected...retrying command", fault.link);
                    replays += 1;
                }
                Err(fault) => {
                    warn!(
                        "Dropping rest of command line after {} sub-commands: {}",
                        applied, fault
                    );
                    break DispatchReport {
                        outcome: DispatchOutcome::Dropped,
                        applied,
                        skipped,
                    };
                }
            }
        };

        self.last = Some(report);
        report
    }

    /// One pass over the line; stops at the first fault
    fn run_pass(&mut self, commands: &[SubCommand]) -> (usize, Result<(), LinkFault>) {
        for (applied, cmd) in commands.iter().enumerate() {
            if let Err(fault) = self.apply(*cmd) {
                return (applied, Err(fault));
            }
        }
        (commands.len(), Ok(()))
    }

    fn apply(&mut self, cmd: SubCommand) -> Result<(), LinkFault> {
        match cmd.target {
            Target::Motor(actuator) => {
                self.actuators[actuator.index()].drive(cmd.value, &mut self.conn, self.brake_pause)
            }
            Target::Servo => self.set_servo_angle(cmd.value),
        }
    }

    /// Forward an angle set-point to the servo; range is left to the driver
    pub fn set_servo_angle(&mut self, angle: i32) -> Result<(), LinkFault> {
        let channel = self.servo_channel;
        debug!("Servo channel {} to angle {}", channel, angle);
        self.conn.with_servo(|s| s.set_angle(channel, angle))
    }

    /// Bring every actuator to zero through the normal drive path
    pub fn stop_all(&mut self) {
        info!("Stopping all actuators");
        for actuator in Actuator::ALL {
            if let Err(e) =
                self.actuators[actuator.index()].drive(0, &mut self.conn, self.brake_pause)
            {
                warn!("Failed to stop {} motor: {}", actuator, e);
            }
        }
    }

    pub fn speed(&self, actuator: Actuator) -> i32 {
        self.actuators[actuator.index()].current_speed()
    }

    pub fn link_status(&self) -> LinkStatus {
        self.conn.status()
    }

    pub fn status(&self) -> RuntimeStatus {
        RuntimeStatus {
            link: self.conn.status(),
            left: self.speed(Actuator::LeftDrive),
            right: self.speed(Actuator::RightDrive),
            actuator: self.speed(Actuator::Linear),
            bucket: self.speed(Actuator::Bucket),
            last: self.last,
        }
    }
}

impl<M: MotorBus, S: ServoBus> Drop for Controller<M, S> {
    fn drop(&mut self) {
        // Best effort: cut power on every channel, bypassing the reconnect policy
        for state in &self.actuators {
            if let Err(e) = self
                .conn
                .motor_mut()
                .forward(state.address(), state.channel(), 0)
            {
                warn!(
                    "Failed to stop {} motor (0x{:02X} {}) on drop: {}",
                    state.actuator(),
                    state.address(),
                    state.channel(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::mock::{mock_buses, Call, MockHandle, MockMotorBus, MockServoBus};
    use MotorChannel::{M1, M2};

    const DRIVE: u8 = 0x80;
    const BUCKET: u8 = 0x81;

    fn setup() -> (Controller<MockMotorBus, MockServoBus>, MockHandle) {
        let (motor, servo, handle) = mock_buses();
        let conn = ConnectionManager::open(motor, servo);
        let layout = Layout {
            drive_address: DRIVE,
            bucket_address: BUCKET,
            servo_channel: 0,
        };
        handle.clear();
        (Controller::new(conn, layout, Duration::ZERO), handle)
    }

    #[test]
    fn test_dispatch_routes_in_order() {
        let (mut ctl, handle) = setup();
        let report = ctl.dispatch("l50|r-30|s90|");

        assert_eq!(report.outcome, DispatchOutcome::Completed);
        assert_eq!(report.applied, 3);
        assert_eq!(
            handle.calls(),
            vec![
                Call::Forward(DRIVE, M1, 60),
                // right starts at 0 (forward), so -30 is a reversal
                Call::Forward(DRIVE, M2, 0),
                Call::Backward(DRIVE, M2, 36),
                Call::Angle(0, 90),
            ]
        );
        assert_eq!(ctl.speed(Actuator::LeftDrive), 50);
        assert_eq!(ctl.speed(Actuator::RightDrive), -30);
    }

    #[test]
    fn test_unknown_prefix_is_skipped() {
        let (mut ctl, handle) = setup();
        let report = ctl.dispatch("l50|x10|s90|");

        assert_eq!(report.applied, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(
            handle.calls(),
            vec![Call::Forward(DRIVE, M1, 60), Call::Angle(0, 90)]
        );
    }

    #[test]
    fn test_bucket_board_channels() {
        let (mut ctl, handle) = setup();
        ctl.dispatch("a100|b25|");
        assert_eq!(
            handle.calls(),
            vec![Call::Forward(BUCKET, M1, 120), Call::Forward(BUCKET, M2, 30)]
        );
        assert_eq!(ctl.speed(Actuator::Linear), 100);
        assert_eq!(ctl.speed(Actuator::Bucket), 25);
    }

    #[test]
    fn test_reversal_pulses_once_per_actuator() {
        let (mut ctl, handle) = setup();
        ctl.dispatch("l40|");
        handle.clear();

        ctl.dispatch("l-20|");
        assert_eq!(
            handle.calls(),
            vec![Call::Forward(DRIVE, M1, 0), Call::Backward(DRIVE, M1, 24)]
        );
    }

    #[test]
    fn test_empty_and_noise_lines_do_nothing() {
        let (mut ctl, handle) = setup();
        let report = ctl.dispatch("no commands here");
        assert_eq!(report.outcome, DispatchOutcome::Completed);
        assert_eq!(report.applied, 0);
        assert!(handle.calls().is_empty());
    }

    #[test]
    fn test_fault_with_reconnect_replays_whole_line() {
        let (mut ctl, handle) = setup();
        // second driver call: the right motor's stop pulse
        handle.fail_call(2);

        let report = ctl.dispatch("l50|r-30|");
        assert_eq!(report.outcome, DispatchOutcome::Replayed);
        assert_eq!(report.applied, 2);
        assert_eq!(ctl.link_status(), LinkStatus::Connected);
        assert_eq!(
            handle.calls(),
            vec![
                Call::Forward(DRIVE, M1, 60),
                Call::Forward(DRIVE, M2, 0), // fails
                Call::OpenMotor,
                // replay from the first sub-command
                Call::Forward(DRIVE, M1, 60),
                Call::Forward(DRIVE, M2, 0),
                Call::Backward(DRIVE, M2, 36),
            ]
        );
    }

    #[test]
    fn test_fault_after_speed_recorded_skips_pulse_on_replay() {
        let (mut ctl, handle) = setup();
        // third call: right motor power command, after its speed was recorded
        handle.fail_call(3);

        ctl.dispatch("l50|r-30|");
        assert_eq!(
            handle.drive_calls(),
            vec![
                Call::Forward(DRIVE, M1, 60),
                Call::Forward(DRIVE, M2, 0),
                Call::Backward(DRIVE, M2, 36), // fails
                Call::Forward(DRIVE, M1, 60),
                Call::Backward(DRIVE, M2, 36),
            ]
        );
        assert_eq!(ctl.speed(Actuator::RightDrive), -30);
    }

    #[test]
    fn test_fault_with_failed_reopen_drops_rest_of_line() {
        let (mut ctl, handle) = setup();
        handle.fail_call(2);
        handle.set_reopen_fails(true);

        let report = ctl.dispatch("l50|s90|b10|");
        assert_eq!(report.outcome, DispatchOutcome::Dropped);
        assert_eq!(report.applied, 1);
        assert_eq!(ctl.link_status(), LinkStatus::Disconnected);
        assert_eq!(
            handle.calls(),
            vec![Call::Forward(DRIVE, M1, 60), Call::Angle(0, 90), Call::OpenServo]
        );
        assert_eq!(ctl.speed(Actuator::Bucket), 0);
    }

    #[test]
    fn test_replay_is_bounded_to_one() {
        let (mut ctl, handle) = setup();
        // fails on the first pass and again on the replay
        handle.fail_call(1);
        handle.fail_call(2);

        let report = ctl.dispatch("l50|r50|");
        assert_eq!(report.outcome, DispatchOutcome::Dropped);
        assert_eq!(
            handle.calls(),
            vec![
                Call::Forward(DRIVE, M1, 60),
                Call::OpenMotor,
                Call::Forward(DRIVE, M1, 60),
                Call::OpenMotor,
            ]
        );
        // the second reopen succeeded, so the link is up for the next line
        assert_eq!(ctl.link_status(), LinkStatus::Connected);
    }

    #[test]
    fn test_next_line_runs_after_drop() {
        let (mut ctl, handle) = setup();
        handle.fail_call(1);
        handle.set_reopen_fails(true);
        ctl.dispatch("l50|");
        assert_eq!(ctl.link_status(), LinkStatus::Disconnected);

        handle.set_reopen_fails(false);
        handle.clear();
        let report = ctl.dispatch("r10|");
        assert_eq!(report.outcome, DispatchOutcome::Completed);
        assert_eq!(handle.calls(), vec![Call::Forward(DRIVE, M2, 12)]);
    }

    #[test]
    fn test_stop_all_and_status() {
        let (mut ctl, handle) = setup();
        ctl.dispatch("l-40|r40|a10|b-5|");
        handle.clear();

        ctl.stop_all();
        assert_eq!(
            handle.calls(),
            vec![
                Call::Forward(DRIVE, M1, 0),
                Call::Forward(DRIVE, M2, 0),
                Call::Forward(BUCKET, M1, 0),
                Call::Forward(BUCKET, M2, 0),
            ]
        );

        let status = ctl.status();
        assert_eq!((status.left, status.right, status.actuator, status.bucket), (0, 0, 0, 0));
        assert_eq!(status.link, LinkStatus::Connected);
    }

    #[test]
    fn test_drop_keeps_going_after_a_failed_stop() {
        let (ctl, handle) = setup();
        handle.fail_call(1);
        drop(ctl);
        // the drive board's M1 fails, the other three still get a stop
        assert_eq!(
            handle.calls(),
            vec![
                Call::Forward(DRIVE, M1, 0),
                Call::Forward(DRIVE, M2, 0),
                Call::Forward(BUCKET, M1, 0),
                Call::Forward(BUCKET, M2, 0),
            ]
        );
    }

    #[test]
    fn test_drop_cuts_power_on_every_channel() {
        let (ctl, handle) = setup();
        drop(ctl);
        assert_eq!(
            handle.calls(),
            vec![
                Call::Forward(DRIVE, M1, 0),
                Call::Forward(DRIVE, M2, 0),
                Call::Forward(BUCKET, M1, 0),
                Call::Forward(BUCKET, M2, 0),
            ]
        );
    }
}
