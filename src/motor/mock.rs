// Recording bus used by the unit tests.
// Motor and servo halves share one call log so ordering across both is visible.

use std::cell::RefCell;
use std::rc::Rc;

use super::bus::{DriverError, MotorBus, MotorChannel, Result, ServoBus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Forward(u8, MotorChannel, u8),
    Backward(u8, MotorChannel, u8),
    Angle(u8, i32),
    OpenMotor,
    OpenServo,
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<Call>,
    /// Drive/angle call numbers (1-based, counted across both halves) that fail
    fail_on: Vec<usize>,
    drive_count: usize,
    reopen_fails: bool,
}

/// Handle to inspect and script the mock after it has been moved into a controller
#[derive(Debug, Clone, Default)]
pub struct MockHandle(Rc<RefCell<Script>>);

impl MockHandle {
    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().calls.clone()
    }

    /// Calls excluding open/reopen
    pub fn drive_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::OpenMotor | Call::OpenServo))
            .collect()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().calls.clear();
    }

    /// Fail the n-th drive/angle call from now on (1-based)
    pub fn fail_call(&self, n: usize) {
        let mut script = self.0.borrow_mut();
        let at = script.drive_count + n;
        script.fail_on.push(at);
    }

    pub fn set_reopen_fails(&self, fails: bool) {
        self.0.borrow_mut().reopen_fails = fails;
    }

    fn record(&self, call: Call) -> Result<()> {
        let mut script = self.0.borrow_mut();
        let opening = matches!(call, Call::OpenMotor | Call::OpenServo);
        script.calls.push(call);

        if opening {
            return if script.reopen_fails {
                Err(DriverError::Simulated("reopen refused".to_string()))
            } else {
                Ok(())
            };
        }

        script.drive_count += 1;
        let n = script.drive_count;
        if script.fail_on.contains(&n) {
            return Err(DriverError::Simulated(format!("call {} failed", n)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MockMotorBus(pub MockHandle);

#[derive(Debug, Clone)]
pub struct MockServoBus(pub MockHandle);

/// Build a motor/servo pair sharing one log
pub fn mock_buses() -> (MockMotorBus, MockServoBus, MockHandle) {
    let handle = MockHandle::default();
    (
        MockMotorBus(handle.clone()),
        MockServoBus(handle.clone()),
        handle,
    )
}

impl MotorBus for MockMotorBus {
    fn open(&mut self) -> Result<()> {
        self.0.record(Call::OpenMotor)
    }

    fn forward(&mut self, address: u8, channel: MotorChannel, power: u8) -> Result<()> {
        self.0.record(Call::Forward(address, channel, power))
    }

    fn backward(&mut self, address: u8, channel: MotorChannel, power: u8) -> Result<()> {
        self.0.record(Call::Backward(address, channel, power))
    }
}

impl ServoBus for MockServoBus {
    fn open(&mut self) -> Result<()> {
        self.0.record(Call::OpenServo)
    }

    fn set_angle(&mut self, channel: u8, angle: i32) -> Result<()> {
        self.0.record(Call::Angle(channel, angle))
    }
}
