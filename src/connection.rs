// Connection manager: owns the driver handles and the reconnect policy
//
// Every hardware call goes through `with_motor` / `with_servo`. On a failed call the
// link is marked disconnected and reopened once; the caller learns whether the
// reopen worked and decides whether to replay.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::motor::{DriverError, MotorBus, ServoBus};

/// Hardware link status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

/// Which driver a fault came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Motor,
    Servo,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Link::Motor => write!(f, "motor controller"),
            Link::Servo => write!(f, "servo controller"),
        }
    }
}

/// A driver call failed; `reconnected` tells whether the single reopen succeeded
#[derive(Debug, thiserror::Error)]
#[error("{link} fault: {source}")]
pub struct LinkFault {
    pub link: Link,
    pub reconnected: bool,
    #[source]
    pub source: DriverError,
}

pub struct ConnectionManager<M, S> {
    motor: M,
    servo: S,
    status: LinkStatus,
}

impl<M: MotorBus, S: ServoBus> ConnectionManager<M, S> {
    /// Open both links. Startup never fails here: a closed link is recovered on first use.
    pub fn open(mut motor: M, mut servo: S) -> Self {
        let status = match motor.open() {
            Ok(()) => {
                info!("Motor controller connected");
                LinkStatus::Connected
            }
            Err(e) => {
                warn!("Motor controller failed to open: {}", e);
                LinkStatus::Disconnected
            }
        };

        match servo.open() {
            Ok(()) => info!("Servo controller connected"),
            Err(e) => warn!("Servo controller failed to open: {}", e),
        }

        Self {
            motor,
            servo,
            status,
        }
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Run a motor-controller call under the reconnect policy
    pub fn with_motor<F>(&mut self, op: F) -> Result<(), LinkFault>
    where
        F: FnOnce(&mut M) -> Result<(), DriverError>,
    {
        match op(&mut self.motor) {
            Ok(()) => Ok(()),
            Err(source) => {
                self.status = LinkStatus::Disconnected;
                warn!("Motor controller disconnected ({})...retrying connection", source);
                let reconnected = Self::reopen(Link::Motor, self.motor.open());
                if reconnected {
                    self.status = LinkStatus::Connected;
                }
                Err(LinkFault {
                    link: Link::Motor,
                    reconnected,
                    source,
                })
            }
        }
    }

    /// Run a servo call under the reconnect policy
    pub fn with_servo<F>(&mut self, op: F) -> Result<(), LinkFault>
    where
        F: FnOnce(&mut S) -> Result<(), DriverError>,
    {
        match op(&mut self.servo) {
            Ok(()) => Ok(()),
            Err(source) => {
                self.status = LinkStatus::Disconnected;
                warn!("Servo controller disconnected ({})...retrying connection", source);
                let reconnected = Self::reopen(Link::Servo, self.servo.open());
                if reconnected {
                    self.status = LinkStatus::Connected;
                }
                Err(LinkFault {
                    link: Link::Servo,
                    reconnected,
                    source,
                })
            }
        }
    }

    fn reopen(link: Link, result: Result<(), DriverError>) -> bool {
        match result {
            Ok(()) => {
                info!("{} reconnected", link);
                true
            }
            Err(e) => {
                warn!("{} reconnect failed: {}", link, e);
                false
            }
        }
    }

    /// Direct access for the shutdown path, which must not trigger reconnects
    pub(crate) fn motor_mut(&mut self) -> &mut M {
        &mut self.motor
    }
}
