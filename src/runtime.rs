// Line-driven runtime: stdin command lines in, motor commands out
// Optional watchdog: if the operator goes quiet, stop every actuator once.

use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::controller::{Controller, Layout};
use crate::device::check_servo_device;
use crate::messages::RuntimeStatus;
use crate::motor::{MaestroBus, MotorBus, RoboclawBus, ServoBus, SimMotorBus, SimServoBus};

pub type DynController = Controller<Box<dyn MotorBus>, Box<dyn ServoBus>>;

pub struct Runtime<M: MotorBus, S: ServoBus> {
    controller: Controller<M, S>,
    watchdog: Option<Duration>,
    stopped: bool,
}

impl<M: MotorBus, S: ServoBus> Runtime<M, S> {
    pub fn new(controller: Controller<M, S>, watchdog: Option<Duration>) -> Self {
        Self {
            controller,
            watchdog,
            stopped: false,
        }
    }

    /// Dispatch one command line to completion
    pub fn on_line(&mut self, line: &str) -> RuntimeStatus {
        let line = line.trim_end();
        if !line.is_empty() {
            self.stopped = false;
            self.controller.dispatch(line);
        }
        self.controller.status()
    }

    /// Watchdog expired with no input
    pub fn on_timeout(&mut self) {
        if self.stopped {
            return;
        }
        if let Some(limit) = self.watchdog {
            warn!("No command for {}ms, stopping all actuators", limit.as_millis());
        }
        self.controller.stop_all();
        self.stopped = true;
    }

    pub fn status(&self) -> RuntimeStatus {
        self.controller.status()
    }
}

/// Build the controller over either the serial hardware or the simulated buses
pub fn build_controller(config: &Config) -> DynController {
    let (motor, servo): (Box<dyn MotorBus>, Box<dyn ServoBus>) = if config.simulate {
        info!("Simulation mode: no serial hardware will be touched");
        (Box::new(SimMotorBus), Box::new(SimServoBus))
    } else {
        // Reported once; whoever supervises this process owns any retry
        if let Err(e) = check_servo_device(Path::new(&config.servo_port)) {
            warn!("Servo connection failed to initialize: {}", e);
        }
        (
            Box::new(RoboclawBus::new(&config.motor_port, config.baudrate)),
            Box::new(MaestroBus::new(&config.servo_port, config.servo_baudrate)),
        )
    };

    let conn = ConnectionManager::open(motor, servo);
    Controller::new(conn, Layout::from(config), config.brake_pause())
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let controller = build_controller(&config);
    let mut runtime = Runtime::new(controller, config.watchdog());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!(
        "Runtime started: motor bus {} (drive 0x{:02X}, bucket 0x{:02X}), servo {} channel {}",
        config.motor_port,
        config.drive_address,
        config.bucket_address,
        config.servo_port,
        config.servo_channel
    );
    match config.watchdog() {
        Some(limit) => info!("Watchdog: {}ms", limit.as_millis()),
        None => info!("Watchdog: off"),
    }

    loop {
        // next_line is cancel safe, so timing it out never loses input
        let next = match runtime.watchdog {
            Some(limit) => match timeout(limit, lines.next_line()).await {
                Ok(next) => next?,
                Err(_) => {
                    runtime.on_timeout();
                    continue;
                }
            },
            None => lines.next_line().await?,
        };

        let Some(line) = next else {
            info!("Input closed, shutting down");
            break;
        };

        // Dispatch blocks this task; the next line is not read until it finishes
        let status = runtime.on_line(&line);
        if config.report_status {
            println!("{}", serde_json::to_string(&status)?);
        }
    }

    Ok(())
}
