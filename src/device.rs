// Servo device path check
//
// The servo board exposes two virtual serial ports; the udev symlink occasionally
// lands on the wrong one. We only check and report, once, at startup.

use std::path::{Path, PathBuf};

use tracing::info;

/// ttyACM numbers the servo's command port may appear as
const ACCEPTED_ACM: [u32; 2] = [0, 1];

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Cannot resolve servo device {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Servo device {path} resolves to {target}, which is not a ttyACM port")]
    NotAcm { path: PathBuf, target: PathBuf },

    #[error("Servo device {path} resolves to ttyACM{number}; expected ttyACM0 or ttyACM1")]
    WrongPort { path: PathBuf, number: u32 },
}

/// Resolve `path` and accept it only if it points at /dev/ttyACM0 or /dev/ttyACM1
pub fn check_servo_device(path: &Path) -> Result<PathBuf, DeviceError> {
    let target = std::fs::canonicalize(path).map_err(|source| DeviceError::Resolve {
        path: path.to_path_buf(),
        source,
    })?;
    let number = acm_number(&target).ok_or_else(|| DeviceError::NotAcm {
        path: path.to_path_buf(),
        target: target.clone(),
    })?;

    if !ACCEPTED_ACM.contains(&number) {
        return Err(DeviceError::WrongPort {
            path: path.to_path_buf(),
            number,
        });
    }

    info!("Servo device {} -> {}", path.display(), target.display());
    Ok(target)
}

/// `/dev/ttyACM3` -> 3
fn acm_number(target: &Path) -> Option<u32> {
    target
        .file_name()?
        .to_str()?
        .strip_prefix("ttyACM")?
        .parse()
        .ok()
}
