// Speed -> power mapping
// Clients speak in percent [-100, 100], the motor controllers take a power level [-120, 120].

/// Largest speed a client may request (percent)
pub const MAX_SPEED: i32 = 100;

/// Largest power level sent to the motor controllers
pub const MAX_POWER: i32 = 120;

/// Map a signed speed percentage to a signed power level.
///
/// Speeds outside [-MAX_SPEED, MAX_SPEED] map to 0 so a malformed value stops
/// the actuator instead of driving it at an undefined level.
pub fn map_speed_to_power(speed: i32) -> i32 {
    if speed.unsigned_abs() > MAX_SPEED as u32 {
        return 0;
    }

    // f64::round rounds half away from zero, which keeps the map odd-symmetric
    let power = speed as f64 / MAX_SPEED as f64 * MAX_POWER as f64;
    power.round() as i32
}

/// Direction of a speed: zero counts as forward
pub fn direction_of(speed: i32) -> i8 {
    if speed >= 0 { 1 } else { -1 }
}
