use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ** CONTROL CONFIGURATION ** //

/// Reads averaged per compass/distance sample (lowest one is dropped).
pub const NUM_AVG_READINGS: usize = 5;
/// Reads thrown away before averaging while the sensor settles.
pub const WARMUP_READS: usize = 2;
/// Pan loop stops within +/- this many degrees.
pub const ANGLE_TOLERANCE: f64 = 1.0;
/// Tilt loop stops within +/- this much normalized tilt.
pub const TILT_TOLERANCE: f64 = 0.01;
pub const MAX_ITERATIONS: u32 = 15;
/// Pan servo travel per degree of heading error is 1 / ANGLE_GAIN_DIVISOR.
pub const ANGLE_GAIN_DIVISOR: f64 = 720.0;
pub const TILT_GAIN_DIVISOR: f64 = 5.0;
pub const ANGLE_SETTLE_MS: u64 = 250;
pub const TILT_SETTLE_MS: u64 = 200;
/// Servo travel is normalized to [0, 1]; both axes start and reset here.
pub const NEUTRAL_POSITION: f64 = 0.5;
/// Manual jog step per button repeat.
pub const JOG_STEP: f64 = 0.01;
pub const JOG_REPEAT_MS: u64 = 25;

// ** GPIO CONFIGURATION ** //

/// Pointer: capture-and-send mount observation. Mount: jog up.
pub const GPIO_BUTTON_1: u8 = 23;
/// Pointer: capture-and-send destination observation. Mount: jog down.
pub const GPIO_BUTTON_2: u8 = 24;
pub const GPIO_ULTRASONIC_TRIGGER: u8 = 17;
pub const GPIO_ULTRASONIC_ECHO: u8 = 27;

//  ** SERVO CONFIGURATION ** //

/// Hardware PWM pins: GPIO 18 (PWM0) pans, GPIO 19 (PWM1) tilts.
pub const PAN_SERVO_PWM_PIN: u8 = 18;
pub const TILT_SERVO_PWM_PIN: u8 = 19;
/// Standard servo pulse width range (microseconds)
pub const SERVO_MIN_PULSE_US: f64 = 1000.0;
pub const SERVO_MAX_PULSE_US: f64 = 2000.0;
pub const SERVO_FREQUENCY_HZ: f64 = 50.0;

// ** SENSOR CONFIGURATION ** //

/// 7-bit address of the compass module (0xE0 in 8-bit notation).
pub const COMPASS_I2C_ADDR: u16 = 0x70;
/// Heading correction for how the compass is mounted on the device.
pub const HEADING_OFFSET: f64 = 0.0;
pub const CALIBRATION_SECS: u64 = 120;
pub const ACCEL_I2C_ADDR: u16 = 0x53;
pub const ECHO_TIMEOUT_MS: u64 = 50;
pub const ECHO_RETRY_MS: u64 = 10;
pub const MAX_ECHO_ATTEMPTS: u32 = 20;

// ** RADIO CONFIGURATION ** //

pub const RADIO_PORT: &str = "/dev/ttyUSB0";
pub const RADIO_BAUD_RATE: u32 = 57_600;
pub const RADIO_READ_TIMEOUT_MS: u64 = 35;

// ** MAIN CONFIGURATION ** //

pub const POINTER_STATUS_INTERVAL_SECS: u64 = 2;
/// Mount logs its heading/tilt every this many idle loop cycles.
pub const MOUNT_STATUS_EVERY: u32 = 15;
pub const MOUNT_IDLE_MS: u64 = 150;

/// Which arcsine the triangulator uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsinMethod {
    /// 61-entry, 1° lookup table (the reference behaviour).
    #[default]
    Table,
    Native,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlParams {
    pub num_avg_readings: usize,
    pub warmup_reads: usize,
    pub angle_tolerance: f64,
    pub tilt_tolerance: f64,
    pub max_iterations: u32,
    pub angle_gain_divisor: f64,
    pub tilt_gain_divisor: f64,
    pub angle_settle_ms: u64,
    pub tilt_settle_ms: u64,
    pub neutral_position: f64,
    pub jog_step: f64,
    /// Drive the pan axis from the compass. Without it only tilt is driven.
    pub use_compass: bool,
    pub asin: AsinMethod,
}

impl Default for ControlParams {
    fn default() -> Self {
        Self {
            num_avg_readings: NUM_AVG_READINGS,
            warmup_reads: WARMUP_READS,
            angle_tolerance: ANGLE_TOLERANCE,
            tilt_tolerance: TILT_TOLERANCE,
            max_iterations: MAX_ITERATIONS,
            angle_gain_divisor: ANGLE_GAIN_DIVISOR,
            tilt_gain_divisor: TILT_GAIN_DIVISOR,
            angle_settle_ms: ANGLE_SETTLE_MS,
            tilt_settle_ms: TILT_SETTLE_MS,
            neutral_position: NEUTRAL_POSITION,
            jog_step: JOG_STEP,
            use_compass: true,
            asin: AsinMethod::Table,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub button_1: u8,
    pub button_2: u8,
    pub pan_servo_pwm: u8,
    pub tilt_servo_pwm: u8,
    pub servo_min_pulse_us: f64,
    pub servo_max_pulse_us: f64,
    pub servo_frequency_hz: f64,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            button_1: GPIO_BUTTON_1,
            button_2: GPIO_BUTTON_2,
            pan_servo_pwm: PAN_SERVO_PWM_PIN,
            tilt_servo_pwm: TILT_SERVO_PWM_PIN,
            servo_min_pulse_us: SERVO_MIN_PULSE_US,
            servo_max_pulse_us: SERVO_MAX_PULSE_US,
            servo_frequency_hz: SERVO_FREQUENCY_HZ,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompassConfig {
    pub i2c_address: u16,
    pub heading_offset: f64,
    pub calibration_secs: u64,
}

impl Default for CompassConfig {
    fn default() -> Self {
        Self {
            i2c_address: COMPASS_I2C_ADDR,
            heading_offset: HEADING_OFFSET,
            calibration_secs: CALIBRATION_SECS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccelerometerConfig {
    pub i2c_address: u16,
}

impl Default for AccelerometerConfig {
    fn default() -> Self {
        Self {
            i2c_address: ACCEL_I2C_ADDR,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UltrasonicConfig {
    pub trigger_pin: u8,
    pub echo_pin: u8,
    pub echo_timeout_ms: u64,
    pub retry_ms: u64,
    pub max_attempts: u32,
}

impl Default for UltrasonicConfig {
    fn default() -> Self {
        Self {
            trigger_pin: GPIO_ULTRASONIC_TRIGGER,
            echo_pin: GPIO_ULTRASONIC_ECHO,
            echo_timeout_ms: ECHO_TIMEOUT_MS,
            retry_ms: ECHO_RETRY_MS,
            max_attempts: MAX_ECHO_ATTEMPTS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            port: RADIO_PORT.to_string(),
            baud_rate: RADIO_BAUD_RATE,
            read_timeout_ms: RADIO_READ_TIMEOUT_MS,
        }
    }
}

/// Everything a node needs, loadable from a (possibly partial) JSON file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub control: ControlParams,
    pub pins: PinConfig,
    pub compass: CompassConfig,
    pub accelerometer: AccelerometerConfig,
    pub ultrasonic: UltrasonicConfig,
    pub radio: RadioConfig,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let control = &self.control;
        if control.num_avg_readings < 2 {
            return Err(Error::InvalidConfig(format!(
                "num_avg_readings must be at least 2, got {}",
                control.num_avg_readings
            )));
        }
        if control.angle_gain_divisor <= 0.0 || control.tilt_gain_divisor <= 0.0 {
            return Err(Error::InvalidConfig("gain divisors must be positive".into()));
        }
        if control.angle_tolerance <= 0.0 || control.tilt_tolerance <= 0.0 {
            return Err(Error::InvalidConfig("tolerances must be positive".into()));
        }
        if !(0.0..=1.0).contains(&control.neutral_position) {
            return Err(Error::InvalidConfig(format!(
                "neutral_position {} outside [0, 1]",
                control.neutral_position
            )));
        }
        if self.pins.servo_min_pulse_us >= self.pins.servo_max_pulse_us {
            return Err(Error::InvalidConfig(
                "servo_min_pulse_us must be below servo_max_pulse_us".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = Config::default();
        assert_eq!(config.control.num_avg_readings, 5);
        assert_eq!(config.control.warmup_reads, 2);
        assert_eq!(config.control.max_iterations, 15);
        assert_eq!(config.control.angle_gain_divisor, 720.0);
        assert_eq!(config.control.neutral_position, 0.5);
        assert_eq!(config.control.asin, AsinMethod::Table);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "control": { "max_iterations": 30, "asin": "native" },
                        "radio": { "port": "/dev/ttyAMA0" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.control.max_iterations, 30);
        assert_eq!(config.control.asin, AsinMethod::Native);
        assert_eq!(config.control.angle_tolerance, ANGLE_TOLERANCE);
        assert_eq!(config.radio.port, "/dev/ttyAMA0");
        assert_eq!(config.radio.baud_rate, RADIO_BAUD_RATE);
        assert_eq!(config.pins, PinConfig::default());
    }

    #[test]
    fn test_validate_rejects_short_averaging() {
        let mut config = Config::default();
        config.control.num_avg_readings = 1;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_from_file_round_trip() {
        let path = std::env::temp_dir().join(format!("ptloc-config-{}.json", std::process::id()));
        let mut config = Config::default();
        config.compass.heading_offset = -90.0;
        fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }
}
