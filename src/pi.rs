use crate::accelerometer::Accelerometer;
use crate::compass_sensor::CompassSensor;
use crate::config::Config;
use crate::error::Result;
use crate::hardware::{Axis, Hardware};
use crate::pwm::ServoDriver;
use crate::ultrasonic::Rangefinder;

/// The sensors and servos of one Raspberry Pi station.
///
/// The pointer has no servos and the mount has no rangefinder, so both are optional;
/// using a missing device is a hardware error.
pub struct PiHardware {
    compass: CompassSensor,
    accelerometer: Accelerometer,
    rangefinder: Option<Rangefinder>,
    pan: Option<ServoDriver>,
    tilt: Option<ServoDriver>,
}

impl PiHardware {
    /// Compass, accelerometer and rangefinder.
    pub fn pointer(config: &Config) -> Result<Self> {
        Ok(Self {
            compass: CompassSensor::new(&config.compass)?,
            accelerometer: Accelerometer::new(&config.accelerometer)?,
            rangefinder: Some(Rangefinder::new(&config.ultrasonic)?),
            pan: None,
            tilt: None,
        })
    }

    /// Compass, accelerometer and both servos.
    pub fn mount(config: &Config) -> Result<Self> {
        Ok(Self {
            compass: CompassSensor::new(&config.compass)?,
            accelerometer: Accelerometer::new(&config.accelerometer)?,
            rangefinder: None,
            pan: Some(ServoDriver::new(config.pins.pan_servo_pwm, &config.pins)?),
            tilt: Some(ServoDriver::new(config.pins.tilt_servo_pwm, &config.pins)?),
        })
    }
}

fn missing(device: &str) -> crate::error::Error {
    crate::error::Error::Hardware(format!("no {} on this station", device))
}

impl Hardware for PiHardware {
    fn read_distance(&mut self) -> Result<f64> {
        self.rangefinder
            .as_mut()
            .ok_or_else(|| missing("rangefinder"))?
            .read_pulse_us()
    }

    fn read_heading(&mut self) -> Result<f64> {
        self.compass.read_heading()
    }

    fn read_tilt(&mut self) -> Result<f64> {
        self.accelerometer.read_tilt()
    }

    fn set_servo(&mut self, axis: Axis, position: f64) -> Result<()> {
        let servo = match axis {
            Axis::Pan => self.pan.as_mut(),
            Axis::Tilt => self.tilt.as_mut(),
        };
        servo
            .ok_or_else(|| missing(&format!("{} servo", axis)))?
            .set_position(position)
    }
}
