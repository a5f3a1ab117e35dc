//! The seam between the control core and the physical device.
//!
//! The controller and the nodes only ever see these traits. `pi::PiHardware` drives the
//! real sensors and servos; `sim::SimulatedRig` stands in for them in tests and in
//! `--simulate` runs.

use std::fmt;
use std::thread;
use std::time::Duration;

use crate::error::Result;

/// Servo axes of the mount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Compass angle.
    Pan,
    /// Elevation.
    Tilt,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Pan => write!(f, "pan"),
            Axis::Tilt => write!(f, "tilt"),
        }
    }
}

pub trait Hardware {
    /// One raw rangefinder reading (echo pulse width in microseconds).
    fn read_distance(&mut self) -> Result<f64>;

    /// One raw compass heading in degrees. May be outside [0, 360).
    fn read_heading(&mut self) -> Result<f64>;

    /// Current tilt in [-1, 1]; negative means pointing upwards.
    fn read_tilt(&mut self) -> Result<f64>;

    /// Command a servo to a normalized travel position in [0, 1].
    fn set_servo(&mut self, axis: Axis, position: f64) -> Result<()>;
}

impl<H: Hardware + ?Sized> Hardware for &mut H {
    fn read_distance(&mut self) -> Result<f64> {
        (**self).read_distance()
    }

    fn read_heading(&mut self) -> Result<f64> {
        (**self).read_heading()
    }

    fn read_tilt(&mut self) -> Result<f64> {
        (**self).read_tilt()
    }

    fn set_servo(&mut self, axis: Axis, position: f64) -> Result<()> {
        (**self).set_servo(axis, position)
    }
}

/// Settle delays go through a clock so tests can step time instead of sleeping.
pub trait Clock {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}
