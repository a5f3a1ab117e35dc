//! Closed-loop pan/tilt driver.
//!
//! Each axis is an integrator: the last commanded servo position is kept and nudged by
//! a fixed fraction of the measured error every step, with a settle delay between
//! steps. A loop ends when the error is inside the tolerance band, when it has run out
//! of iterations, or when the commanded position runs away past the servo's travel.

use std::time::Duration;

use log::{error, info, warn};

use crate::averager::averaged_heading;
use crate::config::ControlParams;
use crate::error::{Error, Result};
use crate::hardware::{Axis, Clock, Hardware};
use crate::observation::TargetBearing;
use crate::triangulate::shortest_angular_delta;

/// How a single axis drive ended. None of these stop the node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DriveOutcome {
    /// Error inside tolerance after `iterations` adjustments.
    Converged { iterations: u32 },
    /// Iteration cap hit; the axis stays where it was last commanded.
    GaveUp { iterations: u32 },
    /// Commanded position reached `position` (|position| >= 1); both axes were recentred.
    SafetyReset { position: f64 },
}

impl DriveOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, DriveOutcome::Converged { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriveReport {
    /// `None` when compass sensing is disabled.
    pub angle: Option<DriveOutcome>,
    pub tilt: DriveOutcome,
}

pub struct ActuationController<H, C> {
    hardware: H,
    clock: C,
    params: ControlParams,
    pan: f64,
    tilt: f64,
}

impl<H: Hardware, C: Clock> ActuationController<H, C> {
    /// Takes ownership of the hardware and centres both servos.
    pub fn new(hardware: H, clock: C, params: ControlParams) -> Result<Self> {
        let neutral = params.neutral_position;
        let mut controller = Self {
            hardware,
            clock,
            params,
            pan: neutral,
            tilt: neutral,
        };
        controller.command_both()?;
        Ok(controller)
    }

    pub fn position(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Pan => self.pan,
            Axis::Tilt => self.tilt,
        }
    }

    pub fn params(&self) -> &ControlParams {
        &self.params
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// One averaged heading and one direct tilt read.
    pub fn status(&mut self) -> Result<(f64, f64)> {
        let angle = averaged_heading(&mut self.hardware, &self.params)?;
        let tilt = self.hardware.read_tilt()?;
        Ok((angle, tilt))
    }

    /// Turn the pan axis until the compass reads `goal` (degrees, [0, 360]).
    pub fn drive_angle(&mut self, goal: f64) -> Result<DriveOutcome> {
        if !(0.0..=360.0).contains(&goal) {
            return Err(Error::InvalidGoal(format!("bad angle: {}", goal)));
        }
        let goal = goal % 360.0;
        let settle = Duration::from_millis(self.params.angle_settle_ms);

        let mut current = averaged_heading(&mut self.hardware, &self.params)?;
        let mut delta = shortest_angular_delta(goal, current);
        let mut iterations = 0;

        while delta.abs() > self.params.angle_tolerance {
            info!(
                "current angle: {:.1}°  diff: {:.2}  pan: {:.4}",
                current, delta, self.pan
            );
            if iterations > self.params.max_iterations {
                warn!(
                    "angle movement unsuccessful after {} iterations (current {:.1}°, goal {:.1}°)",
                    iterations, current, goal
                );
                return Ok(DriveOutcome::GaveUp { iterations });
            }
            iterations += 1;

            current = averaged_heading(&mut self.hardware, &self.params)?;
            delta = shortest_angular_delta(goal, current);
            self.pan += (delta % 180.0) / self.params.angle_gain_divisor;

            if self.pan.abs() >= 1.0 {
                error!("pan value magnitude too high in angle set: {:.4}", self.pan);
                let position = self.pan;
                self.reset()?;
                return Ok(DriveOutcome::SafetyReset { position });
            }
            self.hardware.set_servo(Axis::Pan, self.pan)?;
            self.clock.sleep(settle);
        }

        info!(
            "done with angle: current {:.1}°  diff: {:.2}  pan: {:.4}",
            current, delta, self.pan
        );
        Ok(DriveOutcome::Converged { iterations })
    }

    /// Move the tilt axis until the accelerometer reads `goal` ([-1, 1]).
    pub fn drive_tilt(&mut self, goal: f64) -> Result<DriveOutcome> {
        if !(-1.0..=1.0).contains(&goal) {
            return Err(Error::InvalidGoal(format!("bad tilt: {}", goal)));
        }
        let settle = Duration::from_millis(self.params.tilt_settle_ms);

        let mut current = self.hardware.read_tilt()?;
        let mut delta = goal - current;
        let mut iterations = 0;

        while delta.abs() > self.params.tilt_tolerance {
            info!(
                "current tilt: {:.3}  diff: {:.3}  tilt servo: {:.4}",
                current, delta, self.tilt
            );
            if iterations > self.params.max_iterations {
                warn!(
                    "tilt movement unsuccessful after {} iterations (current {:.3}, goal {:.3})",
                    iterations, current, goal
                );
                return Ok(DriveOutcome::GaveUp { iterations });
            }
            iterations += 1;

            current = self.hardware.read_tilt()?;
            delta = goal - current;
            // raising the tilt servo lowers the measured tilt
            self.tilt -= delta / self.params.tilt_gain_divisor;

            if self.tilt.abs() >= 1.0 {
                error!("tilt value magnitude too high in tilt set: {:.4}", self.tilt);
                let position = self.tilt;
                self.reset()?;
                return Ok(DriveOutcome::SafetyReset { position });
            }
            self.hardware.set_servo(Axis::Tilt, self.tilt)?;
            self.clock.sleep(settle);
        }

        info!(
            "done with tilt: current {:.3}  diff: {:.3}  tilt servo: {:.4}",
            current, delta, self.tilt
        );
        Ok(DriveOutcome::Converged { iterations })
    }

    /// Angle first (it does not depend on tilt), then tilt against a settled heading.
    pub fn drive_to(&mut self, goal_tilt: f64, goal_angle: f64) -> Result<DriveReport> {
        let angle = if self.params.use_compass {
            Some(self.drive_angle(goal_angle)?)
        } else {
            None
        };
        let tilt = self.drive_tilt(goal_tilt)?;
        Ok(DriveReport { angle, tilt })
    }

    pub fn drive_to_bearing(&mut self, bearing: &TargetBearing) -> Result<DriveReport> {
        self.drive_to(bearing.tilt, bearing.angle)
    }

    /// Recentre both servos. Not a shutdown: new goals may follow straight away.
    pub fn reset(&mut self) -> Result<()> {
        info!("resetting servo positions");
        self.pan = self.params.neutral_position;
        self.tilt = self.params.neutral_position;
        self.command_both()
    }

    /// Nudge both servos by `step`, keeping them inside their travel.
    pub fn jog(&mut self, step: f64) -> Result<()> {
        self.pan = (self.pan + step).clamp(0.0, 1.0);
        self.tilt = (self.tilt + step).clamp(0.0, 1.0);
        self.command_both()
    }

    fn command_both(&mut self) -> Result<()> {
        self.hardware.set_servo(Axis::Pan, self.pan)?;
        self.hardware.set_servo(Axis::Tilt, self.tilt)
    }
}
