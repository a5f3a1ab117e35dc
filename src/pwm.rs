use log::{info, warn};

use crate::config::PinConfig;
use crate::error::{Error, Result};

// Use rppal in production
#[cfg(not(test))]
use rppal::pwm::{Channel, Polarity, Pwm};

// Mock PWM for testing
#[cfg(test)]
use crate::mocks::mock_pwm::Pwm;

/// Hobby servo on a hardware PWM channel, positioned by normalized travel.
///
/// Hardware PWM is available on:
/// - GPIO 12 / 18 (PWM0)
/// - GPIO 13 / 19 (PWM1)
///
/// Position 0.0 maps to the minimum pulse width and 1.0 to the maximum.
pub struct ServoDriver {
    pwm: Pwm,
    pin: u8,
    min_pulse_us: f64,
    max_pulse_us: f64,
    frequency_hz: f64,
}

impl ServoDriver {
    /// Open the servo on `pin`, starting at the middle of its travel.
    pub fn new(pin: u8, pins: &PinConfig) -> Result<Self> {
        let centre = position_to_duty(
            0.5,
            pins.servo_min_pulse_us,
            pins.servo_max_pulse_us,
            pins.servo_frequency_hz,
        );

        #[cfg(not(test))]
        let channel = match pin {
            12 | 18 => Channel::Pwm0,
            13 | 19 => Channel::Pwm1,
            _ => {
                return Err(Error::Hardware(format!(
                    "invalid PWM pin {}. Use 12, 13, 18, or 19",
                    pin
                )));
            }
        };

        #[cfg(not(test))]
        let pwm = Pwm::with_frequency(
            channel,
            pins.servo_frequency_hz,
            centre,
            Polarity::Normal,
            true,
        )?;

        #[cfg(test)]
        let pwm = {
            if ![12, 13, 18, 19].contains(&pin) {
                return Err(Error::Hardware(format!("invalid PWM pin {}", pin)));
            }
            let pwm = Pwm::new(pin)?;
            pwm.set_duty_cycle(centre)?;
            pwm
        };

        info!("✓ Servo on GPIO {} initialized", pin);
        Ok(Self {
            pwm,
            pin,
            min_pulse_us: pins.servo_min_pulse_us,
            max_pulse_us: pins.servo_max_pulse_us,
            frequency_hz: pins.servo_frequency_hz,
        })
    }

    /// Move to `position` in [0, 1]. Values outside the travel are clamped.
    pub fn set_position(&mut self, position: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&position) {
            warn!(
                "servo on GPIO {}: position {:.4} clamped to travel",
                self.pin, position
            );
        }
        let duty = position_to_duty(
            position,
            self.min_pulse_us,
            self.max_pulse_us,
            self.frequency_hz,
        );
        self.pwm.set_duty_cycle(duty)?;
        Ok(())
    }

    pub fn disable(&mut self) -> Result<()> {
        self.pwm.disable()?;
        Ok(())
    }
}

impl Drop for ServoDriver {
    fn drop(&mut self) {
        // Ensure PWM is disabled when dropped
        let _ = self.disable();
    }
}

/// Duty cycle for a travel position, given the pulse range and PWM frequency.
pub fn position_to_duty(
    position: f64,
    min_pulse_us: f64,
    max_pulse_us: f64,
    frequency_hz: f64,
) -> f64 {
    let position = position.clamp(0.0, 1.0);
    let pulse_us = min_pulse_us + position * (max_pulse_us - min_pulse_us);
    // Period = 1/50Hz = 20ms = 20000μs
    let period_us = 1_000_000.0 / frequency_hz;
    pulse_us / period_us
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::mock_pwm;
    use approx::assert_relative_eq;

    #[test]
    fn test_position_to_duty() {
        assert_relative_eq!(position_to_duty(0.0, 1000.0, 2000.0, 50.0), 0.05);
        assert_relative_eq!(position_to_duty(0.5, 1000.0, 2000.0, 50.0), 0.075);
        assert_relative_eq!(position_to_duty(1.0, 1000.0, 2000.0, 50.0), 0.1);
    }

    #[test]
    fn test_servo_starts_centred() {
        let _servo = ServoDriver::new(18, &PinConfig::default()).unwrap();
        assert_relative_eq!(mock_pwm::get_mock_duty_cycle(18).unwrap(), 0.075);
    }

    #[test]
    fn test_position_clamping() {
        let mut servo = ServoDriver::new(19, &PinConfig::default()).unwrap();

        servo.set_position(1.3).unwrap();
        assert_relative_eq!(mock_pwm::get_mock_duty_cycle(19).unwrap(), 0.1);
        servo.set_position(-0.2).unwrap();
        assert_relative_eq!(mock_pwm::get_mock_duty_cycle(19).unwrap(), 0.05);
    }

    #[test]
    fn test_invalid_pin_rejected() {
        assert!(ServoDriver::new(4, &PinConfig::default()).is_err());
    }

    #[test]
    fn test_drop_disables_channel() {
        {
            let _servo = ServoDriver::new(12, &PinConfig::default()).unwrap();
            assert!(mock_pwm::get_mock_duty_cycle(12).is_some());
        }
        assert!(mock_pwm::get_mock_duty_cycle(12).is_none());
    }
}
