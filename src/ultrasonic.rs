use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::config::UltrasonicConfig;
use crate::error::{Error, Result};

// Use rppal in production
#[cfg(not(test))]
use rppal::gpio::{Gpio, InputPin, OutputPin};

#[cfg(test)]
// This is only used in testing, not compiled in release.
use crate::mocks::mock_gpio::{Gpio, InputPin, OutputPin};

/// Echo microseconds per inch of range (out and back).
pub const US_PER_INCH: f64 = 148.0;

const TRIGGER_PULSE_US: u64 = 10;

/// Pulse-width rangefinder (HC-SR04 style): trigger pulse out, echo width back.
pub struct Rangefinder {
    trigger: OutputPin,
    echo: InputPin,
    timeout: Duration,
    retry: Duration,
    max_attempts: u32,
}

impl Rangefinder {
    pub fn new(config: &UltrasonicConfig) -> Result<Self> {
        let gpio = Gpio::new()?;
        let trigger = gpio.get(config.trigger_pin)?.into_output_low();
        let echo = gpio.get(config.echo_pin)?.into_input();

        info!(
            "✓ Rangefinder initialized (trigger GPIO {}, echo GPIO {})",
            config.trigger_pin, config.echo_pin
        );
        Ok(Self {
            trigger,
            echo,
            timeout: Duration::from_millis(config.echo_timeout_ms),
            retry: Duration::from_millis(config.retry_ms),
            max_attempts: config.max_attempts,
        })
    }

    /// Echo pulse width in microseconds.
    ///
    /// A missing echo reads as zero and is retried after a short pause.
    pub fn read_pulse_us(&mut self) -> Result<f64> {
        for attempt in 1..=self.max_attempts {
            let width = self.ping();
            if width > 0.0 {
                return Ok(width);
            }
            debug!("no echo (attempt {}), retrying", attempt);
            thread::sleep(self.retry);
        }
        Err(Error::Hardware(format!(
            "no echo after {} attempts",
            self.max_attempts
        )))
    }

    pub fn read_inches(&mut self) -> Result<f64> {
        Ok(inches_from_pulse(self.read_pulse_us()?))
    }

    /// One measurement; 0.0 when the echo never came.
    fn ping(&mut self) -> f64 {
        self.trigger.set_high();
        thread::sleep(Duration::from_micros(TRIGGER_PULSE_US));
        self.trigger.set_low();

        let start = Instant::now();
        while self.echo.is_low() {
            if start.elapsed() > self.timeout {
                return 0.0;
            }
        }
        let rise = Instant::now();
        while self.echo.is_high() {
            if rise.elapsed() > self.timeout {
                return 0.0;
            }
        }
        rise.elapsed().as_secs_f64() * 1_000_000.0
    }
}

pub fn inches_from_pulse(pulse_us: f64) -> f64 {
    pulse_us / US_PER_INCH
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::mock_gpio;

    #[test]
    fn test_inches_from_pulse() {
        assert_eq!(inches_from_pulse(1480.0), 10.0);
        assert_eq!(inches_from_pulse(0.0), 0.0);
    }

    #[test]
    fn test_missing_echo_gives_up_after_max_attempts() {
        mock_gpio::reset_mock_pins();
        let config = UltrasonicConfig {
            echo_timeout_ms: 1,
            retry_ms: 1,
            max_attempts: 3,
            ..UltrasonicConfig::default()
        };
        let mut rangefinder = Rangefinder::new(&config).unwrap();
        mock_gpio::set_mock_pin_level(config.echo_pin, mock_gpio::Level::Low);

        let err = rangefinder.read_pulse_us().unwrap_err();
        assert_eq!(err.to_string(), "hardware: no echo after 3 attempts");
    }

    #[test]
    fn test_stuck_high_echo_times_out() {
        mock_gpio::reset_mock_pins();
        let config = UltrasonicConfig {
            echo_timeout_ms: 1,
            retry_ms: 1,
            max_attempts: 1,
            ..UltrasonicConfig::default()
        };
        let mut rangefinder = Rangefinder::new(&config).unwrap();
        mock_gpio::set_mock_pin_level(config.echo_pin, mock_gpio::Level::High);

        assert!(rangefinder.read_pulse_us().is_err());
    }
}
