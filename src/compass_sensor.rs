use std::thread;
use std::time::Duration;

use log::info;
use rppal::i2c::I2c;

use crate::config::CompassConfig;
use crate::error::Result;

// Tilt-compensated compass module (CMPS family) command set
const COMMAND_REG: u8 = 0x00;
const CMD_MEASURE: u8 = 0x31;
const CMD_CALIBRATION_START: u8 = 0xC0;
const CMD_CALIBRATION_END: u8 = 0xC1;

/// Reply to a measure command.
const REPLY_LEN: usize = 8;

/// Time the module needs between a measure command and its reply.
const MEASURE_DELAY_MS: u64 = 1;

pub struct CompassSensor {
    i2c: I2c,
    heading_offset: f64,
}

impl CompassSensor {
    pub fn new(config: &CompassConfig) -> Result<Self> {
        let mut i2c = I2c::new()?;
        i2c.set_slave_address(config.i2c_address)?;

        info!("✓ Compass initialized at 0x{:02X}", config.i2c_address);
        Ok(Self {
            i2c,
            heading_offset: config.heading_offset,
        })
    }

    /// One heading in degrees, mounting offset applied, not normalized.
    pub fn read_heading(&mut self) -> Result<f64> {
        self.i2c.write(&[COMMAND_REG, CMD_MEASURE])?;
        thread::sleep(Duration::from_millis(MEASURE_DELAY_MS));

        let mut reply = [0u8; REPLY_LEN];
        self.i2c.read(&mut reply)?;
        Ok(decode_heading(&reply, self.heading_offset))
    }

    /// Put the module into its built-in calibration mode.
    ///
    /// Rotate it slowly through all orientations, then call [`Self::end_calibration`].
    pub fn start_calibration(&mut self) -> Result<()> {
        self.i2c.write(&[COMMAND_REG, CMD_CALIBRATION_START])?;
        info!("compass calibration started");
        Ok(())
    }

    pub fn end_calibration(&mut self) -> Result<()> {
        self.i2c.write(&[COMMAND_REG, CMD_CALIBRATION_END])?;
        info!("compass calibration stored");
        Ok(())
    }
}

/// Heading from a measure reply: big-endian tenths of a degree in bytes 1..3.
pub fn decode_heading(reply: &[u8; REPLY_LEN], offset: f64) -> f64 {
    let tenths = u16::from_be_bytes([reply[1], reply[2]]);
    f64::from(tenths) / 10.0 + offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_heading() {
        // 0x0E0F = 3599 -> 359.9°
        let reply = [0x31, 0x0E, 0x0F, 0, 0, 0, 0, 0];
        assert!((decode_heading(&reply, 0.0) - 359.9).abs() < 1e-9);

        let reply = [0x31, 0x03, 0x84, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(decode_heading(&reply, 0.0), 90.0);
    }

    #[test]
    fn test_offset_is_not_normalized() {
        let reply = [0, 0x00, 0x64, 0, 0, 0, 0, 0];
        assert_eq!(decode_heading(&reply, -90.0), -80.0);
    }
}
