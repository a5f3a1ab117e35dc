use log::info;
use rppal::i2c::I2c;

use crate::config::AccelerometerConfig;
use crate::error::{Error, Result};

// ADXL345 register addresses
const DEVID: u8 = 0x00;
const POWER_CTL: u8 = 0x2D;
const DATA_FORMAT: u8 = 0x31;
const DATAX0: u8 = 0x32;

const ADXL345_ID: u8 = 0xE5;
const MEASURE_MODE: u8 = 0x08;
const FULL_RESOLUTION: u8 = 0x08;

/// Three-axis accelerometer used as an inclinometer.
pub struct Accelerometer {
    i2c: I2c,
}

impl Accelerometer {
    pub fn new(config: &AccelerometerConfig) -> Result<Self> {
        let mut i2c = I2c::new()?;
        i2c.set_slave_address(config.i2c_address)?;

        let id = i2c.smbus_read_byte(DEVID)?;
        if id != ADXL345_ID {
            return Err(Error::Hardware(format!(
                "wrong accelerometer device ID: 0x{:02X}, expected 0x{:02X}",
                id, ADXL345_ID
            )));
        }

        // ±2 g, full resolution
        i2c.smbus_write_byte(DATA_FORMAT, FULL_RESOLUTION)?;
        i2c.smbus_write_byte(POWER_CTL, MEASURE_MODE)?;

        info!("✓ Accelerometer (ADXL345) initialized");
        Ok(Self { i2c })
    }

    /// Raw x, y, z counts.
    pub fn read_axes(&mut self) -> Result<(i16, i16, i16)> {
        let mut data = [0u8; 6];
        self.i2c.block_read(DATAX0, &mut data)?;

        // little endian
        Ok((
            i16::from_le_bytes([data[0], data[1]]),
            i16::from_le_bytes([data[2], data[3]]),
            i16::from_le_bytes([data[4], data[5]]),
        ))
    }

    /// Tilt about the pointing axis in [-1, 1]; negative when pointing up.
    pub fn read_tilt(&mut self) -> Result<f64> {
        let (x, y, z) = self.read_axes()?;
        tilt_from_axes(x.into(), y.into(), z.into())
    }
}

/// Sine of the elevation of the y axis: its share of the gravity vector.
pub fn tilt_from_axes(x: f64, y: f64, z: f64) -> Result<f64> {
    let magnitude = (x * x + y * y + z * z).sqrt();
    if magnitude == 0.0 {
        return Err(Error::Hardware("accelerometer reports no gravity".into()));
    }
    Ok((y / magnitude).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_level_is_zero_tilt() {
        assert_eq!(tilt_from_axes(0.0, 0.0, 256.0).unwrap(), 0.0);
    }

    #[test]
    fn test_tilt_is_sine_of_elevation() {
        let angle = 30f64.to_radians();
        let tilt = tilt_from_axes(0.0, -256.0 * angle.sin(), 256.0 * angle.cos()).unwrap();
        assert_relative_eq!(tilt, -0.5, epsilon = 1e-12);
        assert_eq!(tilt_from_axes(0.0, 300.0, 0.0).unwrap(), 1.0);
    }

    #[test]
    fn test_free_fall_is_an_error() {
        assert!(tilt_from_axes(0.0, 0.0, 0.0).is_err());
    }
}
