use crate::config::ControlParams;
use crate::error::{Error, Result};
use crate::hardware::Hardware;
use crate::observation::normalize_angle;

/// Outlier-trimmed mean of repeated sensor reads.
///
/// The first `warmup` reads are thrown away while the sensor settles. The next `count`
/// reads are summed, the single lowest one is dropped, and the rest are averaged.
/// Fails with [`Error::InsufficientSamples`] before touching the sensor if `count < 2`.
pub fn trimmed_average<F>(mut read: F, count: usize, warmup: usize) -> Result<f64>
where
    F: FnMut() -> Result<f64>,
{
    if count < 2 {
        return Err(Error::InsufficientSamples(count));
    }

    for _ in 0..warmup {
        read()?;
    }

    let mut sum = 0.0;
    let mut min = f64::MAX;
    for _ in 0..count {
        let value = read()?;
        sum += value;
        min = min.min(value);
    }

    Ok((sum - min) / (count - 1) as f64)
}

/// Trimmed mean of normalized compass headings.
pub fn averaged_heading<H: Hardware>(hardware: &mut H, params: &ControlParams) -> Result<f64> {
    let heading = trimmed_average(
        || hardware.read_heading().map(normalize_angle),
        params.num_avg_readings,
        params.warmup_reads,
    )?;
    Ok(normalize_angle(heading))
}

/// Trimmed mean of rangefinder readings.
pub fn averaged_distance<H: Hardware>(hardware: &mut H, params: &ControlParams) -> Result<f64> {
    trimmed_average(
        || hardware.read_distance(),
        params.num_avg_readings,
        params.warmup_reads,
    )
}
