//! Side-angle-side triangle solving for the mount's target bearing.
//!
//! Both stations sight the same target. Their distances and the angle between the two
//! sightings fix a triangle; the law of cosines gives the third side and the law of
//! sines the unknown apex angle, which is then combined with the mount's own heading.

use log::debug;

use crate::config::AsinMethod;
use crate::error::{Error, Result};
use crate::observation::{Observation, TargetBearing, normalize_angle};

/// asin(n°) in radians for n = 0..=60, i.e. asin of the argument read as degrees.
/// Entries past 57 saturate at pi/2. Accuracy is about +/- 0.03 rad.
const ASIN_TABLE: [f64; 61] = [
    0.0,
    0.017454178737585,
    0.034913677698806,
    0.052383831720078,
    0.069870004975064,
    0.087377605924218,
    0.104912102606151,
    0.122479038392806,
    0.140084048337536,
    0.157732876254456,
    0.175431392679044,
    0.193185613874249,
    0.211001722063741,
    0.228886087094804,
    0.246845289758441,
    0.264886147024236,
    0.283015739483281,
    0.301241441335296,
    0.319570953307260,
    0.338012338952325,
    0.356574064851671,
    0.375265045331157,
    0.394094692412728,
    0.413072971852013,
    0.432210466274373,
    0.451518446619238,
    0.471008953346718,
    0.490694889163938,
    0.510590125408132,
    0.530709624701538,
    0.551069583099446,
    0.571687595727842,
    0.592582850906022,
    0.613776359048718,
    0.635291224347811,
    0.657152969496191,
    0.679389926750951,
    0.702033712752794,
    0.725119810184966,
    0.748688287260934,
    0.772784697234405,
    0.797461216279661,
    0.822778101828869,
    0.848805589081666,
    0.875626398156128,
    0.903339110766513,
    0.932062815889531,
    0.961943660626584,
    0.993164357510233,
    1.025958462218693,
    1.060632718251592,
    1.097603850460327,
    1.137463179066911,
    1.181100087687805,
    1.229967073304535,
    1.286756209178897,
    1.357717087474778,
    1.469142265488490,
    std::f64::consts::FRAC_PI_2,
    std::f64::consts::FRAC_PI_2,
    std::f64::consts::FRAC_PI_2,
];

const TABLE_LIMIT: i64 = 60;

/// Table arcsine: `table[floor(degrees(x))]`, odd-symmetric for negative `x`.
///
/// An index outside [-60, 60] has no table entry and is rejected rather than clamped.
pub fn asin_lookup(x: f64) -> Result<f64> {
    if !x.is_finite() {
        return Err(Error::InvalidGeometry(format!("asin argument {}", x)));
    }
    let n = x.to_degrees().floor() as i64;
    if !(-TABLE_LIMIT..=TABLE_LIMIT).contains(&n) {
        return Err(Error::InvalidGeometry(format!(
            "n not in interval [-60, 60]: {}",
            n
        )));
    }
    if n >= 0 {
        Ok(ASIN_TABLE[n as usize])
    } else {
        Ok(-ASIN_TABLE[(-n) as usize])
    }
}

fn asin(x: f64, method: AsinMethod) -> Result<f64> {
    match method {
        AsinMethod::Table => asin_lookup(x),
        AsinMethod::Native => {
            if !(-1.0..=1.0).contains(&x) {
                return Err(Error::InvalidGeometry(format!(
                    "asin argument {} outside [-1, 1]",
                    x
                )));
            }
            Ok(x.asin())
        }
    }
}

fn check_distances(d1: f64, d2: f64) -> Result<()> {
    if !(d1.is_finite() && d2.is_finite()) || d1 <= 0.0 || d2 <= 0.0 {
        return Err(Error::InvalidGeometry(format!(
            "distances must be positive, got d1={} d2={}",
            d1, d2
        )));
    }
    Ok(())
}

/// Third side by the law of cosines, and sin(separation) / d3 for the law of sines.
/// Coincident sightings (d3 == 0) give a zero ratio.
fn opposite_side(d1: f64, d2: f64, separation_rad: f64) -> (f64, f64) {
    let d3 = (d1 * d1 + d2 * d2 - 2.0 * d1 * d2 * separation_rad.cos())
        .max(0.0)
        .sqrt();
    let ratio = if d3 > 0.0 {
        separation_rad.sin() / d3
    } else {
        0.0
    };
    (d3, ratio)
}

/// Bearing from the mount to the target, in [0, 360).
///
/// `d1`/`a1` come from the mount station, `d2`/`a2` from the destination station.
/// The final combination `180 - (360 - a1 + apex)` is kept exactly as the deployed
/// mounts compute it. So is the obtuse case, which subtracts the separation in radians
/// from a value in degrees.
pub fn solve_angle(d1: f64, a1: f64, d2: f64, a2: f64, method: AsinMethod) -> Result<f64> {
    check_distances(d1, d2)?;

    let mut separation = (a1 - a2).abs();
    if separation > 180.0 {
        separation = 360.0 - separation;
    }
    let separation_rad = separation.to_radians();
    let (d3, ratio) = opposite_side(d1, d2, separation_rad);

    let apex = if d2 < d3 {
        asin(ratio * d2, method)?.to_degrees()
    } else {
        let opposite = asin(ratio * d1, method)?.to_degrees();
        180.0 - (opposite + separation_rad)
    };
    debug!("separation={:.3}° d3={:.3} apex={:.3}°", separation, d3, apex);

    Ok(normalize_angle(180.0 - (360.0 - a1 + apex)))
}

/// Tilt toward the target, treating tilt * 180 as a pseudo-angle.
pub fn solve_tilt(d1: f64, t1: f64, d2: f64, t2: f64, method: AsinMethod) -> Result<f64> {
    check_distances(d1, d2)?;

    let a1 = t1 * 180.0;
    let a2 = t2 * 180.0;
    let separation = (a1 - a2).abs();
    let separation_rad = separation.to_radians();
    let (d3, ratio) = opposite_side(d1, d2, separation_rad);

    let apex = if d2 < d3 {
        asin(ratio * d2, method)?.to_degrees()
    } else {
        let opposite = asin(ratio * d1, method)?.to_degrees();
        180.0 - (opposite + separation).abs()
    };

    let tilt = (apex - a1) / 180.0;
    debug!("tilt apex={:.3}° a1={:.3}° tilt={:.4}", apex, a1, tilt);
    if !(-1.0..=1.0).contains(&tilt) {
        return Err(Error::InvalidGeometry(format!(
            "solved tilt {:.4} outside [-1, 1]",
            tilt
        )));
    }
    Ok(tilt)
}

/// Bearing the mount must take, from the mount-station and destination-station readings.
pub fn triangulate(
    mount: &Observation,
    destination: &Observation,
    method: AsinMethod,
) -> Result<TargetBearing> {
    let angle = solve_angle(
        mount.distance,
        mount.angle,
        destination.distance,
        destination.angle,
        method,
    )?;
    let tilt = solve_tilt(
        mount.distance,
        mount.tilt,
        destination.distance,
        destination.tilt,
        method,
    )?;
    Ok(TargetBearing { angle, tilt })
}

/// Signed rotation from `current` to `target` with the smallest magnitude.
///
/// Compares the direct difference with its 360-complement in each direction and takes
/// the shorter path. For inputs in [0, 360) the result is within [-180, 180].
pub fn shortest_angular_delta(target: f64, current: f64) -> f64 {
    let wrap_down = 360.0 - target + current;
    let direct = target - current;
    let reverse = current - target;
    let wrap_up = 360.0 - current + target;

    let first = if wrap_down.abs() < direct.abs() {
        -wrap_down
    } else {
        direct
    };
    let second = if reverse.abs() < wrap_up.abs() {
        -reverse
    } else {
        wrap_up
    };

    if first.abs() < second.abs() {
        first
    } else {
        second
    }
}
