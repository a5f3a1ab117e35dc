use std::fmt;

/// Which station an observation was taken from. The discriminant is the wire tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObservationKind {
    /// Slot 1: taken standing at the mount.
    Mount = 1,
    /// Slot 2: taken standing at the destination.
    Destination = 2,
}

impl ObservationKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ObservationKind::Mount),
            2 => Some(ObservationKind::Destination),
            _ => None,
        }
    }
}

impl fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservationKind::Mount => write!(f, "mount"),
            ObservationKind::Destination => write!(f, "destination"),
        }
    }
}

/// One distance/angle/tilt reading taken from a station toward the target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    /// Raw rangefinder units (echo pulse width in microseconds).
    pub distance: f64,
    /// Compass heading in degrees, [0, 360).
    pub angle: f64,
    /// Normalized tilt, [-1, 1]. Negative means pointing upwards.
    pub tilt: f64,
}

impl Observation {
    pub fn new(distance: f64, angle: f64, tilt: f64) -> Self {
        Self {
            distance,
            angle: normalize_angle(angle),
            tilt,
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "d={:.1} angle={:.1}° tilt={:.3}",
            self.distance, self.angle, self.tilt
        )
    }
}

/// Triangulated direction the mount should point at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetBearing {
    pub angle: f64,
    pub tilt: f64,
}

impl fmt::Display for TargetBearing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "angle={:.1}° tilt={:.3}", self.angle, self.tilt)
    }
}

/// Fold any heading into [0, 360).
pub fn normalize_angle(angle: f64) -> f64 {
    ((angle % 360.0) + 360.0) % 360.0
}
