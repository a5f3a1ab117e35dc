//! Stand-ins for the physical rig: a simulated mount, a stepped clock, an in-memory
//! radio link and an indicator that records what it was told.
//!
//! Used by the unit tests, the integration tests and `--simulate` runs.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::hardware::{Axis, Clock, Hardware};
use crate::indicator::Indicator;
use crate::observation::ObservationKind;
use crate::transport::Transport;

/// Degrees of compass swing for the full pan travel.
pub const DEFAULT_HEADING_SPAN: f64 = 600.0;
/// Tilt change for the full tilt travel. Raising the servo lowers the tilt.
pub const DEFAULT_TILT_SPAN: f64 = 4.0;
/// Echo pulse returned when no distance readings are queued.
pub const DEFAULT_ECHO_US: f64 = 1480.0;

/// A mount whose sensors respond linearly to the commanded servo positions.
///
/// With both servos centred the compass reads the base heading and the accelerometer
/// the base tilt. Queued readings take precedence over the model until they run out.
#[derive(Debug, Clone)]
pub struct SimulatedRig {
    base_heading: f64,
    base_tilt: f64,
    heading_span: f64,
    tilt_span: f64,
    frozen: bool,
    distance: f64,
    ranging_time: Duration,
    pan: f64,
    tilt: f64,
    heading_queue: VecDeque<f64>,
    tilt_queue: VecDeque<f64>,
    distance_queue: VecDeque<f64>,
    commands: Vec<(Axis, f64)>,
    reads: usize,
}

impl Default for SimulatedRig {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRig {
    pub fn new() -> Self {
        Self {
            base_heading: 0.0,
            base_tilt: 0.0,
            heading_span: DEFAULT_HEADING_SPAN,
            tilt_span: DEFAULT_TILT_SPAN,
            frozen: false,
            distance: DEFAULT_ECHO_US,
            ranging_time: Duration::ZERO,
            pan: 0.5,
            tilt: 0.5,
            heading_queue: VecDeque::new(),
            tilt_queue: VecDeque::new(),
            distance_queue: VecDeque::new(),
            commands: Vec::new(),
            reads: 0,
        }
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.base_heading = heading;
        self
    }

    pub fn with_tilt(mut self, tilt: f64) -> Self {
        self.base_tilt = tilt;
        self
    }

    pub fn with_distance(mut self, echo_us: f64) -> Self {
        self.distance = echo_us;
        self
    }

    /// Each distance read blocks for `duration`, like waiting on a real echo.
    pub fn with_ranging_time(mut self, duration: Duration) -> Self {
        self.ranging_time = duration;
        self
    }

    pub fn with_spans(mut self, heading_span: f64, tilt_span: f64) -> Self {
        self.heading_span = heading_span;
        self.tilt_span = tilt_span;
        self
    }

    /// Sensors ignore the servos entirely.
    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    pub fn with_heading_readings(mut self, readings: Vec<f64>) -> Self {
        self.heading_queue.extend(readings);
        self
    }

    pub fn with_tilt_readings(mut self, readings: Vec<f64>) -> Self {
        self.tilt_queue.extend(readings);
        self
    }

    pub fn with_distance_readings(mut self, readings: Vec<f64>) -> Self {
        self.distance_queue.extend(readings);
        self
    }

    /// Every servo command received, in order.
    pub fn servo_commands(&self) -> &[(Axis, f64)] {
        &self.commands
    }

    pub fn servo_position(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Pan => self.pan,
            Axis::Tilt => self.tilt,
        }
    }

    /// Total sensor reads of any kind.
    pub fn reads(&self) -> usize {
        self.reads
    }

    fn modelled_heading(&self) -> f64 {
        if self.frozen {
            return self.base_heading;
        }
        self.base_heading + (self.pan - 0.5) * self.heading_span
    }

    fn modelled_tilt(&self) -> f64 {
        if self.frozen {
            return self.base_tilt;
        }
        (self.base_tilt - (self.tilt - 0.5) * self.tilt_span).clamp(-1.0, 1.0)
    }
}

impl Hardware for SimulatedRig {
    fn read_distance(&mut self) -> Result<f64> {
        self.reads += 1;
        if !self.ranging_time.is_zero() {
            std::thread::sleep(self.ranging_time);
        }
        Ok(self.distance_queue.pop_front().unwrap_or(self.distance))
    }

    fn read_heading(&mut self) -> Result<f64> {
        self.reads += 1;
        let modelled = self.modelled_heading();
        Ok(self.heading_queue.pop_front().unwrap_or(modelled))
    }

    fn read_tilt(&mut self) -> Result<f64> {
        self.reads += 1;
        let modelled = self.modelled_tilt();
        Ok(self.tilt_queue.pop_front().unwrap_or(modelled))
    }

    fn set_servo(&mut self, axis: Axis, position: f64) -> Result<()> {
        self.commands.push((axis, position));
        // the horn stops at the end of its travel
        let position = position.clamp(0.0, 1.0);
        match axis {
            Axis::Pan => self.pan = position,
            Axis::Tilt => self.tilt = position,
        }
        Ok(())
    }
}

/// Clock that only counts how long it was asked to sleep.
#[derive(Debug, Default, Clone)]
pub struct SimClock {
    elapsed: Duration,
    sleeps: usize,
}

impl SimClock {
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn sleeps(&self) -> usize {
        self.sleeps
    }
}

impl Clock for SimClock {
    fn sleep(&mut self, duration: Duration) {
        self.elapsed += duration;
        self.sleeps += 1;
    }
}

type Inbox = Arc<Mutex<VecDeque<u8>>>;

fn lock(inbox: &Inbox) -> MutexGuard<'_, VecDeque<u8>> {
    inbox.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One end of an in-memory byte link.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    inbox: Inbox,
    peer: Inbox,
    connected: Arc<AtomicBool>,
    chunk: Option<usize>,
}

impl LoopbackTransport {
    /// Two connected ends; bytes sent on one are received on the other.
    pub fn pair() -> (Self, Self) {
        let a: Inbox = Arc::default();
        let b: Inbox = Arc::default();
        let connected = Arc::new(AtomicBool::new(true));
        (
            Self {
                inbox: a.clone(),
                peer: b.clone(),
                connected: connected.clone(),
                chunk: None,
            },
            Self {
                inbox: b,
                peer: a,
                connected,
                chunk: None,
            },
        )
    }

    /// Deliver at most `bytes` per receive, to exercise partial frames.
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk = Some(bytes.max(1));
        self
    }

    /// Break the link for both ends.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Put raw bytes into this end's inbox as if the peer had sent them.
    pub fn inject(&self, bytes: &[u8]) {
        lock(&self.inbox).extend(bytes);
    }

    fn check_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "loopback disconnected").into())
        }
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_connected()?;
        lock(&self.peer).extend(bytes);
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        self.check_connected()?;
        let mut inbox = lock(&self.inbox);
        let n = self.chunk.map_or(inbox.len(), |c| c.min(inbox.len()));
        Ok(inbox.drain(..n).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorEvent {
    Start(ObservationKind),
    Success(ObservationKind),
    Error(String),
}

/// Indicator that keeps every notification for later inspection.
#[derive(Debug, Default, Clone)]
pub struct RecordingIndicator {
    pub events: Vec<IndicatorEvent>,
}

impl Indicator for RecordingIndicator {
    fn on_capture_start(&mut self, kind: ObservationKind) {
        self.events.push(IndicatorEvent::Start(kind));
    }

    fn on_capture_success(&mut self, kind: ObservationKind) {
        self.events.push(IndicatorEvent::Success(kind));
    }

    fn on_capture_error(&mut self, error: &Error) {
        self.events.push(IndicatorEvent::Error(error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rig_heading_follows_pan() {
        let mut rig = SimulatedRig::new().with_heading(100.0);
        rig.set_servo(Axis::Pan, 0.6).unwrap();
        assert!((rig.read_heading().unwrap() - 160.0).abs() < 1e-9);
    }

    #[test]
    fn test_rig_stops_at_end_of_travel() {
        let mut rig = SimulatedRig::new();
        rig.set_servo(Axis::Tilt, -0.2).unwrap();
        assert_eq!(rig.servo_position(Axis::Tilt), 0.0);
        assert_eq!(rig.servo_commands(), &[(Axis::Tilt, -0.2)]);
    }

    #[test]
    fn test_queued_readings_come_first() {
        let mut rig = SimulatedRig::new().with_heading(5.0).with_heading_readings(vec![1.0]);
        assert_eq!(rig.read_heading().unwrap(), 1.0);
        assert_eq!(rig.read_heading().unwrap(), 5.0);
        assert_eq!(rig.reads(), 2);
    }

    #[test]
    fn test_loopback_delivers_to_peer() {
        let (mut a, mut b) = LoopbackTransport::pair();
        a.send(&[1, 2, 3]).unwrap();
        assert!(a.receive().unwrap().is_empty());
        assert_eq!(b.receive().unwrap(), vec![1, 2, 3]);
        assert!(b.receive().unwrap().is_empty());
    }

    #[test]
    fn test_loopback_chunking() {
        let (mut a, b) = LoopbackTransport::pair();
        let mut b = b.with_chunk_size(2);
        a.send(&[1, 2, 3]).unwrap();
        assert_eq!(b.receive().unwrap(), vec![1, 2]);
        assert_eq!(b.receive().unwrap(), vec![3]);
    }

    #[test]
    fn test_disconnect_is_fatal_on_both_ends() {
        let (mut a, mut b) = LoopbackTransport::pair();
        a.disconnect();
        assert!(a.send(&[0]).unwrap_err().is_fatal());
        assert!(b.receive().unwrap_err().is_fatal());
    }
}
