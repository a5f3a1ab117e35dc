//! Wire format for observations and the receive-side pairing state machine.
//!
//! A frame is one tag byte (the [`ObservationKind`]) followed by distance, angle and
//! tilt as big-endian IEEE-754 doubles:
//!
//! ```text
//! +-----+----------+----------+----------+
//! | tag | distance |  angle   |   tilt   |
//! | u8  | f64 (BE) | f64 (BE) | f64 (BE) |
//! +-----+----------+----------+----------+
//!    1       8          8          8       = 25 bytes
//! ```

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::observation::{Observation, ObservationKind};

pub const FRAME_LEN: usize = 25;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Message {
    pub kind: ObservationKind,
    pub observation: Observation,
}

impl Message {
    pub fn new(kind: ObservationKind, observation: Observation) -> Self {
        Self { kind, observation }
    }

    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut frame = [0u8; FRAME_LEN];
        frame[0] = self.kind.tag();
        frame[1..9].copy_from_slice(&self.observation.distance.to_be_bytes());
        frame[9..17].copy_from_slice(&self.observation.angle.to_be_bytes());
        frame[17..25].copy_from_slice(&self.observation.tilt.to_be_bytes());
        frame
    }

    /// Decode the first [`FRAME_LEN`] bytes of `bytes`. Values are taken bit-for-bit.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let tag = *bytes.first().ok_or(Error::TruncatedFrame {
            expected: FRAME_LEN,
            actual: 0,
        })?;
        let kind = ObservationKind::from_tag(tag).ok_or(Error::UnrecognizedMessage {
            tag,
            discarded: bytes.len(),
        })?;
        if bytes.len() < FRAME_LEN {
            return Err(Error::TruncatedFrame {
                expected: FRAME_LEN,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            kind,
            observation: Observation {
                distance: read_f64(&bytes[1..9]),
                angle: read_f64(&bytes[9..17]),
                tilt: read_f64(&bytes[17..25]),
            },
        })
    }
}

fn read_f64(bytes: &[u8]) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    f64::from_be_bytes(raw)
}

/// Whether slot 1 holds a mount observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Slot 1 filled; the next destination observation completes a pair.
    Armed,
    /// Waiting for a mount observation.
    Incomplete,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReceiveEvent {
    /// A mount observation was stored in slot 1, replacing any earlier one.
    MountStored(Observation),
    /// A destination observation arrived with slot 1 filled.
    PairComplete {
        mount: Observation,
        destination: Observation,
    },
    /// A destination observation arrived first and was dropped.
    SequenceError { kind: ObservationKind },
    /// Unknown tag; everything buffered at that point was thrown away.
    Unrecognized { tag: u8, discarded: usize },
}

impl ReceiveEvent {
    /// The non-fatal error this event reports, if any.
    pub fn error(&self) -> Option<Error> {
        match *self {
            ReceiveEvent::SequenceError { kind } => Some(Error::Sequence { kind }),
            ReceiveEvent::Unrecognized { tag, discarded } => {
                Some(Error::UnrecognizedMessage { tag, discarded })
            }
            _ => None,
        }
    }
}

/// Reassembles frames from a byte stream and pairs mount/destination observations.
///
/// Bytes may arrive in any chunking. Events are produced one at a time so the caller
/// can act on each before the next frame is looked at.
#[derive(Debug, Default)]
pub struct ObservationReceiver {
    buffer: Vec<u8>,
    slot: Option<Observation>,
}

impl ObservationReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet turned into events.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn slot_state(&self) -> SlotState {
        if self.slot.is_some() {
            SlotState::Armed
        } else {
            SlotState::Incomplete
        }
    }

    pub fn slot(&self) -> Option<&Observation> {
        self.slot.as_ref()
    }

    /// Forget the stored mount observation once a pair has been acted on.
    pub fn clear_slot(&mut self) {
        self.slot = None;
    }

    /// Next event, or `None` while the buffered bytes don't make a whole frame.
    pub fn next_event(&mut self) -> Option<ReceiveEvent> {
        let tag = *self.buffer.first()?;

        if ObservationKind::from_tag(tag).is_none() {
            let discarded = self.buffer.len();
            self.buffer.clear();
            warn!(
                "unrecognized message kind {}, dropped {} buffered bytes",
                tag, discarded
            );
            return Some(ReceiveEvent::Unrecognized { tag, discarded });
        }

        if self.buffer.len() < FRAME_LEN {
            debug!("partial frame: {}/{} bytes", self.buffer.len(), FRAME_LEN);
            return None;
        }

        let frame: Vec<u8> = self.buffer.drain(..FRAME_LEN).collect();
        let message = match Message::decode(&frame) {
            Ok(message) => message,
            Err(err) => {
                // tag and length were checked above
                warn!("dropping frame: {}", err);
                return self.next_event();
            }
        };

        match message.kind {
            ObservationKind::Mount => {
                debug!("slot 1 <- {}", message.observation);
                self.slot = Some(message.observation);
                Some(ReceiveEvent::MountStored(message.observation))
            }
            ObservationKind::Destination => match self.slot {
                Some(mount) => Some(ReceiveEvent::PairComplete {
                    mount,
                    destination: message.observation,
                }),
                None => {
                    warn!("destination observation before mount observation, discarded");
                    Some(ReceiveEvent::SequenceError {
                        kind: ObservationKind::Destination,
                    })
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(kind: ObservationKind, d: f64, a: f64, t: f64) -> [u8; FRAME_LEN] {
        Message::new(kind, Observation::new(d, a, t)).encode()
    }

    #[test]
    fn test_encode_layout() {
        let bytes = frame(ObservationKind::Mount, 123.4, 45.0, -0.2);
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..9], &123.4f64.to_be_bytes());
        assert_eq!(&bytes[17..25], &(-0.2f64).to_be_bytes());
    }

    #[test]
    fn test_round_trip_is_exact() {
        let message = Message::new(ObservationKind::Mount, Observation::new(123.4, 45.0, -0.2));
        let decoded = Message::decode(&message.encode()).unwrap();

        assert_eq!(decoded.kind, ObservationKind::Mount);
        assert_eq!(decoded.observation.distance.to_bits(), 123.4f64.to_bits());
        assert_eq!(decoded.observation.angle.to_bits(), 45.0f64.to_bits());
        assert_eq!(decoded.observation.tilt.to_bits(), (-0.2f64).to_bits());
    }

    #[test]
    fn test_decode_errors() {
        let bytes = frame(ObservationKind::Destination, 1.0, 2.0, 0.0);
        assert!(matches!(
            Message::decode(&bytes[..10]),
            Err(Error::TruncatedFrame {
                expected: 25,
                actual: 10
            })
        ));
        assert!(matches!(
            Message::decode(&[9; 25]),
            Err(Error::UnrecognizedMessage { tag: 9, .. })
        ));
        assert!(matches!(
            Message::decode(&[]),
            Err(Error::TruncatedFrame { actual: 0, .. })
        ));
    }

    #[test]
    fn test_destination_first_is_a_sequence_error() {
        let mut rx = ObservationReceiver::new();
        rx.push_bytes(&frame(ObservationKind::Destination, 10.0, 30.0, 0.1));

        let event = rx.next_event().unwrap();
        assert_eq!(
            event,
            ReceiveEvent::SequenceError {
                kind: ObservationKind::Destination
            }
        );
        assert!(matches!(event.error(), Some(Error::Sequence { .. })));
        assert_eq!(rx.slot_state(), SlotState::Incomplete);
        assert_eq!(rx.pending(), 0);

        // the proper order still works afterwards
        rx.push_bytes(&frame(ObservationKind::Mount, 10.0, 90.0, 0.1));
        rx.push_bytes(&frame(ObservationKind::Destination, 10.0, 0.0, 0.2));
        assert!(matches!(rx.next_event(), Some(ReceiveEvent::MountStored(_))));
        assert_eq!(rx.slot_state(), SlotState::Armed);
        match rx.next_event() {
            Some(ReceiveEvent::PairComplete { mount, destination }) => {
                assert_eq!(mount.angle, 90.0);
                assert_eq!(destination.angle, 0.0);
            }
            other => panic!("expected a pair, got {:?}", other),
        }
        // slot stays armed until the caller has acted on the pair
        assert_eq!(rx.slot_state(), SlotState::Armed);
        rx.clear_slot();
        assert_eq!(rx.slot_state(), SlotState::Incomplete);
        assert_eq!(rx.next_event(), None);
    }

    #[test]
    fn test_newer_mount_observation_replaces_older() {
        let mut rx = ObservationReceiver::new();
        rx.push_bytes(&frame(ObservationKind::Mount, 10.0, 90.0, 0.0));
        rx.push_bytes(&frame(ObservationKind::Mount, 20.0, 180.0, 0.0));
        rx.next_event();
        rx.next_event();
        assert_eq!(rx.slot().unwrap().distance, 20.0);
    }

    #[test]
    fn test_partial_frames_wait_for_more_bytes() {
        let mut rx = ObservationReceiver::new();
        let bytes = frame(ObservationKind::Mount, 10.0, 90.0, 0.0);

        rx.push_bytes(&bytes[..1]);
        assert_eq!(rx.next_event(), None);
        rx.push_bytes(&bytes[1..24]);
        assert_eq!(rx.next_event(), None);
        assert_eq!(rx.pending(), 24);
        rx.push_bytes(&bytes[24..]);
        assert!(matches!(rx.next_event(), Some(ReceiveEvent::MountStored(_))));
        assert_eq!(rx.pending(), 0);
    }

    #[test]
    fn test_unknown_tag_drains_buffer() {
        let mut rx = ObservationReceiver::new();
        rx.push_bytes(&frame(ObservationKind::Mount, 10.0, 90.0, 0.0));
        rx.next_event();

        let mut junk = vec![7u8; 5];
        junk.extend_from_slice(&frame(ObservationKind::Destination, 10.0, 0.0, 0.0));
        rx.push_bytes(&junk);

        assert_eq!(
            rx.next_event(),
            Some(ReceiveEvent::Unrecognized {
                tag: 7,
                discarded: 30
            })
        );
        assert_eq!(rx.pending(), 0);
        // no state change
        assert_eq!(rx.slot_state(), SlotState::Armed);
        assert_eq!(rx.next_event(), None);
    }
}
