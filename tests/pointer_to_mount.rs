use std::sync::mpsc;

use ptloc_rs::config::ControlParams;
use ptloc_rs::protocol::SlotState;
use ptloc_rs::sim::{IndicatorEvent, LoopbackTransport, RecordingIndicator, SimClock, SimulatedRig};
use ptloc_rs::triangulate::shortest_angular_delta;
use ptloc_rs::{ActuationController, Axis, Command, Mount, ObservationKind, Pointer};

type SimMount = Mount<SimulatedRig, SimClock, LoopbackTransport, RecordingIndicator>;
type SimPointer = Pointer<SimulatedRig, LoopbackTransport, RecordingIndicator>;

fn pointer(link: &LoopbackTransport, heading: f64, tilt: f64) -> SimPointer {
    let rig = SimulatedRig::new()
        .with_heading(heading)
        .with_tilt(tilt)
        .with_distance(1480.0);
    Pointer::new(
        rig,
        link.clone(),
        RecordingIndicator::default(),
        ControlParams::default(),
    )
}

fn mount(link: LoopbackTransport) -> SimMount {
    let rig = SimulatedRig::new().with_heading(200.0).with_tilt(0.0);
    let controller =
        ActuationController::new(rig, SimClock::default(), ControlParams::default()).unwrap();
    Mount::new(controller, link, RecordingIndicator::default())
}

fn poll_until_idle(mount: &mut SimMount) -> usize {
    let mut handled = 0;
    for _ in 0..20 {
        handled += mount.poll().unwrap();
    }
    handled
}

#[test]
fn test_mount_points_at_destination() {
    let (pointer_end, mount_end) = LoopbackTransport::pair();
    let mut at_mount = pointer(&pointer_end, 90.0, 0.1);
    let mut at_destination = pointer(&pointer_end, 0.0, 0.2);
    // the radio hands over a few bytes at a time
    let mut mount = mount(mount_end.with_chunk_size(7));

    at_mount.capture(ObservationKind::Mount).unwrap();
    at_destination.capture(ObservationKind::Destination).unwrap();
    assert_eq!(poll_until_idle(&mut mount), 2);

    assert_eq!(mount.receiver().slot_state(), SlotState::Incomplete);
    let (angle, tilt) = mount.controller_mut().status().unwrap();
    assert!(
        shortest_angular_delta(225.72, angle).abs() <= 1.0,
        "angle {}",
        angle
    );
    assert!((tilt - 0.3678).abs() <= 0.01, "tilt {}", tilt);
    assert_eq!(
        mount.indicator().events.last(),
        Some(&IndicatorEvent::Success(ObservationKind::Destination))
    );
}

#[test]
fn test_out_of_order_then_recovered() {
    let (pointer_end, mount_end) = LoopbackTransport::pair();
    let mut at_mount = pointer(&pointer_end, 90.0, 0.1);
    let mut at_destination = pointer(&pointer_end, 0.0, 0.2);
    let mut mount = mount(mount_end);

    at_destination.capture(ObservationKind::Destination).unwrap();
    mount.poll().unwrap();
    assert_eq!(mount.receiver().slot_state(), SlotState::Incomplete);
    assert_eq!(mount.controller().hardware().servo_commands().len(), 2);

    at_mount.capture(ObservationKind::Mount).unwrap();
    at_destination.capture(ObservationKind::Destination).unwrap();
    assert_eq!(mount.poll().unwrap(), 2);
    assert_eq!(mount.receiver().slot_state(), SlotState::Incomplete);
    assert!(mount.controller().hardware().servo_commands().len() > 2);
}

#[test]
fn test_stuck_compass_recentres_and_completes_cycle() {
    let (pointer_end, mount_end) = LoopbackTransport::pair();
    let mut at_mount = pointer(&pointer_end, 90.0, 0.1);
    let mut at_destination = pointer(&pointer_end, 0.0, 0.2);

    // compass stuck on one value: the pan integrator winds up past full travel
    let rig = SimulatedRig::new().with_heading(200.0).frozen();
    let controller =
        ActuationController::new(rig, SimClock::default(), ControlParams::default()).unwrap();
    let mut mount = Mount::new(controller, mount_end, RecordingIndicator::default());

    at_mount.capture(ObservationKind::Mount).unwrap();
    at_destination.capture(ObservationKind::Destination).unwrap();
    assert_eq!(mount.poll().unwrap(), 2);

    let commands = mount.controller().hardware().servo_commands();
    assert!(
        commands
            .iter()
            .filter(|(axis, _)| *axis == Axis::Pan)
            .all(|(_, p)| *p < 1.0)
    );
    // the reset after the runaway recentres both axes before tilt is driven
    assert!(
        commands[2..]
            .windows(2)
            .any(|pair| pair == [(Axis::Pan, 0.5), (Axis::Tilt, 0.5)])
    );
    assert_eq!(mount.controller().position(Axis::Pan), 0.5);
    // the drive finished (with a safety reset), so the pair is consumed
    assert_eq!(mount.receiver().slot_state(), SlotState::Incomplete);
}

#[test]
fn test_mount_run_ends_on_broken_link() {
    let (pointer_end, mount_end) = LoopbackTransport::pair();
    let mut mount = mount(mount_end);
    let (_tx, rx) = mpsc::channel::<Command>();

    pointer_end.disconnect();
    let err = mount.run(&rx).unwrap_err();
    assert!(err.is_fatal());
}
