pub mod accelerometer;
pub mod averager;
pub mod compass_sensor;
pub mod config;
pub mod controller;
pub mod error;
pub mod gpio_input;
pub mod hardware;
pub mod indicator;
pub mod node;
pub mod observation;
pub mod pi;
pub mod protocol;
pub mod pwm;
pub mod sim;
pub mod transport;
pub mod triangulate;
pub mod ultrasonic;

// Re-export commonly used types
pub use controller::{ActuationController, DriveOutcome, DriveReport};
pub use error::{Error, Result};
pub use hardware::{Axis, Clock, Hardware, SystemClock};
pub use node::{Command, Mount, Pointer};
pub use observation::{Observation, ObservationKind, TargetBearing};
pub use protocol::{Message, ObservationReceiver, ReceiveEvent};
pub use transport::Transport;

#[cfg(test)]
pub(crate) mod mocks;
