use log::{error, info};

use crate::error::Error;
use crate::observation::ObservationKind;

/// Observer for idle/sending/error status, e.g. a status LED.
///
/// All hooks default to doing nothing.
pub trait Indicator {
    fn on_capture_start(&mut self, _kind: ObservationKind) {}

    fn on_capture_success(&mut self, _kind: ObservationKind) {}

    fn on_capture_error(&mut self, _error: &Error) {}
}

/// Reports status through the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn on_capture_start(&mut self, kind: ObservationKind) {
        info!("● {} capture started", kind);
    }

    fn on_capture_success(&mut self, kind: ObservationKind) {
        info!("✓ {} capture done", kind);
    }

    fn on_capture_error(&mut self, err: &Error) {
        error!("✗ {}", err);
    }
}
