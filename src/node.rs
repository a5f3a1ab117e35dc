//! The two roles of the system.
//!
//! A [`Pointer`] measures and transmits; a [`Mount`] receives, triangulates and drives
//! its servos. Each owns its hardware and transport and runs a single loop fed by a
//! [`Command`] channel (usually from the push buttons in `gpio_input`).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::averager::{averaged_distance, averaged_heading};
use crate::config::{
    ControlParams, MOUNT_IDLE_MS, MOUNT_STATUS_EVERY, POINTER_STATUS_INTERVAL_SECS,
};
use crate::controller::{ActuationController, DriveReport};
use crate::error::{Error, Result};
use crate::hardware::{Clock, Hardware};
use crate::indicator::Indicator;
use crate::observation::{Observation, ObservationKind};
use crate::protocol::{Message, ObservationReceiver, ReceiveEvent};
use crate::transport::Transport;
use crate::triangulate::triangulate;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    /// Take and transmit an observation (pointer).
    Capture(ObservationKind),
    /// Nudge both servos (mount).
    Jog(f64),
    /// Recentre both servos (mount).
    Reset,
    Shutdown,
}

/// Single-flight flag: at most one message is being captured and sent at a time.
///
/// Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct SendGuard {
    busy: Arc<AtomicBool>,
}

impl SendGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` if a send is already in progress.
    pub fn try_acquire(&self) -> Option<SendPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SendPermit {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the [`SendGuard`] when dropped.
#[derive(Debug)]
pub struct SendPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for SendPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Handheld station: measures toward the target and transmits the result.
pub struct Pointer<H, T, I> {
    hardware: H,
    transport: T,
    indicator: I,
    params: ControlParams,
    guard: SendGuard,
}

impl<H: Hardware, T: Transport, I: Indicator> Pointer<H, T, I> {
    pub fn new(hardware: H, transport: T, indicator: I, params: ControlParams) -> Self {
        Self {
            hardware,
            transport,
            indicator,
            params,
            guard: SendGuard::new(),
        }
    }

    pub fn send_guard(&self) -> SendGuard {
        self.guard.clone()
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    /// Measure, encode and send one observation of the given kind.
    pub fn capture(&mut self, kind: ObservationKind) -> Result<Message> {
        let Some(_permit) = self.guard.try_acquire() else {
            let err = Error::SendBusy;
            self.indicator.on_capture_error(&err);
            return Err(err);
        };

        self.indicator.on_capture_start(kind);
        match self.measure_and_send(kind) {
            Ok(message) => {
                info!("sent {} observation: {}", kind, message.observation);
                self.indicator.on_capture_success(kind);
                Ok(message)
            }
            Err(err) => {
                self.indicator.on_capture_error(&err);
                Err(err)
            }
        }
    }

    fn measure_and_send(&mut self, kind: ObservationKind) -> Result<Message> {
        let distance = averaged_distance(&mut self.hardware, &self.params)?;
        let angle = averaged_heading(&mut self.hardware, &self.params)?;
        let tilt = self.hardware.read_tilt()?;

        let message = Message::new(kind, Observation::new(distance, angle, tilt));
        self.transport.send(&message.encode())?;
        Ok(message)
    }

    /// Returns `Ok(false)` on shutdown. Only fatal errors are returned.
    pub fn handle(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Capture(kind) => match self.capture(kind) {
                Ok(_) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => warn!("{} capture failed: {}", kind, err),
            },
            Command::Jog(_) | Command::Reset => debug!("pointer ignores {:?}", command),
            Command::Shutdown => return Ok(false),
        }
        Ok(true)
    }

    /// Serve commands until shutdown or until the channel closes.
    pub fn run(&mut self, commands: &Receiver<Command>) -> Result<()> {
        let interval = Duration::from_secs(POINTER_STATUS_INTERVAL_SECS);
        let mut last_status = Instant::now();
        info!("pointer ready");

        loop {
            match commands.recv_timeout(interval) {
                Ok(command) => {
                    if !self.handle(command)? {
                        break;
                    }
                    if matches!(command, Command::Capture(_)) && !self.drop_queued(commands)? {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("command channel closed");
                    break;
                }
            }

            if last_status.elapsed() >= interval {
                self.log_status();
                last_status = Instant::now();
            }
        }
        info!("pointer stopped");
        Ok(())
    }

    /// Everything queued now arrived while the last capture was being sent. Captures
    /// are dropped with `SendBusy`; other commands still run. Returns `Ok(false)` on
    /// shutdown.
    fn drop_queued(&mut self, commands: &Receiver<Command>) -> Result<bool> {
        loop {
            match commands.try_recv() {
                Ok(Command::Capture(kind)) => {
                    let err = Error::SendBusy;
                    warn!("{} capture dropped: {}", kind, err);
                    self.indicator.on_capture_error(&err);
                }
                Ok(command) => {
                    if !self.handle(command)? {
                        return Ok(false);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(true),
            }
        }
    }

    fn log_status(&mut self) {
        let reading = (|| -> Result<(f64, f64, f64)> {
            Ok((
                self.hardware.read_heading()?,
                self.hardware.read_distance()?,
                self.hardware.read_tilt()?,
            ))
        })();
        match reading {
            Ok((angle, distance, tilt)) => info!(
                "status: angle {:.1}°  distance {:.0}  tilt {:.3}",
                angle, distance, tilt
            ),
            Err(err) => warn!("status read failed: {}", err),
        }
    }
}

/// Servo station: pairs incoming observations and points at the target.
pub struct Mount<H, C, T, I> {
    controller: ActuationController<H, C>,
    transport: T,
    receiver: ObservationReceiver,
    indicator: I,
}

impl<H: Hardware, C: Clock, T: Transport, I: Indicator> Mount<H, C, T, I> {
    pub fn new(controller: ActuationController<H, C>, transport: T, indicator: I) -> Self {
        Self {
            controller,
            transport,
            receiver: ObservationReceiver::new(),
            indicator,
        }
    }

    pub fn controller(&self) -> &ActuationController<H, C> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ActuationController<H, C> {
        &mut self.controller
    }

    pub fn receiver(&self) -> &ObservationReceiver {
        &self.receiver
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    /// Read what the transport has and act on every complete frame.
    ///
    /// Returns the number of events handled. Non-fatal errors are logged and reported to
    /// the indicator; transport failures are returned.
    pub fn poll(&mut self) -> Result<usize> {
        let bytes = self.transport.receive()?;
        self.receiver.push_bytes(&bytes);

        let mut handled = 0;
        while let Some(event) = self.receiver.next_event() {
            handled += 1;
            match self.handle_event(event) {
                Ok(_) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    error!("{}", err);
                    self.indicator.on_capture_error(&err);
                }
            }
        }
        Ok(handled)
    }

    /// Act on one receive event. A completed pair drives the servos and then clears
    /// slot 1; if anything fails first the slot is kept.
    pub fn handle_event(&mut self, event: ReceiveEvent) -> Result<Option<DriveReport>> {
        match event {
            ReceiveEvent::MountStored(observation) => {
                info!("stored mount observation: {}", observation);
                Ok(None)
            }
            ReceiveEvent::PairComplete { mount, destination } => {
                info!("pair complete: mount {} / destination {}", mount, destination);
                self.indicator.on_capture_start(ObservationKind::Destination);

                let bearing = triangulate(&mount, &destination, self.controller.params().asin)?;
                info!("target bearing: {}", bearing);
                let report = self.controller.drive_to_bearing(&bearing)?;
                info!("drive finished: {:?}", report);

                self.receiver.clear_slot();
                self.indicator.on_capture_success(ObservationKind::Destination);
                Ok(Some(report))
            }
            other => match other.error() {
                Some(err) => Err(err),
                None => Ok(None),
            },
        }
    }

    /// Returns `Ok(false)` on shutdown. Only fatal errors are returned.
    pub fn handle(&mut self, command: Command) -> Result<bool> {
        let result = match command {
            Command::Jog(step) => self.controller.jog(step),
            Command::Reset => self.controller.reset(),
            Command::Capture(kind) => {
                debug!("mount ignores capture of {}", kind);
                Ok(())
            }
            Command::Shutdown => return Ok(false),
        };
        match result {
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!("{:?} failed: {}", command, err);
                Ok(true)
            }
            Ok(()) => Ok(true),
        }
    }

    /// Poll the radio and serve commands until shutdown, a closed channel, or a
    /// transport failure.
    pub fn run(&mut self, commands: &Receiver<Command>) -> Result<()> {
        let idle_delay = Duration::from_millis(MOUNT_IDLE_MS);
        let mut idle_cycles = 0;
        info!("mount ready");

        loop {
            if self.poll()? == 0 {
                idle_cycles += 1;
                if idle_cycles >= MOUNT_STATUS_EVERY {
                    self.log_status();
                    idle_cycles = 0;
                }
            }

            loop {
                match commands.try_recv() {
                    Ok(command) => {
                        if !self.handle(command)? {
                            info!("mount stopped");
                            return Ok(());
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        info!("command channel closed");
                        return Ok(());
                    }
                }
            }

            self.controller.clock_mut().sleep(idle_delay);
        }
    }

    fn log_status(&mut self) {
        match self.controller.status() {
            Ok((angle, tilt)) => info!("status: angle {:.1}°  tilt {:.3}", angle, tilt),
            Err(err) => warn!("status read failed: {}", err),
        }
    }
}
