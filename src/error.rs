use thiserror::Error;

use crate::observation::ObservationKind;

/// Everything that can go wrong between a sensor read and a servo command.
///
/// Only transport failures are fatal for a node's run loop (see [`Error::is_fatal`]);
/// every other kind is logged and the node keeps going.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("{kind} observation received before a mount observation")]
    Sequence { kind: ObservationKind },

    #[error("unrecognized message kind {tag} ({discarded} bytes discarded)")]
    UnrecognizedMessage { tag: u8, discarded: usize },

    #[error("previous message still being sent")]
    SendBusy,

    #[error("averaging needs at least 2 samples, got {0}")]
    InsufficientSamples(usize),

    #[error("goal out of range: {0}")]
    InvalidGoal(String),

    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    TruncatedFrame { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("hardware: {0}")]
    Hardware(String),

    #[error("gpio: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("i2c: {0}")]
    I2c(#[from] rppal::i2c::Error),

    #[error("pwm: {0}")]
    Pwm(#[from] rppal::pwm::Error),

    #[error("serial port: {0}")]
    Serial(#[from] serialport::Error),

    #[error("transport i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Transport-level failures end the node's run; the caller decides whether to restart.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Serial(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
