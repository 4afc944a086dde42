//! Errors of the transport layer and of the controller experiment.

use wvfcompiler_backend::CompilerError;

/// Failure reported by a [`Transport`](crate::transport::Transport) implementation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("{op} failed with driver status {status}")]
    Status { op: &'static str, status: u32 },

    #[error("Short write: {written} of {expected} bytes accepted")]
    ShortWrite { written: usize, expected: usize },

    #[error("No device with serial number {0:?}")]
    NoSuchDevice(String),

    #[error("Handle {0} is not open")]
    BadHandle(usize),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    Compiler(#[from] CompilerError),

    #[error("Device {serial} could not be opened: {source}")]
    DeviceNotFound {
        serial: String,
        #[source]
        source: TransportError,
    },

    #[error("Transmission to device {serial} failed: {source}")]
    TransmitFailed {
        serial: String,
        #[source]
        source: TransportError,
    },

    #[error("Program of channel {channel} is {words} words long, the card accepts at most 65535")]
    ProgramTooLong { channel: usize, words: usize },

    #[error("Device {0} is not connected")]
    NotConnected(String),
}

pub type ControlResult<T> = Result<T, ControlError>;
