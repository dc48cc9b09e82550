use std::fmt::{Display, Formatter};

use crate::dongle::Mode;
use crate::status::Status;

/// Errors surfaced by the driver.
#[derive(Debug)]
pub enum Error {
    /// A frame or payload exceeded its buffer capacity.
    PayloadTooLarge { size: usize, max: usize },
    /// An operation required an established ASH connection.
    NotConnected(Status),
    /// The requested adapter-mode transition is not implemented.
    UnsupportedModeTransition { current: Mode, requested: Mode },
    /// The requested radio channel is outside the 2.4 GHz band.
    InvalidChannel(u8),
    /// An I/O error on the serial port.
    Io(std::io::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PayloadTooLarge { size, max } => {
                write!(f, "Payload of {size} bytes exceeds the maximum of {max} bytes.")
            }
            Self::NotConnected(status) => {
                write!(f, "ASH connection is not established (status: {status:?}).")
            }
            Self::UnsupportedModeTransition { current, requested } => {
                write!(
                    f,
                    "Adapter mode transition from {current:?} to {requested:?} is not implemented."
                )
            }
            Self::InvalidChannel(channel) => {
                write!(f, "Invalid radio channel: {channel}. Expected 11 through 26.")
            }
            Self::Io(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}
