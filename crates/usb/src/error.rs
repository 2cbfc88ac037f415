//! Error types for the USB layer

use common::HostError;
use descriptor::ParseError;
use std::io;
use thiserror::Error;

/// A stream was asked for a direction it was not built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("bulk transfer: cannot read")]
    CannotRead,
    #[error("bulk transfer: cannot write")]
    CannotWrite,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("USB host error: {0}")]
    Host(#[from] HostError),

    #[error("Descriptor error: {0}")]
    Parse(#[from] ParseError),

    #[error("Stream error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The host status behind this error, if it came from the host
    pub fn host_error(&self) -> Option<HostError> {
        match self {
            Error::Host(err) => Some(*err),
            _ => None,
        }
    }
}

/// Never produces `ErrorKind::Interrupted`: std's `write_all` and
/// `read_exact` retry on that kind, so an interrupted transfer maps to `Other`.
impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Host(HostError::Timeout) => io::ErrorKind::TimedOut,
            Error::Host(HostError::Pipe) => io::ErrorKind::BrokenPipe,
            Error::Host(HostError::NoDevice) => io::ErrorKind::NotConnected,
            Error::Host(HostError::Access) => io::ErrorKind::PermissionDenied,
            Error::Capability(_) => io::ErrorKind::Unsupported,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
