//! Common error types

use thiserror::Error;

/// Status codes reported by the host USB stack
///
/// Discriminants are the libusb status values, so codes coming back from the
/// native side map onto this enum one to one and back again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(i32)]
pub enum HostError {
    #[error("success")]
    Success = 0,
    #[error("io error")]
    Io = -1,
    #[error("invalid param")]
    InvalidParam = -2,
    #[error("access denied")]
    Access = -3,
    #[error("no device")]
    NoDevice = -4,
    #[error("resource not found")]
    NotFound = -5,
    #[error("busy")]
    Busy = -6,
    #[error("timeout")]
    Timeout = -7,
    #[error("overflow")]
    Overflow = -8,
    #[error("pipe error")]
    Pipe = -9,
    #[error("interrupted")]
    Interrupted = -10,
    #[error("out of memory")]
    NoMem = -11,
    #[error("not supported")]
    NotSupported = -12,
    #[error("other error")]
    Other = -99,
}

impl HostError {
    /// Every variant, in status-code order
    pub const ALL: [HostError; 14] = [
        HostError::Success,
        HostError::Io,
        HostError::InvalidParam,
        HostError::Access,
        HostError::NoDevice,
        HostError::NotFound,
        HostError::Busy,
        HostError::Timeout,
        HostError::Overflow,
        HostError::Pipe,
        HostError::Interrupted,
        HostError::NoMem,
        HostError::NotSupported,
        HostError::Other,
    ];

    /// Map a raw status code; unknown codes become [`HostError::Other`]
    pub fn from_status(status: i32) -> Self {
        match status {
            0 => HostError::Success,
            -1 => HostError::Io,
            -2 => HostError::InvalidParam,
            -3 => HostError::Access,
            -4 => HostError::NoDevice,
            -5 => HostError::NotFound,
            -6 => HostError::Busy,
            -7 => HostError::Timeout,
            -8 => HostError::Overflow,
            -9 => HostError::Pipe,
            -10 => HostError::Interrupted,
            -11 => HostError::NoMem,
            -12 => HostError::NotSupported,
            _ => HostError::Other,
        }
    }

    /// Raw status code for this error
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Interpret a return value where negative codes are errors and anything
/// else is a byte count (control transfers, descriptor fetches)
pub fn negative_is_error(status: i32) -> std::result::Result<usize, HostError> {
    usize::try_from(status).map_err(|_| HostError::from_status(status))
}

/// Interpret a status where every non-zero code is an error (bulk and
/// interrupt transfers)
pub fn nonzero_is_error(status: i32) -> std::result::Result<(), HostError> {
    match status {
        0 => Ok(()),
        other => Err(HostError::from_status(other)),
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("USB host error: {0}")]
    Host(#[from] HostError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
