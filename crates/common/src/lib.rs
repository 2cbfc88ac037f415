//! Common utilities for usbkit
//!
//! This crate holds the pieces shared by the USB layer and its tests: the
//! host status-code error table, the Host Interface boundary trait with its
//! opaque ids, logging setup, and a call-recording stub host.

pub mod error;
pub mod host;
pub mod logging;
pub mod test_utils;

pub use error::{Error, HostError, Result, negative_is_error, nonzero_is_error};
pub use host::{DeviceRef, HandleId, ListId, MAX_PORT_DEPTH, RawDeviceList, Speed, UsbHost};
pub use logging::setup_logging;
