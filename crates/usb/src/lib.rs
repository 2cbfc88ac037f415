//! Synchronous USB access
//!
//! Enumerate devices, open handles and run control, bulk and interrupt
//! transfers on top of a [`UsbHost`] backend. [`init`] gives a context on the
//! system libusb; tests build one on [`common::test_utils::StubHost`].
//!
//! # Example
//!
//! ```
//! use common::test_utils::{StubDevice, StubHost};
//! use usb::Context;
//!
//! let host = StubHost::new().with_device(StubDevice::new(0x1234, 0x5678));
//! let context = Context::new(host);
//!
//! let handle = context.open_device_with_vid_pid(0x1234, 0x5678).unwrap();
//! handle.bulk_write(0x02, b"ping").unwrap();
//! handle.close();
//! ```

pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod filter;
pub mod handle;
pub mod rusb_host;
pub mod stream;
pub mod transfer;

pub use common::{HostError, Speed, UsbHost};
pub use config::UsbConfig;
pub use context::{Context, init};
pub use device::{Device, DeviceList};
pub use error::{CapabilityError, Error, Result};
pub use filter::DeviceFilter;
pub use handle::Handle;
pub use rusb_host::RusbHost;
pub use stream::{BulkStream, InterruptStream, StreamCaps};
pub use transfer::{decode_string_descriptor, endpoint_address};
