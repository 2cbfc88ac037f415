//! USB descriptor decoding
//!
//! This crate turns raw descriptor bytes, as returned by GET_DESCRIPTOR or
//! embedded in a configuration block, into typed records. It performs no I/O
//! and every entry point is a pure function of its input.
//!
//! # Example
//!
//! ```
//! use descriptor::{Descriptor, UsbDescriptor, parse};
//!
//! let raw = [0x07, 0x05, 0x81, 0x03, 0x08, 0x00, 0x0A];
//! let Descriptor::Endpoint(ep) = parse(&raw).unwrap() else {
//!     panic!("not an endpoint");
//! };
//! assert_eq!(ep.number(), 1);
//! assert_eq!(ep.max_packet_size(), 8);
//! assert_eq!(ep.length(), 7);
//! ```
//!
//! # Configuration Blocks
//!
//! A configuration descriptor is followed by its interfaces and endpoints.
//! Walk the block chunk by chunk with [`descriptors`]:
//!
//! ```
//! use descriptor::{Descriptor, descriptors};
//!
//! let block = [
//!     0x09, 0x02, 0x19, 0x00, 0x01, 0x01, 0x00, 0x80, 0x32, // configuration
//!     0x09, 0x04, 0x00, 0x00, 0x01, 0xFF, 0x00, 0x00, 0x00, // interface
//!     0x07, 0x05, 0x02, 0x02, 0x40, 0x00, 0x00, // endpoint
//! ];
//! let endpoints = descriptors(&block)
//!     .filter_map(Result::ok)
//!     .filter(|d| matches!(d, Descriptor::Endpoint(_)))
//!     .count();
//! assert_eq!(endpoints, 1);
//! ```

pub mod codec;
pub mod consts;
pub mod error;
pub mod parser;
pub mod types;

pub use codec::{Field, Record, Width, read_u16_le};
pub use consts::{
    Direction, ENDPOINT_DIR_MASK, ENDPOINT_NUMBER_MASK, Recipient, RequestKind, TransferType,
    class, descriptor_type, request, request_type,
};
pub use error::{ParseError, Result};
pub use parser::{Descriptors, descriptors, parse, parse_configuration, parse_device};
pub use types::{
    CONFIG_DESCRIPTOR_SIZE, ConfigurationDescriptor, DEVICE_DESCRIPTOR_SIZE, Descriptor,
    DeviceDescriptor, ENDPOINT_DESCRIPTOR_SIZE, EndpointDescriptor, HEADER_SIZE,
    INTERFACE_DESCRIPTOR_SIZE, InterfaceDescriptor, StringDescriptor, UsbDescriptor,
};
