//! Descriptor dispatch
//!
//! [`parse`] identifies a single descriptor from its header and decodes it
//! into the matching [`Descriptor`] variant. [`descriptors`] walks a block of
//! concatenated descriptors (such as the full configuration returned by
//! GET_DESCRIPTOR) one chunk at a time.

use crate::consts::descriptor_type;
use crate::error::{ParseError, Result};
use crate::types::{
    ConfigurationDescriptor, Descriptor, DeviceDescriptor, EndpointDescriptor, HEADER_SIZE,
    InterfaceDescriptor, StringDescriptor, UsbDescriptor, header,
};

/// Parse one descriptor from the start of `buf`
///
/// Bytes past the declared bLength are ignored. Fixed-size descriptors must
/// declare exactly their defined size; string descriptors only need the two
/// header bytes, so a declared length of 2 yields an empty payload.
pub fn parse(buf: &[u8]) -> Result<Descriptor> {
    let (declared, kind) = header(buf)?;
    if buf.len() < declared {
        return Err(ParseError::TruncatedBody {
            declared,
            available: buf.len(),
        });
    }

    match kind {
        descriptor_type::DEVICE => DeviceDescriptor::decode(buf).map(Descriptor::Device),
        descriptor_type::CONFIG => {
            ConfigurationDescriptor::decode(buf).map(Descriptor::Configuration)
        }
        descriptor_type::INTERFACE => InterfaceDescriptor::decode(buf).map(Descriptor::Interface),
        descriptor_type::ENDPOINT => EndpointDescriptor::decode(buf).map(Descriptor::Endpoint),
        descriptor_type::STRING => StringDescriptor::decode(buf).map(Descriptor::String),
        other => Err(ParseError::UnknownDescriptorType(other)),
    }
}

/// Parse `buf` and require a device descriptor
pub fn parse_device(buf: &[u8]) -> Result<DeviceDescriptor> {
    match parse(buf)? {
        Descriptor::Device(desc) => Ok(desc),
        other => Err(unexpected(descriptor_type::DEVICE, &other)),
    }
}

/// Parse `buf` and require a configuration descriptor
pub fn parse_configuration(buf: &[u8]) -> Result<ConfigurationDescriptor> {
    match parse(buf)? {
        Descriptor::Configuration(desc) => Ok(desc),
        other => Err(unexpected(descriptor_type::CONFIG, &other)),
    }
}

fn unexpected(expected: u8, found: &Descriptor) -> ParseError {
    ParseError::UnexpectedType {
        expected,
        actual: found.descriptor_type(),
    }
}

/// Iterate over the descriptors packed in `buf`
pub fn descriptors(buf: &[u8]) -> Descriptors<'_> {
    Descriptors {
        remaining: buf,
        done: false,
    }
}

/// Iterator returned by [`descriptors`]
///
/// Yields one parse result per chunk and advances by the chunk's declared
/// length, so class-specific descriptors this crate does not model come out
/// as [`ParseError::UnknownDescriptorType`] without stopping the walk. A
/// chunk that cannot be advanced past (short header, bLength below 2 or past
/// the end of the buffer) yields its error once and ends iteration.
#[derive(Debug, Clone)]
pub struct Descriptors<'a> {
    remaining: &'a [u8],
    done: bool,
}

impl Iterator for Descriptors<'_> {
    type Item = Result<Descriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining.is_empty() {
            return None;
        }

        let result = parse(self.remaining);
        match header(self.remaining) {
            Ok((declared, _)) if declared >= HEADER_SIZE && declared <= self.remaining.len() => {
                self.remaining = &self.remaining[declared..];
            }
            _ => self.done = true,
        }

        Some(result)
    }
}
