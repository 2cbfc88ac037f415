//! Transfer dispatch
//!
//! Control, bulk and interrupt transfers plus descriptor fetches, all as
//! methods on [`Handle`]. Every transfer has a `_timeout` variant; the plain
//! variant uses the handle's default timeout.
//!
//! The two transfer families read host statuses differently. Control
//! transfers and descriptor fetches return a byte count or a negative
//! status, so only negative values fail. Bulk and interrupt transfers return
//! the byte count separately and fail on any non-zero status.

use crate::error::{Error, Result};
use crate::handle::Handle;
use common::{HostError, UsbHost, negative_is_error, nonzero_is_error};
use descriptor::{
    CONFIG_DESCRIPTOR_SIZE, Direction, ENDPOINT_DIR_MASK, ENDPOINT_NUMBER_MASK, ParseError,
    Recipient, RequestKind, descriptor_type, parse_configuration, request_type,
};
use std::time::Duration;
use tracing::{debug, warn};

/// Buffer size for [`Handle::get_descriptor`]
pub const DESCRIPTOR_BUFFER_SIZE: usize = 1024;

/// Buffer size for string descriptor fetches
pub const STRING_BUFFER_SIZE: usize = 256;

const VENDOR_IN: u8 = request_type(Direction::In, RequestKind::Vendor, Recipient::Device);
const VENDOR_OUT: u8 = request_type(Direction::Out, RequestKind::Vendor, Recipient::Device);

/// Endpoint address with the number masked to 4 bits and `direction` forced
pub fn endpoint_address(endpoint: u8, direction: Direction) -> u8 {
    (endpoint & ENDPOINT_NUMBER_MASK) | direction.bits()
}

/// Decode a string descriptor fetched from a device
///
/// Bytes after the two-byte header are little-endian UTF-16 code units.
/// Unpaired surrogates become U+FFFD and a trailing odd byte is ignored.
/// Fewer than four bytes decode to an empty string.
pub fn decode_string_descriptor(bytes: &[u8]) -> String {
    if bytes.len() < 4 {
        return String::new();
    }

    let payload = &bytes[2..];
    let units = payload
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));

    let mut text = String::with_capacity(payload.len() * 2);
    text.extend(char::decode_utf16(units).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)));
    text
}

fn check_length(len: usize) -> Result<()> {
    if len > usize::from(u16::MAX) {
        return Err(Error::Host(HostError::InvalidParam));
    }
    Ok(())
}

/// Data stage of a control transfer
enum DataStage<'a> {
    In(&'a mut [u8]),
    Out(&'a [u8]),
}

impl DataStage<'_> {
    fn len(&self) -> usize {
        match self {
            DataStage::In(buf) => buf.len(),
            DataStage::Out(data) => data.len(),
        }
    }
}

impl<H: UsbHost> Handle<'_, H> {
    fn control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        stage: DataStage<'_>,
        timeout: Duration,
    ) -> Result<usize> {
        check_length(stage.len())?;

        debug!(
            "Control transfer: request_type={:#x}, request={:#x}, value={:#x}, index={:#x}, data_len={}, timeout={}ms",
            request_type,
            request,
            value,
            index,
            stage.len(),
            timeout.as_millis()
        );

        let status = match stage {
            DataStage::In(buf) => self
                .host()
                .read_control(self.id(), request_type, request, value, index, buf, timeout),
            DataStage::Out(data) => self
                .host()
                .write_control(self.id(), request_type, request, value, index, data, timeout),
        };

        negative_is_error(status).map_err(|e| {
            warn!("Control transfer failed: {}", e);
            Error::Host(e)
        })
    }

    /// Control transfer on endpoint 0 using the handle's timeout
    ///
    /// Bit 7 of `request_type` picks the direction: IN fills `buf`, OUT
    /// sends it. Returns the number of bytes transferred.
    pub fn control_transfer(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize> {
        self.control_transfer_timeout(request_type, request, value, index, buf, self.timeout())
    }

    pub fn control_transfer_timeout(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize> {
        let stage = if request_type & ENDPOINT_DIR_MASK != 0 {
            DataStage::In(buf)
        } else {
            DataStage::Out(buf)
        };
        self.control(request_type, request, value, index, stage, timeout)
    }

    /// Vendor request, device to host
    pub fn control_read(
        &self,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize> {
        self.control_transfer(VENDOR_IN, request, value, index, buf)
    }

    /// Vendor request, host to device
    pub fn control_write(
        &self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize> {
        let stage = DataStage::Out(data);
        self.control(VENDOR_OUT, request, value, index, stage, self.timeout())
    }

    /// Vendor request without a data stage
    pub fn command(&self, request: u8, value: u16, index: u16) -> Result<()> {
        self.control_write(request, value, index, &[])?;
        Ok(())
    }

    pub fn bulk_read(&self, endpoint: u8, buf: &mut [u8]) -> Result<usize> {
        self.bulk_read_timeout(endpoint, buf, self.timeout())
    }

    pub fn bulk_read_timeout(
        &self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize> {
        let address = endpoint_address(endpoint, Direction::In);
        debug!(
            "Bulk IN: endpoint={:#x}, buffer_len={}, timeout={}ms",
            address,
            buf.len(),
            timeout.as_millis()
        );
        let (len, status) = self.host().read_bulk(self.id(), address, buf, timeout);
        finish("Bulk IN", address, len, status)
    }

    pub fn bulk_write(&self, endpoint: u8, data: &[u8]) -> Result<usize> {
        self.bulk_write_timeout(endpoint, data, self.timeout())
    }

    pub fn bulk_write_timeout(
        &self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize> {
        let address = endpoint_address(endpoint, Direction::Out);
        debug!(
            "Bulk OUT: endpoint={:#x}, data_len={}, timeout={}ms",
            address,
            data.len(),
            timeout.as_millis()
        );
        let (len, status) = self.host().write_bulk(self.id(), address, data, timeout);
        finish("Bulk OUT", address, len, status)
    }

    pub fn interrupt_read(&self, endpoint: u8, buf: &mut [u8]) -> Result<usize> {
        self.interrupt_read_timeout(endpoint, buf, self.timeout())
    }

    pub fn interrupt_read_timeout(
        &self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize> {
        let address = endpoint_address(endpoint, Direction::In);
        debug!(
            "Interrupt IN: endpoint={:#x}, buffer_len={}, timeout={}ms",
            address,
            buf.len(),
            timeout.as_millis()
        );
        let (len, status) = self.host().read_interrupt(self.id(), address, buf, timeout);
        finish("Interrupt IN", address, len, status)
    }

    pub fn interrupt_write(&self, endpoint: u8, data: &[u8]) -> Result<usize> {
        self.interrupt_write_timeout(endpoint, data, self.timeout())
    }

    pub fn interrupt_write_timeout(
        &self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize> {
        let address = endpoint_address(endpoint, Direction::Out);
        debug!(
            "Interrupt OUT: endpoint={:#x}, data_len={}, timeout={}ms",
            address,
            data.len(),
            timeout.as_millis()
        );
        let (len, status) = self.host().write_interrupt(self.id(), address, data, timeout);
        finish("Interrupt OUT", address, len, status)
    }

    /// GET_DESCRIPTOR into `buf`, returning the filled prefix
    pub fn get_descriptor_into<'b>(
        &self,
        descriptor_type: u8,
        index: u8,
        buf: &'b mut [u8],
    ) -> Result<&'b [u8]> {
        let status = self
            .host()
            .get_descriptor_raw(self.id(), descriptor_type, index, buf);
        let len = negative_is_error(status).map_err(|e| {
            warn!(
                "GET_DESCRIPTOR type={:#x} index={} failed: {}",
                descriptor_type, index, e
            );
            Error::Host(e)
        })?;
        Ok(&buf[..len.min(buf.len())])
    }

    pub fn get_descriptor(&self, descriptor_type: u8, index: u8) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; DESCRIPTOR_BUFFER_SIZE];
        let len = self.get_descriptor_into(descriptor_type, index, &mut buf)?.len();
        buf.truncate(len);
        Ok(buf)
    }

    /// Full configuration block: the configuration descriptor followed by
    /// its interface, endpoint and class-specific descriptors
    pub fn get_config_descriptor_block(&self, config_index: u8) -> Result<Vec<u8>> {
        let mut block = self.get_descriptor(descriptor_type::CONFIG, config_index)?;
        let total = usize::from(parse_configuration(&block)?.total_length());
        if total < CONFIG_DESCRIPTOR_SIZE {
            return Err(ParseError::LengthMismatch {
                descriptor_type: descriptor_type::CONFIG,
                expected: CONFIG_DESCRIPTOR_SIZE,
                actual: total,
            }
            .into());
        }

        if total > block.len() {
            debug!(
                "Configuration {} is {} bytes, fetching again",
                config_index, total
            );
            block = vec![0u8; total];
            let len = self
                .get_descriptor_into(descriptor_type::CONFIG, config_index, &mut block)?
                .len();
            block.truncate(len);
        } else {
            block.truncate(total);
        }
        Ok(block)
    }

    /// Fetch and decode string descriptor `index`
    ///
    /// Index 0 means "no string" and returns an empty string without
    /// touching the bus.
    pub fn get_string_descriptor(&self, index: u8, lang_id: u16) -> Result<String> {
        if index == 0 {
            return Ok(String::new());
        }

        let mut buf = [0u8; STRING_BUFFER_SIZE];
        let status = self
            .host()
            .get_string_descriptor_raw(self.id(), index, lang_id, &mut buf);
        let len = negative_is_error(status).map_err(|e| {
            warn!("String descriptor {} failed: {}", index, e);
            Error::Host(e)
        })?;

        Ok(decode_string_descriptor(&buf[..len.min(buf.len())]))
    }

    pub fn manufacturer_string(&self) -> Result<String> {
        let index = self.device().descriptor().manufacturer_string_index();
        self.get_string_descriptor(index, 0)
    }

    pub fn product_string(&self) -> Result<String> {
        let index = self.device().descriptor().product_string_index();
        self.get_string_descriptor(index, 0)
    }

    pub fn serial_number_string(&self) -> Result<String> {
        let index = self.device().descriptor().serial_number_string_index();
        self.get_string_descriptor(index, 0)
    }
}

fn finish(kind: &str, endpoint: u8, len: usize, status: i32) -> Result<usize> {
    match nonzero_is_error(status) {
        Ok(()) => {
            debug!("{} {:#x} succeeded: {} bytes", kind, endpoint, len);
            Ok(len)
        }
        Err(e) => {
            warn!("{} {:#x} failed after {} bytes: {}", kind, endpoint, len, e);
            Err(Error::Host(e))
        }
    }
}
