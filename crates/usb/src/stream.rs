//! Endpoint streams
//!
//! Streams bind a handle to fixed endpoints so callers can move data with
//! [`std::io::Read`] and [`std::io::Write`]. Each stream copies the handle's
//! timeout when it is created and keeps its own copy from then on.

use crate::error::{CapabilityError, Result};
use crate::handle::Handle;
use bitflags::bitflags;
use common::UsbHost;
use std::io;
use std::time::Duration;

bitflags! {
    /// Directions a stream is allowed to move data in
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StreamCaps: u8 {
        const READ = 0b01;
        const WRITE = 0b10;
    }
}

/// Bulk endpoint pair, possibly restricted to one direction
pub struct BulkStream<'h, 'ctx, H: UsbHost> {
    handle: &'h Handle<'ctx, H>,
    endpoint_in: u8,
    endpoint_out: u8,
    caps: StreamCaps,
    timeout: Duration,
}

impl<'h, 'ctx, H: UsbHost> BulkStream<'h, 'ctx, H> {
    fn new(
        handle: &'h Handle<'ctx, H>,
        endpoint_in: u8,
        endpoint_out: u8,
        caps: StreamCaps,
    ) -> Self {
        Self {
            handle,
            endpoint_in,
            endpoint_out,
            caps,
            timeout: handle.timeout(),
        }
    }

    pub fn caps(&self) -> StreamCaps {
        self.caps
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Bulk IN from the stream's input endpoint
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        if !self.caps.contains(StreamCaps::READ) {
            return Err(CapabilityError::CannotRead.into());
        }
        self.handle
            .bulk_read_timeout(self.endpoint_in, buf, self.timeout)
    }

    /// Bulk OUT to the stream's output endpoint
    pub fn send(&self, data: &[u8]) -> Result<usize> {
        if !self.caps.contains(StreamCaps::WRITE) {
            return Err(CapabilityError::CannotWrite.into());
        }
        self.handle
            .bulk_write_timeout(self.endpoint_out, data, self.timeout)
    }
}

impl<H: UsbHost> io::Read for BulkStream<'_, '_, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.recv(buf)?)
    }
}

impl<H: UsbHost> io::Write for BulkStream<'_, '_, H> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.send(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One interrupt endpoint number, usable in both directions
pub struct InterruptStream<'h, 'ctx, H: UsbHost> {
    handle: &'h Handle<'ctx, H>,
    endpoint: u8,
    timeout: Duration,
}

impl<'h, 'ctx, H: UsbHost> InterruptStream<'h, 'ctx, H> {
    pub fn endpoint(&self) -> u8 {
        self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        self.handle
            .interrupt_read_timeout(self.endpoint, buf, self.timeout)
    }

    pub fn send(&self, data: &[u8]) -> Result<usize> {
        self.handle
            .interrupt_write_timeout(self.endpoint, data, self.timeout)
    }
}

impl<H: UsbHost> io::Read for InterruptStream<'_, '_, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.recv(buf)?)
    }
}

impl<H: UsbHost> io::Write for InterruptStream<'_, '_, H> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.send(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'ctx, H: UsbHost> Handle<'ctx, H> {
    /// Read from `endpoint_in` and write to `endpoint_out`
    pub fn bulk_stream(&self, endpoint_in: u8, endpoint_out: u8) -> BulkStream<'_, 'ctx, H> {
        BulkStream::new(self, endpoint_in, endpoint_out, StreamCaps::all())
    }

    /// Read-only bulk stream
    pub fn bulk_reader(&self, endpoint: u8) -> BulkStream<'_, 'ctx, H> {
        BulkStream::new(self, endpoint, 0, StreamCaps::READ)
    }

    /// Write-only bulk stream
    pub fn bulk_writer(&self, endpoint: u8) -> BulkStream<'_, 'ctx, H> {
        BulkStream::new(self, 0, endpoint, StreamCaps::WRITE)
    }

    pub fn interrupt_stream(&self, endpoint: u8) -> InterruptStream<'_, 'ctx, H> {
        InterruptStream {
            handle: self,
            endpoint,
            timeout: self.timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caps() {
        assert_eq!(StreamCaps::all(), StreamCaps::READ | StreamCaps::WRITE);
        assert!(!StreamCaps::WRITE.contains(StreamCaps::READ));
    }
}
