//! Device model and enumeration results

use crate::context::Context;
use crate::error::{Error, Result};
use crate::filter::DeviceFilter;
use crate::handle::Handle;
use common::{DeviceRef, HostError, ListId, MAX_PORT_DEPTH, Speed, UsbHost, negative_is_error};
use descriptor::{DeviceDescriptor, parse_device};
use std::fmt;
use tracing::{debug, warn};

/// Snapshot of one attached device
///
/// Bus position, speed and the device descriptor are read once when the
/// device is enumerated and never refreshed.
pub struct Device<'ctx, H: UsbHost> {
    context: &'ctx Context<H>,
    device: DeviceRef,
    bus: u8,
    port: u8,
    address: u8,
    speed: Speed,
    descriptor: DeviceDescriptor,
}

impl<'ctx, H: UsbHost> Device<'ctx, H> {
    pub(crate) fn snapshot(context: &'ctx Context<H>, device: DeviceRef) -> Result<Self> {
        let host = context.host();
        let raw = host.device_descriptor(device)?;
        let descriptor = parse_device(&raw)?;

        Ok(Self {
            context,
            device,
            bus: host.bus_number(device),
            port: host.port_number(device),
            address: host.address(device),
            speed: host.speed(device),
            descriptor,
        })
    }

    pub fn context(&self) -> &'ctx Context<H> {
        self.context
    }

    pub fn device_ref(&self) -> DeviceRef {
        self.device
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn vendor_id(&self) -> u16 {
        self.descriptor.vendor_id()
    }

    pub fn product_id(&self) -> u16 {
        self.descriptor.product_id()
    }

    /// Exact match on both vendor and product id
    pub fn matches_identity(&self, vendor_id: u16, product_id: u16) -> bool {
        self.descriptor.matches_identity(vendor_id, product_id)
    }

    /// Hub ports from the root hub down to this device
    pub fn port_numbers(&self) -> Result<Vec<u8>> {
        let mut ports = [0u8; MAX_PORT_DEPTH];
        let status = self.context.host().port_numbers(self.device, &mut ports);
        let count = negative_is_error(status)?;
        Ok(ports[..count.min(MAX_PORT_DEPTH)].to_vec())
    }

    /// The hub this device hangs off, `None` for root hubs
    pub fn parent(&self) -> Option<Device<'ctx, H>> {
        let parent = self.context.host().parent_device(self.device)?;
        match Device::snapshot(self.context, parent) {
            Ok(device) => Some(device),
            Err(e) => {
                warn!("Cannot read parent of {}: {}", self, e);
                None
            }
        }
    }

    /// wMaxPacketSize of `endpoint` in the active configuration
    pub fn max_packet_size(&self, endpoint: u8) -> Result<u16> {
        let status = self.context.host().max_packet_size(self.device, endpoint);
        let size = negative_is_error(status)?;
        u16::try_from(size).map_err(|_| Error::Host(HostError::Overflow))
    }

    pub fn open(&self) -> Result<Handle<'ctx, H>> {
        let id = self.context.host().open(self.device).inspect_err(|e| {
            warn!("Failed to open {}: {}", self, e);
        })?;
        debug!("Opened {} as {:?}", self, id);
        Handle::new(self.clone(), id)
    }
}

impl<H: UsbHost> Clone for Device<'_, H> {
    fn clone(&self) -> Self {
        Self {
            context: self.context,
            device: self.device,
            bus: self.bus,
            port: self.port,
            address: self.address,
            speed: self.speed,
            descriptor: self.descriptor,
        }
    }
}

impl<H: UsbHost> fmt::Display for Device<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bus {:03} Port {:03} Address {:03} ID {:04x}:{:04x}",
            self.bus,
            self.port,
            self.address,
            self.vendor_id(),
            self.product_id()
        )
    }
}

impl<H: UsbHost> fmt::Debug for Device<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("device", &self.device)
            .field("bus", &self.bus)
            .field("port", &self.port)
            .field("address", &self.address)
            .field("speed", &self.speed)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Result of one enumeration
///
/// The host keeps the listed devices alive until the list is released,
/// either by [`DeviceList::release`] or on drop.
pub struct DeviceList<'ctx, H: UsbHost> {
    context: &'ctx Context<H>,
    id: ListId,
    devices: Vec<Device<'ctx, H>>,
    released: bool,
}

impl<'ctx, H: UsbHost> DeviceList<'ctx, H> {
    pub(crate) fn new(
        context: &'ctx Context<H>,
        id: ListId,
        devices: Vec<Device<'ctx, H>>,
    ) -> Self {
        Self {
            context,
            id,
            devices,
            released: false,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Device<'ctx, H>> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// First device matching `vendor_id:product_id`
    pub fn find(&self, vendor_id: u16, product_id: u16) -> Option<&Device<'ctx, H>> {
        self.devices
            .iter()
            .find(|d| d.matches_identity(vendor_id, product_id))
    }

    /// Devices allowed by `filters`; an empty slice allows all of them
    pub fn filtered<'a>(
        &'a self,
        filters: &'a [DeviceFilter],
    ) -> impl Iterator<Item = &'a Device<'ctx, H>> + 'a {
        self.devices
            .iter()
            .filter(move |d| DeviceFilter::allows(filters, d.vendor_id(), d.product_id()))
    }

    /// Devices allowed by the context's configured filters
    pub fn allowed(&self) -> impl Iterator<Item = &Device<'ctx, H>> + '_ {
        self.filtered(self.context.filters())
    }

    pub fn release(mut self) {
        self.free();
    }

    fn free(&mut self) {
        if !self.released {
            self.released = true;
            self.context.host().free_device_list(self.id);
        }
    }
}

impl<H: UsbHost> fmt::Debug for DeviceList<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceList")
            .field("id", &self.id)
            .field("devices", &self.devices)
            .field("released", &self.released)
            .finish()
    }
}

impl<H: UsbHost> Drop for DeviceList<'_, H> {
    fn drop(&mut self) {
        self.free();
    }
}

impl<'a, 'ctx, H: UsbHost> IntoIterator for &'a DeviceList<'ctx, H> {
    type Item = &'a Device<'ctx, H>;
    type IntoIter = std::slice::Iter<'a, Device<'ctx, H>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
