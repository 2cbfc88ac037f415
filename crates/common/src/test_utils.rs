//! Test utilities for usbkit
//!
//! Provides a scripted, call-recording [`UsbHost`] and helpers that build raw
//! descriptor bytes for tests across crates.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{HostCall, StubDevice, StubHost};
//! use common::UsbHost;
//!
//! let host = StubHost::new().with_device(StubDevice::new(0x1234, 0x5678));
//! let list = host.enumerate_devices().unwrap();
//! assert_eq!(list.devices.len(), 1);
//! assert_eq!(host.calls(), vec![HostCall::EnumerateDevices]);
//! ```

use crate::error::HostError;
use crate::host::{DeviceRef, HandleId, ListId, RawDeviceList, Speed, UsbHost};
use descriptor::DEVICE_DESCRIPTOR_SIZE;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Build a standard 18-byte device descriptor
///
/// String indices are 1 (manufacturer), 2 (product) and 3 (serial number).
pub fn create_mock_device_descriptor(
    vendor_id: u16,
    product_id: u16,
) -> [u8; DEVICE_DESCRIPTOR_SIZE] {
    let [vid_lo, vid_hi] = vendor_id.to_le_bytes();
    let [pid_lo, pid_hi] = product_id.to_le_bytes();
    [
        0x12, // bLength
        0x01, // bDescriptorType (Device)
        0x00, 0x02, // bcdUSB (2.00)
        0x00, // bDeviceClass
        0x00, // bDeviceSubClass
        0x00, // bDeviceProtocol
        0x40, // bMaxPacketSize0 (64 bytes)
        vid_lo, vid_hi, // idVendor
        pid_lo, pid_hi, // idProduct
        0x00, 0x01, // bcdDevice (1.00)
        0x01, // iManufacturer
        0x02, // iProduct
        0x03, // iSerialNumber
        0x01, // bNumConfigurations
    ]
}

/// Build a configuration block with one vendor interface and a bulk
/// endpoint pair (EP1 IN, EP2 OUT)
pub fn create_mock_config_descriptor() -> Vec<u8> {
    vec![
        // Configuration descriptor
        0x09, // bLength
        0x02, // bDescriptorType (Configuration)
        0x20, 0x00, // wTotalLength (32 bytes)
        0x01, // bNumInterfaces
        0x01, // bConfigurationValue
        0x00, // iConfiguration
        0x80, // bmAttributes (Bus-powered)
        0x32, // bMaxPower (100mA)
        // Interface descriptor
        0x09, // bLength
        0x04, // bDescriptorType (Interface)
        0x00, // bInterfaceNumber
        0x00, // bAlternateSetting
        0x02, // bNumEndpoints
        0xFF, // bInterfaceClass (Vendor-specific)
        0x00, // bInterfaceSubClass
        0x00, // bInterfaceProtocol
        0x00, // iInterface
        // Endpoint descriptor
        0x07, // bLength
        0x05, // bDescriptorType (Endpoint)
        0x81, // bEndpointAddress (EP1 IN)
        0x02, // bmAttributes (Bulk)
        0x00, 0x02, // wMaxPacketSize (512 bytes)
        0x00, // bInterval
        // Endpoint descriptor
        0x07, // bLength
        0x05, // bDescriptorType (Endpoint)
        0x02, // bEndpointAddress (EP2 OUT)
        0x02, // bmAttributes (Bulk)
        0x00, 0x02, // wMaxPacketSize (512 bytes)
        0x00, // bInterval
    ]
}

/// Build a string descriptor holding `text` as UTF-16LE
pub fn create_mock_string_descriptor(text: &str) -> Vec<u8> {
    let mut bytes = vec![0, 0x03];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes[0] = bytes.len() as u8;
    bytes
}

/// Create mock bulk transfer data of specified size
pub fn create_mock_bulk_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i & 0xFF) as u8).collect()
}

/// One device known to a [`StubHost`]
#[derive(Debug, Clone)]
pub struct StubDevice {
    pub bus: u8,
    pub port: u8,
    pub address: u8,
    pub speed: Speed,
    pub descriptor: [u8; DEVICE_DESCRIPTOR_SIZE],
    /// Hub port chain from the root
    pub ports: Vec<u8>,
    /// Index of the parent device in the stub's device table
    pub parent: Option<usize>,
    /// wMaxPacketSize per endpoint address
    pub max_packet_sizes: HashMap<u8, u16>,
}

impl StubDevice {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            bus: 1,
            port: 1,
            address: 2,
            speed: Speed::High,
            descriptor: create_mock_device_descriptor(vendor_id, product_id),
            ports: vec![1],
            parent: None,
            max_packet_sizes: HashMap::new(),
        }
    }

    pub fn at(mut self, bus: u8, port: u8, address: u8) -> Self {
        self.bus = bus;
        self.port = port;
        self.address = address;
        self
    }

    pub fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_ports(mut self, ports: Vec<u8>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_string_indices(mut self, manufacturer: u8, product: u8, serial: u8) -> Self {
        self.descriptor[14] = manufacturer;
        self.descriptor[15] = product;
        self.descriptor[16] = serial;
        self
    }

    pub fn with_max_packet_size(mut self, endpoint: u8, size: u16) -> Self {
        self.max_packet_sizes.insert(endpoint, size);
        self
    }
}

/// A host call as recorded by [`StubHost`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    EnumerateDevices,
    FreeDeviceList(ListId),
    PortNumbers(DeviceRef),
    MaxPacketSize(DeviceRef, u8),
    Open(DeviceRef),
    Close(HandleId),
    ClaimInterface(HandleId, u8),
    ReleaseInterface(HandleId, u8),
    ResetDevice(HandleId),
    KernelDriverActive(HandleId, u8),
    DetachKernelDriver(HandleId, u8),
    AttachKernelDriver(HandleId, u8),
    SetAutoDetachKernelDriver(HandleId, bool),
    ReadControl {
        handle: HandleId,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        length: usize,
        timeout: Duration,
    },
    WriteControl {
        handle: HandleId,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: Vec<u8>,
        timeout: Duration,
    },
    ReadBulk {
        handle: HandleId,
        endpoint: u8,
        length: usize,
        timeout: Duration,
    },
    WriteBulk {
        handle: HandleId,
        endpoint: u8,
        data: Vec<u8>,
        timeout: Duration,
    },
    ReadInterrupt {
        handle: HandleId,
        endpoint: u8,
        length: usize,
        timeout: Duration,
    },
    WriteInterrupt {
        handle: HandleId,
        endpoint: u8,
        data: Vec<u8>,
        timeout: Duration,
    },
    GetDescriptor {
        handle: HandleId,
        descriptor_type: u8,
        index: u8,
        length: usize,
    },
    GetStringDescriptor {
        handle: HandleId,
        index: u8,
        lang_id: u16,
        length: usize,
    },
    Exit,
}

#[derive(Debug, Default)]
struct StubState {
    devices: Vec<StubDevice>,
    calls: Vec<HostCall>,
    next_list: u32,
    next_handle: u32,
    open_handles: Vec<HandleId>,

    enumerate_error: Option<HostError>,
    open_error: Option<HostError>,
    port_status: Option<i32>,
    interface_status: i32,
    kernel_driver_active: i32,

    control_response: Vec<u8>,
    control_status: Option<i32>,
    bulk_response: Vec<u8>,
    bulk_status: i32,
    interrupt_response: Vec<u8>,
    interrupt_status: i32,
    descriptors: HashMap<(u8, u8), Vec<u8>>,
    descriptor_status: Option<i32>,
    string_response: Vec<u8>,
    string_status: Option<i32>,
}

/// Scripted [`UsbHost`] that records every call it receives
///
/// Reads copy the scripted response into the caller's buffer and report the
/// copied length unless a status override is set. Writes report the full
/// payload length. Status overrides are returned verbatim, so tests can feed
/// any code (negative, zero or positive) through the layer above.
#[derive(Debug, Default)]
pub struct StubHost {
    state: Mutex<StubState>,
}

fn fill(buf: &mut [u8], response: &[u8]) -> usize {
    let n = response.len().min(buf.len());
    buf[..n].copy_from_slice(&response[..n]);
    n
}

impl StubHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: HostCall) {
        self.state().calls.push(call);
    }

    pub fn with_device(self, device: StubDevice) -> Self {
        self.state().devices.push(device);
        self
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<HostCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Handles opened and not yet closed
    pub fn open_handles(&self) -> Vec<HandleId> {
        self.state().open_handles.clone()
    }

    pub fn set_enumerate_error(&self, error: HostError) {
        self.state().enumerate_error = Some(error);
    }

    pub fn set_open_error(&self, error: HostError) {
        self.state().open_error = Some(error);
    }

    pub fn set_port_status(&self, status: i32) {
        self.state().port_status = Some(status);
    }

    /// Status returned by interface, reset and kernel-driver calls
    pub fn set_interface_status(&self, status: i32) {
        self.state().interface_status = status;
    }

    pub fn set_kernel_driver_active(&self, active: i32) {
        self.state().kernel_driver_active = active;
    }

    pub fn set_control_response(&self, data: &[u8]) {
        self.state().control_response = data.to_vec();
    }

    pub fn set_control_status(&self, status: i32) {
        self.state().control_status = Some(status);
    }

    pub fn set_bulk_result(&self, data: &[u8], status: i32) {
        let mut state = self.state();
        state.bulk_response = data.to_vec();
        state.bulk_status = status;
    }

    pub fn set_interrupt_result(&self, data: &[u8], status: i32) {
        let mut state = self.state();
        state.interrupt_response = data.to_vec();
        state.interrupt_status = status;
    }

    pub fn set_descriptor(&self, descriptor_type: u8, index: u8, data: &[u8]) {
        self.state()
            .descriptors
            .insert((descriptor_type, index), data.to_vec());
    }

    pub fn set_descriptor_status(&self, status: i32) {
        self.state().descriptor_status = Some(status);
    }

    pub fn set_string_response(&self, data: &[u8]) {
        self.state().string_response = data.to_vec();
    }

    pub fn set_string_status(&self, status: i32) {
        self.state().string_status = Some(status);
    }

    fn device(&self, device: DeviceRef) -> Option<StubDevice> {
        self.state().devices.get(device.0 as usize).cloned()
    }
}

impl UsbHost for StubHost {
    fn enumerate_devices(&self) -> Result<RawDeviceList, HostError> {
        self.record(HostCall::EnumerateDevices);
        let mut state = self.state();
        if let Some(err) = state.enumerate_error {
            return Err(err);
        }
        state.next_list += 1;
        Ok(RawDeviceList {
            id: ListId(state.next_list),
            devices: (0..state.devices.len() as u32).map(DeviceRef).collect(),
        })
    }

    fn free_device_list(&self, list: ListId) {
        self.record(HostCall::FreeDeviceList(list));
    }

    fn device_descriptor(
        &self,
        device: DeviceRef,
    ) -> Result<[u8; DEVICE_DESCRIPTOR_SIZE], HostError> {
        self.device(device)
            .map(|d| d.descriptor)
            .ok_or(HostError::NoDevice)
    }

    fn bus_number(&self, device: DeviceRef) -> u8 {
        self.device(device).map_or(0, |d| d.bus)
    }

    fn port_number(&self, device: DeviceRef) -> u8 {
        self.device(device).map_or(0, |d| d.port)
    }

    fn address(&self, device: DeviceRef) -> u8 {
        self.device(device).map_or(0, |d| d.address)
    }

    fn speed(&self, device: DeviceRef) -> Speed {
        self.device(device).map_or(Speed::Unknown, |d| d.speed)
    }

    fn port_numbers(&self, device: DeviceRef, ports: &mut [u8]) -> i32 {
        self.record(HostCall::PortNumbers(device));
        if let Some(status) = self.state().port_status {
            return status;
        }
        match self.device(device) {
            Some(d) if d.ports.len() > ports.len() => HostError::Overflow.code(),
            Some(d) => fill(ports, &d.ports) as i32,
            None => HostError::NoDevice.code(),
        }
    }

    fn parent_device(&self, device: DeviceRef) -> Option<DeviceRef> {
        self.device(device)
            .and_then(|d| d.parent)
            .map(|index| DeviceRef(index as u32))
    }

    fn max_packet_size(&self, device: DeviceRef, endpoint: u8) -> i32 {
        self.record(HostCall::MaxPacketSize(device, endpoint));
        match self.device(device) {
            Some(d) => d
                .max_packet_sizes
                .get(&endpoint)
                .map_or(HostError::NotFound.code(), |&size| i32::from(size)),
            None => HostError::NoDevice.code(),
        }
    }

    fn open(&self, device: DeviceRef) -> Result<HandleId, HostError> {
        self.record(HostCall::Open(device));
        let mut state = self.state();
        if let Some(err) = state.open_error {
            return Err(err);
        }
        if device.0 as usize >= state.devices.len() {
            return Err(HostError::NoDevice);
        }
        state.next_handle += 1;
        let handle = HandleId(state.next_handle);
        state.open_handles.push(handle);
        Ok(handle)
    }

    fn close(&self, handle: HandleId) {
        self.record(HostCall::Close(handle));
        self.state().open_handles.retain(|h| *h != handle);
    }

    fn claim_interface(&self, handle: HandleId, interface: u8) -> i32 {
        self.record(HostCall::ClaimInterface(handle, interface));
        self.state().interface_status
    }

    fn release_interface(&self, handle: HandleId, interface: u8) -> i32 {
        self.record(HostCall::ReleaseInterface(handle, interface));
        self.state().interface_status
    }

    fn reset_device(&self, handle: HandleId) -> i32 {
        self.record(HostCall::ResetDevice(handle));
        self.state().interface_status
    }

    fn kernel_driver_active(&self, handle: HandleId, interface: u8) -> i32 {
        self.record(HostCall::KernelDriverActive(handle, interface));
        let state = self.state();
        if state.interface_status < 0 {
            state.interface_status
        } else {
            state.kernel_driver_active
        }
    }

    fn detach_kernel_driver(&self, handle: HandleId, interface: u8) -> i32 {
        self.record(HostCall::DetachKernelDriver(handle, interface));
        self.state().interface_status
    }

    fn attach_kernel_driver(&self, handle: HandleId, interface: u8) -> i32 {
        self.record(HostCall::AttachKernelDriver(handle, interface));
        self.state().interface_status
    }

    fn set_auto_detach_kernel_driver(&self, handle: HandleId, enable: bool) -> i32 {
        self.record(HostCall::SetAutoDetachKernelDriver(handle, enable));
        self.state().interface_status
    }

    fn read_control(
        &self,
        handle: HandleId,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> i32 {
        self.record(HostCall::ReadControl {
            handle,
            request_type,
            request,
            value,
            index,
            length: buf.len(),
            timeout,
        });
        let state = self.state();
        let n = fill(buf, &state.control_response);
        state.control_status.unwrap_or(n as i32)
    }

    fn write_control(
        &self,
        handle: HandleId,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> i32 {
        self.record(HostCall::WriteControl {
            handle,
            request_type,
            request,
            value,
            index,
            data: data.to_vec(),
            timeout,
        });
        self.state().control_status.unwrap_or(data.len() as i32)
    }

    fn read_bulk(
        &self,
        handle: HandleId,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> (usize, i32) {
        self.record(HostCall::ReadBulk {
            handle,
            endpoint,
            length: buf.len(),
            timeout,
        });
        let state = self.state();
        (fill(buf, &state.bulk_response), state.bulk_status)
    }

    fn write_bulk(
        &self,
        handle: HandleId,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> (usize, i32) {
        self.record(HostCall::WriteBulk {
            handle,
            endpoint,
            data: data.to_vec(),
            timeout,
        });
        (data.len(), self.state().bulk_status)
    }

    fn read_interrupt(
        &self,
        handle: HandleId,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> (usize, i32) {
        self.record(HostCall::ReadInterrupt {
            handle,
            endpoint,
            length: buf.len(),
            timeout,
        });
        let state = self.state();
        (fill(buf, &state.interrupt_response), state.interrupt_status)
    }

    fn write_interrupt(
        &self,
        handle: HandleId,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> (usize, i32) {
        self.record(HostCall::WriteInterrupt {
            handle,
            endpoint,
            data: data.to_vec(),
            timeout,
        });
        (data.len(), self.state().interrupt_status)
    }

    fn get_descriptor_raw(
        &self,
        handle: HandleId,
        descriptor_type: u8,
        index: u8,
        buf: &mut [u8],
    ) -> i32 {
        self.record(HostCall::GetDescriptor {
            handle,
            descriptor_type,
            index,
            length: buf.len(),
        });
        let state = self.state();
        if let Some(status) = state.descriptor_status {
            return status;
        }
        match state.descriptors.get(&(descriptor_type, index)) {
            Some(data) => fill(buf, data) as i32,
            // Devices stall unsupported GET_DESCRIPTOR requests
            None => HostError::Pipe.code(),
        }
    }

    fn get_string_descriptor_raw(
        &self,
        handle: HandleId,
        index: u8,
        lang_id: u16,
        buf: &mut [u8],
    ) -> i32 {
        self.record(HostCall::GetStringDescriptor {
            handle,
            index,
            lang_id,
            length: buf.len(),
        });
        let state = self.state();
        let n = fill(buf, &state.string_response);
        state.string_status.unwrap_or(n as i32)
    }

    fn exit(&self) {
        self.record(HostCall::Exit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use descriptor::{Descriptor, descriptors, parse};

    #[test]
    fn test_mock_device_descriptor_parses() {
        let raw = create_mock_device_descriptor(0x1234, 0x5678);
        let Ok(Descriptor::Device(desc)) = parse(&raw) else {
            panic!("mock device descriptor must parse");
        };
        assert_eq!(desc.vendor_id(), 0x1234);
        assert_eq!(desc.product_id(), 0x5678);
    }

    #[test]
    fn test_mock_config_descriptor_is_consistent() {
        let block = create_mock_config_descriptor();
        let parsed: Vec<_> = descriptors(&block).collect::<Result<_, _>>().unwrap();
        let Descriptor::Configuration(config) = &parsed[0] else {
            panic!("block must start with a configuration descriptor");
        };
        assert_eq!(usize::from(config.total_length()), block.len());
        assert_eq!(parsed.len(), 4);
    }

    #[test]
    fn test_mock_string_descriptor() {
        assert_eq!(
            create_mock_string_descriptor("AB"),
            vec![0x06, 0x03, 0x41, 0x00, 0x42, 0x00]
        );
    }

    #[test]
    fn test_stub_records_calls_in_order() {
        let host = StubHost::new().with_device(StubDevice::new(0x1234, 0x5678));
        let list = host.enumerate_devices().unwrap();
        let handle = host.open(list.devices[0]).unwrap();
        host.close(handle);
        host.free_device_list(list.id);

        assert_eq!(
            host.calls(),
            vec![
                HostCall::EnumerateDevices,
                HostCall::Open(DeviceRef(0)),
                HostCall::Close(handle),
                HostCall::FreeDeviceList(list.id),
            ]
        );
        assert!(host.open_handles().is_empty());
    }

    #[test]
    fn test_stub_read_copies_response() {
        let host = StubHost::new().with_device(StubDevice::new(0x1234, 0x5678));
        host.set_bulk_result(&[1, 2, 3], 0);

        let mut buf = [0u8; 2];
        let (n, status) = host.read_bulk(HandleId(1), 0x81, &mut buf, Duration::ZERO);
        assert_eq!((n, status), (2, 0));
        assert_eq!(buf, [1, 2]);
    }

    #[test]
    fn test_stub_missing_descriptor_stalls() {
        let host = StubHost::new();
        let mut buf = [0u8; 16];
        assert_eq!(
            host.get_descriptor_raw(HandleId(1), 0x0F, 0, &mut buf),
            HostError::Pipe.code()
        );
    }
}
