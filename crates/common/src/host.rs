//! Host Interface boundary
//!
//! [`UsbHost`] is everything the USB layer needs from the native driver
//! stack: enumeration, open/close, topology queries and raw transfer
//! execution. Implementations own every native object in their own tables
//! and hand out the small copyable ids defined here, so the layer above never
//! touches a raw pointer.
//!
//! Transfer and query methods return raw libusb-style status codes rather
//! than `Result`s. Interpreting them is the caller's job because the rules
//! differ per transfer kind (see [`crate::negative_is_error`] and
//! [`crate::nonzero_is_error`]).

use crate::error::HostError;
use descriptor::DEVICE_DESCRIPTOR_SIZE;
use std::fmt;
use std::time::Duration;

/// Deepest hub chain USB allows between the root port and a device
pub const MAX_PORT_DEPTH: usize = 8;

/// Opaque reference to a device in the host's device table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceRef(pub u32);

/// Opaque id of one enumeration result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListId(pub u32);

/// Opaque id of an open device handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(pub u32);

/// Result of one enumeration pass
///
/// The host keeps the listed devices alive until
/// [`UsbHost::free_device_list`] is called with `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDeviceList {
    pub id: ListId,
    pub devices: Vec<DeviceRef>,
}

/// Negotiated link speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Speed {
    #[default]
    Unknown = 0,
    /// 1.5 Mbps (USB 1.0)
    Low = 1,
    /// 12 Mbps (USB 1.1)
    Full = 2,
    /// 480 Mbps (USB 2.0)
    High = 3,
    /// 5 Gbps (USB 3.0)
    Super = 4,
}

impl Speed {
    /// Map a libusb speed code, unknown codes become [`Speed::Unknown`]
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Speed::Low,
            2 => Speed::Full,
            3 => Speed::High,
            4 => Speed::Super,
            _ => Speed::Unknown,
        }
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Speed::Unknown => "unknown",
            Speed::Low => "low",
            Speed::Full => "full",
            Speed::High => "high",
            Speed::Super => "super",
        };
        f.write_str(name)
    }
}

/// The native USB driver stack as seen by the USB layer
///
/// All methods take `&self`; implementations must be safe to call from
/// several threads as long as each thread works on a distinct handle.
/// Timeouts of zero mean "no timeout / host default".
pub trait UsbHost: Send + Sync {
    /// Snapshot the devices currently attached
    fn enumerate_devices(&self) -> Result<RawDeviceList, HostError>;

    /// Release an enumeration result
    fn free_device_list(&self, list: ListId);

    /// Cached 18-byte device descriptor, no bus I/O
    fn device_descriptor(
        &self,
        device: DeviceRef,
    ) -> Result<[u8; DEVICE_DESCRIPTOR_SIZE], HostError>;

    fn bus_number(&self, device: DeviceRef) -> u8;

    fn port_number(&self, device: DeviceRef) -> u8;

    fn address(&self, device: DeviceRef) -> u8;

    fn speed(&self, device: DeviceRef) -> Speed;

    /// Fill `ports` with the hub port chain from the root; returns the count
    /// or a negative status
    fn port_numbers(&self, device: DeviceRef, ports: &mut [u8]) -> i32;

    fn parent_device(&self, device: DeviceRef) -> Option<DeviceRef>;

    /// wMaxPacketSize of `endpoint` in the active configuration, or a
    /// negative status
    fn max_packet_size(&self, device: DeviceRef, endpoint: u8) -> i32;

    fn open(&self, device: DeviceRef) -> Result<HandleId, HostError>;

    fn close(&self, handle: HandleId);

    fn claim_interface(&self, handle: HandleId, interface: u8) -> i32;

    fn release_interface(&self, handle: HandleId, interface: u8) -> i32;

    fn reset_device(&self, handle: HandleId) -> i32;

    /// 1 if a kernel driver is bound, 0 if not, negative on error
    fn kernel_driver_active(&self, handle: HandleId, interface: u8) -> i32;

    fn detach_kernel_driver(&self, handle: HandleId, interface: u8) -> i32;

    fn attach_kernel_driver(&self, handle: HandleId, interface: u8) -> i32;

    fn set_auto_detach_kernel_driver(&self, handle: HandleId, enable: bool) -> i32;

    /// Device-to-host control transfer; bytes read or a negative status
    #[allow(clippy::too_many_arguments)]
    fn read_control(
        &self,
        handle: HandleId,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> i32;

    /// Host-to-device control transfer; bytes written or a negative status
    #[allow(clippy::too_many_arguments)]
    fn write_control(
        &self,
        handle: HandleId,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> i32;

    /// Bulk IN transfer; bytes transferred and status
    fn read_bulk(
        &self,
        handle: HandleId,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> (usize, i32);

    /// Bulk OUT transfer; bytes transferred and status
    fn write_bulk(
        &self,
        handle: HandleId,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> (usize, i32);

    /// Interrupt IN transfer; bytes transferred and status
    fn read_interrupt(
        &self,
        handle: HandleId,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> (usize, i32);

    /// Interrupt OUT transfer; bytes transferred and status
    fn write_interrupt(
        &self,
        handle: HandleId,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> (usize, i32);

    /// GET_DESCRIPTOR into `buf`; bytes filled or a negative status
    fn get_descriptor_raw(
        &self,
        handle: HandleId,
        descriptor_type: u8,
        index: u8,
        buf: &mut [u8],
    ) -> i32;

    /// GET_DESCRIPTOR(STRING) into `buf`; bytes filled or a negative status
    fn get_string_descriptor_raw(
        &self,
        handle: HandleId,
        index: u8,
        lang_id: u16,
        buf: &mut [u8],
    ) -> i32;

    /// Tear down native state; called once when the owning context exits
    fn exit(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_from_code() {
        assert_eq!(Speed::from_code(0), Speed::Unknown);
        assert_eq!(Speed::from_code(1), Speed::Low);
        assert_eq!(Speed::from_code(3), Speed::High);
        assert_eq!(Speed::from_code(4), Speed::Super);
        assert_eq!(Speed::from_code(5), Speed::Unknown);
    }

    #[test]
    fn test_speed_display() {
        assert_eq!(Speed::Full.to_string(), "full");
        assert_eq!(Speed::Unknown.to_string(), "unknown");
    }
}
