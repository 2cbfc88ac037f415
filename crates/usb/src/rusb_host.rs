//! libusb-backed host
//!
//! [`RusbHost`] implements [`UsbHost`] on top of `rusb`. Native objects live
//! in id-keyed tables; the rest of the crate only ever sees the ids.
//!
//! Table lock is held for lookups only. Each native handle sits behind its
//! own read-write lock: transfers take the read side and may overlap on one
//! handle, while interface, reset and kernel-driver calls take the write side.

use common::{DeviceRef, HandleId, HostError, ListId, RawDeviceList, Speed, UsbHost};
use descriptor::{DEVICE_DESCRIPTOR_SIZE, descriptor_type, request};
use rusb::{DeviceHandle, UsbContext};
use std::collections::HashMap;
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for GET_DESCRIPTOR requests issued by the host itself
const DESCRIPTOR_TIMEOUT: Duration = Duration::from_secs(1);

type Device = rusb::Device<rusb::Context>;
type NativeHandle = DeviceHandle<rusb::Context>;
type SharedHandle = Arc<HandleSlot<NativeHandle>>;

/// Lock around one native handle
struct HandleSlot<T>(RwLock<T>);

impl<T> HandleSlot<T> {
    fn new(inner: T) -> Self {
        Self(RwLock::new(inner))
    }

    /// Transfers and descriptor reads; any number at once
    fn shared(&self) -> RwLockReadGuard<'_, T> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Calls that reconfigure the device
    fn exclusive(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Map a rusb error onto the host status table
pub fn map_rusb_error(err: rusb::Error) -> HostError {
    match err {
        rusb::Error::Io => HostError::Io,
        rusb::Error::InvalidParam => HostError::InvalidParam,
        rusb::Error::Access => HostError::Access,
        rusb::Error::NoDevice => HostError::NoDevice,
        rusb::Error::NotFound => HostError::NotFound,
        rusb::Error::Busy => HostError::Busy,
        rusb::Error::Timeout => HostError::Timeout,
        rusb::Error::Overflow => HostError::Overflow,
        rusb::Error::Pipe => HostError::Pipe,
        rusb::Error::Interrupted => HostError::Interrupted,
        rusb::Error::NoMem => HostError::NoMem,
        rusb::Error::NotSupported => HostError::NotSupported,
        _ => HostError::Other,
    }
}

fn map_speed(speed: rusb::Speed) -> Speed {
    match speed {
        rusb::Speed::Low => Speed::Low,
        rusb::Speed::Full => Speed::Full,
        rusb::Speed::High => Speed::High,
        rusb::Speed::Super | rusb::Speed::SuperPlus => Speed::Super,
        _ => Speed::Unknown,
    }
}

/// Binary-coded decimal form of a rusb version, as carried on the wire
fn version_to_bcd(version: rusb::Version) -> u16 {
    let major = u16::from(version.major());
    ((major / 10) << 12)
        | ((major % 10) << 8)
        | (u16::from(version.minor() & 0x0F) << 4)
        | u16::from(version.sub_minor() & 0x0F)
}

fn status<T>(result: rusb::Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => map_rusb_error(e).code(),
    }
}

fn count(result: rusb::Result<usize>) -> i32 {
    match result {
        Ok(len) => i32::try_from(len).unwrap_or(i32::MAX),
        Err(e) => map_rusb_error(e).code(),
    }
}

fn transferred(result: rusb::Result<usize>) -> (usize, i32) {
    match result {
        Ok(len) => (len, 0),
        Err(e) => (0, map_rusb_error(e).code()),
    }
}

/// Identity of a native device
///
/// libusb keeps one `libusb_device` per attached device for as long as a
/// reference is held, and the tables hold one for every entry. A device that
/// re-enumerates at a recycled bus address gets a fresh object.
fn device_key(device: &Device) -> usize {
    device.as_raw() as usize
}

struct DeviceEntry<D> {
    device: D,
    key: usize,
    /// Lists currently holding this device
    lists: usize,
    /// Handles currently open on this device
    handles: usize,
}

struct Tables<D, H> {
    next_id: u32,
    devices: HashMap<DeviceRef, DeviceEntry<D>>,
    lists: HashMap<ListId, Vec<DeviceRef>>,
    handles: HashMap<HandleId, (DeviceRef, H)>,
}

impl<D, H> Default for Tables<D, H> {
    fn default() -> Self {
        Self {
            next_id: 0,
            devices: HashMap::new(),
            lists: HashMap::new(),
            handles: HashMap::new(),
        }
    }
}

impl<D, H> Tables<D, H> {
    fn next_id(&mut self) -> u32 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }

    fn find(&self, key: usize) -> Option<DeviceRef> {
        self.devices
            .iter()
            .find_map(|(id, entry)| (entry.key == key).then_some(*id))
    }

    /// Register `device` as held by one more list
    fn hold(&mut self, key: usize, device: D) -> DeviceRef {
        if let Some(id) = self.find(key) {
            if let Some(entry) = self.devices.get_mut(&id) {
                entry.lists += 1;
            }
            return id;
        }
        let id = DeviceRef(self.next_id());
        self.devices.insert(
            id,
            DeviceEntry {
                device,
                key,
                lists: 1,
                handles: 0,
            },
        );
        id
    }

    fn unhold(&mut self, id: DeviceRef, from_handle: bool) {
        let Some(entry) = self.devices.get_mut(&id) else {
            return;
        };
        if from_handle {
            entry.handles = entry.handles.saturating_sub(1);
        } else {
            entry.lists = entry.lists.saturating_sub(1);
        }
        if entry.lists == 0 && entry.handles == 0 {
            self.devices.remove(&id);
        }
    }
}

pub struct RusbHost {
    context: rusb::Context,
    tables: Mutex<Tables<Device, SharedHandle>>,
}

impl RusbHost {
    pub fn new() -> Result<Self, HostError> {
        let context = rusb::Context::new().map_err(map_rusb_error)?;
        info!("libusb context initialized");
        Ok(Self {
            context,
            tables: Mutex::new(Tables::default()),
        })
    }

    fn tables(&self) -> MutexGuard<'_, Tables<Device, SharedHandle>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn device(&self, id: DeviceRef) -> Option<Device> {
        self.tables().devices.get(&id).map(|e| e.device.clone())
    }

    fn handle(&self, id: HandleId) -> Option<SharedHandle> {
        self.tables().handles.get(&id).map(|(_, h)| Arc::clone(h))
    }

    /// Run a transfer on the native handle, or report `missing` for a stale id
    fn with_handle<T>(&self, id: HandleId, missing: T, f: impl FnOnce(&NativeHandle) -> T) -> T {
        match self.handle(id) {
            Some(handle) => f(&handle.shared()),
            None => {
                warn!("Unknown handle {:?}", id);
                missing
            }
        }
    }

    /// Like [`Self::with_handle`], with exclusive access
    fn with_handle_mut<T>(
        &self,
        id: HandleId,
        missing: T,
        f: impl FnOnce(&mut NativeHandle) -> T,
    ) -> T {
        match self.handle(id) {
            Some(handle) => f(&mut handle.exclusive()),
            None => {
                warn!("Unknown handle {:?}", id);
                missing
            }
        }
    }
}

impl UsbHost for RusbHost {
    fn enumerate_devices(&self) -> Result<RawDeviceList, HostError> {
        let list = self.context.devices().map_err(map_rusb_error)?;

        let mut tables = self.tables();
        let devices: Vec<DeviceRef> = list
            .iter()
            .map(|d| tables.hold(device_key(&d), d))
            .collect();
        let id = ListId(tables.next_id());
        tables.lists.insert(id, devices.clone());

        debug!("Enumerated {} devices as {:?}", devices.len(), id);
        Ok(RawDeviceList { id, devices })
    }

    fn free_device_list(&self, list: ListId) {
        let mut tables = self.tables();
        if let Some(devices) = tables.lists.remove(&list) {
            for device in devices {
                tables.unhold(device, false);
            }
        }
    }

    fn device_descriptor(
        &self,
        device: DeviceRef,
    ) -> Result<[u8; DEVICE_DESCRIPTOR_SIZE], HostError> {
        let device = self.device(device).ok_or(HostError::NoDevice)?;
        let desc = device.device_descriptor().map_err(map_rusb_error)?;

        let [usb_lo, usb_hi] = version_to_bcd(desc.usb_version()).to_le_bytes();
        let [vid_lo, vid_hi] = desc.vendor_id().to_le_bytes();
        let [pid_lo, pid_hi] = desc.product_id().to_le_bytes();
        let [dev_lo, dev_hi] = version_to_bcd(desc.device_version()).to_le_bytes();

        Ok([
            DEVICE_DESCRIPTOR_SIZE as u8,
            descriptor_type::DEVICE,
            usb_lo,
            usb_hi,
            desc.class_code(),
            desc.sub_class_code(),
            desc.protocol_code(),
            desc.max_packet_size(),
            vid_lo,
            vid_hi,
            pid_lo,
            pid_hi,
            dev_lo,
            dev_hi,
            desc.manufacturer_string_index().unwrap_or(0),
            desc.product_string_index().unwrap_or(0),
            desc.serial_number_string_index().unwrap_or(0),
            desc.num_configurations(),
        ])
    }

    fn bus_number(&self, device: DeviceRef) -> u8 {
        self.device(device).map_or(0, |d| d.bus_number())
    }

    fn port_number(&self, device: DeviceRef) -> u8 {
        self.device(device).map_or(0, |d| d.port_number())
    }

    fn address(&self, device: DeviceRef) -> u8 {
        self.device(device).map_or(0, |d| d.address())
    }

    fn speed(&self, device: DeviceRef) -> Speed {
        self.device(device)
            .map_or(Speed::Unknown, |d| map_speed(d.speed()))
    }

    fn port_numbers(&self, device: DeviceRef, ports: &mut [u8]) -> i32 {
        let Some(device) = self.device(device) else {
            return HostError::NoDevice.code();
        };
        match device.port_numbers() {
            Ok(chain) if chain.len() > ports.len() => HostError::Overflow.code(),
            Ok(chain) => {
                ports[..chain.len()].copy_from_slice(&chain);
                chain.len() as i32
            }
            Err(e) => map_rusb_error(e).code(),
        }
    }

    fn parent_device(&self, device: DeviceRef) -> Option<DeviceRef> {
        let parent = self.device(device)?.get_parent()?;

        // The parent stays registered as long as the lists holding the child
        let mut tables = self.tables();
        let holders: Vec<ListId> = tables
            .lists
            .iter()
            .filter(|(_, members)| members.contains(&device))
            .map(|(id, _)| *id)
            .collect();
        if holders.is_empty() {
            return None;
        }

        let mut parent_ref = None;
        for list in holders {
            let id = tables.hold(device_key(&parent), parent.clone());
            if let Some(members) = tables.lists.get_mut(&list) {
                members.push(id);
            }
            parent_ref = Some(id);
        }
        parent_ref
    }

    fn max_packet_size(&self, device: DeviceRef, endpoint: u8) -> i32 {
        let Some(device) = self.device(device) else {
            return HostError::NoDevice.code();
        };
        let config = match device.active_config_descriptor() {
            Ok(config) => config,
            Err(e) => return map_rusb_error(e).code(),
        };

        for interface in config.interfaces() {
            for alt in interface.descriptors() {
                for ep in alt.endpoint_descriptors() {
                    if ep.address() == endpoint {
                        return i32::from(ep.max_packet_size());
                    }
                }
            }
        }
        HostError::NotFound.code()
    }

    fn open(&self, device: DeviceRef) -> Result<HandleId, HostError> {
        let native = self.device(device).ok_or(HostError::NoDevice)?;
        let handle = native.open().map_err(map_rusb_error)?;

        let mut tables = self.tables();
        let id = HandleId(tables.next_id());
        if let Some(entry) = tables.devices.get_mut(&device) {
            entry.handles += 1;
        }
        tables
            .handles
            .insert(id, (device, Arc::new(HandleSlot::new(handle))));
        debug!("Opened {:?} on {:?}", id, device);
        Ok(id)
    }

    fn close(&self, handle: HandleId) {
        let mut tables = self.tables();
        if let Some((device, _)) = tables.handles.remove(&handle) {
            tables.unhold(device, true);
            debug!("Closed {:?}", handle);
        }
    }

    fn claim_interface(&self, handle: HandleId, interface: u8) -> i32 {
        self.with_handle_mut(handle, HostError::NotFound.code(), |h| {
            status(h.claim_interface(interface))
        })
    }

    fn release_interface(&self, handle: HandleId, interface: u8) -> i32 {
        self.with_handle_mut(handle, HostError::NotFound.code(), |h| {
            status(h.release_interface(interface))
        })
    }

    fn reset_device(&self, handle: HandleId) -> i32 {
        self.with_handle_mut(handle, HostError::NotFound.code(), |h| status(h.reset()))
    }

    fn kernel_driver_active(&self, handle: HandleId, interface: u8) -> i32 {
        self.with_handle(handle, HostError::NotFound.code(), |h| {
            match h.kernel_driver_active(interface) {
                Ok(active) => i32::from(active),
                Err(e) => map_rusb_error(e).code(),
            }
        })
    }

    fn detach_kernel_driver(&self, handle: HandleId, interface: u8) -> i32 {
        self.with_handle_mut(handle, HostError::NotFound.code(), |h| {
            status(h.detach_kernel_driver(interface))
        })
    }

    fn attach_kernel_driver(&self, handle: HandleId, interface: u8) -> i32 {
        self.with_handle_mut(handle, HostError::NotFound.code(), |h| {
            status(h.attach_kernel_driver(interface))
        })
    }

    fn set_auto_detach_kernel_driver(&self, handle: HandleId, enable: bool) -> i32 {
        self.with_handle_mut(handle, HostError::NotFound.code(), |h| {
            status(h.set_auto_detach_kernel_driver(enable))
        })
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
        self.with_handle(handle, HostError::NotFound.code(), |h| {
            count(h.read_control(request_type, request, value, index, buf, timeout))
        })
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
        self.with_handle(handle, HostError::NotFound.code(), |h| {
            count(h.write_control(request_type, request, value, index, data, timeout))
        })
    }

    fn read_bulk(
        &self,
        handle: HandleId,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> (usize, i32) {
        self.with_handle(handle, (0, HostError::NotFound.code()), |h| {
            transferred(h.read_bulk(endpoint, buf, timeout))
        })
    }

    fn write_bulk(
        &self,
        handle: HandleId,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> (usize, i32) {
        self.with_handle(handle, (0, HostError::NotFound.code()), |h| {
            transferred(h.write_bulk(endpoint, data, timeout))
        })
    }

    fn read_interrupt(
        &self,
        handle: HandleId,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> (usize, i32) {
        self.with_handle(handle, (0, HostError::NotFound.code()), |h| {
            transferred(h.read_interrupt(endpoint, buf, timeout))
        })
    }

    fn write_interrupt(
        &self,
        handle: HandleId,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> (usize, i32) {
        self.with_handle(handle, (0, HostError::NotFound.code()), |h| {
            transferred(h.write_interrupt(endpoint, data, timeout))
        })
    }

    fn get_descriptor_raw(
        &self,
        handle: HandleId,
        descriptor_type: u8,
        index: u8,
        buf: &mut [u8],
    ) -> i32 {
        let value = (u16::from(descriptor_type) << 8) | u16::from(index);
        self.with_handle(handle, HostError::NotFound.code(), |h| {
            count(h.read_control(
                rusb::request_type(
                    rusb::Direction::In,
                    rusb::RequestType::Standard,
                    rusb::Recipient::Device,
                ),
                request::GET_DESCRIPTOR,
                value,
                0,
                buf,
                DESCRIPTOR_TIMEOUT,
            ))
        })
    }

    fn get_string_descriptor_raw(
        &self,
        handle: HandleId,
        index: u8,
        lang_id: u16,
        buf: &mut [u8],
    ) -> i32 {
        let value = (u16::from(descriptor_type::STRING) << 8) | u16::from(index);
        self.with_handle(handle, HostError::NotFound.code(), |h| {
            count(h.read_control(
                rusb::request_type(
                    rusb::Direction::In,
                    rusb::RequestType::Standard,
                    rusb::Recipient::Device,
                ),
                request::GET_DESCRIPTOR,
                value,
                lang_id,
                buf,
                DESCRIPTOR_TIMEOUT,
            ))
        })
    }

    fn exit(&self) {
        let mut tables = self.tables();
        if !tables.handles.is_empty() {
            warn!("{} handles still open at exit", tables.handles.len());
        }
        tables.handles.clear();
        tables.lists.clear();
        tables.devices.clear();
        info!("libusb context released");
    }
}

impl std::fmt::Debug for RusbHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables();
        f.debug_struct("RusbHost")
            .field("devices", &tables.devices.len())
            .field("lists", &tables.lists.len())
            .field("handles", &tables.handles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_map_rusb_error() {
        assert_eq!(map_rusb_error(rusb::Error::Timeout), HostError::Timeout);
        assert_eq!(map_rusb_error(rusb::Error::Pipe), HostError::Pipe);
        assert_eq!(map_rusb_error(rusb::Error::NoDevice), HostError::NoDevice);
        assert_eq!(map_rusb_error(rusb::Error::BadDescriptor), HostError::Other);
        assert_eq!(map_rusb_error(rusb::Error::Other), HostError::Other);
    }

    #[test]
    fn test_map_speed() {
        assert_eq!(map_speed(rusb::Speed::Low), Speed::Low);
        assert_eq!(map_speed(rusb::Speed::High), Speed::High);
        assert_eq!(map_speed(rusb::Speed::SuperPlus), Speed::Super);
        assert_eq!(map_speed(rusb::Speed::Unknown), Speed::Unknown);
    }

    #[test]
    fn test_version_to_bcd() {
        assert_eq!(version_to_bcd(rusb::Version(2, 0, 0)), 0x0200);
        assert_eq!(version_to_bcd(rusb::Version(2, 1, 0)), 0x0210);
        assert_eq!(version_to_bcd(rusb::Version(3, 2, 0)), 0x0320);
        assert_eq!(version_to_bcd(rusb::Version(12, 3, 4)), 0x1234);
    }

    #[test]
    fn test_recycled_address_is_a_new_device() {
        let mut tables: Tables<&str, ()> = Tables::default();
        let first = tables.hold(0x1000, "old");
        assert_eq!(tables.hold(0x1000, "old"), first);

        // Same bus address, different native object
        let second = tables.hold(0x2000, "new");
        assert_ne!(second, first);
        assert_eq!(tables.devices[&second].device, "new");
        assert_eq!(tables.devices[&first].lists, 2);

        tables.unhold(first, false);
        tables.unhold(first, false);
        assert!(!tables.devices.contains_key(&first));
        assert!(tables.devices.contains_key(&second));
    }

    #[test]
    fn test_shared_access_overlaps() {
        let slot = HandleSlot::new(0u32);
        let barrier = Barrier::new(2);

        // Both sides hold the read guard while meeting at the barrier
        thread::scope(|s| {
            s.spawn(|| {
                let _guard = slot.shared();
                barrier.wait();
            });
            let _guard = slot.shared();
            barrier.wait();
        });

        *slot.exclusive() += 1;
        assert_eq!(*slot.shared(), 1);
    }

    #[test]
    fn test_transferred_status() {
        assert_eq!(transferred(Ok(64)), (64, 0));
        assert_eq!(
            transferred(Err(rusb::Error::Timeout)),
            (0, HostError::Timeout.code())
        );
        assert_eq!(count(Err(rusb::Error::Pipe)), -9);
        assert_eq!(status(Ok(())), 0);
    }
}
