//! Library context
//!
//! A [`Context`] owns the host backend and the settings shared by everything
//! opened through it. Devices, lists and handles borrow the context, so the
//! borrow checker guarantees they are gone before [`Context::exit`] runs.

use crate::config::UsbConfig;
use crate::device::{Device, DeviceList};
use crate::error::{Error, Result};
use crate::filter::DeviceFilter;
use crate::handle::Handle;
use crate::rusb_host::RusbHost;
use common::{HostError, UsbHost};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Context<H: UsbHost> {
    host: H,
    default_timeout: Duration,
    auto_detach_kernel_driver: bool,
    filters: Vec<DeviceFilter>,
    exited: bool,
}

/// Create a context backed by the system libusb
pub fn init() -> Result<Context<RusbHost>> {
    Ok(Context::new(RusbHost::new()?))
}

impl<H: UsbHost> Context<H> {
    pub fn new(host: H) -> Self {
        info!("USB context created");
        Self {
            host,
            default_timeout: Duration::ZERO,
            auto_detach_kernel_driver: false,
            filters: Vec::new(),
            exited: false,
        }
    }

    /// Create a context that applies `config` to every handle it opens
    pub fn with_config(host: H, config: &UsbConfig) -> Result<Self> {
        let filters = config
            .usb
            .filters
            .iter()
            .map(|f| DeviceFilter::parse(f))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "USB context created (timeout={}ms, auto_detach={}, filters={})",
            config.usb.default_timeout.as_millis(),
            config.usb.auto_detach_kernel_driver,
            filters.len()
        );

        Ok(Self {
            host,
            default_timeout: config.usb.default_timeout,
            auto_detach_kernel_driver: config.usb.auto_detach_kernel_driver,
            filters,
            exited: false,
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Timeout given to newly opened handles
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn auto_detach_kernel_driver(&self) -> bool {
        self.auto_detach_kernel_driver
    }

    /// Filters from the configuration, empty when none were given
    pub fn filters(&self) -> &[DeviceFilter] {
        &self.filters
    }

    /// Enumerate the attached devices
    ///
    /// Devices whose cached descriptor cannot be read or parsed are skipped
    /// with a warning.
    pub fn devices(&self) -> Result<DeviceList<'_, H>> {
        let raw = self.host.enumerate_devices()?;
        let mut devices = Vec::with_capacity(raw.devices.len());

        for device in &raw.devices {
            match Device::snapshot(self, *device) {
                Ok(device) => devices.push(device),
                Err(e) => warn!("Skipping device {:?}: {}", device, e),
            }
        }

        debug!("Enumerated {} devices", devices.len());
        Ok(DeviceList::new(self, raw.id, devices))
    }

    /// Open the first device whose identity matches `vendor_id:product_id`
    pub fn open_device_with_vid_pid(
        &self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Handle<'_, H>> {
        let list = self.devices()?;
        let handle = match list.find(vendor_id, product_id) {
            Some(device) => device.open(),
            None => Err(Error::Host(HostError::NoDevice)),
        };
        list.release();
        handle
    }

    /// Tear down the host backend
    pub fn exit(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if !self.exited {
            self.exited = true;
            self.host.exit();
            info!("USB context closed");
        }
    }
}

impl<H: UsbHost> Drop for Context<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<H: UsbHost + std::fmt::Debug> std::fmt::Debug for Context<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("host", &self.host)
            .field("default_timeout", &self.default_timeout)
            .field("auto_detach_kernel_driver", &self.auto_detach_kernel_driver)
            .field("filters", &self.filters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{HostCall, StubDevice, StubHost};

    #[test]
    fn test_exit_runs_once() {
        let mut context = Context::new(StubHost::new());
        context.teardown();
        context.teardown();
        let exits = context
            .host()
            .calls()
            .iter()
            .filter(|c| **c == HostCall::Exit)
            .count();
        assert_eq!(exits, 1);
    }

    #[test]
    fn test_with_config_rejects_bad_filter() {
        let mut config = UsbConfig::default();
        config.usb.filters = vec!["nope".into()];
        assert!(matches!(
            Context::with_config(StubHost::new(), &config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_open_missing_device() {
        let host = StubHost::new().with_device(StubDevice::new(0x1234, 0x5678));
        let context = Context::new(host);
        let err = context.open_device_with_vid_pid(0xDEAD, 0xBEEF).unwrap_err();
        assert_eq!(err.host_error(), Some(HostError::NoDevice));
        assert!(
            context
                .host()
                .calls()
                .contains(&HostCall::FreeDeviceList(common::ListId(1)))
        );
    }
}
