//! Open device handles
//!
//! A [`Handle`] is the only way to talk to a device. It closes itself exactly
//! once, either through [`Handle::close`] or when dropped. Transfer methods
//! live in [`crate::transfer`], stream constructors in [`crate::stream`].

use crate::device::Device;
use crate::error::Result;
use common::{HandleId, UsbHost, negative_is_error};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// An open device
///
/// Transfers take `&self`, so several threads may run transfers on one handle
/// at the same time, for example a blocking bulk read alongside the write
/// that triggers it. Changing the default timeout takes `&mut self`.
pub struct Handle<'ctx, H: UsbHost> {
    device: Device<'ctx, H>,
    id: HandleId,
    timeout: Duration,
    open: bool,
}

impl<'ctx, H: UsbHost> Handle<'ctx, H> {
    pub(crate) fn new(device: Device<'ctx, H>, id: HandleId) -> Result<Self> {
        let context = device.context();
        let handle = Self {
            device,
            id,
            timeout: context.default_timeout(),
            open: true,
        };

        if context.auto_detach_kernel_driver() {
            handle.set_auto_detach_kernel_driver(true)?;
        }
        Ok(handle)
    }

    pub(crate) fn host(&self) -> &'ctx H {
        self.device.context().host()
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    /// The device this handle was opened from
    pub fn device(&self) -> &Device<'ctx, H> {
        &self.device
    }

    /// Default timeout for transfers without an explicit one; zero means
    /// the host default
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn claim_interface(&self, interface: u8) -> Result<()> {
        debug!("Claiming interface {} on {:?}", interface, self.id);
        negative_is_error(self.host().claim_interface(self.id, interface))?;
        Ok(())
    }

    pub fn release_interface(&self, interface: u8) -> Result<()> {
        debug!("Releasing interface {} on {:?}", interface, self.id);
        negative_is_error(self.host().release_interface(self.id, interface))?;
        Ok(())
    }

    pub fn reset_device(&self) -> Result<()> {
        negative_is_error(self.host().reset_device(self.id))?;
        Ok(())
    }

    pub fn kernel_driver_active(&self, interface: u8) -> Result<bool> {
        let active = negative_is_error(self.host().kernel_driver_active(self.id, interface))?;
        Ok(active != 0)
    }

    pub fn detach_kernel_driver(&self, interface: u8) -> Result<()> {
        negative_is_error(self.host().detach_kernel_driver(self.id, interface))?;
        Ok(())
    }

    pub fn attach_kernel_driver(&self, interface: u8) -> Result<()> {
        negative_is_error(self.host().attach_kernel_driver(self.id, interface))?;
        Ok(())
    }

    pub fn set_auto_detach_kernel_driver(&self, enable: bool) -> Result<()> {
        negative_is_error(self.host().set_auto_detach_kernel_driver(self.id, enable))?;
        Ok(())
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.host().close(self.id);
            debug!("Closed {:?} ({})", self.id, self.device);
        }
    }
}

impl<H: UsbHost> Drop for Handle<'_, H> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<H: UsbHost> fmt::Debug for Handle<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("device", &self.device)
            .field("timeout", &self.timeout)
            .finish()
    }
}
