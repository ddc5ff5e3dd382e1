//! Run-wide backend context: initialization, teardown and device queries.

use log::{info, warn};

use crate::backend::{Backend, DeviceInfo};
use crate::engine::TransformEngine;
use crate::error::{check, BenchError};
use crate::extent::Extent;
use crate::precision::Precision;
use crate::variant::Variant;

/// Owns the backend for the duration of a benchmark run.
///
/// The device list is enumerated once at construction; engines receive the
/// selected device index from here instead of querying the backend again.
pub struct Context<B: Backend> {
    backend: B,
    devices: Vec<DeviceInfo>,
    device: usize,
    created: bool,
}

impl<B: Backend> Context<B> {
    /// Wrap `backend` and enumerate its devices; the runtime is not initialised yet.
    pub fn new(backend: B) -> Self {
        let devices = backend.devices();
        Self {
            backend,
            devices,
            device: 0,
            created: false,
        }
    }

    /// Backend name used in logs and result records.
    pub fn title(&self) -> &'static str {
        self.backend.title()
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Selected device index.
    pub fn device(&self) -> usize {
        self.device
    }

    /// Devices enumerated at construction.
    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    /// Initialise the runtime on `device`.
    ///
    /// Unknown indices are rejected rather than replaced by a default device.
    pub fn create(&mut self, device: usize) -> Result<(), BenchError> {
        if device >= self.devices.len() {
            return Err(BenchError::UnknownDevice {
                requested: device,
                available: self.devices.len(),
            });
        }
        check(self.backend.init(device), "init")?;
        self.device = device;
        self.created = true;
        info!("{}: context created on device {device}", self.title());
        Ok(())
    }

    /// Reset the runtime. Does nothing unless [`Self::create`] succeeded.
    pub fn destroy(&mut self) -> Result<(), BenchError> {
        if !self.created {
            return Ok(());
        }
        self.created = false;
        check(self.backend.reset(), "reset")?;
        info!("{}: context destroyed", self.title());
        Ok(())
    }

    /// Description line of the selected device, empty when the index is unknown.
    pub fn device_infos(&self) -> String {
        match self.devices.get(self.device) {
            Some(info) => info.to_string(),
            None => {
                warn!("{} device {} unknown", self.title(), self.device);
                String::new()
            }
        }
    }

    /// One `"<index>: <description line>"` row per device.
    pub fn device_list(&self) -> String {
        self.devices
            .iter()
            .enumerate()
            .map(|(i, info)| format!("{i}: {info}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Engine for one variant on the selected device.
    pub fn engine<P: Precision>(
        &mut self,
        variant: Variant,
        extent: Extent,
    ) -> Result<TransformEngine<'_, B, P>, BenchError> {
        if !self.created {
            return Err(BenchError::ContextNotCreated);
        }
        TransformEngine::new(&mut self.backend, self.device, variant, extent)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Direct backend access, bypassing the engine.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: Backend> Drop for Context<B> {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            warn!("context teardown failed: {e}");
        }
    }
}
