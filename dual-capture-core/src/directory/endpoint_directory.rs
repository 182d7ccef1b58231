use std::sync::Arc;

use crate::models::device::{DeviceDescriptor, DeviceDirection};
use crate::models::error::CaptureError;
use crate::traits::platform::DeviceDirectory;

/// Read-only view over the platform device directory.
///
/// Holds the shared directory handle, or nothing when the platform audio
/// subsystem could not be initialized. Listing is a snapshot with no
/// hot-plug subscription and no side effects on capture state.
#[derive(Clone)]
pub struct EndpointDirectory {
    handle: Option<Arc<dyn DeviceDirectory>>,
}

impl EndpointDirectory {
    pub fn new(handle: Arc<dyn DeviceDirectory>) -> Self {
        Self { handle: Some(handle) }
    }

    /// A directory with no platform handle. Every query fails with
    /// [`CaptureError::NotInitialized`].
    pub fn uninitialized() -> Self {
        Self { handle: None }
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }

    /// The shared platform handle.
    pub fn handle(&self) -> Result<&Arc<dyn DeviceDirectory>, CaptureError> {
        self.handle.as_ref().ok_or(CaptureError::NotInitialized)
    }

    /// Active endpoints in `direction`, in platform order.
    ///
    /// Endpoints whose name cannot be resolved are still listed, named
    /// [`UNKNOWN_DEVICE_NAME`](crate::models::device::UNKNOWN_DEVICE_NAME).
    /// Entries without an id cannot be addressed and are dropped.
    pub fn list_endpoints(&self, direction: DeviceDirection) -> Result<Vec<DeviceDescriptor>, CaptureError> {
        let entries = self.handle()?.endpoints(direction)?;

        let mut devices = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.id.is_empty() {
                log::warn!("Skipping {} endpoint with empty id", direction);
                continue;
            }
            if entry.friendly_name.is_none() {
                log::warn!("No friendly name for {} endpoint {}", direction, entry.id);
            }
            devices.push(DeviceDescriptor::new(entry.id, entry.friendly_name, direction));
        }

        log::debug!("Enumerated {} {} endpoints", devices.len(), direction);
        Ok(devices)
    }

    /// Like [`list_endpoints`](Self::list_endpoints), but any failure is
    /// logged and reported as an empty list.
    pub fn list_or_empty(&self, direction: DeviceDirection) -> Vec<DeviceDescriptor> {
        self.list_endpoints(direction).unwrap_or_else(|e| {
            log::warn!("Listing {} endpoints failed: {}", direction, e);
            Vec::new()
        })
    }
}
