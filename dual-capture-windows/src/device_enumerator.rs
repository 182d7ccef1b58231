//! Endpoint enumeration via the MMDevice API.
//!
//! [`WasapiDirectory`] is the shared directory handle of the engine. It owns
//! no COM objects itself: every call enters the MTA on the calling thread and
//! creates a fresh `IMMDeviceEnumerator`, so both capture workers and any
//! listing thread can use it concurrently.

use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use dual_capture_core::models::device::DeviceDirection;
use dual_capture_core::models::error::CaptureError;
use dual_capture_core::traits::platform::{AudioEndpoint, DeviceDirectory, EndpointEntry};

use crate::com::ComGuard;
use crate::wasapi_client::WasapiEndpoint;

/// Device directory backed by the Windows MMDevice API.
#[derive(Debug)]
pub struct WasapiDirectory {
    _private: (),
}

impl WasapiDirectory {
    /// Check that the audio subsystem is reachable and return the directory.
    ///
    /// Fails with [`CaptureError::Enumeration`] when no device enumerator can
    /// be created (audio service stopped, COM unavailable).
    pub fn new() -> Result<Self, CaptureError> {
        let _com = ComGuard::enter_mta()?;
        open_enumerator()?;
        log::debug!("MMDevice enumerator available");
        Ok(Self { _private: () })
    }
}

impl DeviceDirectory for WasapiDirectory {
    fn endpoints(&self, direction: DeviceDirection) -> Result<Vec<EndpointEntry>, CaptureError> {
        let _com = ComGuard::enter_mta()?;
        let enumerator = open_enumerator()?;
        unsafe {
            let collection = enumerator
                .EnumAudioEndpoints(data_flow(direction), DEVICE_STATE_ACTIVE)
                .map_err(|e| CaptureError::Enumeration(format!("EnumAudioEndpoints failed: {}", e)))?;

            let count = collection
                .GetCount()
                .map_err(|e| CaptureError::Enumeration(format!("GetCount failed: {}", e)))?;

            let mut entries = Vec::with_capacity(count as usize);
            for i in 0..count {
                let device = match collection.Item(i) {
                    Ok(d) => d,
                    Err(e) => {
                        log::warn!("skipping {} endpoint {}: {}", direction, i, e);
                        continue;
                    }
                };
                // An unreadable id is reported as empty; the directory drops it.
                let id = device_id(&device).unwrap_or_default();
                entries.push(EndpointEntry {
                    id,
                    friendly_name: friendly_name(&device),
                });
            }
            Ok(entries)
        }
    }

    fn default_endpoint(&self, direction: DeviceDirection) -> Result<Box<dyn AudioEndpoint>, CaptureError> {
        let com = ComGuard::enter_mta()?;
        let enumerator = open_enumerator()?;
        let device = unsafe { enumerator.GetDefaultAudioEndpoint(data_flow(direction), eConsole) }
            .map_err(|_| CaptureError::DeviceNotAvailable)?;
        Ok(Box::new(WasapiEndpoint::new(device, com)?))
    }

    fn endpoint(&self, id: &str) -> Result<Box<dyn AudioEndpoint>, CaptureError> {
        let com = ComGuard::enter_mta()?;
        let enumerator = open_enumerator()?;
        let wide_id: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
        let device = unsafe { enumerator.GetDevice(PCWSTR(wide_id.as_ptr())) }
            .map_err(|_| CaptureError::DeviceNotAvailable)?;
        Ok(Box::new(WasapiEndpoint::new(device, com)?))
    }
}

fn open_enumerator() -> Result<IMMDeviceEnumerator, CaptureError> {
    unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }
        .map_err(|e| CaptureError::Enumeration(format!("failed to create enumerator: {}", e)))
}

fn data_flow(direction: DeviceDirection) -> EDataFlow {
    match direction {
        DeviceDirection::Input => eCapture,
        DeviceDirection::Output => eRender,
    }
}

/// Endpoint id string, freeing the platform allocation.
pub(crate) fn device_id(device: &IMMDevice) -> Result<String, CaptureError> {
    unsafe {
        let raw: PWSTR = device
            .GetId()
            .map_err(|e| CaptureError::Enumeration(format!("GetId failed: {}", e)))?;
        let id = raw.to_string();
        CoTaskMemFree(Some(raw.0 as *const _));
        id.map_err(|e| CaptureError::Enumeration(format!("invalid endpoint id: {}", e)))
    }
}

/// `PKEY_Device_FriendlyName`, or `None` when the property store or the
/// value cannot be read.
fn friendly_name(device: &IMMDevice) -> Option<String> {
    unsafe {
        let store = device.OpenPropertyStore(STGM_READ).ok()?;
        let value = store.GetValue(&PKEY_Device_FriendlyName).ok()?;
        let name = value.to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_flow_per_direction() {
        assert_eq!(data_flow(DeviceDirection::Input), eCapture);
        assert_eq!(data_flow(DeviceDirection::Output), eRender);
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn lists_render_endpoints() {
        let directory = WasapiDirectory::new().unwrap();
        let outputs = directory.endpoints(DeviceDirection::Output).unwrap();
        assert!(outputs.iter().all(|e| !e.id.is_empty()));
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn default_render_endpoint_resolves_by_id() {
        let directory = WasapiDirectory::new().unwrap();
        let default = directory.default_endpoint(DeviceDirection::Output).unwrap();
        let again = directory.endpoint(&default.id()).unwrap();
        assert_eq!(again.id(), default.id());
    }
}
