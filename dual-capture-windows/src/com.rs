//! Per-thread COM apartment and MMCSS registration guards.

use windows::core::{HRESULT, PCWSTR};
use windows::Win32::Foundation::{HANDLE, RPC_E_CHANGED_MODE};
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};
use windows::Win32::System::Threading::{AvRevertMmThreadCharacteristics, AvSetMmThreadCharacteristicsW};

use dual_capture_core::models::error::CaptureError;

/// Keeps the calling thread in the multithreaded apartment until dropped.
///
/// Every COM object that outlives a call holds one of these, declared after
/// its interface fields so the interfaces are released first. Nesting is
/// fine: each successful `CoInitializeEx` is balanced by one `CoUninitialize`.
pub(crate) struct ComGuard {
    owned: bool,
}

impl ComGuard {
    pub(crate) fn enter_mta() -> Result<Self, CaptureError> {
        let hr: HRESULT = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            // Caller's thread is already STA; COM is usable, but not ours to tear down.
            return Ok(Self { owned: false });
        }
        hr.ok()
            .map_err(|e| CaptureError::Unknown(format!("CoInitializeEx failed: {}", e)))?;
        Ok(Self { owned: true })
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.owned {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// "Pro Audio" MMCSS task registration of the current thread.
pub(crate) struct MmcssGuard {
    handle: HANDLE,
}

impl MmcssGuard {
    /// Best effort: a thread that cannot be registered keeps normal priority.
    pub(crate) fn register() -> Option<Self> {
        let mut task_index: u32 = 0;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        match unsafe { AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index) } {
            Ok(handle) => Some(Self { handle }),
            Err(e) => {
                log::debug!("MMCSS registration unavailable: {}", e);
                None
            }
        }
    }
}

impl Drop for MmcssGuard {
    fn drop(&mut self) {
        unsafe {
            let _ = AvRevertMmThreadCharacteristics(self.handle);
        }
    }
}
