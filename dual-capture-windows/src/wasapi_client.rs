//! WASAPI endpoint, audio client and capture client.
//!
//! One set of types serves both sessions: microphone capture opens a
//! capture endpoint normally, system audio opens a render endpoint with
//! `AUDCLNT_STREAMFLAGS_LOOPBACK`. All of them are created and dropped on
//! the session's worker thread, each holding its own [`ComGuard`].
//!
//! Sequence, as driven by the session worker:
//! 1. CoInitializeEx (MTA)
//! 2. Resolve the endpoint (default or by id)
//! 3. Activate IAudioClient
//! 4. GetMixFormat / IsFormatSupported
//! 5. Initialize in shared mode (LOOPBACK flag for system audio)
//! 6. Get IAudioCaptureClient
//! 7. Register with MMCSS, Start, poll for packets

use std::cell::RefCell;
use std::time::Duration;

use windows::Win32::Foundation::{S_FALSE, S_OK};
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::CLSCTX_ALL;

use dual_capture_core::models::error::CaptureError;
use dual_capture_core::models::format::StreamFormat;
use dual_capture_core::traits::platform::{
    AudioClient, AudioEndpoint, CaptureClient, FormatSupport, PacketFlags, StreamMode,
};

use crate::com::{ComGuard, MmcssGuard};
use crate::device_enumerator::device_id;
use crate::wave_format::{to_wave_format, PlatformFormat};

/// A resolved `IMMDevice`.
pub struct WasapiEndpoint {
    device: IMMDevice,
    id: String,
    _com: ComGuard,
}

impl WasapiEndpoint {
    pub(crate) fn new(device: IMMDevice, com: ComGuard) -> Result<Self, CaptureError> {
        let id = device_id(&device)?;
        Ok(Self { device, id, _com: com })
    }
}

impl AudioEndpoint for WasapiEndpoint {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn activate(&self) -> Result<Box<dyn AudioClient>, CaptureError> {
        let com = ComGuard::enter_mta()?;
        let client: IAudioClient = unsafe { self.device.Activate(CLSCTX_ALL, None) }
            .map_err(|e| CaptureError::ActivationFailed(format!("Activate failed: {}", e)))?;
        Ok(Box::new(WasapiClient {
            client,
            platform_formats: RefCell::new(Vec::new()),
            format: None,
            mmcss: None,
            _com: com,
        }))
    }
}

/// Shared-mode `IAudioClient`.
pub struct WasapiClient {
    client: IAudioClient,
    /// Mix format and closest matches as the platform described them.
    platform_formats: RefCell<Vec<PlatformFormat>>,
    format: Option<StreamFormat>,
    mmcss: Option<MmcssGuard>,
    _com: ComGuard,
}

impl AudioClient for WasapiClient {
    fn mix_format(&self) -> Result<StreamFormat, CaptureError> {
        unsafe {
            let ptr = self
                .client
                .GetMixFormat()
                .map_err(|e| CaptureError::FormatNegotiation(format!("GetMixFormat failed: {}", e)))?;
            let platform = PlatformFormat::take(ptr)?;
            let format = platform.format();
            self.platform_formats.borrow_mut().push(platform);
            Ok(format)
        }
    }

    fn is_format_supported(&self, requested: &StreamFormat) -> Result<FormatSupport, CaptureError> {
        let wf = to_wave_format(requested);
        let mut closest: *mut WAVEFORMATEX = std::ptr::null_mut();
        let hr = unsafe {
            self.client
                .IsFormatSupported(AUDCLNT_SHAREMODE_SHARED, &wf, Some(&mut closest as *mut _))
        };

        // The closest-match pointer is ours to free whenever it is set.
        let closest = if closest.is_null() {
            None
        } else {
            Some(unsafe { PlatformFormat::take(closest) })
        };

        if hr == S_OK {
            Ok(FormatSupport::Supported)
        } else if hr == S_FALSE {
            match closest {
                Some(platform) => {
                    let platform = platform?;
                    let format = platform.format();
                    self.platform_formats.borrow_mut().push(platform);
                    Ok(FormatSupport::ClosestMatch(format))
                }
                None => Ok(FormatSupport::Unsupported),
            }
        } else if hr == AUDCLNT_E_UNSUPPORTED_FORMAT {
            Ok(FormatSupport::Unsupported)
        } else {
            Err(CaptureError::FormatNegotiation(format!(
                "IsFormatSupported failed: {}",
                windows::core::Error::from(hr)
            )))
        }
    }

    fn initialize(
        &mut self,
        format: &StreamFormat,
        mode: StreamMode,
        buffer_duration: Duration,
    ) -> Result<(), CaptureError> {
        let flags = match mode {
            StreamMode::Loopback => AUDCLNT_STREAMFLAGS_LOOPBACK | AUDCLNT_STREAMFLAGS_NOPERSIST,
            StreamMode::Capture => AUDCLNT_STREAMFLAGS_NOPERSIST,
        };
        // REFERENCE_TIME is in 100 ns units.
        let duration = i64::try_from(buffer_duration.as_nanos() / 100).unwrap_or(i64::MAX);
        // Loopback cannot convert, so the mix format goes back exactly as the
        // platform described it. Only our own requests are rebuilt.
        let request = to_wave_format(format);
        let formats = self.platform_formats.borrow();
        let wf = platform_description(&formats, format).unwrap_or(&request as *const WAVEFORMATEX);

        unsafe {
            self.client
                .Initialize(AUDCLNT_SHAREMODE_SHARED, flags, duration, 0, wf, None)
                .map_err(|e| CaptureError::InitializeFailed(format!("IAudioClient::Initialize failed: {}", e)))?;
        }
        drop(formats);
        self.format = Some(*format);
        Ok(())
    }

    fn capture_service(&mut self) -> Result<Box<dyn CaptureClient>, CaptureError> {
        let format = self
            .format
            .ok_or_else(|| CaptureError::ServiceUnavailable("client not initialized".into()))?;
        let com = ComGuard::enter_mta()?;
        let capture: IAudioCaptureClient = unsafe { self.client.GetService() }
            .map_err(|e| CaptureError::ServiceUnavailable(format!("GetService failed: {}", e)))?;
        Ok(Box::new(WasapiCaptureClient {
            capture,
            block_align: format.block_align,
            silence: Vec::new(),
            _com: com,
        }))
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        self.mmcss = MmcssGuard::register();
        unsafe { self.client.Start() }
            .map_err(|e| CaptureError::StreamStart(format!("IAudioClient::Start failed: {}", e)))
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        let result = unsafe { self.client.Stop() }
            .map_err(|e| CaptureError::Capture(format!("IAudioClient::Stop failed: {}", e)));
        self.mmcss = None;
        result
    }
}

/// The platform's own description of `format`, if it handed one out.
fn platform_description(formats: &[PlatformFormat], format: &StreamFormat) -> Option<*const WAVEFORMATEX> {
    formats
        .iter()
        .rev()
        .find(|p| p.format() == *format)
        .map(PlatformFormat::as_ptr)
}

/// `IAudioCaptureClient` of a started stream.
pub struct WasapiCaptureClient {
    capture: IAudioCaptureClient,
    block_align: u16,
    silence: Vec<u8>,
    _com: ComGuard,
}

impl CaptureClient for WasapiCaptureClient {
    fn next_packet_frames(&mut self) -> Result<u32, CaptureError> {
        unsafe { self.capture.GetNextPacketSize() }
            .map_err(|e| CaptureError::Capture(format!("GetNextPacketSize failed: {}", e)))
    }

    fn drain_packet(&mut self, sink: &mut dyn FnMut(&[u8], PacketFlags)) -> Result<u32, CaptureError> {
        let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
        let mut num_frames: u32 = 0;
        let mut raw_flags: u32 = 0;

        unsafe {
            self.capture
                .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut raw_flags, None, None)
                .map_err(|e| CaptureError::Capture(format!("GetBuffer failed: {}", e)))?;
        }

        let flags = PacketFlags {
            silent: raw_flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0,
            discontinuity: raw_flags & (AUDCLNT_BUFFERFLAGS_DATA_DISCONTINUITY.0 as u32) != 0,
        };
        let len = num_frames as usize * self.block_align as usize;

        if num_frames > 0 && !buffer_ptr.is_null() {
            if flags.silent {
                // The buffer contents are undefined for silent packets.
                self.silence.clear();
                self.silence.resize(len, 0);
                sink(&self.silence, flags);
            } else {
                // SAFETY: GetBuffer hands out num_frames * nBlockAlign readable
                // bytes, valid until ReleaseBuffer below.
                let data = unsafe { std::slice::from_raw_parts(buffer_ptr, len) };
                sink(data, flags);
            }
        }

        unsafe {
            self.capture
                .ReleaseBuffer(num_frames)
                .map_err(|e| CaptureError::Capture(format!("ReleaseBuffer failed: {}", e)))?;
        }
        Ok(num_frames)
    }
}
