//! Conversion between `WAVEFORMATEX` and [`StreamFormat`].
//!
//! Shared-mode mix formats are usually `WAVE_FORMAT_EXTENSIBLE` with an
//! IEEE-float subformat. Formats the platform hands out are kept as
//! [`PlatformFormat`] and passed back to it untouched, since the extensible
//! tail (channel mask, valid bits) does not survive a [`StreamFormat`].
//! Requests we build are plain `WAVEFORMATEX`.

use windows::core::GUID;
use windows::Win32::Media::Audio::{WAVEFORMATEX, WAVE_FORMAT_PCM};
use windows::Win32::Media::KernelStreaming::{KSDATAFORMAT_SUBTYPE_PCM, WAVEFORMATEXTENSIBLE, WAVE_FORMAT_EXTENSIBLE};
use windows::Win32::Media::Multimedia::{KSDATAFORMAT_SUBTYPE_IEEE_FLOAT, WAVE_FORMAT_IEEE_FLOAT};
use windows::Win32::System::Com::CoTaskMemFree;

use dual_capture_core::models::error::CaptureError;
use dual_capture_core::models::format::{SampleEncoding, StreamFormat};

/// Encoding from a format tag and, for extensible formats, the subformat.
pub(crate) fn encoding_for(tag: u16, sub_format: Option<GUID>) -> Result<SampleEncoding, CaptureError> {
    match tag as u32 {
        WAVE_FORMAT_PCM => Ok(SampleEncoding::Pcm),
        WAVE_FORMAT_IEEE_FLOAT => Ok(SampleEncoding::Float),
        WAVE_FORMAT_EXTENSIBLE => match sub_format {
            Some(g) if g == KSDATAFORMAT_SUBTYPE_PCM => Ok(SampleEncoding::Pcm),
            Some(g) if g == KSDATAFORMAT_SUBTYPE_IEEE_FLOAT => Ok(SampleEncoding::Float),
            Some(g) => Err(CaptureError::InvalidFormat(format!("unsupported subformat {:?}", g))),
            None => Err(CaptureError::InvalidFormat("extensible format without subformat".into())),
        },
        other => Err(CaptureError::InvalidFormat(format!("unsupported format tag {:#06x}", other))),
    }
}

/// Read a platform-owned format description.
///
/// # Safety
/// `ptr` must point to a valid `WAVEFORMATEX`, followed by the extensible
/// tail when the tag says so.
pub(crate) unsafe fn read_wave_format(ptr: *const WAVEFORMATEX) -> Result<StreamFormat, CaptureError> {
    if ptr.is_null() {
        return Err(CaptureError::InvalidFormat("null format pointer".into()));
    }
    // Packed struct: copy out before touching fields.
    let wf = std::ptr::read_unaligned(ptr);
    let tag = wf.wFormatTag;

    let sub_format = if tag as u32 == WAVE_FORMAT_EXTENSIBLE {
        let ext = ptr as *const WAVEFORMATEXTENSIBLE;
        Some(std::ptr::read_unaligned(std::ptr::addr_of!((*ext).SubFormat)))
    } else {
        None
    };

    // Reported fields as is, so an inconsistent platform format is rejected.
    let format = StreamFormat {
        encoding: encoding_for(tag, sub_format)?,
        sample_rate: wf.nSamplesPerSec,
        channels: wf.nChannels,
        bits_per_sample: wf.wBitsPerSample,
        block_align: wf.nBlockAlign,
        bytes_per_second: wf.nAvgBytesPerSec,
    };
    format.validate()?;
    Ok(format)
}

/// A format description allocated by the platform with `CoTaskMemAlloc`,
/// freed on drop.
pub(crate) struct PlatformFormat {
    ptr: *mut WAVEFORMATEX,
    format: StreamFormat,
}

impl PlatformFormat {
    /// Take ownership of `ptr` and read it. The allocation is freed even
    /// when the format is rejected.
    ///
    /// # Safety
    /// `ptr` must be a `CoTaskMemAlloc` allocation satisfying
    /// [`read_wave_format`], not owned by anyone else.
    pub(crate) unsafe fn take(ptr: *mut WAVEFORMATEX) -> Result<Self, CaptureError> {
        let owned = OwnedAllocation(ptr);
        let format = read_wave_format(ptr)?;
        std::mem::forget(owned);
        Ok(Self { ptr, format })
    }

    pub(crate) fn format(&self) -> StreamFormat {
        self.format
    }

    /// The platform's own description, extensible tail included.
    pub(crate) fn as_ptr(&self) -> *const WAVEFORMATEX {
        self.ptr
    }
}

impl Drop for PlatformFormat {
    fn drop(&mut self) {
        drop(OwnedAllocation(self.ptr));
    }
}

struct OwnedAllocation(*mut WAVEFORMATEX);

impl Drop for OwnedAllocation {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe {
                CoTaskMemFree(Some(self.0 as *const _));
            }
        }
    }
}

/// Plain `WAVEFORMATEX` describing `format`.
pub(crate) fn to_wave_format(format: &StreamFormat) -> WAVEFORMATEX {
    let tag = match format.encoding {
        SampleEncoding::Pcm => WAVE_FORMAT_PCM,
        SampleEncoding::Float => WAVE_FORMAT_IEEE_FLOAT,
    };
    WAVEFORMATEX {
        wFormatTag: tag as u16,
        nChannels: format.channels,
        nSamplesPerSec: format.sample_rate,
        nAvgBytesPerSec: format.bytes_per_second,
        nBlockAlign: format.block_align,
        wBitsPerSample: format.bits_per_sample,
        cbSize: 0,
    }
}
