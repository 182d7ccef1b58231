//! # dual-capture-windows
//!
//! Windows WASAPI backend for dual-capture.
//!
//! Provides:
//! - `WasapiDirectory`: endpoint enumeration via the MMDevice API, the
//!   engine's shared [`DeviceDirectory`](dual_capture_core::DeviceDirectory)
//! - `WasapiEndpoint`, `WasapiClient`, `WasapiCaptureClient`: shared-mode
//!   capture, with `AUDCLNT_STREAMFLAGS_LOOPBACK` for system audio
//!
//! ## Platform Requirements
//! - Windows Vista+ for shared-mode loopback
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use dual_capture_core::{EngineConfig, SessionKind};
//!
//! let engine = dual_capture_windows::create_engine(EngineConfig::default())?;
//! engine.start(SessionKind::Microphone, None, Arc::new(|pcm: &[u8]| {
//!     // raw interleaved PCM in the negotiated format
//! }))?;
//! ```

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod wasapi_client;
#[cfg(target_os = "windows")]
mod wave_format;

#[cfg(target_os = "windows")]
pub use device_enumerator::WasapiDirectory;
#[cfg(target_os = "windows")]
pub use wasapi_client::{WasapiCaptureClient, WasapiClient, WasapiEndpoint};

/// Capture engine over the WASAPI directory.
///
/// A directory that cannot be opened leaves the engine inert rather than
/// failing: see [`CaptureEngine::initialize`](dual_capture_core::CaptureEngine::initialize).
#[cfg(target_os = "windows")]
pub fn create_engine(
    config: dual_capture_core::EngineConfig,
) -> Result<dual_capture_core::CaptureEngine, dual_capture_core::CaptureError> {
    use std::sync::Arc;

    dual_capture_core::CaptureEngine::initialize(
        || Ok(Arc::new(WasapiDirectory::new()?) as Arc<dyn dual_capture_core::DeviceDirectory>),
        config,
    )
}
