//! # dual-capture-core
//!
//! Platform-agnostic core of a dual-session PCM capture engine: one session
//! records what the machine is playing (loopback), the other records a
//! microphone. Both deliver raw interleaved PCM buffers to a caller-supplied
//! callback on their own worker threads.
//!
//! Platform backends (Windows WASAPI) implement the traits in
//! [`traits::platform`] and plug into [`CaptureEngine`].
//!
//! ## Architecture
//!
//! ```text
//! dual-capture-core (this crate)
//! ├── traits/       ← AudioDataCallback, DeviceDirectory, AudioEndpoint, AudioClient, CaptureClient
//! ├── models/       ← CaptureError, StreamFormat, DeviceDescriptor, EngineConfig, CaptureState
//! ├── directory/    ← EndpointDirectory (device listing, sentinel names)
//! ├── session/      ← CaptureSession, CaptureEngine, format negotiation, cancellation
//! ├── processing/   ← ChunkQueue, BufferedHandoff (consumer isolated from capture timing)
//! ├── transcode/    ← Transcoder (WAV → MP3 via external encoder)
//! ├── bridge/       ← MethodBridge (name-based calls, base64 audio events)
//! └── mock/         ← in-memory backend (tests, `mock` feature)
//! ```

pub mod bridge;
pub mod directory;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;
pub mod transcode;

// Re-export key types at crate root for convenience.
pub use bridge::{AudioDataEvent, DeviceEntry, EventSink, MethodBridge};
pub use directory::endpoint_directory::EndpointDirectory;
pub use models::config::EngineConfig;
pub use models::device::{DeviceDescriptor, DeviceDirection, UNKNOWN_DEVICE_NAME};
pub use models::error::CaptureError;
pub use models::format::{SampleEncoding, StreamFormat};
pub use models::state::{CaptureState, CaptureStats, SessionKind};
pub use processing::chunk_queue::ChunkQueue;
pub use processing::handoff::BufferedHandoff;
pub use session::cancel::CancellationToken;
pub use session::capture::CaptureSession;
pub use session::engine::CaptureEngine;
pub use traits::callback::AudioDataCallback;
pub use traits::platform::{
    AudioClient, AudioEndpoint, CaptureClient, DeviceDirectory, EndpointEntry, FormatSupport, PacketFlags, StreamMode,
};
pub use transcode::transcoder::Transcoder;
