//! Name-based call surface for a UI layer.
//!
//! Maps remote method names onto [`CaptureEngine`](crate::session::engine::CaptureEngine)
//! calls and forwards captured buffers as text-safe events.

pub mod events;
pub mod method_bridge;

pub use events::{AudioDataEvent, DeviceEntry, AUDIO_DATA_METHOD};
pub use method_bridge::{EventSink, MethodBridge};
