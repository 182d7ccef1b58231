//! Seam between the capture engine and a platform audio subsystem.
//!
//! The traits follow the shape of the native APIs closely enough that each
//! start-time step of a capture session is a single call that can fail on
//! its own:
//!
//! ```text
//! DeviceDirectory ── default_endpoint / endpoint ──▶ AudioEndpoint   (resolve)
//! AudioEndpoint   ── activate ─────────────────────▶ AudioClient     (activate)
//! AudioClient     ── mix_format / is_format_supported               (negotiate)
//!                 ── initialize                                     (initialize)
//!                 ── capture_service ──────────────▶ CaptureClient   (service)
//!                 ── start                                          (start)
//! ```
//!
//! Only the directory is shared between threads. Endpoints and everything
//! derived from them are created, used and dropped on one worker thread, so
//! they carry no `Send` bound. Dropping an object releases its native handle.

use std::time::Duration;

use crate::models::device::DeviceDirection;
use crate::models::error::CaptureError;
use crate::models::format::StreamFormat;

/// Raw enumeration result, before the directory applies naming rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointEntry {
    pub id: String,
    /// `None` when the platform could not resolve a friendly name.
    pub friendly_name: Option<String>,
}

/// How a client is initialized against its endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamMode {
    /// Record the endpoint's own input (microphone).
    Capture,
    /// Record what a render endpoint is playing.
    Loopback,
}

impl StreamMode {
    /// Direction of the endpoint this mode opens. Loopback reads from render
    /// endpoints.
    pub fn endpoint_direction(self) -> DeviceDirection {
        match self {
            Self::Capture => DeviceDirection::Input,
            Self::Loopback => DeviceDirection::Output,
        }
    }
}

/// Answer to a shared-mode format query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSupport {
    /// The requested format can be used as is.
    Supported,
    /// Not supported as requested; the platform suggests this instead.
    ClosestMatch(StreamFormat),
    /// Not supported and no alternative was offered.
    Unsupported,
}

/// Flags the platform attaches to a packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketFlags {
    /// The packet is silence. Backends hand the sink zeroed bytes for it.
    pub silent: bool,
    /// The platform detected a gap before this packet.
    pub discontinuity: bool,
}

/// Shared handle to the platform's device directory.
///
/// Immutable after construction and queried concurrently by both capture
/// workers, so implementations must be reentrant.
pub trait DeviceDirectory: Send + Sync {
    /// Active endpoints in `direction`, in platform order.
    fn endpoints(&self, direction: DeviceDirection) -> Result<Vec<EndpointEntry>, CaptureError>;

    /// The platform's default endpoint for `direction`.
    fn default_endpoint(&self, direction: DeviceDirection) -> Result<Box<dyn AudioEndpoint>, CaptureError>;

    /// The endpoint with the given id, if it is still present.
    fn endpoint(&self, id: &str) -> Result<Box<dyn AudioEndpoint>, CaptureError>;
}

/// A resolved endpoint, owned by one worker thread.
pub trait AudioEndpoint {
    fn id(&self) -> String;

    fn activate(&self) -> Result<Box<dyn AudioClient>, CaptureError>;
}

/// An activated audio client.
pub trait AudioClient {
    /// The endpoint's current shared-mode mix format.
    fn mix_format(&self) -> Result<StreamFormat, CaptureError>;

    /// Ask whether `requested` can be used in shared mode.
    fn is_format_supported(&self, requested: &StreamFormat) -> Result<FormatSupport, CaptureError>;

    fn initialize(
        &mut self,
        format: &StreamFormat,
        mode: StreamMode,
        buffer_duration: Duration,
    ) -> Result<(), CaptureError>;

    /// Capture service of an initialized client.
    fn capture_service(&mut self) -> Result<Box<dyn CaptureClient>, CaptureError>;

    fn start(&mut self) -> Result<(), CaptureError>;

    fn stop(&mut self) -> Result<(), CaptureError>;
}

/// Packet reader of a started client.
pub trait CaptureClient {
    /// Frames in the next available packet, `0` when nothing is ready.
    fn next_packet_frames(&mut self) -> Result<u32, CaptureError>;

    /// Acquire the next packet, hand its bytes to `sink`, then release it back
    /// to the platform. Returns the number of frames drained.
    fn drain_packet(&mut self, sink: &mut dyn FnMut(&[u8], PacketFlags)) -> Result<u32, CaptureError>;
}
