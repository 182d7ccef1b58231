use thiserror::Error;

/// Errors that can occur during capture engine operations.
///
/// Each start-time step of a capture session (device resolution, client
/// activation, format negotiation, client initialization, capture-service
/// acquisition, stream start) has its own variant so a failed start can be
/// attributed after the fact through `CaptureSession::last_error`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("device directory not initialized")]
    NotInitialized,

    #[error("capture already running")]
    AlreadyRunning,

    #[error("device not available")]
    DeviceNotAvailable,

    #[error("endpoint enumeration failed: {0}")]
    Enumeration(String),

    #[error("client activation failed: {0}")]
    ActivationFailed(String),

    #[error("format negotiation failed: {0}")]
    FormatNegotiation(String),

    #[error("client initialization failed: {0}")]
    InitializeFailed(String),

    #[error("capture service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("stream start failed: {0}")]
    StreamStart(String),

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("invalid stream format: {0}")]
    InvalidFormat(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(String),

    #[error("transcode failed: {0}")]
    Transcode(String),

    #[error("bridge error: {0}")]
    Bridge(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}
