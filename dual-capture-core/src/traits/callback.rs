use std::sync::Arc;

/// Callback invoked for every buffer a capture session drains.
///
/// The slice covers exactly the bytes of one platform packet
/// (`frames * block_align`) in the session's negotiated format. It is only
/// valid for the duration of the call; copy it to keep it.
///
/// The callback runs on the session's worker thread, never on the thread
/// that called `start`. It must be thread-safe and must return quickly:
/// while it runs the platform buffer is not being drained. Wrap it in a
/// [`BufferedHandoff`](crate::processing::handoff::BufferedHandoff) to move
/// slow consumers off the capture thread.
pub type AudioDataCallback = Arc<dyn Fn(&[u8]) + Send + Sync + 'static>;
