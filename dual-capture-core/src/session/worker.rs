use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::models::error::CaptureError;
use crate::models::format::StreamFormat;
use crate::models::state::{CaptureState, SessionKind};
use crate::session::capture::SessionShared;
use crate::session::negotiate::negotiate_format;
use crate::traits::callback::AudioDataCallback;
use crate::traits::platform::{CaptureClient, DeviceDirectory};

/// Everything a worker thread needs, moved onto the thread at spawn.
pub(crate) struct WorkerContext {
    pub kind: SessionKind,
    pub directory: Arc<dyn DeviceDirectory>,
    pub device_id: Option<String>,
    pub callback: AudioDataCallback,
    pub requested: StreamFormat,
    pub poll_interval: Duration,
    pub buffer_duration: Duration,
    pub shared: Arc<SessionShared>,
}

/// Worker thread entry point.
///
/// Failures are logged and kept as the session's last error. However the
/// worker exits, including a panicking callback, the session ends up not
/// running and `Idle`.
pub(crate) fn run(ctx: WorkerContext) {
    let _exit = ExitGuard(Arc::clone(&ctx.shared));

    match capture(&ctx) {
        Ok(()) => log::info!("{} capture stopped", ctx.kind),
        Err(e) => {
            log::error!("{} capture error: {}", ctx.kind, e);
            *ctx.shared.last_error.lock() = Some(e);
        }
    }
}

/// Open the device and run the poll loop until the session is stopped.
///
/// Sequence:
/// 1. Resolve the bound endpoint, or the default one for the direction
/// 2. Activate an audio client
/// 3. Negotiate the stream format
/// 4. Initialize the client (loopback flag for system audio)
/// 5. Acquire the capture service
/// 6. Start the stream, then poll and deliver
///
/// Native handles are released in reverse order when the locals drop, on
/// the success path and on every early return alike.
fn capture(ctx: &WorkerContext) -> Result<(), CaptureError> {
    let mode = ctx.kind.mode();

    let endpoint = match ctx.device_id.as_deref() {
        Some(id) => ctx.directory.endpoint(id)?,
        None => ctx.directory.default_endpoint(mode.endpoint_direction())?,
    };

    let mut client = endpoint.activate()?;

    let format = negotiate_format(client.as_ref(), mode, &ctx.requested)?;

    client.initialize(&format, mode, ctx.buffer_duration)?;

    let mut capture_client = client.capture_service()?;

    client.start()?;

    *ctx.shared.format.lock() = Some(format);
    ctx.shared
        .state
        .transition(CaptureState::Starting, CaptureState::Running);
    log::info!(
        "{} capture running on {} ({})",
        ctx.kind,
        endpoint.id(),
        format
    );

    let result = poll_loop(ctx, capture_client.as_mut());

    if let Err(e) = client.stop() {
        log::warn!("{} client stop failed: {}", ctx.kind, e);
    }
    result
}

/// Drain every available packet, sleep when none is ready, repeat until the
/// running flag drops or the session's token is cancelled.
fn poll_loop(ctx: &WorkerContext, capture_client: &mut dyn CaptureClient) -> Result<(), CaptureError> {
    let shared = &ctx.shared;

    while shared.should_run() {
        let mut frames = capture_client.next_packet_frames()?;

        while frames > 0 && shared.should_run() {
            capture_client.drain_packet(&mut |data, flags| {
                if flags.discontinuity {
                    log::debug!("{} capture discontinuity", ctx.kind);
                }
                if flags.silent {
                    shared.stats.silent_packets.fetch_add(1, Ordering::Relaxed);
                }
                if data.is_empty() {
                    return;
                }
                (ctx.callback)(data);
                shared.stats.callbacks.fetch_add(1, Ordering::Relaxed);
                shared
                    .stats
                    .bytes_delivered
                    .fetch_add(data.len() as u64, Ordering::Relaxed);
            })?;

            frames = capture_client.next_packet_frames()?;
        }

        if !shared.should_run() {
            break;
        }
        thread::sleep(ctx.poll_interval);
    }

    Ok(())
}

struct ExitGuard(Arc<SessionShared>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
        self.0.state.store(CaptureState::Idle);
    }
}
