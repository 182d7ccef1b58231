use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::models::config::EngineConfig;
use crate::models::error::CaptureError;
use crate::models::format::StreamFormat;
use crate::models::state::{AtomicCaptureState, CaptureState, CaptureStats, SessionKind};
use crate::session::cancel::CancellationToken;
use crate::session::worker::{self, WorkerContext};
use crate::traits::callback::AudioDataCallback;
use crate::traits::platform::DeviceDirectory;

#[derive(Debug, Default)]
pub(crate) struct AtomicStats {
    pub callbacks: AtomicU64,
    pub bytes_delivered: AtomicU64,
    pub silent_packets: AtomicU64,
}

impl AtomicStats {
    fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            callbacks: self.callbacks.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
            silent_packets: self.silent_packets.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.callbacks.store(0, Ordering::Relaxed);
        self.bytes_delivered.store(0, Ordering::Relaxed);
        self.silent_packets.store(0, Ordering::Relaxed);
    }
}

/// State shared between a session handle and its worker thread.
#[derive(Debug, Default)]
pub(crate) struct SessionShared {
    pub running: AtomicBool,
    pub cancel: CancellationToken,
    pub state: AtomicCaptureState,
    pub format: Mutex<Option<StreamFormat>>,
    pub last_error: Mutex<Option<CaptureError>>,
    pub stats: AtomicStats,
}

impl SessionShared {
    pub fn should_run(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }
}

/// One capture stream (system audio or microphone) and its worker thread.
///
/// `start` returns once the worker is launched; opening the device happens on
/// the worker. A start that fails there is visible as [`is_running`]
/// dropping back to `false` and as [`last_error`].
///
/// [`is_running`]: CaptureSession::is_running
/// [`last_error`]: CaptureSession::last_error
pub struct CaptureSession {
    kind: SessionKind,
    shared: Arc<SessionShared>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    bound_device_id: Mutex<Option<String>>,
}

impl CaptureSession {
    pub fn new(kind: SessionKind) -> Self {
        Self {
            kind,
            shared: Arc::new(SessionShared::default()),
            worker: Mutex::new(None),
            bound_device_id: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Lock-free read of the running flag.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> CaptureState {
        self.shared.state.load()
    }

    /// Format the current (or last) stream was initialized with.
    pub fn negotiated_format(&self) -> Option<StreamFormat> {
        *self.shared.format.lock()
    }

    /// Why the last worker exited early, if it did.
    pub fn last_error(&self) -> Option<CaptureError> {
        self.shared.last_error.lock().clone()
    }

    pub fn stats(&self) -> CaptureStats {
        self.shared.stats.snapshot()
    }

    /// Device the session was last started with; `None` means the default.
    pub fn bound_device_id(&self) -> Option<String> {
        self.bound_device_id.lock().clone()
    }

    /// Launch the worker thread.
    ///
    /// An empty `device_id` is treated like `None` (default endpoint).
    /// Fails with [`CaptureError::AlreadyRunning`] without touching the running
    /// worker if the session is already capturing.
    pub fn start(
        &self,
        directory: Arc<dyn DeviceDirectory>,
        device_id: Option<String>,
        callback: AudioDataCallback,
        config: &EngineConfig,
    ) -> Result<(), CaptureError> {
        let mut worker = self.worker.lock();

        if self.is_running() {
            return Err(CaptureError::AlreadyRunning);
        }

        // A worker that failed on its own, or was stopped from its own
        // callback, may still be unwinding.
        if let Some(previous) = worker.take() {
            if previous.join().is_err() {
                log::error!("previous {} capture thread panicked", self.kind);
            }
        }

        let device_id = device_id.filter(|id| !id.is_empty());
        *self.bound_device_id.lock() = device_id.clone();

        self.shared.cancel.reset();
        self.shared.stats.reset();
        *self.shared.format.lock() = None;
        *self.shared.last_error.lock() = None;
        self.shared.state.store(CaptureState::Starting);
        self.shared.running.store(true, Ordering::SeqCst);

        let ctx = WorkerContext {
            kind: self.kind,
            directory,
            device_id,
            callback,
            requested: config.microphone_target,
            poll_interval: config.poll_interval(),
            buffer_duration: config.buffer_duration(),
            shared: Arc::clone(&self.shared),
        };

        let handle = thread::Builder::new()
            .name(format!("{}-capture", self.kind))
            .spawn(move || worker::run(ctx))
            .map_err(|e| {
                self.shared.running.store(false, Ordering::SeqCst);
                self.shared.state.store(CaptureState::Idle);
                CaptureError::ThreadSpawn(format!("{} capture thread: {}", self.kind, e))
            })?;

        log::debug!("{} capture thread launched", self.kind);
        *worker = Some(handle);
        Ok(())
    }

    /// Cancel the worker and wait for it to exit.
    ///
    /// After this returns the callback is not invoked again. Stopping an idle
    /// session is a no-op. Called from the session's own callback, the stop is
    /// requested but not awaited.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return;
        };

        self.shared.state.store(CaptureState::Stopping);
        self.shared.cancel.cancel();
        self.shared.running.store(false, Ordering::SeqCst);

        if handle.thread().id() == thread::current().id() {
            log::warn!("{} capture stopped from its own callback; not joining", self.kind);
            *worker = Some(handle);
            return;
        }
        drop(worker);

        if handle.join().is_err() {
            log::error!("{} capture thread panicked", self.kind);
        }
        self.shared.state.store(CaptureState::Idle);
        log::debug!("{} capture thread joined", self.kind);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}
