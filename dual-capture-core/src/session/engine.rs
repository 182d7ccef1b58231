use std::sync::Arc;

use parking_lot::Mutex;

use crate::directory::endpoint_directory::EndpointDirectory;
use crate::models::config::EngineConfig;
use crate::models::device::{DeviceDescriptor, DeviceDirection};
use crate::models::error::CaptureError;
use crate::models::state::SessionKind;
use crate::processing::handoff::BufferedHandoff;
use crate::session::capture::CaptureSession;
use crate::traits::callback::AudioDataCallback;
use crate::traits::platform::DeviceDirectory;

/// Façade over the two capture sessions and the shared device directory.
///
/// ```text
///                      ┌─▶ [system CaptureSession] ── loopback worker ──▶ callback
/// [CaptureEngine] ─────┤
///   control mutex      └─▶ [mic CaptureSession] ──── capture worker ───▶ callback
///   EndpointDirectory ◀── shared, read-only, by both workers
/// ```
///
/// Start and stop on either session go through one control mutex, held for
/// the check-and-flip plus the spawn or join, never across a capture loop.
/// The two sessions run independently of each other, each with its own
/// cancellation token. Dropping the engine stops both sessions before the
/// directory handle is released.
pub struct CaptureEngine {
    config: EngineConfig,
    directory: EndpointDirectory,
    init_error: Option<CaptureError>,
    control: Mutex<()>,
    system: CaptureSession,
    microphone: CaptureSession,
}

impl CaptureEngine {
    /// Engine over an initialized directory, with default settings.
    pub fn new(directory: Arc<dyn DeviceDirectory>) -> Self {
        Self::build(EndpointDirectory::new(directory), EngineConfig::default(), None)
    }

    pub fn with_config(directory: Arc<dyn DeviceDirectory>, config: EngineConfig) -> Result<Self, CaptureError> {
        config.validate()?;
        Ok(Self::build(EndpointDirectory::new(directory), config, None))
    }

    /// Run the platform initializer once. If it fails the error is logged,
    /// kept in [`initialization_error`](Self::initialization_error), and the
    /// engine stays inert: listings are empty and starts fail with
    /// [`CaptureError::NotInitialized`].
    pub fn initialize<F>(init: F, config: EngineConfig) -> Result<Self, CaptureError>
    where
        F: FnOnce() -> Result<Arc<dyn DeviceDirectory>, CaptureError>,
    {
        config.validate()?;
        match init() {
            Ok(directory) => Ok(Self::build(EndpointDirectory::new(directory), config, None)),
            Err(e) => {
                log::error!("Audio subsystem initialization failed: {}", e);
                Ok(Self::build(EndpointDirectory::uninitialized(), config, Some(e)))
            }
        }
    }

    fn build(directory: EndpointDirectory, config: EngineConfig, init_error: Option<CaptureError>) -> Self {
        Self {
            config,
            directory,
            init_error,
            control: Mutex::new(()),
            system: CaptureSession::new(SessionKind::SystemAudio),
            microphone: CaptureSession::new(SessionKind::Microphone),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn directory(&self) -> &EndpointDirectory {
        &self.directory
    }

    pub fn initialization_error(&self) -> Option<&CaptureError> {
        self.init_error.as_ref()
    }

    pub fn session(&self, kind: SessionKind) -> &CaptureSession {
        match kind {
            SessionKind::SystemAudio => &self.system,
            SessionKind::Microphone => &self.microphone,
        }
    }

    // --- Device listing ---

    pub fn list_input_devices(&self) -> Vec<DeviceDescriptor> {
        self.directory.list_or_empty(DeviceDirection::Input)
    }

    pub fn list_output_devices(&self) -> Vec<DeviceDescriptor> {
        self.directory.list_or_empty(DeviceDirection::Output)
    }

    // --- Lifecycle ---

    /// Start a session. `device_id` of `None` (or empty) uses the platform
    /// default endpoint for the session's direction.
    ///
    /// Success means the worker was launched; device and format errors
    /// surface later through [`CaptureSession::is_running`] and
    /// [`CaptureSession::last_error`].
    pub fn start(
        &self,
        kind: SessionKind,
        device_id: Option<&str>,
        callback: AudioDataCallback,
    ) -> Result<(), CaptureError> {
        let directory = Arc::clone(self.directory.handle()?);
        let _guard = self.control.lock();
        self.session(kind)
            .start(directory, device_id.map(str::to_string), callback, &self.config)?;
        log::info!(
            "{} capture started on {}",
            kind,
            device_id.filter(|id| !id.is_empty()).unwrap_or("default endpoint")
        );
        Ok(())
    }

    /// Stop a session and wait for its worker to exit. No-op when idle.
    pub fn stop(&self, kind: SessionKind) {
        let _guard = self.control.lock();
        self.session(kind).stop();
    }

    pub fn is_capturing(&self, kind: SessionKind) -> bool {
        self.session(kind).is_running()
    }

    /// Start a session whose buffers are copied to a queue and handed to
    /// `consumer` on a separate thread, isolating it from capture timing.
    ///
    /// The returned hand-off must outlive the session; dropping it after
    /// stopping flushes the remaining buffers to `consumer`.
    pub fn start_buffered<C>(
        &self,
        kind: SessionKind,
        device_id: Option<&str>,
        consumer: C,
    ) -> Result<BufferedHandoff, CaptureError>
    where
        C: FnMut(Vec<u8>) + Send + 'static,
    {
        let handoff = BufferedHandoff::spawn(kind.label(), self.config.handoff_capacity, consumer)?;
        self.start(kind, device_id, handoff.callback())?;
        Ok(handoff)
    }

    pub fn start_system_audio_capture(
        &self,
        device_id: Option<&str>,
        callback: AudioDataCallback,
    ) -> Result<(), CaptureError> {
        self.start(SessionKind::SystemAudio, device_id, callback)
    }

    pub fn start_microphone_capture(
        &self,
        device_id: Option<&str>,
        callback: AudioDataCallback,
    ) -> Result<(), CaptureError> {
        self.start(SessionKind::Microphone, device_id, callback)
    }

    pub fn stop_system_audio_capture(&self) {
        self.stop(SessionKind::SystemAudio);
    }

    pub fn stop_microphone_capture(&self) {
        self.stop(SessionKind::Microphone);
    }

    pub fn is_system_audio_capturing(&self) -> bool {
        self.is_capturing(SessionKind::SystemAudio)
    }

    pub fn is_microphone_capturing(&self) -> bool {
        self.is_capturing(SessionKind::Microphone)
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        self.stop_system_audio_capture();
        self.stop_microphone_capture();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::mock::{MockDevice, MockDirectory, MockPacket};
    use crate::models::format::StreamFormat;
    use crate::models::state::CaptureState;
    use crate::traits::platform::StreamMode;

    fn engine(mock: &MockDirectory) -> CaptureEngine {
        let config = EngineConfig {
            poll_interval_ms: 1,
            ..Default::default()
        };
        CaptureEngine::with_config(Arc::new(mock.clone()), config).unwrap()
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    fn counter() -> (AudioDataCallback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (
            Arc::new(move |_data: &[u8]| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
            count,
        )
    }

    fn two_streaming_devices() -> MockDirectory {
        MockDirectory::new()
            .with_device(
                MockDevice::output("spk", Some("Speakers"))
                    .as_default()
                    .streaming(MockPacket::new(480, 1)),
            )
            .with_device(
                MockDevice::input("mic", Some("Microphone"))
                    .as_default()
                    .streaming(MockPacket::new(120, 2)),
            )
    }

    #[test]
    fn lists_devices_per_direction() {
        let mock = MockDirectory::new()
            .with_device(MockDevice::input("mic-1", Some("Headset")))
            .with_device(MockDevice::input("mic-2", None))
            .with_device(MockDevice::output("spk-1", Some("Speakers")));
        let engine = engine(&mock);

        let inputs = engine.list_input_devices();
        let outputs = engine.list_output_devices();

        assert_eq!(inputs.len(), 2);
        assert!(inputs.iter().all(|d| d.direction == DeviceDirection::Input));
        assert!(inputs.iter().all(|d| !d.id.is_empty()));
        assert_eq!(inputs[1].display_name, "Unknown Device");
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].direction, DeviceDirection::Output);
    }

    #[test]
    fn device_unplugged_after_listing_fails_the_start() {
        let mock = MockDirectory::new()
            .with_device(MockDevice::input("usb-mic", Some("USB Mic")))
            .with_device(MockDevice::input("built-in", Some("Built-in")).as_default());
        let engine = engine(&mock);
        let listed = engine.list_input_devices();
        assert_eq!(listed[0].id, "usb-mic");

        mock.remove_device("usb-mic");
        let (callback, count) = counter();
        engine.start_microphone_capture(Some(listed[0].id.as_str()), callback).unwrap();

        assert!(wait_until(|| !engine.is_microphone_capturing()));
        let session = engine.session(SessionKind::Microphone);
        assert_eq!(session.last_error(), Some(CaptureError::DeviceNotAvailable));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(mock.live_handles(), 0);
        assert_eq!(engine.list_input_devices().len(), 1);
    }

    #[test]
    fn microphone_end_to_end_three_buffers() {
        let mock = MockDirectory::new().with_device(
            MockDevice::input("mic", Some("Mic"))
                .as_default()
                .with_packets([
                    MockPacket::new(120, 1),
                    MockPacket::new(120, 2),
                    MockPacket::new(120, 3),
                ]),
        );
        let engine = engine(&mock);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        engine
            .start_microphone_capture(
                None,
                Arc::new(move |data: &[u8]| sink.lock().push((data.len(), data[0]))),
            )
            .unwrap();
        assert!(wait_until(|| received.lock().len() == 3));
        thread::sleep(Duration::from_millis(20));
        engine.stop_microphone_capture();

        // 120 frames x 4 bytes (44.1 kHz / 2 ch / 16-bit) each.
        let received = received.lock();
        assert_eq!(*received, vec![(480, 1), (480, 2), (480, 3)]);
        assert_eq!(received.iter().map(|(len, _)| len).sum::<usize>(), 1440);
        assert_eq!(engine.session(SessionKind::Microphone).stats().bytes_delivered, 1440);
    }

    #[test]
    fn microphone_uses_device_supported_format() {
        let device_format = StreamFormat::pcm(48_000, 2, 16);
        let mock = MockDirectory::new().with_device(
            MockDevice::input("mic", None)
                .as_default()
                .supporting_only(device_format)
                .streaming(MockPacket::new(10, 1)),
        );
        let engine = engine(&mock);
        let (callback, _) = counter();

        engine.start_microphone_capture(None, callback).unwrap();
        assert!(wait_until(|| engine.session(SessionKind::Microphone).state().is_running()));
        engine.stop_microphone_capture();

        assert_eq!(
            mock.initialized_formats("mic"),
            vec![(device_format, StreamMode::Capture)]
        );
        assert_eq!(
            engine.session(SessionKind::Microphone).negotiated_format(),
            Some(device_format)
        );
    }

    #[test]
    fn loopback_uses_render_mix_format() {
        let mix = StreamFormat::float(44_100, 2, 32);
        let mock = MockDirectory::new().with_device(
            MockDevice::output("spk", None)
                .as_default()
                .with_mix_format(mix)
                .supporting_only(StreamFormat::MICROPHONE_TARGET)
                .streaming(MockPacket::new(10, 1)),
        );
        let engine = engine(&mock);
        let (callback, _) = counter();

        engine.start_system_audio_capture(None, callback).unwrap();
        assert!(wait_until(|| engine.session(SessionKind::SystemAudio).state().is_running()));
        engine.stop_system_audio_capture();

        assert_eq!(mock.initialized_formats("spk"), vec![(mix, StreamMode::Loopback)]);
    }

    #[test]
    fn sessions_bind_requested_device() {
        let mock = two_streaming_devices().with_device(
            MockDevice::input("usb-mic", Some("USB"))
                .streaming(MockPacket::new(10, 9)),
        );
        let engine = engine(&mock);
        let (callback, count) = counter();

        engine.start_microphone_capture(Some("usb-mic"), callback).unwrap();
        assert!(wait_until(|| count.load(Ordering::SeqCst) > 0));
        engine.stop_microphone_capture();

        assert_eq!(mock.initialized_formats("usb-mic").len(), 1);
        assert!(mock.initialized_formats("mic").is_empty());
    }

    #[test]
    fn double_start_rejected_without_second_worker() {
        let mock = two_streaming_devices();
        let engine = engine(&mock);
        let (first, _) = counter();
        let (second, second_count) = counter();

        engine.start_microphone_capture(None, first).unwrap();
        assert_eq!(
            engine.start_microphone_capture(None, second),
            Err(CaptureError::AlreadyRunning)
        );
        assert!(wait_until(|| engine.session(SessionKind::Microphone).state().is_running()));
        thread::sleep(Duration::from_millis(20));

        assert_eq!(mock.started_streams(), 1);
        assert_eq!(second_count.load(Ordering::SeqCst), 0);
        engine.stop_microphone_capture();
    }

    #[test]
    fn concurrent_starts_launch_one_worker() {
        let mock = two_streaming_devices();
        let engine = Arc::new(engine(&mock));

        let results: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    let (callback, _) = counter();
                    engine.start_system_audio_capture(None, callback)
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == CaptureError::AlreadyRunning));
        assert!(wait_until(|| engine.session(SessionKind::SystemAudio).state().is_running()));
        assert_eq!(mock.started_streams(), 1);
        engine.stop_system_audio_capture();
    }

    #[test]
    fn stopping_one_session_leaves_the_other_running() {
        let mock = two_streaming_devices();
        let engine = engine(&mock);
        let (system_cb, system_count) = counter();
        let (mic_cb, mic_count) = counter();

        engine.start_system_audio_capture(None, system_cb).unwrap();
        engine.start_microphone_capture(None, mic_cb).unwrap();
        assert!(wait_until(|| system_count.load(Ordering::SeqCst) > 0 && mic_count.load(Ordering::SeqCst) > 0));
        assert!(engine.is_system_audio_capturing());
        assert!(engine.is_microphone_capturing());

        engine.stop_system_audio_capture();

        assert!(!engine.is_system_audio_capturing());
        assert!(engine.is_microphone_capturing());
        let before = mic_count.load(Ordering::SeqCst);
        assert!(wait_until(|| mic_count.load(Ordering::SeqCst) > before));
        assert_eq!(engine.session(SessionKind::Microphone).state(), CaptureState::Running);

        engine.stop_microphone_capture();
        assert!(!engine.is_microphone_capturing());
    }

    #[test]
    fn no_callbacks_after_stop() {
        let mock = two_streaming_devices();
        let engine = engine(&mock);
        let (callback, count) = counter();

        engine.start_system_audio_capture(None, callback).unwrap();
        assert!(wait_until(|| count.load(Ordering::SeqCst) >= 5));
        engine.stop_system_audio_capture();

        let frozen = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), frozen);
        assert!(!engine.is_system_audio_capturing());
    }

    #[test]
    fn stop_when_idle_returns_immediately() {
        let engine = engine(&MockDirectory::new());
        let started = Instant::now();
        engine.stop_system_audio_capture();
        engine.stop_microphone_capture();
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn restart_after_stop() {
        let mock = two_streaming_devices();
        let engine = engine(&mock);

        for _ in 0..3 {
            let (callback, count) = counter();
            engine.start_microphone_capture(None, callback).unwrap();
            assert!(wait_until(|| count.load(Ordering::SeqCst) > 0));
            engine.stop_microphone_capture();
        }

        assert_eq!(mock.started_streams(), 3);
        assert_eq!(mock.stopped_streams(), 3);
        assert_eq!(mock.live_handles(), 0);
    }

    #[test]
    fn drop_stops_both_sessions() {
        let mock = two_streaming_devices();
        let (system_cb, system_count) = counter();
        let (mic_cb, mic_count) = counter();
        {
            let engine = engine(&mock);
            engine.start_system_audio_capture(None, system_cb).unwrap();
            engine.start_microphone_capture(None, mic_cb).unwrap();
            assert!(wait_until(|| system_count.load(Ordering::SeqCst) > 0 && mic_count.load(Ordering::SeqCst) > 0));
        }

        assert_eq!(mock.live_handles(), 0);
        assert_eq!(mock.stopped_streams(), 2);
    }

    #[test]
    fn failed_initialization_leaves_engine_inert() {
        let engine = CaptureEngine::initialize(
            || Err(CaptureError::Unknown("audio service down".into())),
            EngineConfig::default(),
        )
        .unwrap();
        let (callback, _) = counter();

        assert!(engine.initialization_error().is_some());
        assert!(engine.list_input_devices().is_empty());
        assert!(engine.list_output_devices().is_empty());
        assert_eq!(
            engine.start_microphone_capture(None, callback),
            Err(CaptureError::NotInitialized)
        );
        assert!(!engine.is_microphone_capturing());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(CaptureEngine::with_config(Arc::new(MockDirectory::new()), config).is_err());
    }

    #[test]
    fn buffered_start_delivers_on_consumer_thread() {
        let mock = MockDirectory::new().with_device(
            MockDevice::input("mic", None)
                .as_default()
                .with_packets([MockPacket::new(10, 1), MockPacket::new(10, 2)]),
        );
        let engine = engine(&mock);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        let handoff = engine
            .start_buffered(SessionKind::Microphone, None, move |chunk| {
                sink.lock().push((chunk[0], thread::current().name().map(str::to_string)));
            })
            .unwrap();
        assert!(wait_until(|| engine.session(SessionKind::Microphone).stats().callbacks == 2));
        engine.stop_microphone_capture();
        drop(handoff);

        let received = received.lock();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].0, 1);
        assert_eq!(received[1].0, 2);
        assert_eq!(received[0].1.as_deref(), Some("microphone-handoff"));
    }
}
