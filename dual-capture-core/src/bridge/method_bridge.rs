use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::bridge::events::{AudioDataEvent, DeviceEntry, AUDIO_DATA_METHOD};
use crate::models::error::CaptureError;
use crate::models::state::SessionKind;
use crate::session::engine::CaptureEngine;
use crate::transcode::transcoder::Transcoder;

/// Receives `(method, payload)` pushes for the remote listener.
///
/// Called on capture worker threads.
pub type EventSink = Arc<dyn Fn(&str, Value) + Send + Sync + 'static>;

/// Dispatches remote method calls onto a [`CaptureEngine`].
///
/// | method                    | arguments               | result      |
/// |---------------------------|-------------------------|-------------|
/// | `getInputDevices`         |                         | device list |
/// | `getOutputDevices`        |                         | device list |
/// | `startSystemAudioCapture` | `deviceId?`             | `true`      |
/// | `stopSystemAudioCapture`  |                         | `true`      |
/// | `startMicrophoneCapture`  | `deviceId?`             | `true`      |
/// | `stopMicrophoneCapture`   |                         | `true`      |
/// | `convertToMp3`            | `wavPath`, `mp3Path`    | `bool`      |
pub struct MethodBridge {
    engine: Arc<CaptureEngine>,
    transcoder: Transcoder,
    sink: EventSink,
}

impl MethodBridge {
    pub fn new(engine: Arc<CaptureEngine>, sink: EventSink) -> Self {
        let transcoder = Transcoder::new(engine.config().transcoder_program.clone());
        Self {
            engine,
            transcoder,
            sink,
        }
    }

    pub fn engine(&self) -> &Arc<CaptureEngine> {
        &self.engine
    }

    pub fn handle(&self, method: &str, args: &Value) -> Result<Value, CaptureError> {
        log::debug!("bridge call: {}", method);
        match method {
            "getInputDevices" => Ok(device_list(self.engine.list_input_devices())),
            "getOutputDevices" => Ok(device_list(self.engine.list_output_devices())),
            "startSystemAudioCapture" => self.start(SessionKind::SystemAudio, args),
            "startMicrophoneCapture" => self.start(SessionKind::Microphone, args),
            "stopSystemAudioCapture" => {
                self.engine.stop_system_audio_capture();
                Ok(Value::Bool(true))
            }
            "stopMicrophoneCapture" => {
                self.engine.stop_microphone_capture();
                Ok(Value::Bool(true))
            }
            "convertToMp3" => self.convert_to_mp3(args),
            other => Err(CaptureError::Bridge(format!("not implemented: {}", other))),
        }
    }

    fn start(&self, kind: SessionKind, args: &Value) -> Result<Value, CaptureError> {
        let device_id = optional_str(args, "deviceId")?;
        let sink = Arc::clone(&self.sink);
        let callback = Arc::new(move |data: &[u8]| {
            match serde_json::to_value(AudioDataEvent::encode(kind, data)) {
                Ok(payload) => sink(AUDIO_DATA_METHOD, payload),
                Err(e) => log::error!("failed to encode {} audio event: {}", kind, e),
            }
        });

        self.engine.start(kind, device_id, callback).map_err(|e| {
            let what = match kind {
                SessionKind::SystemAudio => "system audio",
                SessionKind::Microphone => "microphone",
            };
            CaptureError::Bridge(format!("Failed to start {} capture: {}", what, e))
        })?;
        Ok(Value::Bool(true))
    }

    fn convert_to_mp3(&self, args: &Value) -> Result<Value, CaptureError> {
        let wav = optional_str(args, "wavPath")?.filter(|p| !p.is_empty());
        let mp3 = optional_str(args, "mp3Path")?.filter(|p| !p.is_empty());
        let (Some(wav), Some(mp3)) = (wav, mp3) else {
            return Err(CaptureError::Bridge("wavPath and mp3Path are required".into()));
        };

        match self.transcoder.wav_to_mp3(Path::new(wav), Path::new(mp3)) {
            Ok(()) => Ok(Value::Bool(true)),
            Err(e) => {
                log::warn!("{}", e);
                Ok(Value::Bool(false))
            }
        }
    }
}

fn device_list(devices: Vec<crate::models::device::DeviceDescriptor>) -> Value {
    let entries: Vec<DeviceEntry> = devices.into_iter().map(DeviceEntry::from).collect();
    serde_json::to_value(entries).unwrap_or_else(|_| Value::Array(Vec::new()))
}

/// String argument `key` of an argument map. Missing keys, `null`, and
/// non-map argument values read as absent.
fn optional_str<'a>(args: &'a Value, key: &str) -> Result<Option<&'a str>, CaptureError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(CaptureError::Bridge(format!("{} must be a string", key))),
    }
}
