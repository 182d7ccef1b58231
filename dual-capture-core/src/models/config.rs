use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;
use super::format::StreamFormat;

/// Tunables for the capture engine.
///
/// Every field has a default, so a partial JSON document is enough:
/// `{"pollIntervalMs": 5}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Sleep between polls when the platform has no packet ready (default: 10).
    pub poll_interval_ms: u64,

    /// Buffer duration requested when initializing a client (default: 1000).
    pub buffer_duration_ms: u64,

    /// Format requested for microphone capture (default: 44.1 kHz / 2 ch / 16-bit).
    pub microphone_target: StreamFormat,

    /// Queue length of a [`BufferedHandoff`](crate::processing::handoff::BufferedHandoff)
    /// created through the engine (default: 64 chunks).
    pub handoff_capacity: usize,

    /// External transcoder executable (default: `ffmpeg`).
    pub transcoder_program: String,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.poll_interval_ms == 0 {
            return Err(CaptureError::Configuration("poll interval must be positive".into()));
        }
        if self.buffer_duration_ms == 0 {
            return Err(CaptureError::Configuration("buffer duration must be positive".into()));
        }
        if self.handoff_capacity == 0 {
            return Err(CaptureError::Configuration("handoff capacity must be positive".into()));
        }
        if self.transcoder_program.trim().is_empty() {
            return Err(CaptureError::Configuration("transcoder program must not be empty".into()));
        }
        self.microphone_target
            .validate()
            .map_err(|e| CaptureError::Configuration(format!("microphone target: {}", e)))
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::Configuration(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn buffer_duration(&self) -> Duration {
        Duration::from_millis(self.buffer_duration_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            buffer_duration_ms: 1000,
            microphone_target: StreamFormat::MICROPHONE_TARGET,
            handoff_capacity: 64,
            transcoder_program: "ffmpeg".into(),
        }
    }
}
