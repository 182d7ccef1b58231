use std::path::Path;
use std::process::{Command, Stdio};

use crate::models::error::CaptureError;

/// Out-of-process audio transcoder (ffmpeg command line).
///
/// Recording and conversion are the caller's business; this only wraps the
/// subprocess and reduces its outcome to success or failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcoder {
    program: String,
}

impl Transcoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments for a WAV → MP3 (LAME, 192 kbit/s) conversion that
    /// overwrites `mp3`.
    pub fn wav_to_mp3_args(wav: &Path, mp3: &Path) -> Vec<std::ffi::OsString> {
        vec![
            "-i".into(),
            wav.as_os_str().to_owned(),
            "-codec:a".into(),
            "libmp3lame".into(),
            "-b:a".into(),
            "192k".into(),
            "-y".into(),
            mp3.as_os_str().to_owned(),
        ]
    }

    /// Convert `wav` to `mp3`, blocking until the transcoder exits.
    ///
    /// Paths are passed as separate arguments, never through a shell.
    pub fn wav_to_mp3(&self, wav: &Path, mp3: &Path) -> Result<(), CaptureError> {
        log::info!("Transcoding {} -> {}", wav.display(), mp3.display());

        let status = Command::new(&self.program)
            .args(Self::wav_to_mp3_args(wav, mp3))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| CaptureError::Transcode(format!("failed to start {}: {}", self.program, e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(CaptureError::Transcode(format!("{} exited with {}", self.program, status)))
        }
    }
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}
