use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// How samples are encoded inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    /// Signed integer PCM.
    #[default]
    Pcm,
    /// IEEE float. Shared-mode mix formats are usually 32-bit float.
    Float,
}

/// Interleaved stream format negotiated for a capture session.
///
/// Invariant: `block_align == channels * bits_per_sample / 8` and
/// `bytes_per_second == sample_rate * block_align`. Every constructor derives
/// the two fields; [`StreamFormat::validate`] checks formats that come back
/// from a platform backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "FormatFields")]
pub struct StreamFormat {
    pub encoding: SampleEncoding,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub block_align: u16,
    pub bytes_per_second: u32,
}

impl StreamFormat {
    /// Format requested for microphone capture: 44.1 kHz, stereo, 16-bit PCM.
    pub const MICROPHONE_TARGET: StreamFormat = StreamFormat::pcm(44_100, 2, 16);

    /// Integer PCM format with derived block alignment and byte rate.
    pub const fn pcm(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self::with_encoding(SampleEncoding::Pcm, sample_rate, channels, bits_per_sample)
    }

    /// IEEE float format with derived block alignment and byte rate.
    pub const fn float(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self::with_encoding(SampleEncoding::Float, sample_rate, channels, bits_per_sample)
    }

    /// Const constructor for known-good values. Use [`try_new`](Self::try_new)
    /// for anything read from a document or a platform.
    pub const fn with_encoding(
        encoding: SampleEncoding,
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
    ) -> Self {
        let block_align = channels * bits_per_sample / 8;
        Self {
            encoding,
            sample_rate,
            channels,
            bits_per_sample,
            block_align,
            bytes_per_second: sample_rate * block_align as u32,
        }
    }

    /// Like [`with_encoding`](Self::with_encoding), for values from outside
    /// the crate: derived fields that do not fit their wire widths are an
    /// error instead of an overflow, and the result is validated.
    pub fn try_new(
        encoding: SampleEncoding,
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
    ) -> Result<Self, CaptureError> {
        let block_align = u16::try_from(channels as u32 * bits_per_sample as u32 / 8).map_err(|_| {
            CaptureError::InvalidFormat(format!(
                "{} ch x {} bits exceeds the maximum block align",
                channels, bits_per_sample
            ))
        })?;
        let bytes_per_second = sample_rate.checked_mul(block_align as u32).ok_or_else(|| {
            CaptureError::InvalidFormat(format!(
                "{} Hz x {} bytes exceeds the maximum byte rate",
                sample_rate, block_align
            ))
        })?;
        let format = Self {
            encoding,
            sample_rate,
            channels,
            bits_per_sample,
            block_align,
            bytes_per_second,
        };
        format.validate()?;
        Ok(format)
    }

    /// Check the format invariant. Backends call this on every format they
    /// hand to the engine.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.sample_rate == 0 {
            return Err(CaptureError::InvalidFormat("sample rate must be positive".into()));
        }
        if self.channels == 0 {
            return Err(CaptureError::InvalidFormat("channel count must be positive".into()));
        }
        if self.bits_per_sample == 0 || self.bits_per_sample % 8 != 0 {
            return Err(CaptureError::InvalidFormat(format!(
                "unsupported bits per sample: {}",
                self.bits_per_sample
            )));
        }
        let expected_align = self.channels as u32 * self.bits_per_sample as u32 / 8;
        if self.block_align as u32 != expected_align {
            return Err(CaptureError::InvalidFormat(format!(
                "block align {} does not match {} ch x {} bits",
                self.block_align, self.channels, self.bits_per_sample
            )));
        }
        if self.bytes_per_second as u64 != self.sample_rate as u64 * self.block_align as u64 {
            return Err(CaptureError::InvalidFormat(format!(
                "byte rate {} does not match {} Hz x {} bytes",
                self.bytes_per_second, self.sample_rate, self.block_align
            )));
        }
        Ok(())
    }

    /// Size in bytes of `frames` interleaved frames.
    pub fn frames_to_bytes(&self, frames: u32) -> usize {
        frames as usize * self.block_align as usize
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.encoding {
            SampleEncoding::Pcm => "",
            SampleEncoding::Float => " float",
        };
        write!(
            f,
            "{} Hz, {} ch, {}-bit{}",
            self.sample_rate, self.channels, self.bits_per_sample, kind
        )
    }
}

/// Deserialization shape: derived fields are recomputed, never trusted.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FormatFields {
    #[serde(default)]
    encoding: SampleEncoding,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
}

impl TryFrom<FormatFields> for StreamFormat {
    type Error = CaptureError;

    fn try_from(fields: FormatFields) -> Result<Self, Self::Error> {
        StreamFormat::try_new(fields.encoding, fields.sample_rate, fields.channels, fields.bits_per_sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn microphone_target_derived_fields() {
        let format = StreamFormat::MICROPHONE_TARGET;
        assert_eq!(format.sample_rate, 44_100);
        assert_eq!(format.channels, 2);
        assert_eq!(format.bits_per_sample, 16);
        assert_eq!(format.block_align, 4);
        assert_eq!(format.bytes_per_second, 176_400);
        assert!(format.validate().is_ok());
    }

    #[test]
    fn float_mix_format() {
        let format = StreamFormat::float(48_000, 2, 32);
        assert_eq!(format.block_align, 8);
        assert_eq!(format.bytes_per_second, 384_000);
        assert_eq!(format.frames_to_bytes(480), 3840);
    }

    #[test]
    fn rejects_inconsistent_block_align() {
        let mut format = StreamFormat::pcm(48_000, 2, 16);
        format.block_align = 2;
        assert!(matches!(format.validate(), Err(CaptureError::InvalidFormat(_))));
    }

    #[test]
    fn rejects_inconsistent_byte_rate() {
        let mut format = StreamFormat::pcm(48_000, 2, 16);
        format.bytes_per_second = 1;
        assert!(format.validate().is_err());
    }

    #[test]
    fn rejects_odd_bit_depth() {
        assert!(StreamFormat::pcm(48_000, 1, 12).validate().is_err());
        assert!(StreamFormat::pcm(0, 1, 16).validate().is_err());
    }

    #[test]
    fn deserialize_recomputes_derived_fields() {
        let format: StreamFormat =
            serde_json::from_str(r#"{"sampleRate":16000,"channels":1,"bitsPerSample":16,"blockAlign":99}"#)
                .unwrap();
        assert_eq!(format, StreamFormat::pcm(16_000, 1, 16));
    }

    #[test]
    fn try_new_rejects_oversized_fields() {
        assert!(matches!(
            StreamFormat::try_new(SampleEncoding::Float, 48_000, u16::MAX, 32),
            Err(CaptureError::InvalidFormat(_))
        ));
        // The channel-times-bits product no longer overflows before the division.
        let wide = StreamFormat::try_new(SampleEncoding::Float, 48_000, 4096, 32).unwrap();
        assert_eq!(wide.block_align, 16_384);
        assert!(matches!(
            StreamFormat::try_new(SampleEncoding::Pcm, 4_000_000_000, 2, 16),
            Err(CaptureError::InvalidFormat(_))
        ));
        assert_eq!(
            StreamFormat::try_new(SampleEncoding::Pcm, 44_100, 2, 16).unwrap(),
            StreamFormat::MICROPHONE_TARGET
        );
    }

    #[test]
    fn display() {
        assert_eq!(StreamFormat::MICROPHONE_TARGET.to_string(), "44100 Hz, 2 ch, 16-bit");
        assert_eq!(StreamFormat::float(48_000, 2, 32).to_string(), "48000 Hz, 2 ch, 32-bit float");
    }
}
