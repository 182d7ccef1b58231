use crate::models::error::CaptureError;
use crate::models::format::StreamFormat;
use crate::traits::platform::{AudioClient, FormatSupport, StreamMode};

/// Pick the format a client is initialized with.
///
/// Loopback always uses the render endpoint's mix format: the platform cannot
/// resample a loopback stream, so `requested` is ignored. Capture asks for
/// `requested`; a partially supported request is replaced by the platform's
/// closest match, and an outright rejection falls back to the mix format,
/// which shared mode always accepts.
///
/// Every returned format has been checked against the format invariant.
pub fn negotiate_format(
    client: &dyn AudioClient,
    mode: StreamMode,
    requested: &StreamFormat,
) -> Result<StreamFormat, CaptureError> {
    let negotiated = match mode {
        StreamMode::Loopback => client.mix_format()?,
        StreamMode::Capture => match client.is_format_supported(requested)? {
            FormatSupport::Supported => *requested,
            FormatSupport::ClosestMatch(closest) => {
                log::debug!("Requested {} not supported, using closest match {}", requested, closest);
                closest
            }
            FormatSupport::Unsupported => {
                let mix = client.mix_format()?;
                log::debug!("Requested {} rejected, falling back to mix format {}", requested, mix);
                mix
            }
        },
    };

    negotiated
        .validate()
        .map_err(|e| CaptureError::FormatNegotiation(format!("platform returned {}: {}", negotiated, e)))?;
    Ok(negotiated)
}
