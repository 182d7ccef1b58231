use std::fmt;

use serde::{Deserialize, Serialize};

/// Name reported for an endpoint whose friendly name could not be resolved.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

/// Direction of an audio endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceDirection {
    /// Capture-capable endpoint (microphone, line in).
    Input,
    /// Render-capable endpoint (speakers, headphones). Loopback reads from these.
    Output,
}

impl DeviceDirection {
    pub fn is_input(self) -> bool {
        matches!(self, Self::Input)
    }
}

impl fmt::Display for DeviceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Snapshot of one active platform endpoint.
///
/// Produced fresh by every enumeration and carries no live handle. The `id`
/// can be passed back to a start call later, which fails at runtime if the
/// endpoint has disappeared in the meantime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub id: String,
    pub display_name: String,
    pub direction: DeviceDirection,
}

impl DeviceDescriptor {
    /// Build a descriptor, substituting [`UNKNOWN_DEVICE_NAME`] when the
    /// platform could not resolve a friendly name.
    pub fn new(id: impl Into<String>, display_name: Option<String>, direction: DeviceDirection) -> Self {
        let display_name = display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string());
        Self {
            id: id.into(),
            display_name,
            direction,
        }
    }
}
