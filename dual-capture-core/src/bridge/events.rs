use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::models::device::DeviceDescriptor;
use crate::models::error::CaptureError;
use crate::models::state::SessionKind;

/// Method name under which audio events are pushed to the listener.
pub const AUDIO_DATA_METHOD: &str = "onAudioData";

/// One captured buffer, encoded for a text-only transport.
///
/// ```json
/// { "type": "microphone", "data": "AAEC...", "size": 480 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDataEvent {
    #[serde(rename = "type")]
    pub stream: SessionKind,
    /// Standard base64 (with padding) of the raw buffer.
    pub data: String,
    /// Byte length of the raw buffer.
    pub size: u64,
}

impl AudioDataEvent {
    pub fn encode(stream: SessionKind, bytes: &[u8]) -> Self {
        Self {
            stream,
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            size: bytes.len() as u64,
        }
    }

    /// Raw bytes back from `data`.
    pub fn decode(&self) -> Result<Vec<u8>, CaptureError> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| CaptureError::Bridge(format!("invalid audio payload: {}", e)))
    }
}

/// Device as listed to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEntry {
    pub id: String,
    pub name: String,
    pub is_input: bool,
}

impl From<DeviceDescriptor> for DeviceEntry {
    fn from(device: DeviceDescriptor) -> Self {
        Self {
            id: device.id,
            name: device.display_name,
            is_input: device.direction.is_input(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::device::DeviceDirection;

    #[test]
    fn event_wire_shape() {
        let event = AudioDataEvent::encode(SessionKind::SystemAudio, &[0xff, 0x00, 0x10, 0x20]);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "system");
        assert_eq!(json["data"], "/wAQIA==");
        assert_eq!(json["size"], 4);
    }

    #[test]
    fn decode_restores_bytes() {
        let bytes: Vec<u8> = (0..=255).collect();
        let event = AudioDataEvent::encode(SessionKind::Microphone, &bytes);
        assert_eq!(event.decode().unwrap(), bytes);
    }

    #[test]
    fn decode_rejects_garbage() {
        let event = AudioDataEvent {
            stream: SessionKind::Microphone,
            data: "not base64!".into(),
            size: 3,
        };
        assert!(matches!(event.decode(), Err(CaptureError::Bridge(_))));
    }

    #[test]
    fn device_entry_from_descriptor() {
        let entry = DeviceEntry::from(DeviceDescriptor::new("id", None, DeviceDirection::Input));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({"id": "id", "name": "Unknown Device", "isInput": true}));
    }
}
