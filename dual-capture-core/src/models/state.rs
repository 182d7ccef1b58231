use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::traits::platform::StreamMode;

/// The two capture sessions an engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    /// Loopback capture of a render endpoint.
    #[serde(rename = "system")]
    SystemAudio,
    /// Capture from an input endpoint.
    #[serde(rename = "microphone")]
    Microphone,
}

impl SessionKind {
    pub fn mode(self) -> StreamMode {
        match self {
            Self::SystemAudio => StreamMode::Loopback,
            Self::Microphone => StreamMode::Capture,
        }
    }

    /// Short tag used in logs, thread names and bridge events.
    pub fn label(self) -> &'static str {
        match self {
            Self::SystemAudio => "system",
            Self::Microphone => "microphone",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Capture session lifecycle.
///
/// ```text
/// idle → starting → running → stopping → idle
///           ↓                    ↑
///           └──── (failure) ─────┘
/// ```
///
/// `Starting` covers the window between thread launch and the stream being
/// live on the platform. A start that fails inside the worker goes straight
/// back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureState {
    Idle,
    Starting,
    Running,
    Stopping,
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Starting => 1,
            Self::Running => 2,
            Self::Stopping => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Idle,
        }
    }
}

/// Lock-free cell holding a [`CaptureState`], shared between a session and
/// its worker thread.
#[derive(Debug)]
pub struct AtomicCaptureState(AtomicU8);

impl AtomicCaptureState {
    pub fn new(state: CaptureState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub fn load(&self) -> CaptureState {
        CaptureState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn store(&self, state: CaptureState) {
        self.0.store(state.to_u8(), Ordering::SeqCst);
    }

    /// Move to `to` only if the current state is `from`.
    pub fn transition(&self, from: CaptureState, to: CaptureState) -> bool {
        self.0
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for AtomicCaptureState {
    fn default() -> Self {
        Self::new(CaptureState::Idle)
    }
}

/// Delivery counters for one capture session, reset on every start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Number of callback invocations.
    pub callbacks: u64,
    /// Total bytes handed to the callback.
    pub bytes_delivered: u64,
    /// Packets the platform flagged as silent (still delivered).
    pub silent_packets: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_requires_expected_state() {
        let cell = AtomicCaptureState::new(CaptureState::Starting);
        cell.store(CaptureState::Stopping);

        // A worker reaching its loop late must not overwrite a pending stop.
        assert!(!cell.transition(CaptureState::Starting, CaptureState::Running));
        assert_eq!(cell.load(), CaptureState::Stopping);

        assert!(cell.transition(CaptureState::Stopping, CaptureState::Idle));
        assert!(cell.load().is_idle());
    }

    #[test]
    fn session_kinds_map_to_stream_modes() {
        assert_eq!(SessionKind::SystemAudio.mode(), StreamMode::Loopback);
        assert_eq!(SessionKind::Microphone.mode(), StreamMode::Capture);
        assert_eq!(SessionKind::Microphone.to_string(), "microphone");
    }
}
