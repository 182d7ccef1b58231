use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::device::DeviceDirection;
use crate::models::error::CaptureError;
use crate::models::format::StreamFormat;
use crate::traits::platform::{
    AudioClient, AudioEndpoint, CaptureClient, DeviceDirectory, EndpointEntry, FormatSupport, PacketFlags,
    StreamMode,
};

/// Start-time step at which a mock device fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailStep {
    Activate,
    MixFormat,
    Negotiate,
    Initialize,
    Service,
    Start,
    Read,
}

/// One scripted packet. Its payload is `frames * block_align` bytes of
/// `fill` (zeros when `silent`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPacket {
    pub frames: u32,
    pub fill: u8,
    pub silent: bool,
}

impl MockPacket {
    pub fn new(frames: u32, fill: u8) -> Self {
        Self {
            frames,
            fill,
            silent: false,
        }
    }

    pub fn silent(frames: u32) -> Self {
        Self {
            frames,
            fill: 0,
            silent: true,
        }
    }
}

/// A scripted endpoint.
#[derive(Debug, Clone)]
pub struct MockDevice {
    id: String,
    name: Option<String>,
    direction: DeviceDirection,
    is_default: bool,
    mix_format: StreamFormat,
    supported: Option<StreamFormat>,
    offers_closest: bool,
    packets: VecDeque<MockPacket>,
    repeat: Option<MockPacket>,
    fail: Option<FailStep>,
}

impl MockDevice {
    pub fn new(id: impl Into<String>, name: Option<&str>, direction: DeviceDirection) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_string),
            direction,
            is_default: false,
            mix_format: StreamFormat::float(48_000, 2, 32),
            supported: None,
            offers_closest: true,
            packets: VecDeque::new(),
            repeat: None,
            fail: None,
        }
    }

    pub fn input(id: impl Into<String>, name: Option<&str>) -> Self {
        Self::new(id, name, DeviceDirection::Input)
    }

    pub fn output(id: impl Into<String>, name: Option<&str>) -> Self {
        Self::new(id, name, DeviceDirection::Output)
    }

    /// Mark as the default endpoint for its direction.
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn with_mix_format(mut self, format: StreamFormat) -> Self {
        self.mix_format = format;
        self
    }

    /// Only `format` is supported in shared mode; any other request gets it
    /// back as the closest match. Without this every request is supported.
    pub fn supporting_only(mut self, format: StreamFormat) -> Self {
        self.supported = Some(format);
        self
    }

    /// Unsupported requests get no closest match.
    pub fn without_closest_match(mut self) -> Self {
        self.offers_closest = false;
        self
    }

    pub fn with_packets(mut self, packets: impl IntoIterator<Item = MockPacket>) -> Self {
        self.packets.extend(packets);
        self
    }

    /// After the scripted packets run out, offer `packet` once per poll forever.
    pub fn streaming(mut self, packet: MockPacket) -> Self {
        self.repeat = Some(packet);
        self
    }

    pub fn failing_at(mut self, step: FailStep) -> Self {
        self.fail = Some(step);
        self
    }
}

#[derive(Default)]
struct MockState {
    devices: Vec<MockDevice>,
    enumeration_error: Option<CaptureError>,
    initialized: HashMap<String, Vec<(StreamFormat, StreamMode)>>,
    live_handles: usize,
    started: usize,
    stopped: usize,
}

impl MockState {
    fn device(&self, id: &str) -> Option<&MockDevice> {
        self.devices.iter().find(|d| d.id == id)
    }

    fn device_mut(&mut self, id: &str) -> Option<&mut MockDevice> {
        self.devices.iter_mut().find(|d| d.id == id)
    }

    fn fails_at(&self, id: &str, step: FailStep) -> bool {
        self.device(id).and_then(|d| d.fail) == Some(step)
    }
}

/// In-memory [`DeviceDirectory`]. Cloning shares the underlying state, so a
/// test can keep a handle for inspection after giving one to an engine.
#[derive(Clone, Default)]
pub struct MockDirectory {
    state: Arc<Mutex<MockState>>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(self, device: MockDevice) -> Self {
        self.add_device(device);
        self
    }

    pub fn add_device(&self, device: MockDevice) {
        self.state.lock().devices.push(device);
    }

    /// Remove an endpoint, as if it was unplugged.
    pub fn remove_device(&self, id: &str) {
        self.state.lock().devices.retain(|d| d.id != id);
    }

    pub fn push_packets(&self, id: &str, packets: impl IntoIterator<Item = MockPacket>) {
        if let Some(device) = self.state.lock().device_mut(id) {
            device.packets.extend(packets);
        }
    }

    /// Make every enumeration fail with `error`.
    pub fn fail_enumeration(&self, error: CaptureError) {
        self.state.lock().enumeration_error = Some(error);
    }

    /// Formats (and modes) each client for `id` was initialized with, in order.
    pub fn initialized_formats(&self, id: &str) -> Vec<(StreamFormat, StreamMode)> {
        self.state.lock().initialized.get(id).cloned().unwrap_or_default()
    }

    /// Endpoints, clients and capture clients not yet dropped.
    pub fn live_handles(&self) -> usize {
        self.state.lock().live_handles
    }

    pub fn started_streams(&self) -> usize {
        self.state.lock().started
    }

    pub fn stopped_streams(&self) -> usize {
        self.state.lock().stopped
    }

    fn open(&self, id: &str) -> Box<dyn AudioEndpoint> {
        self.state.lock().live_handles += 1;
        Box::new(MockEndpoint {
            state: Arc::clone(&self.state),
            id: id.to_string(),
        })
    }
}

impl DeviceDirectory for MockDirectory {
    fn endpoints(&self, direction: DeviceDirection) -> Result<Vec<EndpointEntry>, CaptureError> {
        let state = self.state.lock();
        if let Some(ref e) = state.enumeration_error {
            return Err(e.clone());
        }
        Ok(state
            .devices
            .iter()
            .filter(|d| d.direction == direction)
            .map(|d| EndpointEntry {
                id: d.id.clone(),
                friendly_name: d.name.clone(),
            })
            .collect())
    }

    fn default_endpoint(&self, direction: DeviceDirection) -> Result<Box<dyn AudioEndpoint>, CaptureError> {
        let id = {
            let state = self.state.lock();
            state
                .devices
                .iter()
                .find(|d| d.direction == direction && d.is_default)
                .map(|d| d.id.clone())
                .ok_or(CaptureError::DeviceNotAvailable)?
        };
        Ok(self.open(&id))
    }

    fn endpoint(&self, id: &str) -> Result<Box<dyn AudioEndpoint>, CaptureError> {
        if self.state.lock().device(id).is_none() {
            return Err(CaptureError::DeviceNotAvailable);
        }
        Ok(self.open(id))
    }
}

struct MockEndpoint {
    state: Arc<Mutex<MockState>>,
    id: String,
}

impl AudioEndpoint for MockEndpoint {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn activate(&self) -> Result<Box<dyn AudioClient>, CaptureError> {
        let mut state = self.state.lock();
        if state.fails_at(&self.id, FailStep::Activate) {
            return Err(CaptureError::ActivationFailed("mock activation failure".into()));
        }
        state.live_handles += 1;
        Ok(Box::new(MockClient {
            state: Arc::clone(&self.state),
            id: self.id.clone(),
            format: None,
            running: false,
        }))
    }
}

impl Drop for MockEndpoint {
    fn drop(&mut self) {
        self.state.lock().live_handles -= 1;
    }
}

struct MockClient {
    state: Arc<Mutex<MockState>>,
    id: String,
    format: Option<StreamFormat>,
    running: bool,
}

impl AudioClient for MockClient {
    fn mix_format(&self) -> Result<StreamFormat, CaptureError> {
        let state = self.state.lock();
        if state.fails_at(&self.id, FailStep::MixFormat) {
            return Err(CaptureError::FormatNegotiation("mock mix format failure".into()));
        }
        state
            .device(&self.id)
            .map(|d| d.mix_format)
            .ok_or(CaptureError::DeviceNotAvailable)
    }

    fn is_format_supported(&self, requested: &StreamFormat) -> Result<FormatSupport, CaptureError> {
        let state = self.state.lock();
        if state.fails_at(&self.id, FailStep::Negotiate) {
            return Err(CaptureError::FormatNegotiation("mock format query failure".into()));
        }
        let device = state.device(&self.id).ok_or(CaptureError::DeviceNotAvailable)?;
        Ok(match device.supported {
            None => FormatSupport::Supported,
            Some(supported) if supported == *requested => FormatSupport::Supported,
            Some(supported) if device.offers_closest => FormatSupport::ClosestMatch(supported),
            Some(_) => FormatSupport::Unsupported,
        })
    }

    fn initialize(
        &mut self,
        format: &StreamFormat,
        mode: StreamMode,
        _buffer_duration: Duration,
    ) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if state.fails_at(&self.id, FailStep::Initialize) {
            return Err(CaptureError::InitializeFailed("mock initialize failure".into()));
        }
        state
            .initialized
            .entry(self.id.clone())
            .or_default()
            .push((*format, mode));
        self.format = Some(*format);
        Ok(())
    }

    fn capture_service(&mut self) -> Result<Box<dyn CaptureClient>, CaptureError> {
        let format = self
            .format
            .ok_or_else(|| CaptureError::ServiceUnavailable("client not initialized".into()))?;
        let mut state = self.state.lock();
        if state.fails_at(&self.id, FailStep::Service) {
            return Err(CaptureError::ServiceUnavailable("mock service failure".into()));
        }
        state.live_handles += 1;
        Ok(Box::new(MockCaptureClient {
            state: Arc::clone(&self.state),
            id: self.id.clone(),
            block_align: format.block_align,
            repeat_ready: true,
        }))
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if state.fails_at(&self.id, FailStep::Start) {
            return Err(CaptureError::StreamStart("mock start failure".into()));
        }
        state.started += 1;
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        if self.running {
            self.running = false;
            self.state.lock().stopped += 1;
        }
        Ok(())
    }
}

impl Drop for MockClient {
    fn drop(&mut self) {
        self.state.lock().live_handles -= 1;
    }
}

struct MockCaptureClient {
    state: Arc<Mutex<MockState>>,
    id: String,
    block_align: u16,
    // A streaming device offers one repeat packet per poll, like hardware
    // filling a buffer between polls.
    repeat_ready: bool,
}

impl MockCaptureClient {
    fn peek(&mut self) -> Result<Option<MockPacket>, CaptureError> {
        let state = self.state.lock();
        if state.fails_at(&self.id, FailStep::Read) {
            return Err(CaptureError::Capture("mock read failure".into()));
        }
        let device = state.device(&self.id).ok_or(CaptureError::DeviceNotAvailable)?;
        if let Some(packet) = device.packets.front() {
            return Ok(Some(*packet));
        }
        Ok(device.repeat.filter(|_| self.repeat_ready))
    }
}

impl CaptureClient for MockCaptureClient {
    fn next_packet_frames(&mut self) -> Result<u32, CaptureError> {
        match self.peek()? {
            Some(packet) => Ok(packet.frames),
            None => {
                self.repeat_ready = true;
                Ok(0)
            }
        }
    }

    fn drain_packet(&mut self, sink: &mut dyn FnMut(&[u8], PacketFlags)) -> Result<u32, CaptureError> {
        let packet = {
            let mut state = self.state.lock();
            let device = state.device_mut(&self.id).ok_or(CaptureError::DeviceNotAvailable)?;
            match device.packets.pop_front() {
                Some(packet) => packet,
                None => match device.repeat {
                    Some(packet) if self.repeat_ready => {
                        self.repeat_ready = false;
                        packet
                    }
                    _ => return Err(CaptureError::Capture("no packet available".into())),
                },
            }
        };

        let len = packet.frames as usize * self.block_align as usize;
        let fill = if packet.silent { 0 } else { packet.fill };
        let data = vec![fill; len];
        sink(
            &data,
            PacketFlags {
                silent: packet.silent,
                discontinuity: false,
            },
        );
        Ok(packet.frames)
    }
}

impl Drop for MockCaptureClient {
    fn drop(&mut self) {
        self.state.lock().live_handles -= 1;
    }
}
