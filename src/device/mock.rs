//! In-process camera backend for tests and the demo binary.

use super::backend::{
    CameraBackend, CameraDevice, CaptureRequest, CaptureSession, DeviceError, DeviceEvent,
    EventSink, SessionOutput,
};
use crate::negotiation::Size;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a mock camera answers an open request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenBehavior {
    /// Delivers `Opened`.
    #[default]
    Succeed,
    /// Delivers `Disconnected`.
    Disconnect,
    /// Delivers `Error(code)`.
    Error(i32),
    /// Fails the open call itself with `AccessDenied`.
    Deny,
}

/// Description of one mock camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockCameraConfig {
    /// Camera identifier.
    pub id: String,
    /// Supported preview output sizes, in reported order.
    #[serde(default = "default_sizes")]
    pub sizes: Vec<Size>,
    /// Report no stream configuration map.
    #[serde(default)]
    pub capabilities_missing: bool,
    /// Answer to open requests.
    #[serde(default)]
    pub behavior: OpenBehavior,
    /// Fail capture session configuration.
    #[serde(default)]
    pub session_fails: bool,
}

fn default_sizes() -> Vec<Size> {
    vec![
        Size::new(3840, 2160),
        Size::new(1920, 1080),
        Size::new(1280, 720),
        Size::new(640, 480),
    ]
}

impl MockCameraConfig {
    /// A camera that opens and previews normally.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sizes: default_sizes(),
            capabilities_missing: false,
            behavior: OpenBehavior::Succeed,
            session_fails: false,
        }
    }

    /// Replaces the reported sizes.
    pub fn with_sizes(mut self, sizes: Vec<Size>) -> Self {
        self.sizes = sizes;
        self
    }

    /// Replaces the open behaviour.
    pub fn with_behavior(mut self, behavior: OpenBehavior) -> Self {
        self.behavior = behavior;
        self
    }
}

/// Counts open device handles across a backend.
#[derive(Debug, Default)]
pub struct LiveHandles {
    current: AtomicUsize,
    peak: AtomicUsize,
    opened: AtomicUsize,
}

impl LiveHandles {
    fn acquire(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    /// Handles open right now.
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// Most handles ever open at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Handles opened over the backend's lifetime.
    pub fn opened_total(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

/// Mock camera backend.
///
/// With an open delay the completion is delivered from a separate thread,
/// the way a platform callback would arrive.
#[derive(Debug)]
pub struct MockBackend {
    cameras: Vec<MockCameraConfig>,
    open_delay: Option<Duration>,
    live: Arc<LiveHandles>,
    sinks: Mutex<HashMap<String, EventSink<MockDevice>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(vec![MockCameraConfig::new("0"), MockCameraConfig::new("1")])
    }
}

impl MockBackend {
    /// Creates a backend exposing `cameras` in order.
    pub fn new(cameras: Vec<MockCameraConfig>) -> Self {
        Self {
            cameras,
            open_delay: None,
            live: Arc::new(LiveHandles::default()),
            sinks: Mutex::new(HashMap::new()),
        }
    }

    /// Delivers open outcomes from a background thread after `delay`.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// Shared handle counter.
    pub fn live_handles(&self) -> Arc<LiveHandles> {
        Arc::clone(&self.live)
    }

    /// Simulates the platform revoking an open camera.
    ///
    /// Returns false if the camera was never opened or nobody listens.
    pub fn disconnect(&self, camera_id: &str) -> bool {
        let sink = match self.sinks.lock() {
            Ok(sinks) => sinks.get(camera_id).cloned(),
            Err(_) => None,
        };
        sink.map(|sink| sink.deliver(DeviceEvent::Disconnected))
            .unwrap_or(false)
    }

    fn camera(&self, camera_id: &str) -> Result<&MockCameraConfig, DeviceError> {
        self.cameras
            .iter()
            .find(|camera| camera.id == camera_id)
            .ok_or_else(|| DeviceError::DeviceUnavailable(camera_id.to_string()))
    }
}

impl CameraBackend for MockBackend {
    type Device = MockDevice;

    fn camera_ids(&self) -> Result<Vec<String>, DeviceError> {
        Ok(self.cameras.iter().map(|camera| camera.id.clone()).collect())
    }

    fn output_sizes(&self, camera_id: &str) -> Result<Option<Vec<Size>>, DeviceError> {
        let camera = self.camera(camera_id)?;
        if camera.capabilities_missing {
            return Ok(None);
        }
        Ok(Some(camera.sizes.clone()))
    }

    fn open(&self, camera_id: &str, sink: EventSink<MockDevice>) -> Result<(), DeviceError> {
        let camera = self.camera(camera_id)?;

        let event = match camera.behavior {
            OpenBehavior::Deny => {
                return Err(DeviceError::AccessDenied(format!(
                    "camera {camera_id} requires permission"
                )))
            }
            OpenBehavior::Succeed => {
                self.live.acquire();
                DeviceEvent::Opened(MockDevice {
                    id: camera.id.clone(),
                    live: Arc::clone(&self.live),
                    session_fails: camera.session_fails,
                    open: true,
                })
            }
            OpenBehavior::Disconnect => DeviceEvent::Disconnected,
            OpenBehavior::Error(code) => DeviceEvent::Error(code),
        };

        if let Ok(mut sinks) = self.sinks.lock() {
            sinks.insert(camera.id.clone(), sink.clone());
        }

        tracing::debug!(camera_id, event = event.kind(), delay = ?self.open_delay, "MockBackend open");
        match self.open_delay {
            Some(delay) => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    sink.deliver(event);
                });
            }
            None => {
                sink.deliver(event);
            }
        }
        Ok(())
    }
}

/// Handle to an open mock camera.
#[derive(Debug)]
pub struct MockDevice {
    id: String,
    live: Arc<LiveHandles>,
    session_fails: bool,
    open: bool,
}

impl CameraDevice for MockDevice {
    type Session = MockSession;

    fn id(&self) -> &str {
        &self.id
    }

    fn create_capture_session(&mut self, output: &SessionOutput) -> Result<MockSession, DeviceError> {
        if !self.open {
            return Err(DeviceError::Closed);
        }
        if self.session_fails {
            return Err(DeviceError::SessionConfigFailed(format!(
                "camera {} rejected output {}",
                self.id, output.size
            )));
        }
        Ok(MockSession {
            size: output.size,
            repeating: None,
            open: true,
        })
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.live.release();
            tracing::info!(camera_id = %self.id, "MockDevice closed");
        }
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.close();
    }
}

/// Capture session of a [`MockDevice`].
#[derive(Debug)]
pub struct MockSession {
    size: Size,
    repeating: Option<CaptureRequest>,
    open: bool,
}

impl MockSession {
    /// Size the session renders at.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Request currently repeating, if any.
    pub fn repeating_request(&self) -> Option<CaptureRequest> {
        self.repeating
    }
}

impl CaptureSession for MockSession {
    fn set_repeating_request(&mut self, request: &CaptureRequest) -> Result<(), DeviceError> {
        if !self.open {
            return Err(DeviceError::Closed);
        }
        self.repeating = Some(*request);
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.repeating = None;
    }
}
