//! Camera platform abstraction.
//!
//! The controller only talks to hardware through these traits, so a
//! platform binding and the in-process mock are interchangeable.

use crate::host::PreviewSurface;
use crate::negotiation::Size;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by a camera backend or device.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    #[error("camera access denied: {0}")]
    AccessDenied(String),
    #[error("camera device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("camera API not supported: {0}")]
    UnsupportedApi(String),
    #[error("capture session configuration failed: {0}")]
    SessionConfigFailed(String),
    #[error("camera device already closed")]
    Closed,
}

/// Asynchronous outcome of an open request, and later device-level events.
pub enum DeviceEvent<D> {
    /// The device opened; ownership of the handle passes to the receiver.
    Opened(D),
    /// The device went away (another client took it, or it was unplugged).
    Disconnected,
    /// The device reported a fatal error code.
    Error(i32),
}

impl<D> DeviceEvent<D> {
    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceEvent::Opened(_) => "opened",
            DeviceEvent::Disconnected => "disconnected",
            DeviceEvent::Error(_) => "error",
        }
    }
}

impl<D> fmt::Debug for DeviceEvent<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceEvent::Opened(_) => f.write_str("Opened(..)"),
            DeviceEvent::Disconnected => f.write_str("Disconnected"),
            DeviceEvent::Error(code) => write!(f, "Error({code})"),
        }
    }
}

/// Completion channel handed to [`CameraBackend::open`].
///
/// Backends may keep a clone and deliver more events after `Opened`, for
/// example a later disconnect.
pub struct EventSink<D> {
    deliver: Arc<dyn Fn(DeviceEvent<D>) -> bool + Send + Sync>,
}

impl<D> EventSink<D> {
    /// Wraps a delivery function. It returns false once nobody listens.
    pub fn new(deliver: impl Fn(DeviceEvent<D>) -> bool + Send + Sync + 'static) -> Self {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// Delivers an event. Returns false if the receiver has shut down.
    pub fn deliver(&self, event: DeviceEvent<D>) -> bool {
        (self.deliver)(event)
    }
}

impl<D> Clone for EventSink<D> {
    fn clone(&self) -> Self {
        Self {
            deliver: Arc::clone(&self.deliver),
        }
    }
}

impl<D> fmt::Debug for EventSink<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

/// Request template a capture request is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTemplate {
    Preview,
    Record,
    StillCapture,
}

/// 3A control mode applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Off,
    Auto,
}

/// A capture request submitted to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub template: RequestTemplate,
    pub control_mode: ControlMode,
}

impl CaptureRequest {
    /// Continuous preview with automatic exposure, focus and white balance.
    pub fn preview() -> Self {
        Self {
            template: RequestTemplate::Preview,
            control_mode: ControlMode::Auto,
        }
    }
}

/// Output a capture session renders into.
#[derive(Clone)]
pub struct SessionOutput {
    /// Destination surface, owned by the host.
    pub surface: Arc<dyn PreviewSurface>,
    /// Negotiated buffer size.
    pub size: Size,
}

impl fmt::Debug for SessionOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOutput").field("size", &self.size).finish()
    }
}

/// A configured capture session bound to one device and one surface.
pub trait CaptureSession: Send + 'static {
    /// Starts delivering frames for `request` until the session closes.
    fn set_repeating_request(&mut self, request: &CaptureRequest) -> Result<(), DeviceError>;

    /// Stops the session. Closing twice is a no-op.
    fn close(&mut self);
}

/// An open camera device.
pub trait CameraDevice: Send + 'static {
    /// Session type this device creates.
    type Session: CaptureSession;

    /// Platform identifier of this device.
    fn id(&self) -> &str;

    /// Builds a capture session rendering into `output`.
    fn create_capture_session(&mut self, output: &SessionOutput) -> Result<Self::Session, DeviceError>;

    /// Releases the device. Closing twice is a no-op.
    fn close(&mut self);
}

/// Entry point to a platform's cameras.
pub trait CameraBackend: Send + Sync + 'static {
    /// Device type produced by [`CameraBackend::open`].
    type Device: CameraDevice;

    /// Lists camera identifiers in platform order.
    fn camera_ids(&self) -> Result<Vec<String>, DeviceError>;

    /// Lists the output sizes a camera supports for preview surfaces.
    ///
    /// `Ok(None)` means the platform returned no stream configuration map.
    fn output_sizes(&self, camera_id: &str) -> Result<Option<Vec<Size>>, DeviceError>;

    /// Requests the device. The outcome arrives through `sink`.
    fn open(&self, camera_id: &str, sink: EventSink<Self::Device>) -> Result<(), DeviceError>;
}
