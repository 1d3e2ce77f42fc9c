//! Camera device access.
//!
//! This module provides a trait-based abstraction over the platform's
//! camera service, allowing for both real camera bindings and the mock
//! backend used in tests and the demo binary.

mod backend;
mod mock;

pub use backend::{
    CameraBackend, CameraDevice, CaptureRequest, CaptureSession, ControlMode, DeviceError,
    DeviceEvent, EventSink, RequestTemplate, SessionOutput,
};
pub use mock::{LiveHandles, MockBackend, MockCameraConfig, MockDevice, MockSession, OpenBehavior};
