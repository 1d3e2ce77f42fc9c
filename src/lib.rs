//! Camera Preview Controller Library
//!
//! Drives a camera device through its preview lifecycle for a host view:
//! negotiates an output size from the sizes the device reports, opens the
//! device, binds a capture session to the host's surface and reports
//! state changes back to the host.
//!
//! # Architecture
//!
//! ```text
//! host surface → negotiation → controller → device backend
//!                                  ↓
//!                     listener (started / stopped)
//! ```
//!
//! # Design Principles
//!
//! - **One live handle**: open and close are serialised by a single permit
//! - **Owned, not global**: a controller is a value owned by its host
//! - **Channel completion**: device answers arrive as tagged events on a
//!   background thread
//! - **Non-fatal device errors**: access or capability failures are
//!   reported to the host, only lock failures abort the call
//!
//! # Example
//!
//! ```no_run
//! use camera_preview::{
//!     controller::{ControllerConfig, PreviewController},
//!     device::MockBackend,
//!     host::{ChannelListener, PreviewSurface, PreviewTarget},
//!     negotiation::Size,
//! };
//! use std::sync::Arc;
//!
//! struct Surface;
//!
//! impl PreviewSurface for Surface {
//!     fn is_available(&self) -> bool {
//!         true
//!     }
//!
//!     fn set_default_buffer_size(&self, _size: Size) {}
//! }
//!
//! let (listener, events) = ChannelListener::new();
//! let controller = PreviewController::new(
//!     MockBackend::default(),
//!     ControllerConfig::default(),
//!     Arc::new(listener),
//! );
//!
//! controller.set_preview_target(PreviewTarget::new(Arc::new(Surface), 1280, 720));
//! controller.open(1280, 720).unwrap();
//!
//! let event = events.recv().unwrap();
//! assert!(event.is_started());
//!
//! controller.close().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod controller;
pub mod device;
pub mod host;
pub mod metrics;
pub mod negotiation;

// Re-export commonly used types at crate root
pub use controller::{
    CameraSelector, ControllerConfig, ControllerError, FileConfig, LifecycleState,
    PreviewController,
};
pub use device::{CameraBackend, CameraDevice, CaptureSession, DeviceError, DeviceEvent, MockBackend};
pub use host::{ChannelListener, PreviewListener, PreviewSurface, PreviewTarget};
pub use negotiation::{choose_optimal_size, choose_video_size, Size};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
