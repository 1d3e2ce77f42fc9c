//! Camera preview lifecycle.
//!
//! The controller takes a camera from `Closed` through `Opening` and `Open`
//! to `PreviewActive`, and back. Opening and closing are serialised by a
//! single permit; device callbacks run on a dedicated background thread.

mod config;
mod engine;
mod permit;
mod state;
mod worker;

pub use config::{ConfigError, ControllerConfig, FileConfig, MetricsConfig, TargetConfig};
pub use engine::{ControllerError, PreviewController};
pub use permit::Permit;
pub use state::{CameraSelector, LifecycleState};
