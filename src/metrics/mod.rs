//! Prometheus metrics exporter for the preview controller.
//!
//! # Metrics Exposed
//!
//! - `camera_preview_open_attempts_total` - Open requests that took the permit
//! - `camera_preview_open_failures_total` - Opens that produced no handle
//! - `camera_preview_lock_timeouts_total` - Permit waits that timed out
//! - `camera_preview_previews_started_total` - Preview sessions started
//! - `camera_preview_device_errors_total` - Device disconnect and error events
//! - `camera_preview_swaps_total` - Camera selector swaps
//! - `camera_preview_lifecycle_state` - Current lifecycle state code
//!
//! # Example
//!
//! ```no_run
//! use camera_preview::metrics::MetricsRegistry;
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! registry.record_open_attempt();
//! println!("{}", registry.encode().unwrap());
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
