//! Metrics collection and registry.

use crate::controller::LifecycleState;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A point-in-time copy of the counters, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub open_attempts: u64,
    pub open_failures: u64,
    pub lock_timeouts: u64,
    pub previews_started: u64,
    pub device_errors: u64,
    pub swaps: u64,
    pub lifecycle_state: i64,
}

/// Prometheus metrics registry for the preview controller.
pub struct MetricsRegistry {
    registry: Registry,

    open_attempts_total: IntCounter,
    open_failures_total: IntCounter,
    lock_timeouts_total: IntCounter,
    previews_started_total: IntCounter,
    device_errors_total: IntCounter,
    swaps_total: IntCounter,
    lifecycle_state: IntGauge,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all controller metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let open_attempts_total = IntCounter::new(
            "camera_preview_open_attempts_total",
            "Open requests that reached the device permit",
        )?;
        let open_failures_total = IntCounter::new(
            "camera_preview_open_failures_total",
            "Open requests that did not produce a device handle",
        )?;
        let lock_timeouts_total = IntCounter::new(
            "camera_preview_lock_timeouts_total",
            "Timeouts waiting for the device permit",
        )?;
        let previews_started_total = IntCounter::new(
            "camera_preview_previews_started_total",
            "Preview sessions that started a repeating request",
        )?;
        let device_errors_total = IntCounter::new(
            "camera_preview_device_errors_total",
            "Disconnect and error events reported by devices",
        )?;
        let swaps_total = IntCounter::new(
            "camera_preview_swaps_total",
            "Camera selector swaps",
        )?;
        let lifecycle_state = IntGauge::new(
            "camera_preview_lifecycle_state",
            "Lifecycle state (0=closed, 1=opening, 2=open, 3=preview-active, 4=closing)",
        )?;

        registry.register(Box::new(open_attempts_total.clone()))?;
        registry.register(Box::new(open_failures_total.clone()))?;
        registry.register(Box::new(lock_timeouts_total.clone()))?;
        registry.register(Box::new(previews_started_total.clone()))?;
        registry.register(Box::new(device_errors_total.clone()))?;
        registry.register(Box::new(swaps_total.clone()))?;
        registry.register(Box::new(lifecycle_state.clone()))?;

        Ok(Self {
            registry,
            open_attempts_total,
            open_failures_total,
            lock_timeouts_total,
            previews_started_total,
            device_errors_total,
            swaps_total,
            lifecycle_state,
        })
    }

    pub fn record_open_attempt(&self) {
        self.open_attempts_total.inc();
    }

    pub fn record_open_failure(&self) {
        self.open_failures_total.inc();
    }

    pub fn record_lock_timeout(&self) {
        self.lock_timeouts_total.inc();
    }

    pub fn record_preview_started(&self) {
        self.previews_started_total.inc();
    }

    pub fn record_device_error(&self) {
        self.device_errors_total.inc();
    }

    pub fn record_swap(&self) {
        self.swaps_total.inc();
    }

    /// Publishes the current lifecycle state.
    pub fn set_state(&self, state: LifecycleState) {
        self.lifecycle_state.set(state.code());
    }

    /// Copies the current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            open_attempts: self.open_attempts_total.get(),
            open_failures: self.open_failures_total.get(),
            lock_timeouts: self.lock_timeouts_total.get(),
            previews_started: self.previews_started_total.get(),
            device_errors: self.device_errors_total.get(),
            swaps: self.swaps_total.get(),
            lifecycle_state: self.lifecycle_state.get(),
        }
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
