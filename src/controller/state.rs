//! Lifecycle state and camera selection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the controller's camera handle. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// No handle.
    #[default]
    Closed,
    /// An open request is outstanding.
    Opening,
    /// Handle held, no active preview session.
    Open,
    /// Handle held and a repeating preview request is running.
    PreviewActive,
    /// Handle being torn down.
    Closing,
}

impl LifecycleState {
    /// Returns true when a device handle is held.
    pub fn holds_handle(&self) -> bool {
        matches!(self, LifecycleState::Open | LifecycleState::PreviewActive)
    }

    /// Numeric code exported as a metric.
    pub fn code(&self) -> i64 {
        match self {
            LifecycleState::Closed => 0,
            LifecycleState::Opening => 1,
            LifecycleState::Open => 2,
            LifecycleState::PreviewActive => 3,
            LifecycleState::Closing => 4,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Closed => "closed",
            LifecycleState::Opening => "opening",
            LifecycleState::Open => "open",
            LifecycleState::PreviewActive => "preview-active",
            LifecycleState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Which physical camera to open, as an index into the platform's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CameraSelector {
    /// Index 0, typically the back camera.
    Primary,
    /// Index 1, typically the front camera. May be missing on single-camera devices.
    #[default]
    Forward,
}

impl CameraSelector {
    /// Index into the camera identifier list.
    pub fn index(&self) -> usize {
        match self {
            CameraSelector::Primary => 0,
            CameraSelector::Forward => 1,
        }
    }

    /// The other selector.
    pub fn alternate(&self) -> Self {
        match self {
            CameraSelector::Primary => CameraSelector::Forward,
            CameraSelector::Forward => CameraSelector::Primary,
        }
    }

    /// Clamps the selector against the number of cameras present.
    ///
    /// An out-of-range selector falls back to `Forward`, not `Primary`.
    /// Callers must still check the returned index.
    pub fn clamp(self, camera_count: usize) -> Self {
        if self.index() >= camera_count {
            CameraSelector::Forward
        } else {
            self
        }
    }
}

impl fmt::Display for CameraSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraSelector::Primary => f.write_str("primary"),
            CameraSelector::Forward => f.write_str("forward"),
        }
    }
}
