//! Binding between a host view's surface lifecycle and the controller.

use super::surface::PreviewTarget;
use crate::controller::{ControllerError, PreviewController};
use crate::device::CameraBackend;

/// Forwards surface lifecycle callbacks from a host view to a controller.
///
/// Holds a typed reference to the controller it drives.
pub struct PreviewHost<'a, B: CameraBackend> {
    controller: &'a PreviewController<B>,
    target: Option<PreviewTarget>,
}

impl<'a, B: CameraBackend> PreviewHost<'a, B> {
    /// Creates a binding for `controller`.
    pub fn new(controller: &'a PreviewController<B>) -> Self {
        Self {
            controller,
            target: None,
        }
    }

    /// The surface became available: bind it and open the camera.
    pub fn surface_available(&mut self, target: PreviewTarget) -> Result<(), ControllerError> {
        let (width, height) = (target.width(), target.height());
        tracing::debug!(width, height, "Preview surface available");
        self.controller.set_preview_target(target.clone());
        self.target = Some(target);
        self.controller.open(width, height)
    }

    /// The surface was resized. The next open or swap uses the new size.
    pub fn surface_size_changed(&mut self, width: u32, height: u32) {
        if let Some(target) = self.target.as_mut() {
            target.resize(width, height);
            self.controller.set_preview_target(target.clone());
        }
    }

    /// The surface is going away: close the camera and drop the reference.
    pub fn surface_destroyed(&mut self) -> Result<(), ControllerError> {
        tracing::debug!("Preview surface destroyed");
        let result = self.controller.close();
        self.controller.clear_preview_target();
        self.target = None;
        result
    }

    /// Switches between the primary and forward cameras.
    pub fn swap_camera(&mut self) -> Result<(), ControllerError> {
        self.controller.swap_selector()
    }

    /// Current target, if a surface is bound.
    pub fn target(&self) -> Option<&PreviewTarget> {
        self.target.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ControllerConfig, LifecycleState};
    use crate::device::MockBackend;
    use crate::host::{ChannelListener, PreviewEventKind, PreviewSurface};
    use crate::negotiation::Size;
    use std::sync::Arc;
    use std::time::Duration;

    struct Surface;

    impl PreviewSurface for Surface {
        fn is_available(&self) -> bool {
            true
        }

        fn set_default_buffer_size(&self, _size: Size) {}
    }

    #[test]
    fn test_surface_lifecycle_drives_controller() {
        let (listener, rx) = ChannelListener::new();
        let controller =
            PreviewController::new(MockBackend::default(), ControllerConfig::default(), Arc::new(listener));
        let mut host = PreviewHost::new(&controller);

        host.surface_available(PreviewTarget::new(Arc::new(Surface), 1920, 1080))
            .unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(2)).unwrap().is_started());
        assert_eq!(controller.state(), LifecycleState::PreviewActive);
        assert_eq!(controller.preview_size(), Some(Size::new(1920, 1080)));

        host.surface_size_changed(1280, 720);
        assert_eq!(host.target().map(|t| t.width()), Some(1280));

        host.surface_destroyed().unwrap();
        let stopped = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(stopped.kind, PreviewEventKind::Stopped);
        assert_eq!(controller.state(), LifecycleState::Closed);
        assert!(host.target().is_none());
    }

    #[test]
    fn test_swap_after_resize_uses_new_size() {
        let (listener, rx) = ChannelListener::new();
        let controller =
            PreviewController::new(MockBackend::default(), ControllerConfig::default(), Arc::new(listener));
        let mut host = PreviewHost::new(&controller);

        host.surface_available(PreviewTarget::new(Arc::new(Surface), 1920, 1080))
            .unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(2)).unwrap().is_started());

        host.surface_size_changed(1280, 720);
        host.swap_camera().unwrap();
        let stopped = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(stopped.kind, PreviewEventKind::Stopped);
        assert!(rx.recv_timeout(Duration::from_secs(2)).unwrap().is_started());
        assert_eq!(controller.preview_size(), Some(Size::new(1280, 720)));
    }
}
