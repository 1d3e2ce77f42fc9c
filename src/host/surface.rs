//! Preview surface supplied by the host view.

use crate::negotiation::Size;
use std::fmt;
use std::sync::Arc;

/// Destination buffer that receives camera frames for display.
pub trait PreviewSurface: Send + Sync {
    /// Returns true while the surface can receive frames.
    fn is_available(&self) -> bool;

    /// Sets the size of the buffers the camera produces into this surface.
    fn set_default_buffer_size(&self, size: Size);
}

/// The surface and pixel dimensions the host view renders the preview in.
///
/// The controller keeps a reference for the lifetime of the session but
/// never owns the surface.
#[derive(Clone)]
pub struct PreviewTarget {
    surface: Arc<dyn PreviewSurface>,
    width: u32,
    height: u32,
}

impl PreviewTarget {
    /// Creates a target for `surface` laid out at `width` x `height`.
    pub fn new(surface: Arc<dyn PreviewSurface>, width: u32, height: u32) -> Self {
        Self {
            surface,
            width,
            height,
        }
    }

    /// Returns the surface.
    #[inline]
    pub fn surface(&self) -> &Arc<dyn PreviewSurface> {
        &self.surface
    }

    /// Returns the view width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the view height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Records new view dimensions.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}

impl fmt::Debug for PreviewTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewTarget")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("available", &self.surface.is_available())
            .finish()
    }
}
