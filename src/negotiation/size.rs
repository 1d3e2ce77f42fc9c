//! Output size type reported by camera devices.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A (width, height) pair from a device's supported output sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Creates a new size.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the pixel area, widened so large sizes never overflow.
    #[inline]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Returns true if this size has the aspect ratio described by `ratio`.
    ///
    /// Uses integer arithmetic, so `1920x1080` matches `16x9` but a size
    /// whose height only rounds to the ratio does not.
    pub fn matches_aspect(&self, ratio: Size) -> bool {
        if ratio.width == 0 {
            return false;
        }
        u64::from(self.height)
            == u64::from(self.width) * u64::from(ratio.height) / u64::from(ratio.width)
    }

    /// Returns true if both dimensions are at least those of `min`.
    #[inline]
    pub fn covers(&self, min_width: u32, min_height: u32) -> bool {
        self.width >= min_width && self.height >= min_height
    }
}

/// Orders two sizes by area.
pub fn compare_by_area(lhs: &Size, rhs: &Size) -> Ordering {
    lhs.area().cmp(&rhs.area())
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}
