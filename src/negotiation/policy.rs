//! Output size selection.
//!
//! Pure functions over a device-reported list of sizes. Nothing here
//! touches a device, so equal inputs always produce the same choice.

use super::size::{compare_by_area, Size};

/// Widescreen aspect ratio used for landscape recording sizes.
pub const WIDESCREEN: Size = Size::new(16, 9);

/// Tallest recording size chosen for landscape surfaces.
pub const MAX_LANDSCAPE_LINES: u32 = 1080;

/// Broadcast heights preferred for portrait recording sizes.
const BROADCAST_LINES: [u32; 2] = [1080, 720];

/// Orientation of a preview surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Wider than tall.
    Landscape,
    /// Taller than wide.
    Portrait,
    /// Equal sides.
    Square,
}

impl Orientation {
    /// Derives the orientation from surface dimensions.
    pub fn of(width: u32, height: u32) -> Self {
        match width.cmp(&height) {
            std::cmp::Ordering::Greater => Orientation::Landscape,
            std::cmp::Ordering::Less => Orientation::Portrait,
            std::cmp::Ordering::Equal => Orientation::Square,
        }
    }
}

/// Returns the first candidate with the largest area.
pub fn largest_by_area(choices: &[Size]) -> Option<Size> {
    choices
        .iter()
        .copied()
        .reduce(|best, size| if size.area() > best.area() { size } else { best })
}

/// Chooses the smallest size that is at least `min_width` x `min_height`
/// and has the aspect ratio of `aspect`.
///
/// Falls back to the first candidate when none qualifies. Returns `None`
/// only for an empty list.
pub fn choose_optimal_size(
    choices: &[Size],
    min_width: u32,
    min_height: u32,
    aspect: Size,
) -> Option<Size> {
    let best = choices
        .iter()
        .filter(|size| size.matches_aspect(aspect) && size.covers(min_width, min_height))
        .min_by(|a, b| compare_by_area(a, b))
        .copied();

    match best {
        Some(size) => Some(size),
        None => {
            let fallback = choices.first().copied();
            if let Some(size) = fallback {
                tracing::warn!(
                    min_width,
                    min_height,
                    aspect = %aspect,
                    fallback = %size,
                    "No suitable preview size, using first reported size"
                );
            }
            fallback
        }
    }
}

/// Chooses a recording size for a surface of the given dimensions.
///
/// Landscape surfaces get the last 16:9 size, in reported order, no taller
/// than 1080 lines.
/// Portrait and square surfaces get a size whose rotated aspect ratio
/// equals the surface's, preferring 1080 or 720 lines, then a size whose
/// height equals the surface width.
pub fn choose_video_size(choices: &[Size], surface_width: u32, surface_height: u32) -> Option<Size> {
    let first = choices.first().copied()?;
    if surface_width == 0 || surface_height == 0 {
        return Some(first);
    }

    let orientation = Orientation::of(surface_width, surface_height);
    tracing::debug!(?orientation, surface_width, surface_height, candidates = choices.len(), "Choosing video size");

    let chosen = match orientation {
        Orientation::Landscape => choices
            .iter()
            .copied()
            .rev()
            .find(|size| size.matches_aspect(WIDESCREEN) && size.height <= MAX_LANDSCAPE_LINES),
        Orientation::Portrait | Orientation::Square => {
            // height / width of the sensor equals width / height of the surface
            let potentials: Vec<Size> = choices
                .iter()
                .copied()
                .filter(|size| {
                    u64::from(size.height) * u64::from(surface_height)
                        == u64::from(size.width) * u64::from(surface_width)
                })
                .collect();
            tracing::debug!(potentials = potentials.len(), "Aspect ratio matches");

            potentials
                .iter()
                .copied()
                .find(|size| BROADCAST_LINES.contains(&size.height))
                .or_else(|| potentials.iter().copied().find(|size| size.height == surface_width))
                .or_else(|| potentials.first().copied())
        }
    };

    Some(chosen.unwrap_or(first))
}
