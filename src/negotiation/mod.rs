//! Output size negotiation.
//!
//! Picks the preview and recording sizes from the list of sizes a camera
//! device reports. These are pure functions; the controller calls them
//! while opening a device.

mod policy;
mod size;

pub use policy::{
    choose_optimal_size, choose_video_size, largest_by_area, Orientation, MAX_LANDSCAPE_LINES,
    WIDESCREEN,
};
pub use size::{compare_by_area, Size};
