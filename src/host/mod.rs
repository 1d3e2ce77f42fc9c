//! Host view integration.
//!
//! The host supplies a surface and its pixel dimensions and receives
//! "preview started" and "preview stopped" notifications.

mod binding;
mod listener;
mod surface;

pub use binding::PreviewHost;
pub use listener::{ChannelListener, NoopListener, PreviewEvent, PreviewEventKind, PreviewListener};
pub use surface::{PreviewSurface, PreviewTarget};
