//! Preview state notifications pushed to the host.

use chrono::{DateTime, Utc};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

/// Receives preview state changes. Called from the camera background thread.
pub trait PreviewListener: Send + Sync {
    /// The preview session started, or failed to start.
    fn preview_started(&self, success: bool);

    /// The preview stopped.
    fn preview_stopped(&self, success: bool);
}

/// Which notification an event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewEventKind {
    Started,
    Stopped,
}

/// A notification forwarded by [`ChannelListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewEvent {
    pub kind: PreviewEventKind,
    pub success: bool,
    pub at: DateTime<Utc>,
}

impl PreviewEvent {
    fn now(kind: PreviewEventKind, success: bool) -> Self {
        Self {
            kind,
            success,
            at: Utc::now(),
        }
    }

    /// Returns true for a successful start.
    pub fn is_started(&self) -> bool {
        self.kind == PreviewEventKind::Started && self.success
    }
}

/// Listener that forwards notifications into a channel.
pub struct ChannelListener {
    tx: Mutex<Sender<PreviewEvent>>,
}

impl ChannelListener {
    /// Creates a listener and the receiving end of its channel.
    pub fn new() -> (Self, Receiver<PreviewEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Mutex::new(tx) }, rx)
    }

    fn send(&self, event: PreviewEvent) {
        let sent = self
            .tx
            .lock()
            .map(|tx| tx.send(event).is_ok())
            .unwrap_or(false);
        if !sent {
            tracing::debug!("Preview event dropped, receiver gone");
        }
    }
}

impl PreviewListener for ChannelListener {
    fn preview_started(&self, success: bool) {
        self.send(PreviewEvent::now(PreviewEventKind::Started, success));
    }

    fn preview_stopped(&self, success: bool) {
        self.send(PreviewEvent::now(PreviewEventKind::Stopped, success));
    }
}

/// Listener that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl PreviewListener for NoopListener {
    fn preview_started(&self, _success: bool) {}

    fn preview_stopped(&self, _success: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_listener_forwards_in_order() {
        let (listener, rx) = ChannelListener::new();
        listener.preview_started(true);
        listener.preview_stopped(false);

        let first = rx.recv().unwrap();
        assert!(first.is_started());
        let second = rx.recv().unwrap();
        assert_eq!(second.kind, PreviewEventKind::Stopped);
        assert!(!second.success);
        assert!(second.at >= first.at);
    }

    #[test]
    fn test_channel_listener_without_receiver() {
        let (listener, rx) = ChannelListener::new();
        drop(rx);
        listener.preview_started(true);
    }
}
