//! Background thread that runs device callbacks and session setup.

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

/// Work item executed on the background thread.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Shutdown,
}

/// Cloneable handle for posting jobs to a [`Worker`].
#[derive(Clone)]
pub(crate) struct Dispatcher {
    tx: Sender<Message>,
}

impl Dispatcher {
    /// Queues a job. Returns false if the worker has stopped.
    pub(crate) fn post(&self, job: Job) -> bool {
        self.tx.send(Message::Run(job)).is_ok()
    }
}

/// A named thread draining a FIFO job queue.
pub(crate) struct Worker {
    dispatcher: Dispatcher,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawns the worker thread.
    pub(crate) fn spawn(name: &str) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Message>();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            tracing::debug!("Camera background thread started");
            while let Ok(message) = rx.recv() {
                match message {
                    Message::Run(job) => job(),
                    Message::Shutdown => break,
                }
            }
            tracing::debug!("Camera background thread stopped");
        })?;

        Ok(Self {
            dispatcher: Dispatcher { tx },
            handle: Some(handle),
        })
    }

    /// Returns a handle for posting jobs.
    pub(crate) fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Runs every job queued so far, then stops the thread and joins it.
    pub(crate) fn stop(mut self) {
        self.stop_in_place();
    }

    fn stop_in_place(&mut self) {
        let _ = self.dispatcher.tx.send(Message::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                // Stopping from inside a job; the loop exits after this job.
                return;
            }
            if handle.join().is_err() {
                tracing::error!("Camera background thread panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop_in_place();
    }
}
