//! Camera preview controller.
//!
//! Owns the device handle and its capture session. `open` and `close` run
//! on the caller's thread and are serialised by a single permit; device
//! callbacks and session setup run on one background thread.
//!
//! The permit taken by `open` stays held until the device answers, so a
//! `close` issued while an open is in flight waits for the answer.

use super::config::ControllerConfig;
use super::permit::{Permit, PermitGuard};
use super::state::{CameraSelector, LifecycleState};
use super::worker::{Dispatcher, Job, Worker};
use crate::device::{
    CameraBackend, CameraDevice, CaptureRequest, CaptureSession, DeviceError, DeviceEvent,
    EventSink, SessionOutput,
};
use crate::host::{PreviewListener, PreviewTarget};
use crate::metrics::MetricsRegistry;
use crate::negotiation::{choose_optimal_size, choose_video_size, largest_by_area, Size};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Failures that abort an `open` or `close` call.
///
/// Device-level failures are not returned; they reach the host through
/// [`PreviewListener::preview_stopped`].
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("timed out after {0:?} waiting to lock the camera")]
    LockTimeout(Duration),
    #[error("interrupted while waiting to lock the camera")]
    Interrupted,
    #[error("failed to start camera background thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

/// Why an open request did not reach the device.
enum OpenFailure {
    Device(DeviceError),
    Fatal(ControllerError),
}

impl From<DeviceError> for OpenFailure {
    fn from(err: DeviceError) -> Self {
        OpenFailure::Device(err)
    }
}

impl From<ControllerError> for OpenFailure {
    fn from(err: ControllerError) -> Self {
        OpenFailure::Fatal(err)
    }
}

/// Mutable controller state, guarded by one mutex.
struct Slot<D: CameraDevice> {
    lifecycle: LifecycleState,
    device: Option<D>,
    session: Option<D::Session>,
    selector: CameraSelector,
    target: Option<PreviewTarget>,
    last_dimensions: Option<(u32, u32)>,
    preview_size: Option<Size>,
    video_size: Option<Size>,
    /// Bumped on every open request and close; events carry the value
    /// current when their open was issued.
    generation: u64,
}

impl<D: CameraDevice> Slot<D> {
    /// Closes the session before the device that owns it.
    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        if let Some(mut device) = self.device.take() {
            device.close();
        }
    }
}

/// A device event on its way to the background thread.
///
/// If it is dropped undelivered, the device it carries is closed.
struct InFlight<D: CameraDevice>(Option<DeviceEvent<D>>);

impl<D: CameraDevice> Drop for InFlight<D> {
    fn drop(&mut self) {
        if let Some(DeviceEvent::Opened(mut device)) = self.0.take() {
            tracing::warn!(camera_id = device.id(), "Device event undelivered, closing device");
            device.close();
        }
    }
}

struct Inner<B: CameraBackend> {
    backend: B,
    config: ControllerConfig,
    permit: Permit,
    slot: Mutex<Slot<B::Device>>,
    listener: Arc<dyn PreviewListener>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl<B: CameraBackend> Inner<B> {
    fn lock_slot(&self) -> Result<MutexGuard<'_, Slot<B::Device>>, ControllerError> {
        self.slot.lock().map_err(|_| ControllerError::Interrupted)
    }

    fn set_lifecycle(&self, slot: &mut Slot<B::Device>, next: LifecycleState) {
        if slot.lifecycle != next {
            tracing::debug!(from = %slot.lifecycle, to = %next, "Lifecycle transition");
        }
        slot.lifecycle = next;
        if let Some(metrics) = &self.metrics {
            metrics.set_state(next);
        }
    }

    fn acquire_permit(&self) -> Result<(), ControllerError> {
        let timeout = self.config.lock_timeout();
        match self.permit.try_acquire_for(timeout) {
            Ok(true) => Ok(()),
            Ok(false) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_lock_timeout();
                }
                tracing::error!(?timeout, "Timed out waiting for camera lock");
                Err(ControllerError::LockTimeout(timeout))
            }
            Err(_) => Err(ControllerError::Interrupted),
        }
    }

    /// Negotiates sizes and issues the asynchronous open request.
    ///
    /// Caller holds the permit.
    fn request_open(
        self: &Arc<Self>,
        width: u32,
        height: u32,
        dispatcher: Dispatcher,
    ) -> Result<(), OpenFailure> {
        let ids = self.backend.camera_ids()?;

        let camera_id = {
            let mut slot = self.lock_slot()?;
            let selector = slot.selector.clamp(ids.len());
            if selector != slot.selector {
                tracing::warn!(
                    requested = %slot.selector,
                    fallback = %selector,
                    cameras = ids.len(),
                    "Camera selector out of range"
                );
                slot.selector = selector;
            }
            ids.get(selector.index()).cloned().ok_or_else(|| {
                DeviceError::DeviceUnavailable(format!(
                    "no camera at index {} ({} present)",
                    selector.index(),
                    ids.len()
                ))
            })?
        };

        let sizes = self.backend.output_sizes(&camera_id)?.ok_or_else(|| {
            DeviceError::UnsupportedApi(format!("camera {camera_id} reports no stream configuration"))
        })?;
        let no_sizes = || DeviceError::UnsupportedApi(format!("camera {camera_id} reports no output sizes"));
        let largest = largest_by_area(&sizes).ok_or_else(no_sizes)?;
        let preview_size = choose_optimal_size(&sizes, width, height, largest).ok_or_else(no_sizes)?;
        let video_size = choose_video_size(&sizes, width, height);

        tracing::info!(
            camera_id = %camera_id,
            preview_size = %preview_size,
            largest = %largest,
            target_width = width,
            target_height = height,
            "Opening camera"
        );

        let generation = {
            let mut slot = self.lock_slot()?;
            slot.preview_size = Some(preview_size);
            slot.video_size = video_size;
            slot.generation += 1;
            self.set_lifecycle(&mut slot, LifecycleState::Opening);
            slot.generation
        };

        let sink = self.event_sink(generation, dispatcher);
        self.backend.open(&camera_id, sink)?;
        Ok(())
    }

    /// Reports a device-level open failure and returns to `Closed`.
    fn fail_open(&self, err: DeviceError, dispatcher: &Dispatcher) {
        match &err {
            DeviceError::UnsupportedApi(_) => {
                tracing::error!(error = %err, "Camera API not supported on this device")
            }
            _ => tracing::warn!(error = %err, "Cannot access the camera"),
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_open_failure();
        }

        match self.slot.lock() {
            Ok(mut slot) => {
                slot.teardown();
                self.set_lifecycle(&mut slot, LifecycleState::Closed);
            }
            Err(_) => tracing::error!("Camera state lock poisoned"),
        }
        self.permit.release();

        let listener = Arc::clone(&self.listener);
        if !dispatcher.post(Box::new(move || listener.preview_stopped(false))) {
            self.listener.preview_stopped(false);
        }
    }

    fn event_sink(self: &Arc<Self>, generation: u64, dispatcher: Dispatcher) -> EventSink<B::Device> {
        let inner = Arc::downgrade(self);
        let dispatcher = Mutex::new(dispatcher);
        EventSink::new(move |event| {
            let mut pending = InFlight(Some(event));
            let Some(inner) = inner.upgrade() else {
                return false;
            };
            let job: Job = Box::new(move || {
                if let Some(event) = pending.0.take() {
                    inner.handle_event(generation, event);
                }
            });
            dispatcher
                .lock()
                .map(|dispatcher| dispatcher.post(job))
                .unwrap_or(false)
        })
    }

    /// Runs on the background thread.
    fn handle_event(&self, generation: u64, event: DeviceEvent<B::Device>) {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(_) => {
                tracing::error!(event = event.kind(), "Camera state lock poisoned, dropping event");
                return;
            }
        };

        if generation != slot.generation {
            tracing::debug!(
                event = event.kind(),
                generation,
                current = slot.generation,
                "Ignoring event from superseded open"
            );
            if let DeviceEvent::Opened(mut device) = event {
                device.close();
            }
            return;
        }

        let resolving_open = slot.lifecycle == LifecycleState::Opening;
        match event {
            DeviceEvent::Opened(mut device) => {
                if !resolving_open {
                    tracing::warn!(camera_id = device.id(), "Unexpected open event, closing device");
                    device.close();
                    return;
                }
                tracing::debug!(camera_id = device.id(), "Camera device opened");
                slot.device = Some(device);
                self.set_lifecycle(&mut slot, LifecycleState::Open);
                self.permit.release();

                let started = self.start_preview(&mut slot);
                drop(slot);
                if let Some(success) = started {
                    self.listener.preview_started(success);
                }
            }
            DeviceEvent::Disconnected => {
                tracing::warn!("Camera device disconnected");
                self.device_lost(slot, resolving_open);
            }
            DeviceEvent::Error(code) => {
                tracing::error!(code, "Camera device error");
                self.device_lost(slot, resolving_open);
            }
        }
    }

    /// Discards the handle after a disconnect or error and tells the host.
    fn device_lost(
        &self,
        mut slot: MutexGuard<'_, Slot<B::Device>>,
        resolving_open: bool,
    ) {
        slot.teardown();
        self.set_lifecycle(&mut slot, LifecycleState::Closed);
        if resolving_open {
            self.permit.release();
        }
        drop(slot);

        if let Some(metrics) = &self.metrics {
            metrics.record_device_error();
            if resolving_open {
                metrics.record_open_failure();
            }
        }
        self.listener.preview_stopped(true);
    }

    /// Binds the target surface and submits the repeating preview request.
    ///
    /// Returns `None` when there is nothing to render into yet.
    fn start_preview(&self, slot: &mut Slot<B::Device>) -> Option<bool> {
        let (Some(target), Some(size)) = (slot.target.clone(), slot.preview_size) else {
            tracing::debug!("No preview target, camera stays open without a session");
            return None;
        };
        if !target.surface().is_available() {
            tracing::debug!("Preview surface not available");
            return None;
        }

        target.surface().set_default_buffer_size(size);
        let output = SessionOutput {
            surface: Arc::clone(target.surface()),
            size,
        };

        let result = {
            let device = slot.device.as_mut()?;
            build_session(device, &output)
        };
        match result {
            Ok(session) => {
                slot.session = Some(session);
                self.set_lifecycle(slot, LifecycleState::PreviewActive);
                if let Some(metrics) = &self.metrics {
                    metrics.record_preview_started();
                }
                tracing::info!(size = %size, "Preview started");
                Some(true)
            }
            Err(err) => {
                tracing::error!(error = %err, "Capture session configuration failed");
                Some(false)
            }
        }
    }
}

fn build_session<D: CameraDevice>(device: &mut D, output: &SessionOutput) -> Result<D::Session, DeviceError> {
    let mut session = device.create_capture_session(output)?;
    if let Err(err) = session.set_repeating_request(&CaptureRequest::preview()) {
        session.close();
        return Err(err);
    }
    Ok(session)
}

/// Drives one camera's preview lifecycle for a host view.
///
/// The controller is an ordinary owned value; drop it (or call
/// [`shutdown`](Self::shutdown)) to close the camera and stop its
/// background thread.
pub struct PreviewController<B: CameraBackend> {
    inner: Arc<Inner<B>>,
    worker: Mutex<Option<Worker>>,
}

impl<B: CameraBackend> PreviewController<B> {
    /// Creates a controller over `backend`.
    pub fn new(backend: B, config: ControllerConfig, listener: Arc<dyn PreviewListener>) -> Self {
        Self::build(backend, config, listener, None)
    }

    /// Creates a controller that records into `metrics`.
    pub fn with_metrics(
        backend: B,
        config: ControllerConfig,
        listener: Arc<dyn PreviewListener>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self::build(backend, config, listener, Some(metrics))
    }

    fn build(
        backend: B,
        config: ControllerConfig,
        listener: Arc<dyn PreviewListener>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        if let Some(metrics) = &metrics {
            metrics.set_state(LifecycleState::Closed);
        }
        let slot = Slot {
            lifecycle: LifecycleState::Closed,
            device: None,
            session: None,
            selector: config.default_selector,
            target: None,
            last_dimensions: None,
            preview_size: None,
            video_size: None,
            generation: 0,
        };
        Self {
            inner: Arc::new(Inner {
                backend,
                config,
                permit: Permit::new(),
                slot: Mutex::new(slot),
                listener,
                metrics,
            }),
            worker: Mutex::new(None),
        }
    }

    fn dispatcher(&self) -> Result<Dispatcher, ControllerError> {
        let mut worker = self.worker.lock().map_err(|_| ControllerError::Interrupted)?;
        if worker.is_none() {
            let spawned =
                Worker::spawn(&self.inner.config.worker_name).map_err(ControllerError::WorkerSpawn)?;
            *worker = Some(spawned);
        }
        worker
            .as_ref()
            .map(Worker::dispatcher)
            .ok_or(ControllerError::Interrupted)
    }

    /// Opens the selected camera for a view of `width` x `height` pixels.
    ///
    /// Returns once the request is issued; the outcome arrives through the
    /// listener. A no-op when a handle is already held. Only a permit
    /// timeout or a poisoned lock is returned as an error.
    pub fn open(&self, width: u32, height: u32) -> Result<(), ControllerError> {
        {
            let mut slot = self.inner.lock_slot()?;
            slot.last_dimensions = Some((width, height));
            if slot.device.is_some() && slot.lifecycle.holds_handle() {
                tracing::debug!(state = %slot.lifecycle, "Camera already open");
                return Ok(());
            }
        }

        self.inner.acquire_permit()?;

        // An open that held the permit before us may have finished.
        match self.inner.lock_slot() {
            Ok(slot) if slot.device.is_some() && slot.lifecycle.holds_handle() => {
                drop(slot);
                self.inner.permit.release();
                return Ok(());
            }
            Ok(_) => {}
            Err(err) => {
                self.inner.permit.release();
                return Err(err);
            }
        }

        if let Some(metrics) = &self.inner.metrics {
            metrics.record_open_attempt();
        }

        let dispatcher = match self.dispatcher() {
            Ok(dispatcher) => dispatcher,
            Err(err) => {
                self.inner.permit.release();
                return Err(err);
            }
        };

        match self.inner.request_open(width, height, dispatcher.clone()) {
            Ok(()) => Ok(()),
            Err(OpenFailure::Device(err)) => {
                self.inner.fail_open(err, &dispatcher);
                Ok(())
            }
            Err(OpenFailure::Fatal(err)) => {
                self.inner.permit.release();
                Err(err)
            }
        }
    }

    /// Closes the camera, waiting for any in-flight open to resolve first.
    ///
    /// The session is torn down before the device. The permit is released
    /// on every path.
    pub fn close(&self) -> Result<(), ControllerError> {
        self.inner.acquire_permit()?;
        let _permit = PermitGuard::held(&self.inner.permit);

        let had_handle = {
            let mut slot = self.inner.lock_slot()?;
            let had_handle = slot.device.is_some();
            if had_handle {
                self.inner.set_lifecycle(&mut slot, LifecycleState::Closing);
            }
            slot.teardown();
            slot.generation += 1;
            self.inner.set_lifecycle(&mut slot, LifecycleState::Closed);
            had_handle
        };

        if had_handle {
            tracing::info!("Camera closed");
            self.notify_stopped();
        }
        Ok(())
    }

    fn notify_stopped(&self) {
        let listener = Arc::clone(&self.inner.listener);
        let posted = match self.worker.lock() {
            Ok(worker) => worker.as_ref().is_some_and(|worker| {
                let listener = Arc::clone(&listener);
                worker.dispatcher().post(Box::new(move || listener.preview_stopped(true)))
            }),
            Err(_) => false,
        };
        if !posted {
            listener.preview_stopped(true);
        }
    }

    /// Closes the current camera and reopens with the other selector at
    /// the bound target's current dimensions, or those of the last open
    /// when no target is bound.
    pub fn swap_selector(&self) -> Result<(), ControllerError> {
        self.close()?;

        let (selector, dimensions) = {
            let mut slot = self.inner.lock_slot()?;
            slot.selector = slot.selector.alternate();
            let dimensions = slot
                .target
                .as_ref()
                .map(|t| (t.width(), t.height()))
                .or(slot.last_dimensions);
            (slot.selector, dimensions)
        };
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_swap();
        }
        tracing::info!(selector = %selector, "Swapped camera selector");

        match dimensions {
            Some((width, height)) => self.open(width, height),
            None => {
                tracing::debug!("No known preview dimensions, not reopening");
                Ok(())
            }
        }
    }

    /// Sets the surface the preview renders into.
    ///
    /// Takes effect the next time a device opens.
    pub fn set_preview_target(&self, target: PreviewTarget) {
        match self.inner.slot.lock() {
            Ok(mut slot) => slot.target = Some(target),
            Err(_) => tracing::error!("Camera state lock poisoned, preview target not set"),
        }
    }

    /// Forgets the preview surface.
    pub fn clear_preview_target(&self) {
        if let Ok(mut slot) = self.inner.slot.lock() {
            slot.target = None;
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.inner
            .slot
            .lock()
            .map(|slot| slot.lifecycle)
            .unwrap_or(LifecycleState::Closed)
    }

    /// Returns true while a device handle is held.
    pub fn has_live_handle(&self) -> bool {
        self.inner
            .slot
            .lock()
            .map(|slot| slot.device.is_some())
            .unwrap_or(false)
    }

    /// Camera the next open uses.
    pub fn selector(&self) -> CameraSelector {
        self.inner
            .slot
            .lock()
            .map(|slot| slot.selector)
            .unwrap_or(self.inner.config.default_selector)
    }

    /// Chooses the camera for the next open. Does not reopen.
    pub fn set_selector(&self, selector: CameraSelector) {
        if let Ok(mut slot) = self.inner.slot.lock() {
            slot.selector = selector;
        }
    }

    /// Preview size negotiated by the last open.
    pub fn preview_size(&self) -> Option<Size> {
        self.inner.slot.lock().ok().and_then(|slot| slot.preview_size)
    }

    /// Recording size chosen by the last open.
    pub fn video_size(&self) -> Option<Size> {
        self.inner.slot.lock().ok().and_then(|slot| slot.video_size)
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// Closes the camera and stops the background thread after it drains.
    ///
    /// A pending open is waited for, up to the configured shutdown timeout,
    /// so its device is closed rather than abandoned.
    pub fn shutdown(self) {
        drop(self);
    }

    fn shutdown_in_place(&mut self) {
        let deadline = Instant::now() + self.inner.config.shutdown_timeout();
        loop {
            match self.close() {
                Ok(()) => break,
                Err(ControllerError::LockTimeout(_)) if Instant::now() < deadline => {
                    tracing::debug!(state = %self.state(), "Waiting for pending open before shutdown");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Close during shutdown failed");
                    break;
                }
            }
        }
        let worker = match self.worker.get_mut() {
            Ok(worker) => worker.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(worker) = worker {
            worker.stop();
        }
    }
}

impl<B: CameraBackend> Drop for PreviewController<B> {
    fn drop(&mut self) {
        self.shutdown_in_place();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{MockBackend, MockCameraConfig, OpenBehavior};
    use crate::host::{ChannelListener, PreviewEvent, PreviewEventKind, PreviewSurface};
    use crate::device::EventSink;
    use crate::host::PreviewListener;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::{self, Receiver};
    use std::thread::{self, ThreadId};

    const WAIT: Duration = Duration::from_secs(2);

    #[derive(Default)]
    struct RecordingSurface {
        size: Mutex<Option<Size>>,
        unavailable: AtomicBool,
    }

    impl PreviewSurface for RecordingSurface {
        fn is_available(&self) -> bool {
            !self.unavailable.load(Ordering::SeqCst)
        }

        fn set_default_buffer_size(&self, size: Size) {
            *self.size.lock().unwrap() = Some(size);
        }
    }

    fn controller(
        backend: MockBackend,
    ) -> (PreviewController<MockBackend>, Receiver<PreviewEvent>, Arc<RecordingSurface>) {
        let (listener, rx) = ChannelListener::new();
        let controller = PreviewController::new(backend, ControllerConfig::default(), Arc::new(listener));
        let surface = Arc::new(RecordingSurface::default());
        controller.set_preview_target(PreviewTarget::new(surface.clone(), 1280, 720));
        (controller, rx, surface)
    }

    fn next(rx: &Receiver<PreviewEvent>) -> PreviewEvent {
        rx.recv_timeout(WAIT).expect("preview event")
    }

    #[test]
    fn test_open_starts_preview() {
        let (controller, rx, surface) = controller(MockBackend::default());

        controller.open(1280, 720).unwrap();
        assert!(next(&rx).is_started());

        assert_eq!(controller.state(), LifecycleState::PreviewActive);
        assert_eq!(controller.preview_size(), Some(Size::new(1280, 720)));
        assert_eq!(controller.video_size(), Some(Size::new(1280, 720)));
        assert_eq!(*surface.size.lock().unwrap(), Some(Size::new(1280, 720)));
        assert_eq!(controller.backend().live_handles().current(), 1);
    }

    #[test]
    fn test_open_twice_is_noop() {
        let (controller, rx, _surface) = controller(MockBackend::default());
        controller.open(1280, 720).unwrap();
        assert!(next(&rx).is_started());

        controller.open(1280, 720).unwrap();
        assert_eq!(controller.backend().live_handles().opened_total(), 1);
    }

    #[test]
    fn test_close_tears_down() {
        let (controller, rx, _surface) = controller(MockBackend::default());
        controller.open(1280, 720).unwrap();
        assert!(next(&rx).is_started());

        controller.close().unwrap();
        assert_eq!(controller.state(), LifecycleState::Closed);
        assert!(!controller.has_live_handle());
        assert_eq!(controller.backend().live_handles().current(), 0);

        let stopped = next(&rx);
        assert_eq!(stopped.kind, PreviewEventKind::Stopped);
        assert!(stopped.success);

        // closing again is harmless
        controller.close().unwrap();
    }

    #[test]
    fn test_open_without_target_stays_open() {
        let (listener, _rx) = ChannelListener::new();
        let backend = MockBackend::default().with_open_delay(Duration::from_millis(5));
        let controller = PreviewController::new(backend, ControllerConfig::default(), Arc::new(listener));

        controller.open(640, 480).unwrap();
        // close waits for the open to resolve
        controller.close().unwrap();
        assert_eq!(controller.backend().live_handles().opened_total(), 1);
        assert_eq!(controller.backend().live_handles().current(), 0);
    }

    #[test]
    fn test_unavailable_surface_skips_session() {
        let (controller, _rx, surface) = controller(MockBackend::default());
        surface.unavailable.store(true, Ordering::SeqCst);

        controller.open(1280, 720).unwrap();
        controller.close().unwrap();
        assert_eq!(*surface.size.lock().unwrap(), None);
    }

    #[test]
    fn test_access_denied_is_reported() {
        let backend = MockBackend::new(vec![
            MockCameraConfig::new("0"),
            MockCameraConfig::new("1").with_behavior(OpenBehavior::Deny),
        ]);
        let (controller, rx, _surface) = controller(backend);

        controller.open(1280, 720).unwrap();
        let event = next(&rx);
        assert_eq!(event.kind, PreviewEventKind::Stopped);
        assert!(!event.success);
        assert_eq!(controller.state(), LifecycleState::Closed);

        // permit was released, so a retry can proceed
        controller.set_selector(CameraSelector::Primary);
        controller.open(1280, 720).unwrap();
        assert!(next(&rx).is_started());
    }

    #[test]
    fn test_unsupported_api_is_reported() {
        let mut camera = MockCameraConfig::new("1");
        camera.capabilities_missing = true;
        let backend = MockBackend::new(vec![MockCameraConfig::new("0"), camera]);
        let (controller, rx, _surface) = controller(backend);

        controller.open(1280, 720).unwrap();
        assert!(!next(&rx).success);
        controller.close().unwrap();
    }

    #[test]
    fn test_error_event_closes() {
        let backend = MockBackend::new(vec![
            MockCameraConfig::new("0"),
            MockCameraConfig::new("1").with_behavior(OpenBehavior::Error(4)),
        ]);
        let (controller, rx, _surface) = controller(backend);

        controller.open(1280, 720).unwrap();
        let event = next(&rx);
        assert_eq!(event.kind, PreviewEventKind::Stopped);
        assert!(event.success);
        assert_eq!(controller.state(), LifecycleState::Closed);
        controller.close().unwrap();
    }

    #[test]
    fn test_disconnect_after_preview() {
        let (controller, rx, _surface) = controller(MockBackend::default());
        controller.open(1280, 720).unwrap();
        assert!(next(&rx).is_started());

        assert!(controller.backend().disconnect("1"));
        let event = next(&rx);
        assert_eq!(event.kind, PreviewEventKind::Stopped);
        assert!(event.success);
        assert!(!controller.has_live_handle());
        assert_eq!(controller.backend().live_handles().current(), 0);

        // the permit was not over-released: a fresh open works normally
        controller.open(1280, 720).unwrap();
        assert!(next(&rx).is_started());
    }

    #[test]
    fn test_session_failure_keeps_device_open() {
        let mut camera = MockCameraConfig::new("1");
        camera.session_fails = true;
        let backend = MockBackend::new(vec![MockCameraConfig::new("0"), camera]);
        let (controller, rx, _surface) = controller(backend);

        controller.open(1280, 720).unwrap();
        let event = next(&rx);
        assert_eq!(event.kind, PreviewEventKind::Started);
        assert!(!event.success);
        assert_eq!(controller.state(), LifecycleState::Open);
        assert!(controller.has_live_handle());
    }

    #[test]
    fn test_single_camera_forward_clamp() {
        let backend = MockBackend::new(vec![MockCameraConfig::new("only")]);
        let (controller, rx, _surface) = controller(backend);
        controller.set_selector(CameraSelector::Forward);

        controller.open(1280, 720).unwrap();
        let event = next(&rx);
        assert!(!event.success);
        assert_eq!(controller.selector(), CameraSelector::Forward);
    }

    #[test]
    fn test_swap_selector() {
        let (controller, rx, _surface) = controller(MockBackend::default());
        assert_eq!(controller.selector(), CameraSelector::Forward);
        controller.open(1280, 720).unwrap();
        assert!(next(&rx).is_started());

        controller.swap_selector().unwrap();
        assert_eq!(controller.selector(), CameraSelector::Primary);
        assert_eq!(next(&rx).kind, PreviewEventKind::Stopped);
        assert!(next(&rx).is_started());
        assert_eq!(controller.backend().live_handles().current(), 1);
        assert_eq!(controller.backend().live_handles().peak(), 1);
    }

    #[test]
    fn test_close_times_out_behind_slow_open() {
        let (listener, _rx) = ChannelListener::new();
        let backend = MockBackend::default().with_open_delay(Duration::from_millis(300));
        let config = ControllerConfig::with_lock_timeout(Duration::from_millis(20));
        let controller = PreviewController::new(backend, config, Arc::new(listener));

        controller.open(1280, 720).unwrap();
        assert_eq!(controller.state(), LifecycleState::Opening);
        assert!(matches!(controller.close(), Err(ControllerError::LockTimeout(_))));
    }

    #[test]
    fn test_metrics_recorded() {
        let (listener, rx) = ChannelListener::new();
        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let controller = PreviewController::with_metrics(
            MockBackend::default(),
            ControllerConfig::default(),
            Arc::new(listener),
            Arc::clone(&metrics),
        );
        controller.set_preview_target(PreviewTarget::new(
            Arc::new(RecordingSurface::default()),
            1280,
            720,
        ));

        controller.open(1280, 720).unwrap();
        assert!(next(&rx).is_started());
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.open_attempts, 1);
        assert_eq!(snapshot.previews_started, 1);
        assert_eq!(snapshot.lifecycle_state, LifecycleState::PreviewActive.code());

        controller.close().unwrap();
        assert_eq!(metrics.snapshot().lifecycle_state, 0);
    }

    #[test]
    fn test_open_failure_notifies_from_background_thread() {
        struct ThreadListener {
            tx: Mutex<mpsc::Sender<ThreadId>>,
        }

        impl PreviewListener for ThreadListener {
            fn preview_started(&self, _success: bool) {}

            fn preview_stopped(&self, _success: bool) {
                let _ = self.tx.lock().unwrap().send(thread::current().id());
            }
        }

        let (tx, rx) = mpsc::channel();
        let backend = MockBackend::new(vec![
            MockCameraConfig::new("0"),
            MockCameraConfig::new("1").with_behavior(OpenBehavior::Deny),
        ]);
        let controller = PreviewController::new(
            backend,
            ControllerConfig::default(),
            Arc::new(ThreadListener { tx: Mutex::new(tx) }),
        );

        controller.open(1280, 720).unwrap();
        let notified_on = rx.recv_timeout(WAIT).unwrap();
        assert_ne!(notified_on, thread::current().id());
        assert_eq!(controller.state(), LifecycleState::Closed);
    }

    #[test]
    fn test_shutdown_waits_for_pending_open() {
        let backend = MockBackend::default().with_open_delay(Duration::from_millis(150));
        let live = backend.live_handles();
        let (listener, rx) = ChannelListener::new();
        let config = ControllerConfig::with_lock_timeout(Duration::from_millis(20));
        let controller = PreviewController::new(backend, config, Arc::new(listener));
        controller.set_preview_target(PreviewTarget::new(
            Arc::new(RecordingSurface::default()),
            1280,
            720,
        ));

        controller.open(1280, 720).unwrap();
        controller.shutdown();

        // the open resolved before the background thread stopped
        assert_eq!(live.opened_total(), 1);
        assert_eq!(live.current(), 0);
        assert!(next(&rx).is_started());
        assert_eq!(next(&rx).kind, PreviewEventKind::Stopped);
    }

    /// Device that only records an explicit close.
    struct TrackedDevice {
        closed: Arc<AtomicBool>,
    }

    struct NullSession;

    impl CaptureSession for NullSession {
        fn set_repeating_request(&mut self, _request: &CaptureRequest) -> Result<(), DeviceError> {
            Ok(())
        }

        fn close(&mut self) {}
    }

    impl CameraDevice for TrackedDevice {
        type Session = NullSession;

        fn id(&self) -> &str {
            "tracked"
        }

        fn create_capture_session(&mut self, _output: &SessionOutput) -> Result<NullSession, DeviceError> {
            Ok(NullSession)
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Backend that hands its completion sink to the test.
    struct ParkedBackend {
        sink: Arc<Mutex<Option<EventSink<TrackedDevice>>>>,
    }

    impl CameraBackend for ParkedBackend {
        type Device = TrackedDevice;

        fn camera_ids(&self) -> Result<Vec<String>, DeviceError> {
            Ok(vec!["0".to_string(), "1".to_string()])
        }

        fn output_sizes(&self, _camera_id: &str) -> Result<Option<Vec<Size>>, DeviceError> {
            Ok(Some(vec![Size::new(1280, 720)]))
        }

        fn open(&self, _camera_id: &str, sink: EventSink<TrackedDevice>) -> Result<(), DeviceError> {
            *self.sink.lock().unwrap() = Some(sink);
            Ok(())
        }
    }

    #[test]
    fn test_late_open_after_shutdown_closes_device() {
        let parked = Arc::new(Mutex::new(None));
        let backend = ParkedBackend {
            sink: Arc::clone(&parked),
        };
        let config = ControllerConfig {
            lock_timeout_ms: 10,
            shutdown_timeout_ms: 10,
            ..Default::default()
        };
        let controller = PreviewController::new(backend, config, Arc::new(crate::host::NoopListener));

        controller.open(1280, 720).unwrap();
        assert_eq!(controller.state(), LifecycleState::Opening);
        // the device never answers in time
        controller.shutdown();

        let sink = parked.lock().unwrap().take().expect("open was requested");
        let closed = Arc::new(AtomicBool::new(false));
        let delivered = sink.deliver(DeviceEvent::Opened(TrackedDevice {
            closed: Arc::clone(&closed),
        }));
        assert!(!delivered);
        assert!(closed.load(Ordering::SeqCst));
    }
}
