use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::Mutex;

use crate::models::audio_models::{AudioDeviceInfo, SourceDiagnostics};
use crate::models::config::{CaptureOptions, PipelineConfig};
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::processing::pipeline::SignalPipeline;
use crate::processing::spectrogram::SpectrogramImage;
use crate::traits::capture_backend::{CaptureBackend, CaptureStream, StreamCallbacks};
use crate::traits::capture_subscriber::CaptureSubscriber;

/// Handle returned by [`CaptureSource::subscribe`]; pass it back to
/// [`CaptureSource::unsubscribe`] to stop receiving frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

/// The backend handle, present only while running.
enum StreamSlot {
    Stopped,
    Running(Box<dyn CaptureStream>),
}

/// Lifecycle state, protected by `parking_lot::Mutex`.
struct SourceState {
    slot: StreamSlot,
    /// Bumped on every start so signals from a released stream can be told
    /// apart from the current one.
    generation: u64,
    disposed: bool,
}

impl SourceState {
    fn take_stream(&mut self) -> Option<Box<dyn CaptureStream>> {
        match std::mem::replace(&mut self.slot, StreamSlot::Stopped) {
            StreamSlot::Running(stream) => Some(stream),
            StreamSlot::Stopped => None,
        }
    }
}

/// State shared between the owning `CaptureSource` and stream callbacks.
///
/// Lock order is `state` → `pipeline` and `state` → `subscribers`; no code
/// path acquires `state` while holding either of the others.
struct SourceShared {
    state: Mutex<SourceState>,
    pipeline: Mutex<SignalPipeline>,
    subscribers: Mutex<Vec<(SubscriptionToken, Arc<dyn CaptureSubscriber>)>>,
    diagnostics: Mutex<SourceDiagnostics>,
}

impl SourceShared {
    /// Data-available handler; runs on the backend's capture thread.
    fn handle_data(&self, generation: u64, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }

        // Only long enough to confirm the delivering stream is still ours.
        let format = {
            let state = self.state.lock();
            match &state.slot {
                StreamSlot::Running(stream) if state.generation == generation => stream.format(),
                _ => return,
            }
        };
        let Some(format) = format else {
            return;
        };

        let frame = self.pipeline.lock().process(&format, bytes);

        {
            let mut d = self.diagnostics.lock();
            d.blocks_received += 1;
            match &frame {
                Some(frame) => {
                    d.frames_published += 1;
                    d.samples_total += frame.block.sample_count() as u64;
                }
                None => d.blocks_dropped += 1,
            }
        }

        let Some(frame) = frame else {
            log::trace!("dropped {} byte block with no decodable samples ({})", bytes.len(), format);
            return;
        };

        for subscriber in self.subscriber_snapshot() {
            subscriber.on_frame(&frame);
        }
    }

    /// Stream-stopped handler. A stop we did not request is a fault.
    fn handle_stopped(&self, generation: u64, error: Option<CaptureError>) {
        let stream = {
            let mut state = self.state.lock();
            if state.generation != generation || state.disposed {
                log::debug!("ignoring stop signal from released stream #{}", generation);
                return;
            }
            match state.take_stream() {
                Some(stream) => stream,
                None => return,
            }
        };
        // The handle may belong to the thread we are running on; release it
        // without holding the lock.
        drop(stream);

        let fault = match error {
            Some(CaptureError::StreamFault(message)) => CaptureError::StreamFault(message),
            Some(other) => CaptureError::StreamFault(other.to_string()),
            None => CaptureError::StreamFault("backend ended the stream".into()),
        };
        log::error!("Capture stream #{} failed: {}", generation, fault);
        self.diagnostics.lock().faults += 1;

        for subscriber in self.subscriber_snapshot() {
            subscriber.on_fault(&fault);
        }
    }

    fn subscriber_snapshot(&self) -> Vec<Arc<dyn CaptureSubscriber>> {
        self.subscribers
            .lock()
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect()
    }
}

/// Owns one capture stream's lifecycle and drives the signal pipeline for
/// every block it delivers.
///
/// ```text
/// [Backend stream] → raw bytes → [SampleDecoder] → [LevelMeter]
///                                               └→ [SpectrumAnalyzer] → [SpectrogramRenderer]
///                                                        ↓
///                                               [CaptureSubscriber]s
/// ```
///
/// All methods take `&self`; the source can be shared behind an `Arc` and
/// started or stopped from any thread while the backend delivers blocks on
/// its own.
pub struct CaptureSource {
    backend: Arc<dyn CaptureBackend>,
    options: CaptureOptions,
    shared: Arc<SourceShared>,
    next_token: AtomicU64,
}

impl CaptureSource {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        options: CaptureOptions,
        pipeline: PipelineConfig,
    ) -> Result<Self, CaptureError> {
        options.validate().map_err(CaptureError::ConfigurationFailed)?;
        let pipeline = SignalPipeline::new(pipeline)?;

        Ok(Self {
            backend,
            options,
            shared: Arc::new(SourceShared {
                state: Mutex::new(SourceState {
                    slot: StreamSlot::Stopped,
                    generation: 0,
                    disposed: false,
                }),
                pipeline: Mutex::new(pipeline),
                subscribers: Mutex::new(Vec::new()),
                diagnostics: Mutex::new(SourceDiagnostics::default()),
            }),
            next_token: AtomicU64::new(1),
        })
    }

    /// Source with the default analysis settings.
    pub fn with_defaults(backend: Arc<dyn CaptureBackend>, options: CaptureOptions) -> Result<Self, CaptureError> {
        Self::new(backend, options, PipelineConfig::default())
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn state(&self) -> CaptureState {
        match self.shared.state.lock().slot {
            StreamSlot::Running(_) => CaptureState::Running,
            StreamSlot::Stopped => CaptureState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().disposed
    }

    pub fn diagnostics(&self) -> SourceDiagnostics {
        self.shared.diagnostics.lock().clone()
    }

    /// Endpoints the backend offers for this source's capture mode.
    pub fn devices(&self) -> Result<Vec<AudioDeviceInfo>, CaptureError> {
        self.backend.devices(self.options.mode)
    }

    /// Current spectrogram, if rendering is enabled.
    pub fn spectrogram(&self) -> Option<SpectrogramImage> {
        self.shared.pipeline.lock().spectrogram()
    }

    /// Open and start a backend stream. Transitions: stopped → running.
    ///
    /// A no-op when already running. Setup failures leave the source stopped
    /// and are not retried.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut state = self.shared.state.lock();
        if state.disposed {
            return Err(CaptureError::Disposed);
        }
        if matches!(state.slot, StreamSlot::Running(_)) {
            return Ok(());
        }

        let mut stream = self.backend.open(&self.options).map_err(|e| {
            log::error!("Failed to open {} capture on {}: {}", self.options.mode, self.backend.name(), e);
            e
        })?;

        state.generation += 1;
        let generation = state.generation;

        let callbacks = Self::stream_callbacks(Arc::downgrade(&self.shared), generation);
        if let Err(e) = stream.start(callbacks) {
            log::error!("Failed to start {} capture: {}", self.options.mode, e);
            drop(state);
            drop(stream);
            return Err(e);
        }

        // A new session gets a fresh spectrogram. Blocks from the new stream
        // wait on the state lock, so none is rendered before this.
        self.shared.pipeline.lock().reset();

        let format = stream.format();
        state.slot = StreamSlot::Running(stream);
        drop(state);

        {
            let mut d = self.shared.diagnostics.lock();
            d.started_at = Some(Utc::now());
            d.last_format = format.map(|f| f.to_string()).unwrap_or_default();
        }
        log::info!(
            "Started {} capture #{} ({})",
            self.options.mode,
            generation,
            format.map(|f| f.to_string()).unwrap_or_else(|| "format pending".into())
        );
        Ok(())
    }

    /// Stop the stream. Transitions: running → stopped.
    ///
    /// A no-op when already stopped. If the backend fails to stop cleanly
    /// the error is returned, but the source is stopped regardless.
    pub fn stop(&self) -> Result<(), CaptureError> {
        let Some(stream) = self.shared.state.lock().take_stream() else {
            return Ok(());
        };

        log::info!("Stopping {} capture", self.options.mode);
        Self::shutdown_stream(stream).map_err(|e| {
            log::warn!("Capture stream did not stop cleanly: {}", e);
            e
        })
    }

    /// Permanently release the source: drops every subscription and the
    /// stream. Safe to call any number of times; later `start` and
    /// `subscribe` calls fail with [`CaptureError::Disposed`].
    pub fn dispose(&self) {
        let stream = {
            let mut state = self.shared.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            self.shared.subscribers.lock().clear();
            state.take_stream()
        };

        if let Some(stream) = stream {
            if let Err(e) = Self::shutdown_stream(stream) {
                log::warn!("Ignoring stop failure during dispose: {}", e);
            }
        }
    }

    /// Register a subscriber for frames and faults.
    pub fn subscribe(&self, subscriber: Arc<dyn CaptureSubscriber>) -> Result<SubscriptionToken, CaptureError> {
        let state = self.shared.state.lock();
        if state.disposed {
            return Err(CaptureError::Disposed);
        }

        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.shared.subscribers.lock().push((token, subscriber));
        Ok(token)
    }

    /// Returns false if `token` was not (or is no longer) subscribed.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut subscribers = self.shared.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(t, _)| *t != token);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }

    // --- Internal helpers ---

    /// Callbacks hold only a weak reference so a stream never keeps its
    /// owning source alive.
    fn stream_callbacks(shared: Weak<SourceShared>, generation: u64) -> StreamCallbacks {
        let data_shared = Weak::clone(&shared);
        StreamCallbacks {
            on_data: Arc::new(move |bytes: &[u8]| {
                if let Some(shared) = data_shared.upgrade() {
                    shared.handle_data(generation, bytes);
                }
            }),
            on_stopped: Arc::new(move |error: Option<CaptureError>| {
                if let Some(shared) = shared.upgrade() {
                    shared.handle_stopped(generation, error);
                }
            }),
        }
    }

    fn shutdown_stream(mut stream: Box<dyn CaptureStream>) -> Result<(), CaptureError> {
        let result = stream.stop();
        drop(stream);
        result
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.dispose();
    }
}
