use std::sync::Arc;

use crate::models::audio_models::{AudioDeviceInfo, CaptureMode};
use crate::models::config::CaptureOptions;
use crate::models::error::CaptureError;
use crate::models::wave_format::WaveFormat;

/// Callback invoked with each raw block, in the stream's declared format.
///
/// Fires on a backend-owned thread; keep processing short.
pub type RawBufferCallback = Arc<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// Callback invoked once when a stream stops. `Some(error)` when the stream
/// died on its own (device removed, driver failure).
pub type StreamStoppedCallback = Arc<dyn Fn(Option<CaptureError>) + Send + Sync + 'static>;

/// Handlers a stream delivers its events to.
#[derive(Clone)]
pub struct StreamCallbacks {
    pub on_data: RawBufferCallback,
    pub on_stopped: StreamStoppedCallback,
}

/// A single opened capture stream.
///
/// Implemented by:
/// - `WasapiStream` (Windows)
pub trait CaptureStream: Send {
    /// Begin delivering blocks. Setup failures (device busy, format rejected)
    /// are returned here rather than through `on_stopped`.
    fn start(&mut self, callbacks: StreamCallbacks) -> Result<(), CaptureError>;

    /// Stop delivering blocks and release device resources.
    fn stop(&mut self) -> Result<(), CaptureError>;

    fn is_running(&self) -> bool;

    /// Format of delivered blocks; None until the stream has started.
    fn format(&self) -> Option<WaveFormat>;
}

/// Platform capture backend: device enumeration plus stream creation.
///
/// Implemented by:
/// - `WasapiBackend` (Windows)
/// - `UnsupportedBackend` (every other platform)
pub trait CaptureBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this backend can open streams at all on this machine.
    fn is_available(&self) -> bool;

    /// Endpoints usable in `mode`.
    fn devices(&self, mode: CaptureMode) -> Result<Vec<AudioDeviceInfo>, CaptureError>;

    /// Open (but do not start) a stream for `options`.
    fn open(&self, options: &CaptureOptions) -> Result<Box<dyn CaptureStream>, CaptureError>;
}
