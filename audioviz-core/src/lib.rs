//! # audioviz-core
//!
//! Platform-agnostic audio capture and visualization core library.
//!
//! Turns raw capture buffers into normalized samples, a loudness level, a
//! frequency spectrum and a scrolling spectrogram image. Platform-specific
//! backends (Windows WASAPI) implement the `CaptureBackend` trait and plug
//! into the generic `CaptureSource`.
//!
//! ## Architecture
//!
//! ```text
//! audioviz-core (this crate)
//! ├── traits/       ← CaptureBackend, CaptureStream, CaptureSubscriber
//! ├── models/       ← CaptureError, CaptureState, CaptureOptions, WaveFormat, etc.
//! ├── processing/   ← SampleDecoder, LevelMeter, SpectrumAnalyzer, SpectrogramRenderer
//! ├── session/      ← CaptureSource (lifecycle + pipeline driver)
//! └── backends/     ← UnsupportedBackend
//! ```

pub mod backends;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use backends::unsupported::UnsupportedBackend;
pub use models::audio_models::{AudioDeviceInfo, CaptureMode, NormalizedBlock, SourceDiagnostics};
pub use models::config::{CaptureOptions, PipelineConfig, SpectrogramConfig};
pub use models::error::CaptureError;
pub use models::state::CaptureState;
pub use models::wave_format::{SampleEncoding, SampleKind, WaveFormat};
pub use processing::pipeline::{AnalysisFrame, SignalPipeline};
pub use processing::spectrogram::{SpectrogramImage, SpectrogramRenderer};
pub use processing::spectrum::SpectrumAnalyzer;
pub use session::capture_source::{CaptureSource, SubscriptionToken};
pub use traits::capture_backend::{CaptureBackend, CaptureStream, RawBufferCallback, StreamCallbacks, StreamStoppedCallback};
pub use traits::capture_subscriber::CaptureSubscriber;
