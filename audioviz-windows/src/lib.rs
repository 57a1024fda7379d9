//! # audioviz-windows
//!
//! Windows WASAPI backend for audioviz.
//!
//! Provides:
//! - `WasapiBackend`: device enumeration and stream creation
//! - `WasapiStream`: shared-mode capture, microphone or loopback
//! - `DeviceEnumerator`: audio endpoint enumeration via MMDevice API
//! - `default_backend()`: WASAPI on Windows, `UnsupportedBackend` elsewhere
//!
//! ## Platform Requirements
//! - Windows 10+
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use audioviz_core::{CaptureOptions, CaptureSource};
//!
//! let source = CaptureSource::with_defaults(
//!     audioviz_windows::default_backend(),
//!     CaptureOptions::default_loopback(),
//! )?;
//! source.subscribe(my_subscriber)?;
//! source.start()?;
//! ```

use std::sync::Arc;

use audioviz_core::traits::capture_backend::CaptureBackend;

pub mod format;

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod wasapi_backend;
#[cfg(target_os = "windows")]
pub mod wasapi_stream;

#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use wasapi_backend::WasapiBackend;
#[cfg(target_os = "windows")]
pub use wasapi_stream::WasapiStream;

/// The capture backend for the platform this was built for.
#[cfg(target_os = "windows")]
pub fn default_backend() -> Arc<dyn CaptureBackend> {
    Arc::new(WasapiBackend::new())
}

/// The capture backend for the platform this was built for.
#[cfg(not(target_os = "windows"))]
pub fn default_backend() -> Arc<dyn CaptureBackend> {
    Arc::new(audioviz_core::backends::unsupported::UnsupportedBackend::default())
}

#[cfg(all(test, not(target_os = "windows")))]
mod tests {
    use super::*;
    use audioviz_core::models::config::CaptureOptions;
    use audioviz_core::models::error::CaptureError;

    #[test]
    fn non_windows_default_is_unsupported() {
        let backend = default_backend();
        assert_eq!(backend.name(), "unsupported");
        assert!(!backend.is_available());
        assert!(matches!(
            backend.open(&CaptureOptions::default()),
            Err(CaptureError::PlatformNotSupported(_))
        ));
    }
}
