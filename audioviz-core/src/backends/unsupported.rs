use crate::models::audio_models::{AudioDeviceInfo, CaptureMode};
use crate::models::config::CaptureOptions;
use crate::models::error::CaptureError;
use crate::traits::capture_backend::{CaptureBackend, CaptureStream};

/// Stand-in backend for platforms without a capture implementation.
///
/// Lists no devices and fails every `open` with `PlatformNotSupported`, so a
/// source built on it errors on `start()` instead of silently never
/// delivering audio.
#[derive(Debug, Clone)]
pub struct UnsupportedBackend {
    reason: String,
}

impl UnsupportedBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Default for UnsupportedBackend {
    fn default() -> Self {
        Self::new("audio capture is not yet implemented for this platform")
    }
}

impl CaptureBackend for UnsupportedBackend {
    fn name(&self) -> &str {
        "unsupported"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn devices(&self, _mode: CaptureMode) -> Result<Vec<AudioDeviceInfo>, CaptureError> {
        Ok(Vec::new())
    }

    fn open(&self, _options: &CaptureOptions) -> Result<Box<dyn CaptureStream>, CaptureError> {
        Err(CaptureError::PlatformNotSupported(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_no_devices() {
        let backend = UnsupportedBackend::default();
        assert!(!backend.is_available());
        assert!(backend.devices(CaptureMode::Loopback).unwrap().is_empty());
        assert!(backend.devices(CaptureMode::Microphone).unwrap().is_empty());
    }

    #[test]
    fn open_fails_fast_with_reason() {
        let backend = UnsupportedBackend::new("no audio on this box");
        let err = backend.open(&CaptureOptions::default()).err().unwrap();
        assert_eq!(err, CaptureError::PlatformNotSupported("no audio on this box".into()));
    }
}
