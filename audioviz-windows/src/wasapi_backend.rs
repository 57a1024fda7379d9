//! `CaptureBackend` implementation over WASAPI.

use audioviz_core::models::audio_models::{AudioDeviceInfo, CaptureMode};
use audioviz_core::models::config::CaptureOptions;
use audioviz_core::models::error::CaptureError;
use audioviz_core::traits::capture_backend::{CaptureBackend, CaptureStream};

use crate::com::ComScope;
use crate::device_enumerator::DeviceEnumerator;
use crate::wasapi_stream::WasapiStream;

/// Windows capture backend: MMDevice enumeration plus WASAPI shared-mode
/// streams.
///
/// Stateless; COM is entered per call on the calling thread and on each
/// stream's own capture thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct WasapiBackend;

impl WasapiBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for WasapiBackend {
    fn name(&self) -> &str {
        "wasapi"
    }

    fn is_available(&self) -> bool {
        // At least one endpoint to capture from in either mode.
        [CaptureMode::Loopback, CaptureMode::Microphone]
            .into_iter()
            .any(|mode| self.devices(mode).is_ok_and(|devices| !devices.is_empty()))
    }

    fn devices(&self, mode: CaptureMode) -> Result<Vec<AudioDeviceInfo>, CaptureError> {
        let _com = ComScope::enter()?;
        DeviceEnumerator::new()?.list_devices(mode)
    }

    fn open(&self, options: &CaptureOptions) -> Result<Box<dyn CaptureStream>, CaptureError> {
        options.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(Box::new(WasapiStream::new(options.clone())))
    }
}
