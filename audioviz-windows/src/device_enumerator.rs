//! Windows audio endpoint enumeration via the MMDevice API.
//!
//! Loopback capture records what a render endpoint (speakers, headphones)
//! plays, so loopback lists render endpoints; microphone mode lists capture
//! endpoints.

use windows::core::{Interface, PCWSTR};
use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use audioviz_core::models::audio_models::{AudioDeviceInfo, CaptureMode};
use audioviz_core::models::error::CaptureError;

use crate::com::device_error;

/// Suffix appended to the default endpoint's display name.
const DEFAULT_SUFFIX: &str = " (Default)";

/// Endpoint data flow that backs each capture mode.
pub(crate) fn data_flow(mode: CaptureMode) -> EDataFlow {
    match mode {
        CaptureMode::Loopback => eRender,
        CaptureMode::Microphone => eCapture,
    }
}

pub(crate) fn display_label(friendly_name: &str, is_default: bool) -> String {
    if is_default {
        format!("{}{}", friendly_name, DEFAULT_SUFFIX)
    } else {
        friendly_name.to_string()
    }
}

/// Audio endpoint enumerator using the Windows MMDevice API.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Create a new device enumerator.
    ///
    /// Requires COM to be initialized on the calling thread.
    pub fn new() -> Result<Self, CaptureError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(|e| CaptureError::Unknown(format!("failed to create enumerator: {}", e)))?;
            Ok(Self { enumerator })
        }
    }

    /// List active endpoints usable in `mode`, default endpoint marked.
    pub fn list_devices(&self, mode: CaptureMode) -> Result<Vec<AudioDeviceInfo>, CaptureError> {
        let flow = data_flow(mode);
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(flow, DEVICE_STATE_ACTIVE)
                .map_err(|e| CaptureError::Unknown(format!("EnumAudioEndpoints failed: {}", e)))?;

            let count = collection
                .GetCount()
                .map_err(|e| CaptureError::Unknown(format!("GetCount failed: {}", e)))?;

            let default_id = self.default_device_id(mode).ok();

            let mut devices = Vec::with_capacity(count as usize);
            for i in 0..count {
                let device = match collection.Item(i) {
                    Ok(d) => d,
                    Err(_) => continue,
                };

                let Some(id) = Self::device_id(&device) else {
                    continue;
                };

                let name = Self::friendly_name(&device).unwrap_or_else(|| format!("Device {}", i));
                let is_default = default_id.as_deref() == Some(id.as_str());

                devices.push(AudioDeviceInfo {
                    id,
                    display_name: display_label(&name, is_default),
                    mode,
                    is_default,
                });
            }

            log::debug!("Found {} active {} endpoints", devices.len(), mode);
            Ok(devices)
        }
    }

    /// Endpoint ID of the console default for `mode`.
    pub fn default_device_id(&self, mode: CaptureMode) -> Result<String, CaptureError> {
        let device = self.default_device(mode)?;
        Self::device_id(&device)
            .ok_or_else(|| CaptureError::DeviceNotAvailable(format!("default {} endpoint", mode)))
    }

    /// Resolve the endpoint a stream should open: `device_id` if given,
    /// otherwise the console default for `mode`.
    pub fn resolve(&self, mode: CaptureMode, device_id: Option<&str>) -> Result<IMMDevice, CaptureError> {
        let Some(id) = device_id else {
            return self.default_device(mode);
        };

        let wide_id: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
        let device = unsafe { self.enumerator.GetDevice(PCWSTR(wide_id.as_ptr())) }
            .map_err(|e| device_error(e, id))?;

        // An ID of the wrong flow would open, but as the wrong kind of stream.
        let endpoint: IMMEndpoint = device
            .cast()
            .map_err(|e| CaptureError::Unknown(format!("IMMEndpoint cast failed: {}", e)))?;
        let flow = unsafe { endpoint.GetDataFlow() }
            .map_err(|e| CaptureError::Unknown(format!("GetDataFlow failed: {}", e)))?;
        if flow != data_flow(mode) {
            return Err(CaptureError::DeviceNotAvailable(format!(
                "{} is not a {} endpoint",
                id, mode
            )));
        }

        Ok(device)
    }

    fn default_device(&self, mode: CaptureMode) -> Result<IMMDevice, CaptureError> {
        unsafe { self.enumerator.GetDefaultAudioEndpoint(data_flow(mode), eConsole) }
            .map_err(|e| device_error(e, &format!("default {} endpoint", mode)))
    }

    fn device_id(device: &IMMDevice) -> Option<String> {
        unsafe {
            let raw = device.GetId().ok()?;
            let id = raw.to_string().ok();
            CoTaskMemFree(Some(raw.0 as *const _));
            id
        }
    }

    /// Read the PKEY_Device_FriendlyName property from a device.
    fn friendly_name(device: &IMMDevice) -> Option<String> {
        unsafe {
            let store = device.OpenPropertyStore(STGM_READ).ok()?;
            let value = store.GetValue(&PKEY_Device_FriendlyName).ok()?;
            let name = value.to_string();
            (!name.is_empty()).then_some(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoint_is_labelled() {
        assert_eq!(display_label("Speakers", true), "Speakers (Default)");
        assert_eq!(display_label("Speakers", false), "Speakers");
    }

    #[test]
    fn loopback_reads_render_endpoints() {
        assert_eq!(data_flow(CaptureMode::Loopback), eRender);
        assert_eq!(data_flow(CaptureMode::Microphone), eCapture);
    }
}
