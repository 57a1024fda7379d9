//! COM apartment handling and HRESULT mapping shared by the enumerator and
//! the capture thread.

use windows::Win32::Foundation::{E_ACCESSDENIED, RPC_E_CHANGED_MODE};
use windows::Win32::Media::Audio::{AUDCLNT_E_DEVICE_INVALIDATED, AUDCLNT_E_DEVICE_IN_USE};
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

use audioviz_core::models::error::CaptureError;

/// Joins the calling thread to the MTA for as long as it lives.
///
/// A thread that already lives in an STA keeps it; COM is usable there too,
/// so that case is not an error and nothing is uninitialized on drop.
pub(crate) struct ComScope {
    owns_init: bool,
}

impl ComScope {
    pub(crate) fn enter() -> Result<Self, CaptureError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            return Ok(Self { owns_init: false });
        }
        hr.ok()
            .map_err(|e| CaptureError::Unknown(format!("CoInitializeEx failed: {}", e)))?;
        Ok(Self { owns_init: true })
    }
}

impl Drop for ComScope {
    fn drop(&mut self) {
        if self.owns_init {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Map a failure to reach or activate an endpoint.
pub(crate) fn device_error(error: windows::core::Error, device: &str) -> CaptureError {
    let code = error.code();
    if code == E_ACCESSDENIED {
        CaptureError::PermissionDenied
    } else if code == AUDCLNT_E_DEVICE_INVALIDATED || code == AUDCLNT_E_DEVICE_IN_USE {
        CaptureError::DeviceNotAvailable(format!("{}: {}", device, error))
    } else {
        CaptureError::DeviceNotAvailable(device.to_string())
    }
}

/// Map a failure while the stream is already delivering.
pub(crate) fn stream_error(error: windows::core::Error, call: &str) -> CaptureError {
    if error.code() == AUDCLNT_E_DEVICE_INVALIDATED {
        CaptureError::StreamFault("capture device was removed".into())
    } else {
        CaptureError::StreamFault(format!("{} failed: {}", call, error))
    }
}
