//! WASAPI shared-mode capture stream.
//!
//! One implementation serves both capture modes:
//! - `Microphone` opens a capture endpoint.
//! - `Loopback` opens a render endpoint with `AUDCLNT_STREAMFLAGS_LOOPBACK`
//!   and records the mix going to it. No special permissions are needed;
//!   DRM-protected audio arrives silenced.
//!
//! All COM objects live on the dedicated capture thread. The stream handle
//! itself only holds the stop flag and the thread handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use windows::core::PCWSTR;
use windows::Win32::Foundation::{E_ACCESSDENIED, HANDLE};
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use audioviz_core::models::audio_models::CaptureMode;
use audioviz_core::models::config::CaptureOptions;
use audioviz_core::models::error::CaptureError;
use audioviz_core::models::wave_format::WaveFormat;
use audioviz_core::traits::capture_backend::{CaptureStream, StreamCallbacks};

use crate::com::{device_error, stream_error, ComScope};
use crate::device_enumerator::DeviceEnumerator;
use crate::format::{buffer_duration_hns, poll_interval, requested_format, to_waveformatex, wave_format_from_ptr};

/// Setup outcome sent from the capture thread back to `start()`.
type ReadySignal = Result<WaveFormat, CaptureError>;

/// A WASAPI capture stream for one `CaptureOptions`.
pub struct WasapiStream {
    options: CaptureOptions,
    running: Arc<AtomicBool>,
    format: Option<WaveFormat>,
    capture_handle: Option<thread::JoinHandle<()>>,
}

impl WasapiStream {
    pub fn new(options: CaptureOptions) -> Self {
        Self {
            options,
            running: Arc::new(AtomicBool::new(false)),
            format: None,
            capture_handle: None,
        }
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }
}

impl CaptureStream for WasapiStream {
    fn start(&mut self, callbacks: StreamCallbacks) -> Result<(), CaptureError> {
        if self.capture_handle.is_some() {
            return Err(CaptureError::ConfigurationFailed(
                "capture stream already started".into(),
            ));
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let options = self.options.clone();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<ReadySignal>(1);

        let handle = thread::Builder::new()
            .name(format!("wasapi-{}-capture", self.options.mode))
            .spawn(move || capture_thread(options, running, callbacks, ready_tx))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CaptureError::Unknown(format!("failed to spawn capture thread: {}", e))
            })?;

        // Setup runs on the capture thread; wait for its verdict so open
        // failures surface here rather than through `on_stopped`.
        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(CaptureError::Unknown("capture thread exited during setup".into())));

        match ready {
            Ok(format) => {
                log::debug!("WASAPI {} stream format: {}", self.options.mode, format);
                self.format = Some(format);
                self.capture_handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(e)
            }
        }
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.capture_handle.take() else {
            return Ok(());
        };

        // Released from inside one of its own callbacks: the loop sees the
        // flag and exits once the callback returns.
        if handle.thread().id() == thread::current().id() {
            return Ok(());
        }

        handle
            .join()
            .map_err(|_| CaptureError::Unknown("capture thread panicked".into()))
    }

    fn is_running(&self) -> bool {
        self.capture_handle.is_some() && self.running.load(Ordering::SeqCst)
    }

    fn format(&self) -> Option<WaveFormat> {
        self.format
    }
}

impl Drop for WasapiStream {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("WASAPI stream teardown failed: {}", e);
        }
    }
}

/// Capture thread entry point.
fn capture_thread(
    options: CaptureOptions,
    running: Arc<AtomicBool>,
    callbacks: StreamCallbacks,
    ready: mpsc::SyncSender<ReadySignal>,
) {
    let session = match CaptureSession::open(&options) {
        Ok(session) => session,
        Err(e) => {
            log::error!("WASAPI {} setup failed: {}", options.mode, e);
            running.store(false, Ordering::SeqCst);
            let _ = ready.send(Err(e));
            return;
        }
    };

    if ready.send(Ok(session.format)).is_err() {
        return;
    }

    let result = session.pump(&running, &callbacks, poll_interval(options.buffer_ms));
    running.store(false, Ordering::SeqCst);
    drop(session);

    match result {
        Ok(()) => (callbacks.on_stopped)(None),
        Err(e) => {
            log::error!("WASAPI {} capture error: {}", options.mode, e);
            (callbacks.on_stopped)(Some(e));
        }
    }
}

/// MMCSS registration for the capture thread, reverted on drop.
struct MmcssRegistration(HANDLE);

impl MmcssRegistration {
    fn pro_audio() -> Option<Self> {
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        let mut task_index: u32 = 0;
        match unsafe { AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index) } {
            Ok(handle) => Some(Self(handle)),
            Err(e) => {
                log::warn!("MMCSS registration failed, capturing at normal priority: {}", e);
                None
            }
        }
    }
}

impl Drop for MmcssRegistration {
    fn drop(&mut self) {
        unsafe {
            let _ = AvRevertMmThreadCharacteristics(self.0);
        }
    }
}

/// Initialized audio client and its capture service. Field order is drop
/// order: the client is stopped and released before COM is torn down.
struct CaptureSession {
    audio_client: IAudioClient,
    capture_client: IAudioCaptureClient,
    format: WaveFormat,
    _mmcss: Option<MmcssRegistration>,
    _com: ComScope,
}

impl CaptureSession {
    /// Sequence:
    /// 1. CoInitializeEx (MTA)
    /// 2. Resolve the endpoint (by ID or the default for the mode)
    /// 3. Activate IAudioClient
    /// 4. Initialize in shared mode, with LOOPBACK on render endpoints
    /// 5. Get IAudioCaptureClient
    /// 6. Register with MMCSS
    /// 7. Start
    fn open(options: &CaptureOptions) -> Result<Self, CaptureError> {
        let com = ComScope::enter()?;

        let enumerator = DeviceEnumerator::new()?;
        let device = enumerator.resolve(options.mode, options.device_id.as_deref())?;
        let label = options.device_id.as_deref().unwrap_or("default endpoint");

        unsafe {
            let audio_client: IAudioClient = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| device_error(e, label))?;

            let mix_format_ptr = audio_client
                .GetMixFormat()
                .map_err(|e| CaptureError::ConfigurationFailed(format!("GetMixFormat failed: {}", e)))?;
            let mix_format = wave_format_from_ptr(mix_format_ptr);
            log::debug!("WASAPI mix format for {}: {}", label, mix_format);

            let mut stream_flags = AUDCLNT_STREAMFLAGS_NOPERSIST;
            if options.mode == CaptureMode::Loopback {
                stream_flags |= AUDCLNT_STREAMFLAGS_LOOPBACK;
            }

            let requested = requested_format(options, &mix_format);
            let converted: WAVEFORMATEX;
            let format_ptr: *const WAVEFORMATEX = match &requested {
                Some(format) => {
                    stream_flags |= AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM | AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY;
                    converted = to_waveformatex(format);
                    &converted
                }
                None => mix_format_ptr,
            };

            let initialized = audio_client.Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                stream_flags,
                buffer_duration_hns(options.buffer_ms),
                0,
                format_ptr,
                None,
            );
            CoTaskMemFree(Some(mix_format_ptr as *const _));
            initialized.map_err(|e| {
                if e.code() == E_ACCESSDENIED {
                    CaptureError::PermissionDenied
                } else {
                    CaptureError::ConfigurationFailed(format!("IAudioClient::Initialize failed: {}", e))
                }
            })?;

            let capture_client: IAudioCaptureClient = audio_client
                .GetService()
                .map_err(|e| CaptureError::ConfigurationFailed(format!("GetService failed: {}", e)))?;

            let mmcss = MmcssRegistration::pro_audio();

            audio_client
                .Start()
                .map_err(|e| device_error(e, label))?;

            Ok(Self {
                audio_client,
                capture_client,
                format: requested.unwrap_or(mix_format),
                _mmcss: mmcss,
                _com: com,
            })
        }
    }

    /// Poll for packets until `running` clears or the device fails.
    fn pump(&self, running: &AtomicBool, callbacks: &StreamCallbacks, poll: Duration) -> Result<(), CaptureError> {
        let block_align = usize::from(self.format.channels) * usize::from(self.format.bits_per_sample / 8);
        let mut silence: Vec<u8> = Vec::new();

        while running.load(Ordering::SeqCst) {
            thread::sleep(poll);

            let mut packet_length = unsafe { self.capture_client.GetNextPacketSize() }
                .map_err(|e| stream_error(e, "GetNextPacketSize"))?;

            while packet_length > 0 && running.load(Ordering::SeqCst) {
                let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                let mut num_frames: u32 = 0;
                let mut flags: u32 = 0;

                unsafe {
                    self.capture_client
                        .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                        .map_err(|e| stream_error(e, "GetBuffer"))?;
                }

                let len = num_frames as usize * block_align;
                if len > 0 {
                    let is_silent = flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0;
                    if is_silent || buffer_ptr.is_null() {
                        silence.resize(len, 0);
                        (callbacks.on_data)(&silence[..len]);
                    } else {
                        let bytes = unsafe { std::slice::from_raw_parts(buffer_ptr, len) };
                        (callbacks.on_data)(bytes);
                    }
                }

                unsafe { self.capture_client.ReleaseBuffer(num_frames) }
                    .map_err(|e| stream_error(e, "ReleaseBuffer"))?;

                packet_length = unsafe { self.capture_client.GetNextPacketSize() }
                    .map_err(|e| stream_error(e, "GetNextPacketSize"))?;
            }
        }

        Ok(())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        unsafe {
            let _ = self.audio_client.Stop();
        }
    }
}
