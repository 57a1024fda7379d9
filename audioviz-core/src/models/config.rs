use serde::{Deserialize, Serialize};

use super::audio_models::CaptureMode;
use super::error::CaptureError;

pub const DEFAULT_BUFFER_MS: u32 = 20;
pub const DEFAULT_FFT_SIZE: usize = 1024;
pub const DEFAULT_LEVEL_FLOOR_DB: f32 = -120.0;
pub const DEFAULT_SPECTRUM_FLOOR_DB: f32 = -90.0;
/// Largest spectrogram width or height accepted by `PipelineConfig`.
pub const MAX_SPECTROGRAM_SIDE: usize = 4096;

/// Options for opening a capture stream.
///
/// Fixed for the lifetime of a `CaptureSource`; build a new source to change
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureOptions {
    /// Loopback (default) or microphone.
    pub mode: CaptureMode,

    /// Specific endpoint ID, or None for the default endpoint of `mode`.
    pub device_id: Option<String>,

    /// Requested sample rate in Hz; None keeps the device mix format.
    pub sample_rate: Option<u32>,

    /// Requested channel count; None keeps the device mix format.
    pub channels: Option<u16>,

    /// Backend buffer duration in milliseconds (default: 20).
    pub buffer_ms: u32,
}

impl CaptureOptions {
    pub fn default_loopback() -> Self {
        Self {
            mode: CaptureMode::Loopback,
            ..Self::default()
        }
    }

    pub fn default_microphone() -> Self {
        Self {
            mode: CaptureMode::Microphone,
            ..Self::default()
        }
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_buffer_ms(self, buffer_ms: u32) -> Result<Self, CaptureError> {
        if buffer_ms == 0 {
            return Err(CaptureError::ConfigurationFailed(
                "buffer duration must be positive".into(),
            ));
        }
        Ok(Self { buffer_ms, ..self })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_ms == 0 {
            return Err("buffer duration must be positive".into());
        }
        if self.sample_rate == Some(0) {
            return Err("sample rate override must be positive".into());
        }
        if self.channels == Some(0) {
            return Err("channel override must be positive".into());
        }
        if self.device_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err("device id must not be blank".into());
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, CaptureError> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("invalid capture options: {}", e)))?;
        options.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(options)
    }
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Loopback,
            device_id: None,
            sample_rate: None,
            channels: None,
            buffer_ms: DEFAULT_BUFFER_MS,
        }
    }
}

/// Size of the scrolling spectrogram image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectrogramConfig {
    pub width: usize,
    pub height: usize,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 256,
        }
    }
}

/// Analysis settings shared by every block a source processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// FFT analysis size; a power of two, at least 2 (default: 1024).
    pub fft_size: usize,

    /// Loudness reported for silence (default: -120 dBFS).
    pub level_floor_db: f32,

    /// Bottom of the spectrum intensity scale (default: -90 dB).
    pub spectrum_floor_db: f32,

    /// Spectrogram image size, or None to skip rendering.
    pub spectrogram: Option<SpectrogramConfig>,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.fft_size < 2 || !self.fft_size.is_power_of_two() {
            return Err(format!("fft size must be a power of two >= 2: {}", self.fft_size));
        }
        if self.level_floor_db.is_nan() || self.level_floor_db >= 0.0 {
            return Err(format!("level floor must be negative: {}", self.level_floor_db));
        }
        if self.spectrum_floor_db.is_nan() || self.spectrum_floor_db >= 0.0 {
            return Err(format!("spectrum floor must be negative: {}", self.spectrum_floor_db));
        }
        if let Some(size) = self.spectrogram {
            if size.width == 0 || size.height == 0 {
                return Err(format!(
                    "spectrogram size must be non-zero: {}x{}",
                    size.width, size.height
                ));
            }
            if size.width > MAX_SPECTROGRAM_SIDE || size.height > MAX_SPECTROGRAM_SIDE {
                return Err(format!(
                    "spectrogram size must be at most {}x{}: {}x{}",
                    MAX_SPECTROGRAM_SIDE, MAX_SPECTROGRAM_SIDE, size.width, size.height
                ));
            }
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, CaptureError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("invalid pipeline config: {}", e)))?;
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(config)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            level_floor_db: DEFAULT_LEVEL_FLOOR_DB,
            spectrum_floor_db: DEFAULT_SPECTRUM_FLOOR_DB,
            spectrogram: Some(SpectrogramConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(CaptureOptions::default().validate().is_ok());
        assert!(PipelineConfig::default().validate().is_ok());
        assert_eq!(CaptureOptions::default_microphone().mode, CaptureMode::Microphone);
        assert_eq!(CaptureOptions::default_loopback().buffer_ms, 20);
    }

    #[test]
    fn zero_buffer_duration_rejected() {
        let err = CaptureOptions::default_loopback().with_buffer_ms(0).unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));

        let options = CaptureOptions {
            buffer_ms: 0,
            ..CaptureOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn with_buffer_ms_keeps_other_fields() {
        let options = CaptureOptions::default_microphone()
            .with_device("{0.0.1.00000000}.{abc}")
            .with_buffer_ms(50)
            .unwrap();
        assert_eq!(options.mode, CaptureMode::Microphone);
        assert_eq!(options.device_id.as_deref(), Some("{0.0.1.00000000}.{abc}"));
        assert_eq!(options.buffer_ms, 50);
    }

    #[test]
    fn fft_size_must_be_power_of_two() {
        for bad in [0, 1, 3, 1000] {
            let config = PipelineConfig {
                fft_size: bad,
                ..PipelineConfig::default()
            };
            assert!(config.validate().is_err(), "fft size {} accepted", bad);
        }
    }

    #[test]
    fn floors_must_be_negative() {
        let config = PipelineConfig {
            spectrum_floor_db: 0.0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            level_floor_db: f32::NAN,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn options_from_json_fill_defaults() {
        let options = CaptureOptions::from_json_str(r#"{"mode":"microphone","device_id":"mic-1"}"#).unwrap();
        assert_eq!(options.mode, CaptureMode::Microphone);
        assert_eq!(options.device_id.as_deref(), Some("mic-1"));
        assert_eq!(options.buffer_ms, DEFAULT_BUFFER_MS);
        assert_eq!(options.sample_rate, None);
    }

    #[test]
    fn options_from_json_validates() {
        let err = CaptureOptions::from_json_str(r#"{"buffer_ms":0}"#).unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));

        let err = CaptureOptions::from_json_str("not json").unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
    }

    #[test]
    fn pipeline_from_json() {
        let config = PipelineConfig::from_json_str(
            r#"{"fft_size":2048,"spectrogram":{"width":64,"height":32}}"#,
        )
        .unwrap();
        assert_eq!(config.fft_size, 2048);
        assert_eq!(config.spectrum_floor_db, DEFAULT_SPECTRUM_FLOOR_DB);
        assert_eq!(
            config.spectrogram,
            Some(SpectrogramConfig {
                width: 64,
                height: 32
            })
        );

        let config = PipelineConfig::from_json_str(r#"{"spectrogram":null}"#).unwrap();
        assert_eq!(config.spectrogram, None);
    }

    #[test]
    fn oversized_spectrogram_rejected() {
        let err = PipelineConfig::from_json_str(
            r#"{"fft_size":256,"spectrogram":{"width":4611686018427387904,"height":2}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));

        let config = PipelineConfig {
            spectrogram: Some(SpectrogramConfig {
                width: 64,
                height: MAX_SPECTROGRAM_SIDE + 1,
            }),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            spectrogram: Some(SpectrogramConfig {
                width: MAX_SPECTROGRAM_SIDE,
                height: MAX_SPECTROGRAM_SIDE,
            }),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
