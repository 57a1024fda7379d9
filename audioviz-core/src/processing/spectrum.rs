use std::fmt;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::models::error::CaptureError;

/// Magnitudes at or below this are reported at the floor instead of taking
/// `log10` of (near) zero.
const MAGNITUDE_EPSILON: f32 = 1e-9;

/// Symmetric Hann window: `w[i] = 0.5 * (1 - cos(2πi / (N-1)))`.
///
/// A window of one coefficient is `[1.0]`; zero yields an empty window.
pub fn hann_window(size: usize) -> Vec<f32> {
    match size {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let factor = 2.0 * std::f32::consts::PI / (size - 1) as f32;
            (0..size)
                .map(|i| 0.5 * (1.0 - (factor * i as f32).cos()))
                .collect()
        }
    }
}

/// Windowed FFT over a fixed analysis size, producing one intensity in
/// `[0, 1]` per bin for the lower half of the spectrum.
///
/// All buffers are allocated once in [`SpectrumAnalyzer::new`]; `analyze`
/// does not allocate.
pub struct SpectrumAnalyzer {
    size: usize,
    floor_db: f32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    spectrum: Vec<f32>,
    valid: usize,
}

impl SpectrumAnalyzer {
    /// `size` must be a power of two of at least 2; `floor_db` is the
    /// decibel value mapped to intensity 0 and must be negative.
    pub fn new(size: usize, floor_db: f32) -> Result<Self, CaptureError> {
        if size < 2 || !size.is_power_of_two() {
            return Err(CaptureError::ConfigurationFailed(format!(
                "fft size must be a power of two >= 2: {}",
                size
            )));
        }
        if floor_db.is_nan() || floor_db >= 0.0 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "spectrum floor must be negative: {}",
                floor_db
            )));
        }

        let fft = FftPlanner::new().plan_fft_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(Self {
            size,
            floor_db,
            fft,
            window: hann_window(size),
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch,
            spectrum: vec![0.0; size / 2],
            valid: 0,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of bins produced per analysis (`size / 2`).
    pub fn bin_count(&self) -> usize {
        self.size / 2
    }

    pub fn floor_db(&self) -> f32 {
        self.floor_db
    }

    pub fn window(&self) -> &[f32] {
        &self.window
    }

    /// Centre frequency of `bin` for a stream at `sample_rate`.
    pub fn bin_frequency(&self, bin: usize, sample_rate: u32) -> f32 {
        bin as f32 * sample_rate as f32 / self.size as f32
    }

    /// Analyze channel 0 of `samples` into the internal spectrum buffer.
    ///
    /// Returns the number of valid bins, readable through [`Self::spectrum`].
    pub fn analyze(&mut self, samples: &[f32], sample_count: usize, channels: u16) -> usize {
        self.transform(samples, sample_count, channels);
        let mut spectrum = std::mem::take(&mut self.spectrum);
        let len = self.write_intensities(&mut spectrum);
        self.spectrum = spectrum;
        self.valid = len;
        len
    }

    /// Like [`Self::analyze`] but writes into `target`, returning
    /// `min(target.len(), size / 2)`.
    pub fn analyze_into(&mut self, samples: &[f32], sample_count: usize, channels: u16, target: &mut [f32]) -> usize {
        self.transform(samples, sample_count, channels);
        self.write_intensities(target)
    }

    /// Intensities from the most recent [`Self::analyze`] call.
    pub fn spectrum(&self) -> &[f32] {
        &self.spectrum[..self.valid]
    }

    /// Fill the complex buffer with windowed channel-0 frames (zero-padded)
    /// and run the forward transform in place.
    fn transform(&mut self, samples: &[f32], sample_count: usize, channels: u16) {
        let channels = channels.max(1) as usize;
        let available = samples.len().min(sample_count);
        let frames = (available / channels).min(self.size);

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            *slot = if i < frames {
                Complex::new(samples[i * channels] * self.window[i], 0.0)
            } else {
                Complex::new(0.0, 0.0)
            };
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
    }

    fn write_intensities(&self, target: &mut [f32]) -> usize {
        let len = target.len().min(self.size / 2);
        let scale = 1.0 / self.size as f32;
        let range = -self.floor_db;

        for (out, bin) in target[..len].iter_mut().zip(&self.buffer) {
            let magnitude = bin.norm() * scale;
            let db = if magnitude <= MAGNITUDE_EPSILON {
                self.floor_db
            } else {
                (20.0 * magnitude.log10()).max(self.floor_db)
            };
            *out = ((db - self.floor_db) / range).clamp(0.0, 1.0);
        }
        len
    }
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("size", &self.size)
            .field("floor_db", &self.floor_db)
            .field("valid", &self.valid)
            .finish()
    }
}
