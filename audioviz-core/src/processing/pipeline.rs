use std::sync::Arc;

use crate::models::audio_models::NormalizedBlock;
use crate::models::config::PipelineConfig;
use crate::models::error::CaptureError;
use crate::models::wave_format::WaveFormat;
use crate::processing::level_meter;
use crate::processing::sample_decoder;
use crate::processing::spectrogram::{SpectrogramImage, SpectrogramRenderer};
use crate::processing::spectrum::SpectrumAnalyzer;

/// Everything derived from one delivered block.
#[derive(Debug, Clone)]
pub struct AnalysisFrame {
    pub block: Arc<NormalizedBlock>,
    /// RMS loudness in dBFS, clamped to `[level_floor_db, 0]`.
    pub level_db: f32,
    /// Largest absolute sample in the block, in `[0, 1]`.
    pub peak: f32,
    /// Bin intensities in `[0, 1]`, lowest frequency first.
    pub spectrum: Vec<f32>,
    /// Spectrogram after this frame was painted, if rendering is enabled.
    pub spectrogram: Option<SpectrogramImage>,
}

impl AnalysisFrame {
    pub fn sample_rate(&self) -> u32 {
        self.block.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.block.channels
    }
}

/// Decode → meter → analyze → render for a single capture source.
///
/// Owns the analyzer scratch buffers and the spectrogram pixels; it is used
/// from one thread at a time.
#[derive(Debug)]
pub struct SignalPipeline {
    config: PipelineConfig,
    analyzer: SpectrumAnalyzer,
    renderer: Option<SpectrogramRenderer>,
}

impl SignalPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;

        let analyzer = SpectrumAnalyzer::new(config.fft_size, config.spectrum_floor_db)?;
        let renderer = config
            .spectrogram
            .map(|size| SpectrogramRenderer::new(size.width, size.height));

        Ok(Self {
            config,
            analyzer,
            renderer,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one raw block. Returns None when the block decodes to no
    /// samples, in which case nothing was rendered either.
    pub fn process(&mut self, format: &WaveFormat, bytes: &[u8]) -> Option<AnalysisFrame> {
        let block = sample_decoder::decode(format, bytes);
        if block.is_empty() {
            return None;
        }
        Some(self.analyze(block))
    }

    /// Meter, analyze and render an already-normalized block.
    pub fn analyze(&mut self, block: NormalizedBlock) -> AnalysisFrame {
        let count = block.sample_count();
        let level_db = level_meter::decibel_level(&block.samples, count, self.config.level_floor_db);
        let peak = level_meter::peak_level(&block.samples);

        self.analyzer.analyze(&block.samples, count, block.channels);
        let spectrum = self.analyzer.spectrum().to_vec();

        let spectrogram = self.renderer.as_mut().map(|renderer| {
            renderer.render(&spectrum);
            renderer.snapshot()
        });

        AnalysisFrame {
            block: Arc::new(block),
            level_db,
            peak,
            spectrum,
            spectrogram,
        }
    }

    /// Start a new session: the spectrogram history is discarded.
    pub fn reset(&mut self) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.clear();
        }
    }

    /// Current spectrogram without rendering a new frame.
    pub fn spectrogram(&self) -> Option<SpectrogramImage> {
        self.renderer.as_ref().map(SpectrogramRenderer::snapshot)
    }
}
