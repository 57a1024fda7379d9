pub mod level_meter;
pub mod pipeline;
pub mod sample_decoder;
pub mod spectrogram;
pub mod spectrum;
