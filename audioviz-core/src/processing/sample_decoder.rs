//! Raw byte block → normalized `f32` samples.
//!
//! Integer PCM is rescaled by its full-scale value; 32-bit float is taken
//! as-is apart from clamping into `[-1.0, 1.0]`. Anything the decoder does
//! not understand produces an empty block, which callers treat as "nothing
//! to process this tick".

use crate::models::audio_models::NormalizedBlock;
use crate::models::wave_format::{SampleKind, WaveFormat};

const SCALE_8: f32 = 1.0 / 128.0;
const SCALE_16: f32 = 1.0 / 32_768.0;
const SCALE_24: f32 = 1.0 / 8_388_608.0;
const SCALE_32: f64 = 1.0 / 2_147_483_648.0;

/// Decode `bytes` according to `format`.
///
/// Sample count is `bytes.len() / bytes_per_sample`; a trailing partial
/// sample is dropped.
pub fn decode(format: &WaveFormat, bytes: &[u8]) -> NormalizedBlock {
    let Some(kind) = format.sample_kind() else {
        log::trace!("undecodable format {}, dropping {} bytes", format, bytes.len());
        return NormalizedBlock::empty(format.sample_rate, format.channels);
    };

    let samples = decode_samples(kind, bytes);
    NormalizedBlock {
        samples,
        sample_rate: format.sample_rate,
        channels: format.channels,
    }
}

/// Decode a whole number of `kind` samples from the front of `bytes`.
pub fn decode_samples(kind: SampleKind, bytes: &[u8]) -> Vec<f32> {
    let chunks = bytes.chunks_exact(kind.bytes_per_sample());
    match kind {
        SampleKind::Int8 => chunks.map(|b| (b[0] as i16 - 128) as f32 * SCALE_8).collect(),
        SampleKind::Int16 => chunks
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 * SCALE_16)
            .collect(),
        SampleKind::Int24 => chunks.map(|b| read_i24_le(b) as f32 * SCALE_24).collect(),
        SampleKind::Int32 => chunks
            .map(|b| (i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64 * SCALE_32) as f32)
            .collect(),
        SampleKind::Float32 => chunks
            .map(|b| sanitize_float(f32::from_le_bytes([b[0], b[1], b[2], b[3]])))
            .collect(),
    }
}

/// Three little-endian bytes, sign-extended from bit 23.
fn read_i24_le(b: &[u8]) -> i32 {
    // Place the 24 bits in the top of an i32 and shift back to sign-extend.
    i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8
}

fn sanitize_float(sample: f32) -> f32 {
    if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::wave_format::{SUBTYPE_IEEE_FLOAT, SUBTYPE_PCM};
    use approx::assert_abs_diff_eq;
    use uuid::Uuid;

    #[test]
    fn silent_blocks_decode_to_zero() {
        // 8-bit silence is the 128 midpoint, not zero bytes.
        let block = decode(&WaveFormat::pcm(8000, 1, 8), &[128; 64]);
        assert_eq!(block.sample_count(), 64);
        assert!(block.samples.iter().all(|&s| s == 0.0));

        for (format, width) in [
            (WaveFormat::pcm(48000, 2, 16), 2),
            (WaveFormat::pcm(48000, 2, 24), 3),
            (WaveFormat::pcm(48000, 2, 32), 4),
            (WaveFormat::ieee_float(48000, 2), 4),
            (WaveFormat::extensible(48000, 2, 32, SUBTYPE_IEEE_FLOAT), 4),
            (WaveFormat::extensible(48000, 2, 16, SUBTYPE_PCM), 2),
        ] {
            let bytes = vec![0u8; width * 96];
            let block = decode(&format, &bytes);
            assert_eq!(block.sample_count(), 96, "{}", format);
            assert!(block.samples.iter().all(|&s| s == 0.0), "{}", format);
            assert_eq!(block.sample_rate, 48000);
            assert_eq!(block.channels, 2);
        }
    }

    #[test]
    fn pcm8_is_offset_binary() {
        let block = decode(&WaveFormat::pcm(8000, 1, 8), &[0, 128, 255]);
        assert_eq!(block.samples, vec![-1.0, 0.0, 127.0 / 128.0]);
    }

    #[test]
    fn pcm16_extremes() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&i16::MIN.to_le_bytes());
        bytes.extend_from_slice(&i16::MAX.to_le_bytes());
        bytes.extend_from_slice(&16384i16.to_le_bytes());

        let block = decode(&WaveFormat::pcm(44100, 1, 16), &bytes);
        assert_eq!(block.samples[0], -1.0);
        assert!(block.samples[1] < 1.0);
        assert_abs_diff_eq!(block.samples[1], 32767.0 / 32768.0, epsilon = 1e-7);
        assert_eq!(block.samples[2], 0.5);
    }

    #[test]
    fn pcm24_sign_extension() {
        let block = decode(
            &WaveFormat::pcm(48000, 1, 24),
            &[0x00, 0x00, 0x80, 0xFF, 0xFF, 0x7F, 0xFF, 0xFF, 0xFF],
        );
        assert_eq!(block.sample_count(), 3);
        assert_eq!(block.samples[0], -1.0);
        assert!(block.samples[1] < 1.0);
        assert_abs_diff_eq!(block.samples[1], 8_388_607.0 / 8_388_608.0, epsilon = 1e-7);
        assert_abs_diff_eq!(block.samples[2], -1.0 / 8_388_608.0, epsilon = 1e-12);
    }

    #[test]
    fn pcm32_extremes() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&i32::MIN.to_le_bytes());
        bytes.extend_from_slice(&(i32::MAX / 2).to_le_bytes());

        let block = decode(&WaveFormat::pcm(48000, 1, 32), &bytes);
        assert_eq!(block.samples[0], -1.0);
        assert_abs_diff_eq!(block.samples[1], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn float_passthrough_and_clamp() {
        let mut bytes = Vec::new();
        for v in [0.25f32, -0.75, 1.5, f32::NAN, f32::NEG_INFINITY] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }

        let block = decode(&WaveFormat::ieee_float(48000, 1), &bytes);
        assert_eq!(block.samples, vec![0.25, -0.75, 1.0, 0.0, -1.0]);
    }

    #[test]
    fn trailing_partial_sample_is_dropped() {
        let block = decode(&WaveFormat::pcm(48000, 1, 16), &[0, 0, 0, 0, 0]);
        assert_eq!(block.sample_count(), 2);

        let block = decode(&WaveFormat::pcm(48000, 1, 24), &[0; 8]);
        assert_eq!(block.sample_count(), 2);

        let block = decode(&WaveFormat::ieee_float(48000, 1), &[0; 3]);
        assert!(block.is_empty());
    }

    #[test]
    fn unrecognized_formats_yield_empty_blocks() {
        let bytes = [0u8; 64];
        assert!(decode(&WaveFormat::pcm(48000, 2, 0), &bytes).is_empty());
        assert!(decode(&WaveFormat::pcm(48000, 2, 20), &bytes).is_empty());
        assert!(decode(&WaveFormat::extensible(48000, 2, 16, Uuid::from_u128(7)), &bytes).is_empty());

        let mulaw = WaveFormat {
            encoding: crate::models::wave_format::SampleEncoding::Unknown(0x0007),
            sample_rate: 8000,
            channels: 1,
            bits_per_sample: 8,
        };
        let block = decode(&mulaw, &bytes);
        assert!(block.is_empty());
        assert_eq!(block.sample_rate, 8000);
    }
}
