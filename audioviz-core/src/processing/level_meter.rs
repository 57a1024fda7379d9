/// RMS loudness in dBFS over the first `min(buffer.len(), sample_count)`
/// samples, clamped to `[floor_db, 0]`.
///
/// Silence, an empty range, or a non-finite mean all report `floor_db`.
/// A constant full-scale signal reads 0 dB; halving the amplitude drops the
/// reading by ~6.02 dB.
pub fn decibel_level(buffer: &[f32], sample_count: usize, floor_db: f32) -> f32 {
    let length = buffer.len().min(sample_count);
    if length == 0 {
        return floor_db;
    }

    let sum_squares: f64 = buffer[..length]
        .iter()
        .map(|&s| {
            let s = s as f64;
            s * s
        })
        .sum();

    let mean = sum_squares / length as f64;
    if mean <= 0.0 || !mean.is_finite() {
        return floor_db;
    }

    let decibels = (20.0 * mean.sqrt().log10()) as f32;
    decibels.clamp(floor_db, 0.0)
}

/// Peak absolute level of samples (0.0–1.0 for normalized audio).
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const FLOOR: f32 = -120.0;

    #[test]
    fn silence_reads_floor() {
        for len in [1, 7, 1024, 4096] {
            let buffer = vec![0.0f32; len];
            assert_eq!(decibel_level(&buffer, len, FLOOR), FLOOR);
            assert_eq!(decibel_level(&buffer, len, -60.0), -60.0);
        }
    }

    #[test]
    fn empty_range_reads_floor() {
        assert_eq!(decibel_level(&[], 0, FLOOR), FLOOR);
        assert_eq!(decibel_level(&[0.5, 0.5], 0, FLOOR), FLOOR);
    }

    #[test]
    fn constant_amplitudes() {
        for (amplitude, expected) in [(1.0f32, 0.0f32), (0.5, -6.0206), (0.25, -12.0412)] {
            let buffer = vec![amplitude; 2048];
            let db = decibel_level(&buffer, buffer.len(), FLOOR);
            assert_abs_diff_eq!(db, expected, epsilon = 1e-3);
        }
    }

    #[test]
    fn full_scale_sine_reads_minus_three() {
        let buffer: Vec<f32> = (0..4800)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 48000.0).sin())
            .collect();
        let db = decibel_level(&buffer, buffer.len(), FLOOR);
        assert_abs_diff_eq!(db, -3.0103, epsilon = 1e-2);
    }

    #[test]
    fn ignores_samples_past_sample_count() {
        let mut buffer = vec![0.5f32; 512];
        buffer.extend(std::iter::repeat(1.0).take(512));

        let db = decibel_level(&buffer, 512, FLOOR);
        assert_abs_diff_eq!(db, -6.0206, epsilon = 1e-3);

        // sample_count larger than the buffer is capped at the buffer length.
        let db = decibel_level(&buffer[..512], 10_000, FLOOR);
        assert_abs_diff_eq!(db, -6.0206, epsilon = 1e-3);
    }

    #[test]
    fn clipping_is_clamped_to_zero() {
        let buffer = vec![4.0f32; 64];
        assert_eq!(decibel_level(&buffer, buffer.len(), FLOOR), 0.0);
    }

    #[test]
    fn non_finite_input_reads_floor() {
        let buffer = [0.1, f32::NAN, 0.2];
        assert_eq!(decibel_level(&buffer, buffer.len(), FLOOR), FLOOR);

        let buffer = [f32::INFINITY, 0.2];
        assert_eq!(decibel_level(&buffer, buffer.len(), FLOOR), FLOOR);
    }

    #[test]
    fn very_quiet_signal_clamps_to_floor() {
        let buffer = vec![1e-9f32; 256];
        assert_eq!(decibel_level(&buffer, buffer.len(), -90.0), -90.0);
    }

    #[test]
    fn peak_level_basic() {
        assert_abs_diff_eq!(peak_level(&[0.1, -0.5, 0.3]), 0.5, epsilon = 1e-6);
        assert_eq!(peak_level(&[]), 0.0);
    }
}
