//! Stream format negotiation between `CaptureOptions` and the WASAPI mix
//! format.

use std::time::Duration;

use audioviz_core::models::config::CaptureOptions;
use audioviz_core::models::wave_format::WaveFormat;

/// `IAudioClient` durations are in 100-nanosecond units.
pub fn buffer_duration_hns(buffer_ms: u32) -> i64 {
    i64::from(buffer_ms) * 10_000
}

/// How long the capture thread sleeps between packet polls: half the
/// buffer, between 1 and 50 ms.
pub fn poll_interval(buffer_ms: u32) -> Duration {
    Duration::from_millis(u64::from((buffer_ms / 2).clamp(1, 50)))
}

/// Format to ask the audio engine for in place of its mix format.
///
/// None when no override is set. With an override the engine converts to
/// 32-bit float at the requested rate and channel count, filling in whatever
/// the options leave unset from the mix format.
pub fn requested_format(options: &CaptureOptions, mix: &WaveFormat) -> Option<WaveFormat> {
    if options.sample_rate.is_none() && options.channels.is_none() {
        return None;
    }
    Some(WaveFormat::ieee_float(
        options.sample_rate.unwrap_or(mix.sample_rate),
        options.channels.unwrap_or(mix.channels),
    ))
}

#[cfg(target_os = "windows")]
pub(crate) use native::{to_waveformatex, wave_format_from_ptr};

#[cfg(target_os = "windows")]
mod native {
    use uuid::Uuid;
    use windows::Win32::Media::Audio::{WAVEFORMATEX, WAVEFORMATEXTENSIBLE};

    use audioviz_core::models::wave_format::{
        SampleEncoding, WaveFormat, WAVE_FORMAT_EXTENSIBLE, WAVE_FORMAT_IEEE_FLOAT, WAVE_FORMAT_PCM,
    };

    /// Extra bytes a WAVEFORMATEXTENSIBLE carries after the base header.
    const EXTENSIBLE_EXTRA: u16 = 22;

    /// Read a format returned by `GetMixFormat`.
    ///
    /// # Safety
    /// `ptr` must point to a valid WAVEFORMATEX, followed by the extensible
    /// fields when its tag says so.
    pub(crate) unsafe fn wave_format_from_ptr(ptr: *const WAVEFORMATEX) -> WaveFormat {
        let header = std::ptr::read_unaligned(ptr);
        let tag = header.wFormatTag;

        let sub_format = if tag == WAVE_FORMAT_EXTENSIBLE && header.cbSize >= EXTENSIBLE_EXTRA {
            let extensible = std::ptr::read_unaligned(ptr as *const WAVEFORMATEXTENSIBLE);
            let guid = extensible.SubFormat;
            Some(Uuid::from_u128(guid.to_u128()))
        } else {
            None
        };

        WaveFormat {
            encoding: SampleEncoding::from_format_tag(tag, sub_format),
            sample_rate: header.nSamplesPerSec,
            channels: header.nChannels,
            bits_per_sample: header.wBitsPerSample,
        }
    }

    /// Plain WAVEFORMATEX for a PCM or float format we ask the engine for.
    pub(crate) fn to_waveformatex(format: &WaveFormat) -> WAVEFORMATEX {
        let tag = match format.encoding {
            SampleEncoding::IeeeFloat => WAVE_FORMAT_IEEE_FLOAT,
            _ => WAVE_FORMAT_PCM,
        };
        let block_align = format.channels * (format.bits_per_sample / 8);

        WAVEFORMATEX {
            wFormatTag: tag,
            nChannels: format.channels,
            nSamplesPerSec: format.sample_rate,
            nAvgBytesPerSec: format.sample_rate * u32::from(block_align),
            nBlockAlign: block_align,
            wBitsPerSample: format.bits_per_sample,
            cbSize: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audioviz_core::models::wave_format::SampleEncoding;

    #[test]
    fn buffer_duration_in_hns() {
        assert_eq!(buffer_duration_hns(20), 200_000);
        assert_eq!(buffer_duration_hns(100), 1_000_000);
    }

    #[test]
    fn poll_interval_is_half_buffer() {
        assert_eq!(poll_interval(20), Duration::from_millis(10));
        assert_eq!(poll_interval(1), Duration::from_millis(1));
        assert_eq!(poll_interval(500), Duration::from_millis(50));
    }

    #[test]
    fn mix_format_kept_without_overrides() {
        let mix = WaveFormat::ieee_float(48000, 2);
        assert_eq!(requested_format(&CaptureOptions::default(), &mix), None);
    }

    #[test]
    fn overrides_request_float_conversion() {
        let mix = WaveFormat::pcm(44100, 2, 16);
        let options = CaptureOptions {
            sample_rate: Some(16000),
            ..CaptureOptions::default_microphone()
        };

        let requested = requested_format(&options, &mix).unwrap();

        assert_eq!(requested.encoding, SampleEncoding::IeeeFloat);
        assert_eq!(requested.sample_rate, 16000);
        assert_eq!(requested.channels, 2);
        assert_eq!(requested.bits_per_sample, 32);
    }

    #[test]
    fn channel_override_keeps_mix_rate() {
        let mix = WaveFormat::ieee_float(48000, 6);
        let options = CaptureOptions {
            channels: Some(1),
            ..CaptureOptions::default()
        };

        let requested = requested_format(&options, &mix).unwrap();

        assert_eq!((requested.sample_rate, requested.channels), (48000, 1));
    }
}
