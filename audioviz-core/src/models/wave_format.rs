//! Declared encoding of raw blocks delivered by a capture backend.
//!
//! Mirrors the `WAVEFORMATEX` / `WAVEFORMATEXTENSIBLE` vocabulary: a format
//! tag, optionally refined by a sub-format GUID when the tag is
//! `WAVE_FORMAT_EXTENSIBLE`.

use std::fmt;

use uuid::Uuid;

pub const WAVE_FORMAT_PCM: u16 = 0x0001;
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// `KSDATAFORMAT_SUBTYPE_PCM`
pub const SUBTYPE_PCM: Uuid = Uuid::from_u128(0x00000001_0000_0010_8000_00aa00389b71);

/// `KSDATAFORMAT_SUBTYPE_IEEE_FLOAT`
pub const SUBTYPE_IEEE_FLOAT: Uuid = Uuid::from_u128(0x00000003_0000_0010_8000_00aa00389b71);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleEncoding {
    Pcm,
    IeeeFloat,
    Extensible { sub_format: Uuid },
    Unknown(u16),
}

impl SampleEncoding {
    /// Maps a raw WAVE format tag. `sub_format` is only consulted for
    /// `WAVE_FORMAT_EXTENSIBLE`; an extensible tag without one is unknown.
    pub fn from_format_tag(tag: u16, sub_format: Option<Uuid>) -> Self {
        match (tag, sub_format) {
            (WAVE_FORMAT_PCM, _) => Self::Pcm,
            (WAVE_FORMAT_IEEE_FLOAT, _) => Self::IeeeFloat,
            (WAVE_FORMAT_EXTENSIBLE, Some(sub_format)) => Self::Extensible { sub_format },
            (other, _) => Self::Unknown(other),
        }
    }
}

/// Concrete sample layout after resolving the encoding and bit depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// Unsigned, offset by 128.
    Int8,
    Int16,
    Int24,
    Int32,
    Float32,
}

impl SampleKind {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int24 => 3,
            Self::Int32 | Self::Float32 => 4,
        }
    }

    fn pcm(bits_per_sample: u16) -> Option<Self> {
        match bits_per_sample {
            8 => Some(Self::Int8),
            16 => Some(Self::Int16),
            24 => Some(Self::Int24),
            32 => Some(Self::Int32),
            _ => None,
        }
    }

    fn float(bits_per_sample: u16) -> Option<Self> {
        (bits_per_sample == 32).then_some(Self::Float32)
    }
}

/// Stream format reported by a backend. Samples are little-endian and
/// interleaved by channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveFormat {
    pub encoding: SampleEncoding,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl WaveFormat {
    pub fn pcm(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            encoding: SampleEncoding::Pcm,
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    pub fn ieee_float(sample_rate: u32, channels: u16) -> Self {
        Self {
            encoding: SampleEncoding::IeeeFloat,
            sample_rate,
            channels,
            bits_per_sample: 32,
        }
    }

    pub fn extensible(sample_rate: u32, channels: u16, bits_per_sample: u16, sub_format: Uuid) -> Self {
        Self {
            encoding: SampleEncoding::Extensible { sub_format },
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Resolves the per-sample layout, or `None` if this format cannot be
    /// decoded.
    pub fn sample_kind(&self) -> Option<SampleKind> {
        match self.encoding {
            SampleEncoding::Pcm => SampleKind::pcm(self.bits_per_sample),
            SampleEncoding::IeeeFloat => SampleKind::float(self.bits_per_sample),
            SampleEncoding::Extensible { sub_format } if sub_format == SUBTYPE_PCM => {
                SampleKind::pcm(self.bits_per_sample)
            }
            SampleEncoding::Extensible { sub_format } if sub_format == SUBTYPE_IEEE_FLOAT => {
                SampleKind::float(self.bits_per_sample)
            }
            SampleEncoding::Extensible { .. } | SampleEncoding::Unknown(_) => None,
        }
    }
}

impl fmt::Display for WaveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoding = match self.encoding {
            SampleEncoding::Pcm => "pcm".to_string(),
            SampleEncoding::IeeeFloat => "float".to_string(),
            SampleEncoding::Extensible { sub_format } if sub_format == SUBTYPE_PCM => "ext-pcm".to_string(),
            SampleEncoding::Extensible { sub_format } if sub_format == SUBTYPE_IEEE_FLOAT => {
                "ext-float".to_string()
            }
            SampleEncoding::Extensible { sub_format } => format!("ext-{}", sub_format),
            SampleEncoding::Unknown(tag) => format!("tag-{:#06x}", tag),
        };
        write!(
            f,
            "{}Hz {}ch {}-bit {}",
            self.sample_rate, self.channels, self.bits_per_sample, encoding
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtype_guids_match_ksmedia() {
        assert_eq!(SUBTYPE_PCM.to_string(), "00000001-0000-0010-8000-00aa00389b71");
        assert_eq!(SUBTYPE_IEEE_FLOAT.to_string(), "00000003-0000-0010-8000-00aa00389b71");
    }

    #[test]
    fn format_tags_map_to_encodings() {
        assert_eq!(SampleEncoding::from_format_tag(1, None), SampleEncoding::Pcm);
        assert_eq!(SampleEncoding::from_format_tag(3, None), SampleEncoding::IeeeFloat);
        assert_eq!(
            SampleEncoding::from_format_tag(0xFFFE, Some(SUBTYPE_IEEE_FLOAT)),
            SampleEncoding::Extensible {
                sub_format: SUBTYPE_IEEE_FLOAT
            }
        );
        assert_eq!(SampleEncoding::from_format_tag(0xFFFE, None), SampleEncoding::Unknown(0xFFFE));
        assert_eq!(SampleEncoding::from_format_tag(0x0055, None), SampleEncoding::Unknown(0x0055));
    }

    #[test]
    fn sample_kind_resolution() {
        assert_eq!(WaveFormat::pcm(48000, 2, 24).sample_kind(), Some(SampleKind::Int24));
        assert_eq!(WaveFormat::ieee_float(48000, 2).sample_kind(), Some(SampleKind::Float32));
        assert_eq!(
            WaveFormat::extensible(48000, 2, 32, SUBTYPE_IEEE_FLOAT).sample_kind(),
            Some(SampleKind::Float32)
        );
        assert_eq!(
            WaveFormat::extensible(48000, 2, 16, SUBTYPE_PCM).sample_kind(),
            Some(SampleKind::Int16)
        );
        assert_eq!(WaveFormat::pcm(48000, 2, 0).sample_kind(), None);
        assert_eq!(WaveFormat::pcm(48000, 2, 12).sample_kind(), None);
        assert_eq!(
            WaveFormat::extensible(48000, 2, 16, Uuid::from_u128(42)).sample_kind(),
            None
        );
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(WaveFormat::ieee_float(48000, 2).to_string(), "48000Hz 2ch 32-bit float");
    }
}
