use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the audio graph a source listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// The mix being rendered to an output device.
    #[default]
    Loopback,
    Microphone,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loopback => f.write_str("loopback"),
            Self::Microphone => f.write_str("microphone"),
        }
    }
}

/// An endpoint a capture backend can open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDeviceInfo {
    pub id: String,
    pub display_name: String,
    pub mode: CaptureMode,
    pub is_default: bool,
}

impl fmt::Display for AudioDeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// A block of samples rescaled to `[-1.0, 1.0]`, interleaved by channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedBlock {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl NormalizedBlock {
    pub fn empty(sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
            channels,
        }
    }

    /// Total number of samples across all channels.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Wall-clock length of the block; zero when the format is degenerate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let per_second = self.sample_rate as f64 * self.channels as f64;
        Duration::from_secs_f64(self.samples.len() as f64 / per_second)
    }
}

/// Counters for debugging a capture source.
#[derive(Debug, Clone, Default)]
pub struct SourceDiagnostics {
    pub blocks_received: u64,
    pub blocks_dropped: u64,
    pub frames_published: u64,
    pub samples_total: u64,
    pub faults: u64,
    pub last_format: String,
    pub started_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_duration() {
        let block = NormalizedBlock {
            samples: vec![0.0; 960],
            sample_rate: 48000,
            channels: 2,
        };
        assert_eq!(block.frame_count(), 480);
        assert_eq!(block.duration(), Duration::from_millis(10));
    }

    #[test]
    fn degenerate_block_has_zero_duration() {
        let block = NormalizedBlock {
            samples: vec![0.0; 16],
            sample_rate: 0,
            channels: 1,
        };
        assert_eq!(block.duration(), Duration::ZERO);
        assert_eq!(NormalizedBlock::empty(48000, 0).duration(), Duration::ZERO);
    }

    #[test]
    fn capture_mode_serializes_lowercase() {
        let json = serde_json::to_string(&CaptureMode::Microphone).unwrap();
        assert_eq!(json, "\"microphone\"");
    }
}
