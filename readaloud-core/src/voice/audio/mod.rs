//! Audio output for synthesized speech

pub mod controller;
#[cfg(feature = "cpal-device")]
pub mod cpal_device;
pub mod device;

use std::time::Duration;

/// PCM layout the playback path understands. There is no negotiation:
/// synthesis is requested in this format and the device is opened with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormatSpec {
    pub sample_rate_hz: u32,
    pub channel_count: u16,
    pub bytes_per_sample: u16,
}

impl AudioFormatSpec {
    /// 16 kHz, mono, signed 16-bit little-endian
    pub const PCM_16K_MONO: AudioFormatSpec = AudioFormatSpec {
        sample_rate_hz: 16_000,
        channel_count: 1,
        bytes_per_sample: 2,
    };

    pub fn bytes_per_frame(&self) -> usize {
        self.channel_count as usize * self.bytes_per_sample as usize
    }

    /// Playback time of `byte_len` bytes in this format
    pub fn duration_of(&self, byte_len: usize) -> Duration {
        let bytes_per_second = self.bytes_per_frame() as u64 * self.sample_rate_hz as u64;
        if bytes_per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(byte_len as u64 * 1_000_000 / bytes_per_second)
    }
}

impl Default for AudioFormatSpec {
    fn default() -> Self {
        Self::PCM_16K_MONO
    }
}
