pub mod layout;
pub mod wav;

pub use layout::{from_waveform, to_waveform};
pub use wav::{AudioCodec, WavCodec};

use std::time::Duration;

/// Channel shape of an audio buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    Multi(u16),
}

impl ChannelLayout {
    pub fn from_channels(channels: u16) -> Self {
        if channels <= 1 {
            ChannelLayout::Mono
        } else {
            ChannelLayout::Multi(channels)
        }
    }

    pub fn channels(&self) -> u16 {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Multi(n) => *n,
        }
    }
}

/// Decoded audio with interleaved samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub layout: ChannelLayout,
}

impl AudioBuffer {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            layout: ChannelLayout::Mono,
        }
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.layout.channels().max(1) as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

/// Algorithm-facing audio shape: mono stays flat, multi-channel is channel-major.
#[derive(Debug, Clone, PartialEq)]
pub enum Waveform {
    Mono(Vec<f32>),
    Planar(Vec<Vec<f32>>),
}

impl Waveform {
    pub fn frames(&self) -> usize {
        match self {
            Waveform::Mono(samples) => samples.len(),
            Waveform::Planar(channels) => channels.first().map_or(0, Vec::len),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            Waveform::Mono(_) => 1,
            Waveform::Planar(channels) => channels.len(),
        }
    }

    /// Frame range `[start, end)` of this waveform, clamped to its length.
    pub fn slice_frames(&self, start: usize, end: usize) -> Waveform {
        let end = end.min(self.frames());
        let start = start.min(end);
        match self {
            Waveform::Mono(samples) => Waveform::Mono(samples[start..end].to_vec()),
            Waveform::Planar(channels) => Waveform::Planar(
                channels.iter().map(|c| c[start..end].to_vec()).collect(),
            ),
        }
    }

    /// Per-frame mean across channels.
    pub fn mixdown(&self) -> Vec<f32> {
        match self {
            Waveform::Mono(samples) => samples.clone(),
            Waveform::Planar(channels) => {
                let count = channels.len().max(1) as f32;
                (0..self.frames())
                    .map(|i| channels.iter().map(|c| c[i]).sum::<f32>() / count)
                    .collect()
            }
        }
    }
}
