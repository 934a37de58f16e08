pub mod silence;

pub use silence::SilenceSlicer;

use crate::audio::Waveform;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Parameters handed to the slicing algorithm. Fixed for the lifetime of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceParameters {
    /// Informational only; the decoded sample rate is authoritative.
    pub sample_rate_hint: Option<u32>,
    /// Silence threshold, interpreted by the algorithm (dB for [`SilenceSlicer`]).
    pub threshold: f64,
    pub min_length: u32,
    pub min_interval: u32,
    pub hop_size: u32,
    pub max_silence_kept: u32,
}

/// Sample offsets of one slice within its source, `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceSpan {
    pub start: usize,
    pub end: usize,
}

impl SliceSpan {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Algorithm output: `chunks[i]` holds the audio for `spans[i]`.
#[derive(Debug, Clone, Default)]
pub struct SliceOutput {
    pub spans: Vec<SliceSpan>,
    pub chunks: Vec<Waveform>,
}

/// Silence-boundary detection, as an opaque collaborator of the batch pipeline.
pub trait SliceAlgorithm: Send + Sync {
    fn slice(
        &self,
        waveform: &Waveform,
        sample_rate: u32,
        params: &SliceParameters,
    ) -> Result<SliceOutput>;

    fn name(&self) -> &'static str;
}
