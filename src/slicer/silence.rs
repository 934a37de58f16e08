use tracing::debug;

use crate::audio::Waveform;
use crate::error::{Result, SlicerError};

use super::{SliceAlgorithm, SliceOutput, SliceParameters, SliceSpan};

/// RMS-gated silence slicer.
///
/// Millisecond parameters are converted to RMS frames at the source sample
/// rate. Long silences are cut at their quietest frame, keeping at most
/// `max_silence_kept` of silence on either side of a slice.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilenceSlicer;

/// Parameters converted to RMS frame units.
#[derive(Debug, Clone, PartialEq)]
struct FrameSettings {
    threshold: f32,
    hop_size: usize,
    win_size: usize,
    min_length: usize,
    min_interval: usize,
    max_sil_kept: usize,
}

impl FrameSettings {
    fn new(sample_rate: u32, params: &SliceParameters) -> Result<Self> {
        if !(params.min_length >= params.min_interval && params.min_interval >= params.hop_size)
        {
            return Err(SlicerError::Algorithm(
                "The following condition must be satisfied: min_length >= min_interval >= hop_size"
                    .to_string(),
            ));
        }
        if params.max_silence_kept < params.hop_size {
            return Err(SlicerError::Algorithm(
                "The following condition must be satisfied: max_silence_kept >= hop_size"
                    .to_string(),
            ));
        }

        let sr = sample_rate as f64;
        let hop_size = (sr * params.hop_size as f64 / 1000.0).round() as usize;
        if hop_size == 0 {
            return Err(SlicerError::Algorithm(format!(
                "Hop size of {} ms is less than one sample at {} Hz",
                params.hop_size, sample_rate
            )));
        }

        let min_interval_samples = sr * params.min_interval as f64 / 1000.0;
        let hop = hop_size as f64;

        Ok(Self {
            threshold: 10f64.powf(params.threshold / 20.0) as f32,
            hop_size,
            win_size: (min_interval_samples.round() as usize).min(4 * hop_size).max(1),
            min_length: (sr * params.min_length as f64 / 1000.0 / hop).round() as usize,
            min_interval: (min_interval_samples / hop).round() as usize,
            max_sil_kept: (sr * params.max_silence_kept as f64 / 1000.0 / hop).round() as usize,
        })
    }
}

impl SliceAlgorithm for SilenceSlicer {
    fn slice(
        &self,
        waveform: &Waveform,
        sample_rate: u32,
        params: &SliceParameters,
    ) -> Result<SliceOutput> {
        let settings = FrameSettings::new(sample_rate, params)?;
        let total_samples = waveform.frames();

        if total_samples.div_ceil(settings.hop_size) <= settings.min_length {
            return Ok(whole(waveform));
        }

        let rms = rms_envelope(&waveform.mixdown(), settings.win_size, settings.hop_size);
        let tags = silence_tags(&rms, &settings);
        debug!(
            "{} RMS frames, {} silence cuts",
            rms.len(),
            tags.len()
        );

        if tags.is_empty() {
            return Ok(whole(waveform));
        }

        let mut frame_ranges = Vec::with_capacity(tags.len() + 1);
        if tags[0].0 > 0 {
            frame_ranges.push((0, tags[0].0));
        }
        for pair in tags.windows(2) {
            frame_ranges.push((pair[0].1, pair[1].0));
        }
        let last = tags[tags.len() - 1];
        if last.1 < rms.len() {
            frame_ranges.push((last.1, rms.len()));
        }

        let mut output = SliceOutput::default();
        for (begin, end) in frame_ranges {
            let end = (end * settings.hop_size).min(total_samples);
            let start = (begin * settings.hop_size).min(end);
            output.spans.push(SliceSpan { start, end });
            output.chunks.push(waveform.slice_frames(start, end));
        }

        Ok(output)
    }

    fn name(&self) -> &'static str {
        "silence"
    }
}

fn whole(waveform: &Waveform) -> SliceOutput {
    SliceOutput {
        spans: vec![SliceSpan {
            start: 0,
            end: waveform.frames(),
        }],
        chunks: vec![waveform.clone()],
    }
}

/// Centred RMS envelope: the signal is zero-padded by half a window on each side.
fn rms_envelope(samples: &[f32], win_size: usize, hop_size: usize) -> Vec<f32> {
    let pad = win_size / 2;
    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    if padded.len() < win_size {
        return Vec::new();
    }

    let frames = (padded.len() - win_size) / hop_size + 1;
    (0..frames)
        .map(|i| {
            let window = &padded[i * hop_size..i * hop_size + win_size];
            let power: f64 = window.iter().map(|&s| (s as f64) * (s as f64)).sum();
            (power / win_size as f64).sqrt() as f32
        })
        .collect()
}

/// Index of the quietest frame in `rms[start..end]`, clamped to the envelope.
fn quietest(rms: &[f32], start: usize, end: usize) -> usize {
    let end = end.min(rms.len());
    let mut best = start;
    for i in start..end {
        if rms[i] < rms[best] {
            best = i;
        }
    }
    best
}

/// Frame ranges of silence to cut out, in order.
fn silence_tags(rms: &[f32], s: &FrameSettings) -> Vec<(usize, usize)> {
    let mut tags = Vec::new();
    let mut silence_start: Option<usize> = None;
    let mut clip_start = 0;

    for (i, &value) in rms.iter().enumerate() {
        if value < s.threshold {
            if silence_start.is_none() {
                silence_start = Some(i);
            }
            continue;
        }
        let Some(start) = silence_start else {
            continue;
        };

        let is_leading_silence = start == 0 && i > s.max_sil_kept;
        let need_slice_middle =
            i - start >= s.min_interval && i.saturating_sub(clip_start) >= s.min_length;
        if !is_leading_silence && !need_slice_middle {
            silence_start = None;
            continue;
        }

        if i - start <= s.max_sil_kept {
            let pos = quietest(rms, start, i + 1);
            if start == 0 {
                tags.push((0, pos));
            } else {
                tags.push((pos, pos));
            }
            clip_start = pos;
        } else if i - start <= s.max_sil_kept * 2 {
            let pos = quietest(rms, i - s.max_sil_kept, start + s.max_sil_kept + 1);
            let pos_l = quietest(rms, start, start + s.max_sil_kept + 1);
            let pos_r = quietest(rms, i - s.max_sil_kept, i + 1);
            if start == 0 {
                tags.push((0, pos_r));
                clip_start = pos_r;
            } else {
                tags.push((pos_l.min(pos), pos_r.max(pos)));
                clip_start = pos_r.max(pos);
            }
        } else {
            let pos_l = quietest(rms, start, start + s.max_sil_kept + 1);
            let pos_r = quietest(rms, i - s.max_sil_kept, i + 1);
            if start == 0 {
                tags.push((0, pos_r));
            } else {
                tags.push((pos_l, pos_r));
            }
            clip_start = pos_r;
        }
        silence_start = None;
    }

    // Trailing silence
    let total = rms.len();
    if let Some(start) = silence_start {
        if total - start >= s.min_interval {
            let silence_end = total.min(start + s.max_sil_kept);
            let pos = quietest(rms, start, silence_end + 1);
            tags.push((pos, total + 1));
        }
    }

    tags
}
