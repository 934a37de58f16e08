//! Conversion between interleaved buffers and the channel-major shape the
//! slicing algorithm consumes.

use crate::error::{Result, SlicerError};

use super::{AudioBuffer, ChannelLayout, Waveform};

/// Transpose an interleaved buffer into channel-major form. Mono passes through unchanged.
pub fn to_waveform(buffer: &AudioBuffer) -> Waveform {
    match buffer.layout {
        ChannelLayout::Mono => Waveform::Mono(buffer.samples.clone()),
        ChannelLayout::Multi(n) => {
            let n = n as usize;
            let mut channels: Vec<Vec<f32>> = (0..n)
                .map(|_| Vec::with_capacity(buffer.frames()))
                .collect();
            // A trailing partial frame is dropped.
            for frame in buffer.samples.chunks_exact(n) {
                for (channel, &sample) in channels.iter_mut().zip(frame) {
                    channel.push(sample);
                }
            }
            Waveform::Planar(channels)
        }
    }
}

/// Inverse of [`to_waveform`]: interleave a chunk back for encoding.
///
/// The chunk must have the same channel shape as `layout`.
pub fn from_waveform(
    waveform: Waveform,
    sample_rate: u32,
    layout: ChannelLayout,
) -> Result<AudioBuffer> {
    let samples = match (waveform, layout) {
        (Waveform::Mono(samples), ChannelLayout::Mono) => samples,
        (Waveform::Planar(channels), ChannelLayout::Multi(n)) => {
            if channels.len() != n as usize {
                return Err(SlicerError::Algorithm(format!(
                    "Chunk has {} channels, source has {}",
                    channels.len(),
                    n
                )));
            }
            let frames = channels.first().map_or(0, Vec::len);
            if channels.iter().any(|c| c.len() != frames) {
                return Err(SlicerError::Algorithm(
                    "Chunk channels have different lengths".to_string(),
                ));
            }
            let mut interleaved = Vec::with_capacity(frames * channels.len());
            for i in 0..frames {
                interleaved.extend(channels.iter().map(|c| c[i]));
            }
            interleaved
        }
        (waveform, layout) => {
            return Err(SlicerError::Algorithm(format!(
                "Chunk shape ({} channels) does not match source layout {:?}",
                waveform.channels(),
                layout
            )));
        }
    };

    Ok(AudioBuffer {
        samples,
        sample_rate,
        layout,
    })
}
