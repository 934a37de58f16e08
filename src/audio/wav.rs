use std::path::Path;

use hound::{WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::config::SampleFormat;
use crate::error::{Result, SlicerError};

use super::{AudioBuffer, ChannelLayout};

/// Read/write capability for waveform files.
pub trait AudioCodec: Send + Sync {
    fn decode(&self, path: &Path) -> Result<AudioBuffer>;
    fn encode(&self, path: &Path, buffer: &AudioBuffer, format: SampleFormat) -> Result<()>;
}

/// WAV codec backed by `hound`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavCodec;

impl AudioCodec for WavCodec {
    fn decode(&self, path: &Path) -> Result<AudioBuffer> {
        if !path.exists() {
            return Err(SlicerError::InputRead(format!(
                "{}: file not found",
                path.display()
            )));
        }

        let reader = WavReader::open(path).map_err(|e| {
            SlicerError::InputRead(format!("Failed to open WAV file {}: {e}", path.display()))
        })?;

        let spec = reader.spec();
        debug!(
            "Decoding {}: {} Hz, {} channels, {} bits",
            path.display(),
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample
        );

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<_, _>>()
            }
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>(),
        }
        .map_err(|e| {
            SlicerError::InputRead(format!("Corrupt sample data in {}: {e}", path.display()))
        })?;

        Ok(AudioBuffer {
            samples,
            sample_rate: spec.sample_rate,
            layout: ChannelLayout::from_channels(spec.channels),
        })
    }

    fn encode(&self, path: &Path, buffer: &AudioBuffer, format: SampleFormat) -> Result<()> {
        let spec = WavSpec {
            channels: buffer.layout.channels(),
            sample_rate: buffer.sample_rate,
            bits_per_sample: match format {
                SampleFormat::Pcm16 => 16,
                SampleFormat::Float32 => 32,
            },
            sample_format: match format {
                SampleFormat::Pcm16 => hound::SampleFormat::Int,
                SampleFormat::Float32 => hound::SampleFormat::Float,
            },
        };

        let write_err =
            |e: hound::Error| SlicerError::OutputWrite(format!("{}: {e}", path.display()));

        let mut writer = WavWriter::create(path, spec).map_err(write_err)?;
        match format {
            SampleFormat::Pcm16 => {
                for &sample in &buffer.samples {
                    let s = (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32);
                    writer.write_sample(s as i16).map_err(write_err)?;
                }
            }
            SampleFormat::Float32 => {
                for &sample in &buffer.samples {
                    writer.write_sample(sample).map_err(write_err)?;
                }
            }
        }
        writer.finalize().map_err(write_err)?;

        Ok(())
    }
}
