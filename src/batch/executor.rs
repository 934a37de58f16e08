use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::audio::{from_waveform, to_waveform, AudioCodec};
use crate::config::SampleFormat;
use crate::error::{Result, SlicerError};
use crate::report::{SliceItem, TaskItem};
use crate::slicer::{SliceAlgorithm, SliceOutput, SliceParameters};

use super::panic_message;
use super::paths::{native_path, OutputPathResolver};

/// Result of slicing one input file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub task: TaskItem,
    /// Counted even when slices are not recorded on the task.
    pub chunks_written: usize,
}

/// A file that failed partway. Chunks written before the failure stay on disk.
#[derive(Debug)]
pub struct FileFailure {
    pub error: SlicerError,
    /// Slices written before the failure, if slices are being recorded.
    pub slices: Vec<SliceItem>,
    pub chunks_written: usize,
}

/// Runs decode, slice and encode for a single file.
pub struct TaskExecutor {
    codec: Arc<dyn AudioCodec>,
    algorithm: Arc<dyn SliceAlgorithm>,
    params: SliceParameters,
    paths: OutputPathResolver,
    sample_format: SampleFormat,
    record_slices: bool,
}

impl TaskExecutor {
    pub fn new(
        codec: Arc<dyn AudioCodec>,
        algorithm: Arc<dyn SliceAlgorithm>,
        params: SliceParameters,
        paths: OutputPathResolver,
    ) -> Self {
        Self {
            codec,
            algorithm,
            params,
            paths,
            sample_format: SampleFormat::default(),
            record_slices: false,
        }
    }

    pub fn with_sample_format(mut self, format: SampleFormat) -> Self {
        self.sample_format = format;
        self
    }

    /// Record a [`SliceItem`] per written chunk. Only needed when a report is requested.
    pub fn with_slice_records(mut self, record: bool) -> Self {
        self.record_slices = record;
        self
    }

    /// Slice `path` and write every chunk.
    ///
    /// A panic in the codec or the algorithm is reported as
    /// [`SlicerError::Worker`] like any other per-file failure.
    pub fn process(&self, path: &Path) -> std::result::Result<FileOutcome, FileFailure> {
        let mut slices = Vec::new();
        let mut chunks_written = 0;

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.slice_file(path, &mut slices, &mut chunks_written)
        }));
        let error = match result {
            Ok(Ok(())) => {
                return Ok(FileOutcome {
                    task: TaskItem::new(native_path(path), slices),
                    chunks_written,
                })
            }
            Ok(Err(e)) => e,
            Err(payload) => SlicerError::Worker(format!(
                "Slicing {} panicked: {}",
                path.display(),
                panic_message(payload.as_ref())
            )),
        };

        Err(FileFailure {
            error,
            slices,
            chunks_written,
        })
    }

    fn slice_file(
        &self,
        path: &Path,
        slices: &mut Vec<SliceItem>,
        chunks_written: &mut usize,
    ) -> Result<()> {
        let started = Instant::now();
        info!("Slicing {}", path.display());

        let buffer = self.codec.decode(path)?;
        let sample_rate = buffer.sample_rate;
        let layout = buffer.layout;
        debug!(
            "Decoded {:.2}s of audio, {} Hz, {:?}",
            buffer.duration().as_secs_f64(),
            sample_rate,
            layout
        );
        if let Some(hint) = self.params.sample_rate_hint {
            if hint != sample_rate {
                debug!("Sample rate hint {} Hz differs from file ({} Hz)", hint, sample_rate);
            }
        }

        let waveform = to_waveform(&buffer);
        drop(buffer);

        let output = self.algorithm.slice(&waveform, sample_rate, &self.params)?;
        check_output(&output)?;

        let out_dir = self.paths.resolve_dir(path)?;
        OutputPathResolver::ensure_dir(&out_dir)?;

        for (index, (span, chunk)) in output.spans.into_iter().zip(output.chunks).enumerate() {
            let out_path = OutputPathResolver::slice_path(&out_dir, path, index);

            let chunk = from_waveform(chunk, sample_rate, layout)?;
            self.codec.encode(&out_path, &chunk, self.sample_format)?;
            *chunks_written += 1;
            debug!(
                "Wrote {} (samples {}..{})",
                out_path.display(),
                span.start,
                span.end
            );

            if self.record_slices {
                slices.push(SliceItem::new(
                    span,
                    OutputPathResolver::slice_file_name(path, index),
                ));
            }
        }

        info!(
            "{}: {} slices in {:.2}s",
            path.display(),
            chunks_written,
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

fn check_output(output: &SliceOutput) -> Result<()> {
    if output.spans.len() != output.chunks.len() {
        return Err(SlicerError::Algorithm(format!(
            "Algorithm returned {} spans but {} chunks",
            output.spans.len(),
            output.chunks.len()
        )));
    }
    if let Some(span) = output.spans.iter().find(|s| s.start > s.end) {
        return Err(SlicerError::Algorithm(format!(
            "Invalid span {}..{}",
            span.start, span.end
        )));
    }
    Ok(())
}
