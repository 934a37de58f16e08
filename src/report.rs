//! Slice mapping report: which output files came from which input, and where.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{Result, SlicerError};
use crate::slicer::SliceSpan;

/// One written slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceItem {
    pub start: u64,
    pub end: u64,
    /// Output file name, without directory.
    pub file: String,
}

impl SliceItem {
    pub fn new(span: SliceSpan, file: impl Into<String>) -> Self {
        Self {
            start: span.start as u64,
            end: span.end as u64,
            file: file.into(),
        }
    }
}

/// Record of one submitted input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    pub original_file: String,
    pub slices: Vec<SliceItem>,
    /// Set when the file failed and the batch was allowed to continue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskItem {
    pub fn new(original_file: impl Into<String>, slices: Vec<SliceItem>) -> Self {
        Self {
            original_file: original_file.into(),
            slices,
            error: None,
        }
    }

    /// `slices` are the ones written before the failure.
    pub fn failed(
        original_file: impl Into<String>,
        slices: Vec<SliceItem>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            original_file: original_file.into(),
            slices,
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliceMapping {
    pub output_folder: String,
    pub tasks: Vec<TaskItem>,
}

impl SliceMapping {
    /// Build the mapping for a finished batch. Tasks keep submission order.
    pub fn build(output_folder: impl Into<String>, tasks: Vec<TaskItem>) -> Self {
        Self {
            output_folder: output_folder.into(),
            tasks,
        }
    }

    pub fn slice_count(&self) -> usize {
        self.tasks.iter().map(|t| t.slices.len()).sum()
    }
}

/// Write `mapping` as pretty JSON, replacing any file at `path`.
///
/// The JSON goes to a temporary file in the same directory which is then
/// renamed over `path`, so readers see either the old file or the full report.
pub fn write_report(path: &Path, mapping: &SliceMapping) -> Result<()> {
    let report_err =
        |e: std::io::Error| SlicerError::ReportWrite(format!("{}: {e}", path.display()));

    let json = serde_json::to_string_pretty(mapping)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(report_err)?;
    }

    let mut tmp = NamedTempFile::new_in(dir).map_err(report_err)?;
    tmp.write_all(json.as_bytes()).map_err(report_err)?;
    tmp.as_file().sync_all().map_err(report_err)?;
    tmp.persist(path).map_err(|e| report_err(e.error))?;

    info!(
        "Wrote mapping for {} files ({} slices) to {}",
        mapping.tasks.len(),
        mapping.slice_count(),
        path.display()
    );
    Ok(())
}

pub fn read_report(path: &Path) -> Result<SliceMapping> {
    if !path.exists() {
        return Err(SlicerError::FileNotFound(path.display().to_string()));
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
