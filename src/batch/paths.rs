use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, SlicerError};

/// Derives where slices of a source file are written and what they are called.
#[derive(Debug, Clone, Default)]
pub struct OutputPathResolver {
    /// Configured output directory. `None` writes next to each source file.
    output_dir: Option<PathBuf>,
}

impl OutputPathResolver {
    /// An empty `configured` path means "same directory as the source".
    pub fn new(configured: impl AsRef<Path>) -> Self {
        let configured = configured.as_ref();
        Self {
            output_dir: (!configured.as_os_str().is_empty()).then(|| configured.to_path_buf()),
        }
    }

    /// Directory the slices of `source` go to.
    pub fn resolve_dir(&self, source: &Path) -> Result<PathBuf> {
        if let Some(dir) = &self.output_dir {
            return Ok(dir.clone());
        }

        let absolute = std::path::absolute(source).map_err(|e| {
            SlicerError::OutputWrite(format!(
                "Cannot resolve directory of {}: {e}",
                source.display()
            ))
        })?;
        Ok(absolute
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/")))
    }

    /// `{stem}_{index}.wav`, where the stem drops only the last extension.
    pub fn slice_file_name(source: &Path, index: usize) -> String {
        let stem = source.file_stem().unwrap_or_default().to_string_lossy();
        format!("{}_{}.wav", stem, index)
    }

    /// Full path of slice `index` of `source` inside `dir`.
    pub fn slice_path(dir: &Path, source: &Path, index: usize) -> PathBuf {
        dir.join(Self::slice_file_name(source, index))
    }

    /// Create `dir` and any missing parents.
    pub fn ensure_dir(dir: &Path) -> Result<()> {
        if dir.is_dir() {
            return Ok(());
        }
        debug!("Creating output directory {}", dir.display());
        std::fs::create_dir_all(dir).map_err(|e| {
            SlicerError::OutputWrite(format!(
                "Failed to create output directory {}: {e}",
                dir.display()
            ))
        })
    }
}

/// Absolute source path with separators normalized for the host platform.
///
/// Falls back to the path as given if the working directory is unavailable.
pub fn native_path(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .components()
        .collect::<PathBuf>()
        .display()
        .to_string()
}
