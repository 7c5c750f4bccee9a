//! Sample discovery
//!
//! A samples directory holds one signal per `*.json` file and zipped
//! batches as `*.zip`. Only the top level is scanned.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors from scanning a samples directory
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("Samples directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("No *.json or *.zip samples in {}", .0.display())]
    Empty(PathBuf),

    #[error("Failed to read samples directory: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// A single signal document
    Json,
    /// A zipped batch, forwarded as-is
    Archive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub path: PathBuf,
    pub kind: SampleKind,
}

impl Sample {
    fn classify(path: PathBuf) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        let kind = match extension.as_str() {
            "json" => SampleKind::Json,
            "zip" => SampleKind::Archive,
            _ => return None,
        };
        Some(Self { path, kind })
    }

    /// File name for reports
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// List the samples in `dir`, sorted by path
pub fn discover_samples(dir: &Path) -> Result<Vec<Sample>, SampleError> {
    if !dir.is_dir() {
        return Err(SampleError::NotFound(dir.to_path_buf()));
    }

    let mut samples = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(sample) = Sample::classify(path) {
            samples.push(sample);
        }
    }

    if samples.is_empty() {
        return Err(SampleError::Empty(dir.to_path_buf()));
    }

    samples.sort_by(|a, b| a.path.cmp(&b.path));
    debug!("Found {} sample(s) in {}", samples.len(), dir.display());
    Ok(samples)
}
