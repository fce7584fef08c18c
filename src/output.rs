//! Conversion results and their persistence.

use crate::catalog::FileType;
use crate::error::MorphError;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of one pipeline run.
///
/// `bytes` is skipped when serialised; the JSON form is a summary for
/// `--json` output and logs.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Type detected from the produced bytes.
    pub file_type: FileType,
    /// Derived output filename (base name only).
    pub file_name: String,
    pub source_file_type: FileType,
    pub source_sub_type: String,
    pub target_sub_type: String,
    pub duration_ms: u64,
}

impl ConversionOutput {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Directory converted files are written to.
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `output` under its derived name and return the final path.
    ///
    /// The write is atomic: bytes go to a temp file in the same directory
    /// which is then renamed over the target, so readers never see a
    /// partial file. An existing file with the same name is replaced.
    pub fn save(&self, output: &ConversionOutput) -> Result<PathBuf, MorphError> {
        self.save_as(&output.file_name, &output.bytes)
    }

    pub fn save_as(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, MorphError> {
        let path = self.dir.join(file_name);
        let failed = |source: std::io::Error| MorphError::OutputPersistenceFailed {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(failed)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(failed)?;
        tmp.write_all(bytes).map_err(failed)?;
        tmp.as_file().sync_all().map_err(failed)?;
        tmp.persist(&path).map_err(|e| failed(e.error))?;

        debug!(path = %path.display(), bytes = bytes.len(), "saved output");
        Ok(path)
    }
}
