//! Error types for the morphos library.
//!
//! Every pipeline stage returns the specific [`MorphError`] kind it detects.
//! Kinds fall into three groups that callers map to user-facing responses:
//!
//! * **Client errors**: the upload itself cannot be handled
//!   ([`MorphError::UnsupportedMimeType`], [`MorphError::UnknownFileType`],
//!   [`MorphError::UnsupportedSubType`], missing inputs).
//! * **Conversion errors**: the input was accepted but the codec could not
//!   produce output ([`MorphError::ConversionFailed`]).
//! * **Persistence errors**: the result exists but could not be saved
//!   ([`MorphError::OutputPersistenceFailed`]).
//!
//! The library never logs errors itself; the HTTP layer and the CLI decide
//! how to present them.

use crate::catalog::FileType;
use crate::pipeline::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the morphos library.
#[derive(Debug, Error)]
pub enum MorphError {
    // ── Classification / dispatch ─────────────────────────────────────────
    /// The MIME string is malformed or its type segment is not catalogued.
    #[error("Unsupported MIME type '{mime}'")]
    UnsupportedMimeType { mime: String },

    /// No converter family is registered for this file type.
    #[error("Unknown file type '{file_type}': no converters are registered for it")]
    UnknownFileType { file_type: FileType },

    /// The subtype is not registered under the given file type.
    #[error("Unsupported {file_type} format '{sub_type}'")]
    UnsupportedSubType {
        file_type: FileType,
        sub_type: String,
    },

    // ── Conversion ────────────────────────────────────────────────────────
    /// The codec rejected the input, or the target is not a legal target
    /// for the source format.
    #[error("Conversion {from} → {to} failed: {detail}")]
    ConversionFailed {
        from: String,
        to: String,
        detail: String,
    },

    /// The caller cancelled the request; the pipeline stopped before `stage`.
    #[error("Conversion cancelled before stage '{stage}'")]
    Cancelled { stage: Stage },

    // ── Input ─────────────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    // ── Output ────────────────────────────────────────────────────────────
    /// Could not create or write the converted file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputPersistenceFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config ────────────────────────────────────────────────────────────
    /// Builder or environment validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MorphError {
    /// Shorthand used by the codec adapters.
    pub(crate) fn conversion(
        from: impl Into<String>,
        to: impl Into<String>,
        detail: impl ToString,
    ) -> Self {
        MorphError::ConversionFailed {
            from: from.into(),
            to: to.into(),
            detail: detail.to_string(),
        }
    }

    /// `true` when the error is caused by the request rather than the server.
    ///
    /// Classification and dispatch failures are client errors; conversion,
    /// persistence and internal failures are not.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MorphError::UnsupportedMimeType { .. }
                | MorphError::UnknownFileType { .. }
                | MorphError::UnsupportedSubType { .. }
                | MorphError::InputNotFound { .. }
                | MorphError::DownloadFailed { .. }
                | MorphError::InvalidConfig(_)
        )
    }

    /// Stable machine-readable code, used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            MorphError::UnsupportedMimeType { .. } => "UNSUPPORTED_MIME_TYPE",
            MorphError::UnknownFileType { .. } => "UNKNOWN_FILE_TYPE",
            MorphError::UnsupportedSubType { .. } => "UNSUPPORTED_SUB_TYPE",
            MorphError::ConversionFailed { .. } => "CONVERSION_FAILED",
            MorphError::Cancelled { .. } => "CANCELLED",
            MorphError::InputNotFound { .. } => "INPUT_NOT_FOUND",
            MorphError::DownloadFailed { .. } => "DOWNLOAD_FAILED",
            MorphError::OutputPersistenceFailed { .. } => "CANT_WRITE_FILE",
            MorphError::InvalidConfig(_) => "INVALID_CONFIG",
            MorphError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
