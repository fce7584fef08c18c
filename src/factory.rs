//! Converter dispatch: `FileType` → factory → per-subtype converter.

use crate::catalog::{catalog, FileType};
use crate::codec::docx::DocxConverter;
use crate::codec::pdf::PdfConverter;
use crate::codec::raster::ImageConverter;
use crate::codec::text::TextConverter;
use crate::codec::{CodecRuntime, FormatConverter};
use crate::error::MorphError;
use std::sync::Arc;

/// Builds converters for one file type.
///
/// Cheap to construct per request; holds the type, the uploaded file's
/// name and a handle to the shared codec runtime.
#[derive(Debug, Clone)]
pub struct ConverterFactory {
    file_type: FileType,
    original_filename: String,
    runtime: Arc<CodecRuntime>,
}

/// Select the converter family for `file_type`.
///
/// Fails with [`MorphError::UnknownFileType`] when the catalog has no
/// subtypes registered under it.
pub fn build_factory(
    file_type: FileType,
    original_filename: &str,
    runtime: Arc<CodecRuntime>,
) -> Result<ConverterFactory, MorphError> {
    if !catalog().has_file_type(file_type) {
        return Err(MorphError::UnknownFileType { file_type });
    }
    Ok(ConverterFactory {
        file_type,
        original_filename: original_filename.to_string(),
        runtime,
    })
}

impl ConverterFactory {
    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    /// Instantiate the converter for `sub_type`.
    ///
    /// Fails with [`MorphError::UnsupportedSubType`] when `sub_type` is not
    /// registered under this factory's file type.
    pub fn new_converter(&self, sub_type: &str) -> Result<Box<dyn FormatConverter>, MorphError> {
        let unsupported = || MorphError::UnsupportedSubType {
            file_type: self.file_type,
            sub_type: sub_type.to_string(),
        };

        let entry = catalog().entry(sub_type).ok_or_else(unsupported)?;
        if entry.file_type != self.file_type {
            return Err(unsupported());
        }

        let runtime = Arc::clone(&self.runtime);
        let converter: Box<dyn FormatConverter> = match self.file_type {
            FileType::Image => Box::new(ImageConverter::new(entry.sub_type, runtime)),
            FileType::Application => Box::new(PdfConverter::new(runtime)),
            FileType::Document => Box::new(DocxConverter::new(runtime)),
            FileType::Text => Box::new(TextConverter::new(runtime)),
            FileType::Audio | FileType::Video => return Err(unsupported()),
        };
        Ok(converter)
    }
}
