//! Format identification: raw bytes → MIME string → `(FileType, SubType)`.
//!
//! [`sniff_mime`] looks at content only, never at file names. [`classify`]
//! then maps the MIME string onto the catalog. Both are pure functions.

use crate::catalog::{catalog, FileType};
use crate::error::MorphError;
use image::{ImageFormat, ImageReader};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;

/// MIME string of an OOXML word-processing package.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Vendor MIME strings whose subtype segment is not the catalog subtype.
const ALIASES: &[(&str, FileType, &str)] = &[
    (DOCX_MIME, FileType::Document, "docx"),
    ("text/plain", FileType::Text, "txt"),
    ("image/jpg", FileType::Image, "jpeg"),
    ("image/x-ms-bmp", FileType::Image, "bmp"),
];

// RFC 6838 restricted-name characters.
static RE_MIME_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9!#$&^_.+-]*$").unwrap());

/// Split a MIME string into its catalog identity.
///
/// Parameters (`; charset=…`) are ignored and matching is case-insensitive.
/// Fails with [`MorphError::UnsupportedMimeType`] unless the resulting
/// `(type, subtype)` pair has a catalog entry.
pub fn classify(mime: &str) -> Result<(FileType, String), MorphError> {
    let unsupported = || MorphError::UnsupportedMimeType {
        mime: mime.to_string(),
    };

    let essence = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let (file_type, sub_type) = match ALIASES.iter().find(|(m, _, _)| *m == essence) {
        Some((_, file_type, sub_type)) => (*file_type, *sub_type),
        None => {
            let (type_part, sub_part) = essence.split_once('/').ok_or_else(unsupported)?;
            if sub_part.is_empty()
                || !RE_MIME_TOKEN.is_match(type_part)
                || !RE_MIME_TOKEN.is_match(sub_part)
            {
                return Err(unsupported());
            }
            let file_type: FileType = type_part.parse().map_err(|_| unsupported())?;
            (file_type, sub_part)
        }
    };

    if !catalog().contains(file_type, sub_type) {
        return Err(unsupported());
    }
    Ok((file_type, sub_type.to_string()))
}

/// Detect the MIME type of `bytes` from their content.
///
/// Never fails: unrecognised content is `application/octet-stream`.
pub fn sniff_mime(bytes: &[u8]) -> String {
    if bytes.starts_with(b"%PDF-") {
        return "application/pdf".to_string();
    }
    if bytes.starts_with(b"PK\x03\x04") {
        return sniff_zip(bytes).to_string();
    }
    if let Some(format) = raster_format(bytes) {
        return format.to_mime_type().to_string();
    }
    if looks_like_text(bytes) {
        return "text/plain; charset=utf-8".to_string();
    }
    "application/octet-stream".to_string()
}

/// A raster format whose header actually decodes. Several image magic
/// numbers are two printable bytes (`BM`, `P1`), so a guess alone would
/// claim ordinary text.
fn raster_format(bytes: &[u8]) -> Option<ImageFormat> {
    let format = image::guess_format(bytes).ok()?;
    ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .ok()
        .map(|_| format)
}

fn sniff_zip(bytes: &[u8]) -> &'static str {
    let Ok(mut archive) = zip::ZipArchive::new(Cursor::new(bytes)) else {
        return "application/zip";
    };
    if archive.by_name("word/document.xml").is_ok() {
        DOCX_MIME
    } else {
        "application/zip"
    }
}

fn looks_like_text(bytes: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return false;
    };
    !text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t' | '\x0c'))
}
