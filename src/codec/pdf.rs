//! PDF reading and writing via pdfium.
//!
//! Reading: pages are rasterised with a pixel cap (not a DPI), so a poster-
//! sized page cannot exhaust memory; text is extracted page by page.
//! Writing: images become one page sized to the image, text is laid out on
//! A4 pages in Helvetica.

use super::{archive, check_target, docx, raster, text, CodecRuntime, FormatConverter};
use crate::catalog::FileType;
use crate::config::ConversionConfig;
use crate::error::MorphError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::sync::Arc;
use tracing::debug;

/// A4 in PDF points.
const A4_WIDTH: f32 = 595.0;
const A4_HEIGHT: f32 = 842.0;
/// Helvetica's average glyph advance as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;
/// Largest page edge PDF viewers are required to support.
const MAX_PAGE_EDGE: f32 = 14_400.0;

/// Rasterise every page, longest edge capped at `max_pixels`.
pub fn rasterise(
    pdfium: &Pdfium,
    bytes: &[u8],
    max_pixels: u32,
) -> Result<Vec<DynamicImage>, String> {
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| format!("cannot open PDF: {:?}", e))?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut images = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| format!("page {}: {:?}", idx + 1, e))?;
        let image = bitmap.as_image();
        debug!(
            page = idx + 1,
            width = image.width(),
            height = image.height(),
            "rendered page"
        );
        images.push(image);
    }

    if images.is_empty() {
        return Err("document has no pages".to_string());
    }
    Ok(images)
}

/// Extract the text of every page.
pub fn extract_text(pdfium: &Pdfium, bytes: &[u8]) -> Result<Vec<String>, String> {
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| format!("cannot open PDF: {:?}", e))?;

    let mut pages = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| format!("page {}: {:?}", idx + 1, e))?;
        pages.push(text.all());
    }

    if pages.is_empty() {
        return Err("document has no pages".to_string());
    }
    Ok(pages)
}

/// Wrap `img` in a single-page PDF, one point per pixel at 96 DPI.
pub fn image_to_pdf(pdfium: &Pdfium, img: &DynamicImage) -> Result<Vec<u8>, String> {
    let width = (img.width() as f32 * 0.75).clamp(1.0, MAX_PAGE_EDGE);
    let height = (img.height() as f32 * 0.75).clamp(1.0, MAX_PAGE_EDGE);

    let mut document = pdfium
        .create_new_pdf()
        .map_err(|e| format!("cannot create PDF: {:?}", e))?;
    {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::from_points(
                PdfPoints::new(width),
                PdfPoints::new(height),
            ))
            .map_err(|e| format!("cannot add page: {:?}", e))?;
        page.objects_mut()
            .create_image_object(
                PdfPoints::new(0.0),
                PdfPoints::new(0.0),
                img,
                Some(PdfPoints::new(width)),
                Some(PdfPoints::new(height)),
            )
            .map_err(|e| format!("cannot place image: {:?}", e))?;
    }

    document
        .save_to_bytes()
        .map_err(|e| format!("cannot save PDF: {:?}", e))
}

/// Lay out `paragraphs` on A4 pages.
///
/// Each paragraph is wrapped to the printable width; an empty paragraph is
/// an empty line. An empty document still yields one blank page.
pub fn text_to_pdf(
    pdfium: &Pdfium,
    paragraphs: &[String],
    config: &ConversionConfig,
) -> Result<Vec<u8>, String> {
    let font_size = config.text_font_size;
    let margin = config.page_margin;
    let leading = font_size * 1.4;
    let max_chars = (((A4_WIDTH - 2.0 * margin) / (font_size * AVG_GLYPH_WIDTH)) as usize).max(1);
    let lines_per_page = (((A4_HEIGHT - 2.0 * margin) / leading) as usize).max(1);

    let lines: Vec<String> = paragraphs
        .iter()
        .flat_map(|p| text::wrap(p, max_chars))
        .collect();

    let mut document = pdfium
        .create_new_pdf()
        .map_err(|e| format!("cannot create PDF: {:?}", e))?;
    let font = document.fonts_mut().helvetica();

    let blank_page: &[String] = &[];
    let chunks: Vec<&[String]> = if lines.is_empty() {
        vec![blank_page]
    } else {
        lines.chunks(lines_per_page).collect()
    };

    for chunk in &chunks {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .map_err(|e| format!("cannot add page: {:?}", e))?;
        for (row, line) in chunk.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let y = A4_HEIGHT - margin - font_size - row as f32 * leading;
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(margin),
                    PdfPoints::new(y),
                    line,
                    font,
                    PdfPoints::new(font_size),
                )
                .map_err(|e| format!("cannot place text: {:?}", e))?;
        }
    }
    debug!(lines = lines.len(), pages = chunks.len(), "laid out text");

    document
        .save_to_bytes()
        .map_err(|e| format!("cannot save PDF: {:?}", e))
}

/// Converter for `application/pdf`.
pub struct PdfConverter {
    runtime: Arc<CodecRuntime>,
}

impl PdfConverter {
    pub fn new(runtime: Arc<CodecRuntime>) -> Self {
        Self { runtime }
    }

    /// Every page is encoded and archived as `page-NNN.<target>`, a single
    /// page included, so the result is always a zip.
    fn to_images(&self, pdfium: &Pdfium, target: &str, source: &[u8]) -> Result<Vec<u8>, String> {
        let config = self.runtime.config();
        let pages = rasterise(pdfium, source, config.max_rendered_pixels)?;

        let encoded = pages
            .iter()
            .enumerate()
            .map(|(idx, img)| {
                raster::encode(img, target, config.jpeg_quality)
                    .map(|bytes| (format!("page-{:03}.{}", idx + 1, target), bytes))
            })
            .collect::<Result<Vec<_>, _>>()?;

        archive::zip_entries(&encoded).map_err(|e| e.to_string())
    }

    fn to_paragraphs(&self, pdfium: &Pdfium, source: &[u8]) -> Result<Vec<String>, String> {
        let pages = extract_text(pdfium, source)?;
        Ok(pages
            .iter()
            .flat_map(|page| text::paragraphs(page))
            .collect())
    }
}

impl FormatConverter for PdfConverter {
    fn sub_type(&self) -> &'static str {
        "pdf"
    }

    fn convert_to(
        &self,
        target_type_label: &str,
        target_sub_type: &str,
        source: &[u8],
    ) -> Result<Vec<u8>, MorphError> {
        let target_type = check_target("pdf", target_type_label, target_sub_type)?;
        let pdfium = self.runtime.pdfium("pdf", target_sub_type)?;

        let result = match (target_type, target_sub_type) {
            (FileType::Image, target) => self.to_images(pdfium, target, source),
            (FileType::Document, "docx") => self
                .to_paragraphs(pdfium, source)
                .and_then(|paragraphs| docx::write_docx(&paragraphs)),
            (FileType::Text, "txt") => extract_text(pdfium, source)
                .map(|pages| text::join_pages(&pages).into_bytes()),
            (_, target) => Err(format!("no codec writes '{target}' from a PDF")),
        };
        result.map_err(|e| MorphError::conversion("pdf", target_sub_type, e))
    }
}
