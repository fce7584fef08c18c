//! Raster images: png, jpeg, gif, webp, bmp, tiff via the `image` crate.

use super::{check_target, pdf, CodecRuntime, FormatConverter};
use crate::catalog::FileType;
use crate::error::MorphError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// Map a catalog subtype to the codec's format enum.
pub fn image_format(sub_type: &str) -> Option<ImageFormat> {
    match sub_type {
        "png" => Some(ImageFormat::Png),
        "jpeg" => Some(ImageFormat::Jpeg),
        "gif" => Some(ImageFormat::Gif),
        "webp" => Some(ImageFormat::WebP),
        "bmp" => Some(ImageFormat::Bmp),
        "tiff" => Some(ImageFormat::Tiff),
        _ => None,
    }
}

/// Decode `bytes` as `sub_type`. The declared format is trusted; content
/// that does not match it is a codec error.
pub fn decode(bytes: &[u8], sub_type: &str) -> Result<DynamicImage, String> {
    let format =
        image_format(sub_type).ok_or_else(|| format!("no raster decoder for '{sub_type}'"))?;
    image::load_from_memory_with_format(bytes, format).map_err(|e| e.to_string())
}

/// Encode `img` as `sub_type`.
///
/// JPEG has no alpha channel, so the image is flattened to RGB first; the
/// other encoders receive RGBA8, which all of them accept.
pub fn encode(img: &DynamicImage, sub_type: &str, jpeg_quality: u8) -> Result<Vec<u8>, String> {
    let format =
        image_format(sub_type).ok_or_else(|| format!("no raster encoder for '{sub_type}'"))?;
    let mut buf = Vec::new();

    if format == ImageFormat::Jpeg {
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality.clamp(1, 100));
        rgb.write_with_encoder(encoder).map_err(|e| e.to_string())?;
    } else {
        let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
        rgba.write_to(&mut Cursor::new(&mut buf), format)
            .map_err(|e| e.to_string())?;
    }

    debug!(
        sub_type,
        width = img.width(),
        height = img.height(),
        bytes = buf.len(),
        "encoded raster"
    );
    Ok(buf)
}

/// Converter for every raster subtype.
pub struct ImageConverter {
    sub_type: &'static str,
    runtime: Arc<CodecRuntime>,
}

impl ImageConverter {
    pub fn new(sub_type: &'static str, runtime: Arc<CodecRuntime>) -> Self {
        Self { sub_type, runtime }
    }
}

impl FormatConverter for ImageConverter {
    fn sub_type(&self) -> &'static str {
        self.sub_type
    }

    fn convert_to(
        &self,
        target_type_label: &str,
        target_sub_type: &str,
        source: &[u8],
    ) -> Result<Vec<u8>, MorphError> {
        let from = self.sub_type;
        let target_type = check_target(from, target_type_label, target_sub_type)?;
        let img = decode(source, from)
            .map_err(|e| MorphError::conversion(from, target_sub_type, e))?;

        match target_type {
            FileType::Image => encode(&img, target_sub_type, self.runtime.config().jpeg_quality)
                .map_err(|e| MorphError::conversion(from, target_sub_type, e)),
            FileType::Application => {
                let pdfium = self.runtime.pdfium(from, target_sub_type)?;
                pdf::image_to_pdf(pdfium, &img)
                    .map_err(|e| MorphError::conversion(from, target_sub_type, e))
            }
            other => Err(MorphError::conversion(
                from,
                target_sub_type,
                format!("no codec writes {other} from an image"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use image::{Rgba, RgbaImage};

    fn sample() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(16, 8, |x, y| {
            Rgba([(x * 16) as u8, (y * 32) as u8, 128, 255])
        }))
    }

    fn converter(sub_type: &'static str) -> ImageConverter {
        ImageConverter::new(sub_type, CodecRuntime::raster_only(ConversionConfig::default()))
    }

    #[test]
    fn encode_then_sniff_matches_every_raster_format() {
        for sub in ["png", "jpeg", "gif", "webp", "bmp", "tiff"] {
            let bytes = encode(&sample(), sub, 85).expect(sub);
            assert!(!bytes.is_empty());
            let guessed = image::guess_format(&bytes).expect(sub);
            assert_eq!(Some(guessed), image_format(sub), "{sub}");
        }
    }

    #[test]
    fn png_to_jpeg_keeps_dimensions() {
        let png = encode(&sample(), "png", 85).unwrap();
        let jpeg = converter("png").convert_to("Image", "jpeg", &png).unwrap();
        let back = decode(&jpeg, "jpeg").unwrap();
        assert_eq!((back.width(), back.height()), (16, 8));
    }

    #[test]
    fn corrupt_input_is_conversion_failure() {
        let err = converter("png")
            .convert_to("Image", "jpeg", b"definitely not a png")
            .unwrap_err();
        assert!(matches!(err, MorphError::ConversionFailed { .. }));
    }

    #[test]
    fn illegal_target_is_rejected() {
        let png = encode(&sample(), "png", 85).unwrap();
        let err = converter("png").convert_to("Image", "png", &png).unwrap_err();
        assert!(matches!(err, MorphError::ConversionFailed { .. }));
    }

    #[test]
    fn pdf_target_without_engine_fails_cleanly() {
        let png = encode(&sample(), "png", 85).unwrap();
        let err = converter("png")
            .convert_to("Application", "pdf", &png)
            .unwrap_err();
        assert!(err.to_string().contains("PDF engine"), "got: {err}");
    }

    #[test]
    fn supported_formats_come_from_catalog() {
        let formats = converter("gif").supported_formats();
        assert!(formats.contains_key("png"));
        assert!(formats.contains_key("pdf"));
        assert!(!formats.contains_key("gif"));
    }
}
