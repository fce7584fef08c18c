//! Converter contract and the per-type codec adapters.
//!
//! Every converter implements [`FormatConverter`]. Adapters translate catalog
//! subtypes into the codec's own vocabulary and surface codec failures as
//! [`MorphError::ConversionFailed`]; the codecs themselves are `image` for
//! raster formats, `pdfium-render` for PDF, and `zip` + `quick-xml` for OOXML.
//!
//! ```text
//! image ─┬─▶ image (re-encode)          docx ─┬─▶ pdf (text layout)
//!        └─▶ pdf   (one page per image)       └─▶ txt
//! pdf ───┬─▶ image (one per page, zipped)  txt ──┬─▶ pdf
//!        ├─▶ docx                              └─▶ docx
//!        └─▶ txt
//! ```

pub mod archive;
pub mod docx;
pub mod pdf;
pub mod raster;
pub mod text;

use crate::catalog::{catalog, FileType};
use crate::config::ConversionConfig;
use crate::error::MorphError;
use pdfium_render::prelude::Pdfium;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Capability shared by every converter instance.
///
/// Implementations hold no mutable state: two instances of the same subtype
/// converting different inputs at the same time cannot affect each other.
pub trait FormatConverter: Send + Sync {
    /// The source subtype this converter reads.
    fn sub_type(&self) -> &'static str;

    /// Convert `source` to `target_sub_type`.
    ///
    /// `target_type_label` must be the display label of the target's file
    /// type (e.g. `"Image"` for `png`). `source` is only read; the returned
    /// buffer is freshly allocated.
    fn convert_to(
        &self,
        target_type_label: &str,
        target_sub_type: &str,
        source: &[u8],
    ) -> Result<Vec<u8>, MorphError>;

    /// Legal targets of this converter, subtype → display label.
    fn supported_formats(&self) -> BTreeMap<&'static str, &'static str> {
        catalog().targets_of(self.sub_type())
    }
}

/// Validate `from → to` against the catalog and the caller's type label.
pub(crate) fn check_target(from: &str, label: &str, to: &str) -> Result<FileType, MorphError> {
    let cat = catalog();
    if !cat.can_convert(from, to) {
        return Err(MorphError::conversion(
            from,
            to,
            format!("'{to}' is not a supported target for '{from}'"),
        ));
    }
    let file_type = cat
        .file_type_of(to)
        .ok_or_else(|| MorphError::conversion(from, to, "target is not catalogued"))?;
    if file_type.label() != label {
        return Err(MorphError::conversion(
            from,
            to,
            format!(
                "target type label '{label}' does not match '{}'",
                file_type.label()
            ),
        ));
    }
    Ok(file_type)
}

/// Process-wide codec resources.
///
/// Acquired once at startup with [`CodecRuntime::startup`] and shared as an
/// `Arc` with every factory. Holds the bound pdfium library (if any) and the
/// codec tuning from [`ConversionConfig`].
pub struct CodecRuntime {
    pdfium: Option<Pdfium>,
    config: ConversionConfig,
}

impl std::fmt::Debug for CodecRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRuntime")
            .field("pdf_engine", &self.pdfium.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl CodecRuntime {
    /// Bind the pdfium library and build the runtime.
    ///
    /// Library resolution order: the library embedded with the `bundled`
    /// feature, `PDFIUM_LIB_PATH` or the pdfium-auto cache, the platform
    /// library in the working directory, the system library, and finally a
    /// one-time download into the cache. When none can be bound the runtime
    /// still starts but only raster conversions succeed.
    ///
    /// May block on network I/O; call it from `spawn_blocking` in async code.
    pub fn startup(config: ConversionConfig) -> Arc<Self> {
        let pdfium = match bind_pdfium() {
            Ok(p) => {
                info!("PDF engine bound");
                Some(p)
            }
            Err(reason) => {
                info!(%reason, "PDF engine unavailable; raster conversions only");
                None
            }
        };
        Arc::new(Self { pdfium, config })
    }

    /// Runtime without a PDF engine.
    pub fn raster_only(config: ConversionConfig) -> Arc<Self> {
        Arc::new(Self {
            pdfium: None,
            config,
        })
    }

    /// Release codec resources. Dropping the last `Arc` has the same effect;
    /// this only makes the point of release explicit at process shutdown.
    pub fn shutdown(self: Arc<Self>) {
        match Arc::try_unwrap(self) {
            Ok(runtime) => {
                debug!(pdf_engine = runtime.pdfium.is_some(), "codec runtime released");
                drop(runtime);
            }
            Err(shared) => {
                debug!(
                    refs = Arc::strong_count(&shared),
                    "codec runtime still shared; released with its last owner"
                );
            }
        }
    }

    pub fn has_pdf_engine(&self) -> bool {
        self.pdfium.is_some()
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// The bound pdfium library, or a conversion error naming the pair.
    pub(crate) fn pdfium(&self, from: &str, to: &str) -> Result<&Pdfium, MorphError> {
        self.pdfium.as_ref().ok_or_else(|| {
            MorphError::conversion(
                from,
                to,
                "PDF engine is not available (set PDFIUM_LIB_PATH or allow the first-run download)",
            )
        })
    }
}

fn bind_pdfium() -> Result<Pdfium, String> {
    #[cfg(feature = "bundled")]
    {
        match pdfium_auto::ensure_pdfium_bundled()
            .and_then(|path| pdfium_auto::bind_pdfium_from_path(&path))
        {
            Ok(p) => return Ok(p),
            Err(e) => debug!(error = %e, "bundled pdfium unusable"),
        }
    }

    if let Some(path) = pdfium_auto::cached_pdfium_path() {
        return pdfium_auto::bind_pdfium_from_path(&path).map_err(|e| e.to_string());
    }

    if let Ok(p) = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
    {
        return Ok(Pdfium::new(p));
    }

    // reqwest's blocking client must not run on an async worker thread.
    info!("fetching PDF engine into {}", pdfium_auto::pdfium_cache_dir().display());
    let path = std::thread::spawn(|| pdfium_auto::ensure_pdfium_library(None))
        .join()
        .map_err(|_| "PDF engine download panicked".to_string())?
        .map_err(|e| e.to_string())?;
    pdfium_auto::bind_pdfium_from_path(&path).map_err(|e| e.to_string())
}
