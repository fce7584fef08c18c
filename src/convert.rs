//! Library entry points.
//!
//! Each function wraps one [`ConversionPipeline`] run: resolve the input,
//! sniff its MIME type, convert on the blocking pool, and optionally
//! persist. The codec runtime is passed in so a process binds pdfium once
//! and shares it across every call.

use crate::catalog::{catalog, FileType};
use crate::classify::{classify, sniff_mime};
use crate::codec::CodecRuntime;
use crate::error::MorphError;
use crate::factory::build_factory;
use crate::output::{ConversionOutput, OutputStore};
use crate::pipeline::{input, CancelFlag, ConversionPipeline, ConversionRequest};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Convert a local file or HTTP(S) URL to `target_sub_type`.
///
/// # Example
/// ```rust,no_run
/// use morphos::{convert, CodecRuntime, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let runtime = CodecRuntime::startup(ConversionConfig::default());
/// let output = convert("photo.jpg", "png", &runtime).await?;
/// std::fs::write(&output.file_name, &output.bytes)?;
/// runtime.shutdown();
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    input_str: impl AsRef<str>,
    target_sub_type: &str,
    runtime: &Arc<CodecRuntime>,
) -> Result<ConversionOutput, MorphError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {} → {}", input_str, target_sub_type);

    let resolved =
        input::resolve_input(input_str, runtime.config().download_timeout_secs).await?;
    convert_bytes(resolved.bytes, &resolved.filename, target_sub_type, runtime).await
}

/// Convert bytes already in memory. `filename` only drives output naming.
pub async fn convert_bytes(
    bytes: Vec<u8>,
    filename: &str,
    target_sub_type: &str,
    runtime: &Arc<CodecRuntime>,
) -> Result<ConversionOutput, MorphError> {
    convert_bytes_cancellable(bytes, filename, target_sub_type, runtime, None).await
}

/// [`convert_bytes`] with a cancellation signal checked between stages.
pub async fn convert_bytes_cancellable(
    bytes: Vec<u8>,
    filename: &str,
    target_sub_type: &str,
    runtime: &Arc<CodecRuntime>,
    cancel: Option<CancelFlag>,
) -> Result<ConversionOutput, MorphError> {
    let request = ConversionRequest::sniffed(bytes, filename, target_sub_type);
    let pipeline = ConversionPipeline::new(Arc::clone(runtime));
    let output = pipeline.run_blocking(request, cancel).await?;

    info!(
        "Conversion complete: {} ({} bytes, {}ms)",
        output.file_name,
        output.len(),
        output.duration_ms
    );
    Ok(output)
}

/// Convert and write the result into `dir` under its derived name.
///
/// Returns the output summary and the written path.
pub async fn convert_to_dir(
    input_str: impl AsRef<str>,
    target_sub_type: &str,
    dir: impl AsRef<Path>,
    runtime: &Arc<CodecRuntime>,
) -> Result<(ConversionOutput, PathBuf), MorphError> {
    let output = convert(input_str, target_sub_type, runtime).await?;
    let store = OutputStore::new(dir.as_ref());
    tokio::task::spawn_blocking(move || store.save(&output).map(|path| (output, path)))
        .await
        .map_err(|e| MorphError::Internal(format!("write task panicked: {e}")))?
}

/// Detected identity of an input and the targets it can be converted to.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub filename: String,
    pub mime: String,
    pub file_type: FileType,
    pub sub_type: String,
    /// Target subtype → display label.
    pub supported_formats: BTreeMap<&'static str, &'static str>,
}

/// Identify `input_str` without converting it.
///
/// Fails with the same classification and dispatch errors as a conversion
/// would; needs no PDF engine.
pub async fn inspect(
    input_str: impl AsRef<str>,
    runtime: &Arc<CodecRuntime>,
) -> Result<Inspection, MorphError> {
    let resolved =
        input::resolve_input(input_str.as_ref(), runtime.config().download_timeout_secs).await?;
    inspect_bytes(&resolved.bytes, &resolved.filename, runtime)
}

/// [`inspect`] for bytes already in memory.
pub fn inspect_bytes(
    bytes: &[u8],
    filename: &str,
    runtime: &Arc<CodecRuntime>,
) -> Result<Inspection, MorphError> {
    let mime = sniff_mime(bytes);
    let (file_type, sub_type) = classify(&mime)?;
    let converter =
        build_factory(file_type, filename, Arc::clone(runtime))?.new_converter(&sub_type)?;

    Ok(Inspection {
        filename: filename.to_string(),
        mime,
        file_type,
        sub_type,
        supported_formats: converter.supported_formats(),
    })
}

/// Every catalogued subtype grouped by file type, with its targets.
pub fn catalog_summary() -> BTreeMap<FileType, BTreeMap<&'static str, Vec<&'static str>>> {
    let cat = catalog();
    cat.file_types()
        .map(|file_type| {
            let subs = cat
                .sub_types(file_type)
                .into_keys()
                .map(|sub| (sub, cat.targets_of(sub).into_keys().collect()))
                .collect();
            (file_type, subs)
        })
        .collect()
}
