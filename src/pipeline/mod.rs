//! The per-request conversion pipeline.
//!
//! ## Data Flow
//!
//! ```text
//! Received ──▶ Classified ──▶ FactoryBuilt ──▶ ConverterBuilt ──▶ Converted ──▶ Named
//!  (bytes)      (MIME →        (FileType →      (SubType →         (codec)       (output
//!               type/sub)      factory)         converter)                       filename)
//! ```
//!
//! Each stage either advances or fails with the [`MorphError`] kind it
//! detects; there is no retry and no partial result. A [`CancelFlag`] is
//! checked at every stage boundary, never inside a codec call.
//!
//! Results of an `application` source are always delivered as a zip archive,
//! matching their forced `.zip` name: page images arrive already archived,
//! any other output is wrapped as a single entry named for the target.
//!
//! Supporting stages outside the per-request flow:
//!
//! 1. [`input`]: read a local path or download a URL into memory
//! 2. [`naming`]: derive the output filename

pub mod input;
pub mod naming;

use crate::catalog::{catalog, FileType};
use crate::classify::{classify, sniff_mime};
use crate::codec::{archive, CodecRuntime};
use crate::error::MorphError;
use crate::factory::build_factory;
use crate::output::ConversionOutput;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Pipeline states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Classified,
    FactoryBuilt,
    ConverterBuilt,
    Converted,
    Named,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Classified => "classified",
            Stage::FactoryBuilt => "factory_built",
            Stage::ConverterBuilt => "converter_built",
            Stage::Converted => "converted",
            Stage::Named => "named",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-owned cancellation signal. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One conversion request. Immutable once built.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub detected_mime: String,
    pub source: Vec<u8>,
    pub original_filename: String,
    pub target_sub_type: String,
}

impl ConversionRequest {
    pub fn new(
        detected_mime: impl Into<String>,
        source: Vec<u8>,
        original_filename: impl Into<String>,
        target_sub_type: impl Into<String>,
    ) -> Self {
        Self {
            detected_mime: detected_mime.into(),
            source,
            original_filename: original_filename.into(),
            target_sub_type: target_sub_type.into(),
        }
    }

    /// Build a request whose MIME type is detected from `source`.
    pub fn sniffed(
        source: Vec<u8>,
        original_filename: impl Into<String>,
        target_sub_type: impl Into<String>,
    ) -> Self {
        let mime = sniff_mime(&source);
        Self::new(mime, source, original_filename, target_sub_type)
    }
}

/// Runs requests against a shared [`CodecRuntime`].
#[derive(Debug, Clone)]
pub struct ConversionPipeline {
    runtime: Arc<CodecRuntime>,
}

impl ConversionPipeline {
    pub fn new(runtime: Arc<CodecRuntime>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Arc<CodecRuntime> {
        &self.runtime
    }

    /// Run `request` to completion on the current thread.
    ///
    /// The target is checked against the converter's supported formats
    /// before the codec runs. The output file type comes from sniffing the
    /// produced bytes, falling back to the catalog type of the target;
    /// archived results are `application`.
    pub fn run(
        &self,
        request: &ConversionRequest,
        cancel: Option<&CancelFlag>,
    ) -> Result<ConversionOutput, MorphError> {
        let start = Instant::now();
        let target = request.target_sub_type.as_str();
        debug!(
            stage = %Stage::Received,
            mime = %request.detected_mime,
            filename = %request.original_filename,
            bytes = request.source.len(),
            to = target,
            "pipeline"
        );

        checkpoint(cancel, Stage::Classified)?;
        let (file_type, sub_type) = classify(&request.detected_mime)?;
        debug!(stage = %Stage::Classified, %file_type, %sub_type, "pipeline");

        checkpoint(cancel, Stage::FactoryBuilt)?;
        let factory = build_factory(
            file_type,
            &request.original_filename,
            Arc::clone(&self.runtime),
        )?;
        debug!(stage = %Stage::FactoryBuilt, %file_type, "pipeline");

        checkpoint(cancel, Stage::ConverterBuilt)?;
        let converter = factory.new_converter(&sub_type)?;
        debug!(stage = %Stage::ConverterBuilt, %sub_type, "pipeline");

        if !converter.supported_formats().contains_key(target) {
            return Err(MorphError::conversion(
                &sub_type,
                target,
                format!("'{target}' is not a supported target for '{sub_type}'"),
            ));
        }
        let target_type = catalog()
            .file_type_of(target)
            .ok_or_else(|| MorphError::Internal(format!("target '{target}' is not catalogued")))?;

        checkpoint(cancel, Stage::Converted)?;
        let bytes = converter.convert_to(target_type.label(), target, &request.source)?;
        debug!(stage = %Stage::Converted, bytes = bytes.len(), "pipeline");

        checkpoint(cancel, Stage::Named)?;
        let name_sub_type = naming::output_sub_type(file_type, target);
        let file_name = naming::derive_output_name(&request.original_filename, name_sub_type);
        let (bytes, output_type) = if name_sub_type == target {
            let output_type = classify(&sniff_mime(&bytes))
                .map(|(t, _)| t)
                .unwrap_or(target_type);
            (bytes, output_type)
        } else {
            let entry = naming::derive_output_name(&request.original_filename, target);
            let archived = into_archive(entry, bytes)
                .map_err(|e| MorphError::conversion(&sub_type, target, e))?;
            (archived, FileType::Application)
        };
        debug!(stage = %Stage::Named, %file_name, file_type = %output_type, "pipeline");

        Ok(ConversionOutput {
            bytes,
            file_type: output_type,
            file_name,
            source_file_type: file_type,
            source_sub_type: sub_type,
            target_sub_type: target.to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Run `request` on the blocking thread pool.
    ///
    /// Codec calls are CPU-bound and pdfium is synchronous, so they must not
    /// run on an async worker thread.
    pub async fn run_blocking(
        &self,
        request: ConversionRequest,
        cancel: Option<CancelFlag>,
    ) -> Result<ConversionOutput, MorphError> {
        self.run_blocking_holding(request, cancel, ()).await
    }

    /// [`run_blocking`](Self::run_blocking), keeping `guard` alive until the
    /// blocking task returns.
    ///
    /// The guard moves into the task, so it outlives the conversion even
    /// when the awaiting future is dropped first. Pass a semaphore permit to
    /// bound conversions that are actually running.
    pub async fn run_blocking_holding<G>(
        &self,
        request: ConversionRequest,
        cancel: Option<CancelFlag>,
        guard: G,
    ) -> Result<ConversionOutput, MorphError>
    where
        G: Send + 'static,
    {
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            pipeline.run(&request, cancel.as_ref())
        })
        .await
        .map_err(|e| MorphError::Internal(format!("conversion task panicked: {e}")))?
    }
}

/// `bytes` unchanged when they already are a zip archive, else a one-entry
/// archive holding them as `entry`.
fn into_archive(entry: String, bytes: Vec<u8>) -> Result<Vec<u8>, String> {
    if sniff_mime(&bytes) == "application/zip" {
        return Ok(bytes);
    }
    archive::zip_entries(&[(entry, bytes)]).map_err(|e| e.to_string())
}

fn checkpoint(cancel: Option<&CancelFlag>, next: Stage) -> Result<(), MorphError> {
    match cancel {
        Some(flag) if flag.is_cancelled() => Err(MorphError::Cancelled { stage: next }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FileType;
    use crate::codec::raster;
    use crate::config::ConversionConfig;
    use image::{DynamicImage, Rgb, RgbImage};

    fn pipeline() -> ConversionPipeline {
        ConversionPipeline::new(CodecRuntime::raster_only(ConversionConfig::default()))
    }

    fn jpeg() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 9, Rgb([200, 40, 40])));
        raster::encode(&img, "jpeg", 90).unwrap()
    }

    #[test]
    fn jpeg_to_png_is_named_and_typed() {
        let req = ConversionRequest::new("image/jpeg", jpeg(), "photo.jpg", "png");
        let out = pipeline().run(&req, None).unwrap();
        assert_eq!(out.file_name, "photo.png");
        assert_eq!(out.file_type, FileType::Image);
        assert_eq!(sniff_mime(&out.bytes), "image/png");
        assert_eq!(out.source_sub_type, "jpeg");
    }

    #[test]
    fn unknown_mime_fails_at_classification() {
        let req = ConversionRequest::new("application/x-unknown-thing", vec![1, 2, 3], "x.bin", "png");
        let err = pipeline().run(&req, None).unwrap_err();
        assert!(matches!(err, MorphError::UnsupportedMimeType { .. }));
    }

    #[test]
    fn uncatalogued_sub_type_fails_at_classification() {
        let req = ConversionRequest::new("image/x-icon", vec![0, 0, 1, 0], "fav.ico", "png");
        let err = pipeline().run(&req, None).unwrap_err();
        assert!(matches!(err, MorphError::UnsupportedMimeType { .. }));
    }

    #[test]
    fn sniffed_binary_garbage_is_unsupported_mime() {
        let req = ConversionRequest::sniffed(vec![0, 159, 146, 150], "blob.bin", "png");
        assert_eq!(req.detected_mime, "application/octet-stream");
        match pipeline().run(&req, None).unwrap_err() {
            MorphError::UnsupportedMimeType { mime } => assert_eq!(mime, "application/octet-stream"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn non_archive_bytes_are_wrapped_in_one_entry() {
        let zipped = into_archive("deck.txt".to_string(), b"page text\n".to_vec()).unwrap();
        assert_eq!(sniff_mime(&zipped), "application/zip");
        let mut zip = zip::ZipArchive::new(std::io::Cursor::new(zipped)).unwrap();
        assert_eq!(zip.len(), 1);
        assert_eq!(zip.by_index(0).unwrap().name(), "deck.txt");
    }

    #[test]
    fn archive_bytes_are_kept_as_is() {
        let pages = vec![("page-001.png".to_string(), b"x".to_vec())];
        let zipped = archive::zip_entries(&pages).unwrap();
        assert_eq!(into_archive("deck.png".to_string(), zipped.clone()).unwrap(), zipped);
    }

    #[test]
    fn illegal_target_is_rejected_before_codec() {
        // The source is not a decodable image: reaching the codec would
        // yield a decode error mentioning the payload instead.
        let req = ConversionRequest::new("image/png", b"not an image".to_vec(), "a.png", "mp3");
        match pipeline().run(&req, None).unwrap_err() {
            MorphError::ConversionFailed { detail, .. } => {
                assert!(detail.contains("not a supported target"), "got: {detail}")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn cancelled_flag_stops_at_first_boundary() {
        let flag = CancelFlag::new();
        flag.cancel();
        let req = ConversionRequest::new("image/jpeg", jpeg(), "photo.jpg", "png");
        match pipeline().run(&req, Some(&flag)).unwrap_err() {
            MorphError::Cancelled { stage } => assert_eq!(stage, Stage::Classified),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn sniffed_request_detects_mime() {
        let req = ConversionRequest::sniffed(jpeg(), "p.jpg", "gif");
        assert_eq!(req.detected_mime, "image/jpeg");
    }

    /// Records the thread it is dropped on.
    struct DropThread(std::sync::mpsc::Sender<std::thread::ThreadId>);

    impl Drop for DropThread {
        fn drop(&mut self) {
            let _ = self.0.send(std::thread::current().id());
        }
    }

    #[tokio::test]
    async fn guard_is_released_by_the_blocking_task() {
        let (tx, rx) = std::sync::mpsc::channel();
        let req = ConversionRequest::new("image/jpeg", jpeg(), "photo.jpg", "png");
        pipeline()
            .run_blocking_holding(req, None, DropThread(tx))
            .await
            .unwrap();
        let dropped_on = rx.recv().unwrap();
        assert_ne!(dropped_on, std::thread::current().id());
    }

    #[tokio::test]
    async fn permit_outlives_a_dropped_caller() {
        let permits = Arc::new(tokio::sync::Semaphore::new(1));
        let permit = Arc::clone(&permits).acquire_owned().await.unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        let req = ConversionRequest::new("image/jpeg", jpeg(), "photo.jpg", "tiff");

        let pipeline = pipeline();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let task = tokio::spawn(async move {
            let _ = started_tx.send(());
            pipeline
                .run_blocking_holding(req, None, (permit, DropThread(tx)))
                .await
        });
        // Single-threaded runtime: the task's first poll, which hands the
        // guard to the blocking pool, has finished once this resolves.
        started_rx.await.unwrap();
        task.abort();
        let _ = task.await;

        // Once the permit is free again the guard must have gone with the
        // blocking task, not with the aborted future.
        let _again = permits.acquire().await.unwrap();
        let dropped_on = rx.recv().unwrap();
        assert_ne!(dropped_on, std::thread::current().id());
    }

    #[tokio::test]
    async fn run_blocking_matches_run() {
        let req = ConversionRequest::new("image/jpeg", jpeg(), "photo.jpg", "bmp");
        let out = pipeline().run_blocking(req, None).await.unwrap();
        assert_eq!(out.file_name, "photo.bmp");
        assert_eq!(sniff_mime(&out.bytes), "image/bmp");
    }
}
