//! End-to-end integration tests for morphos.
//!
//! Fixtures are generated in memory. Tests that need the PDF engine print
//! `SKIP` and return when pdfium cannot be bound.
//!
//! Run with:
//!   PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   cargo test --test e2e test_scenario -- --nocapture

use image::{DynamicImage, Rgba, RgbaImage};
use morphos::codec::{docx, raster};
use morphos::{
    catalog, classify, convert_bytes, convert_to_dir, inspect, sniff_mime, CodecRuntime,
    ConversionConfig, ConversionPipeline, ConversionRequest, FileType, MorphError,
};
use std::io::{Cursor, Read};
use std::sync::{Arc, OnceLock};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// pdfium binds once per process; every test shares this runtime.
fn runtime() -> Arc<CodecRuntime> {
    static RUNTIME: OnceLock<Arc<CodecRuntime>> = OnceLock::new();
    Arc::clone(RUNTIME.get_or_init(|| CodecRuntime::startup(ConversionConfig::default())))
}

fn pipeline() -> ConversionPipeline {
    ConversionPipeline::new(runtime())
}

/// Skip this test when no PDF engine is available.
macro_rules! pdf_skip_unless_ready {
    () => {{
        if !runtime().has_pdf_engine() {
            println!("SKIP: PDF engine not available (set PDFIUM_LIB_PATH)");
            return;
        }
    }};
}

fn image_with(color: [u8; 4], width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba(color)
        } else {
            Rgba([255, 255, 255, 255])
        }
    }))
}

fn raster_fixture(sub_type: &str) -> Vec<u8> {
    raster::encode(&image_with([30, 90, 200, 255], 24, 16), sub_type, 90)
        .unwrap_or_else(|e| panic!("encode {sub_type}: {e}"))
}

fn text_fixture() -> Vec<u8> {
    b"Quarterly report\n\nRevenue grew in every region.\n".to_vec()
}

fn docx_fixture() -> Vec<u8> {
    let paragraphs = vec![
        "Quarterly report".to_string(),
        String::new(),
        "Revenue grew in every region.".to_string(),
    ];
    docx::write_docx(&paragraphs).expect("write docx")
}

/// Fixture bytes for any catalogued subtype. `None` when the fixture needs
/// the PDF engine and it is not available.
fn fixture(sub_type: &str) -> Option<Vec<u8>> {
    match sub_type {
        "txt" => Some(text_fixture()),
        "docx" => Some(docx_fixture()),
        "pdf" => {
            if !runtime().has_pdf_engine() {
                return None;
            }
            let req = ConversionRequest::sniffed(text_fixture(), "fixture.txt", "pdf");
            Some(pipeline().run(&req, None).expect("txt → pdf fixture").bytes)
        }
        raster_sub => Some(raster_fixture(raster_sub)),
    }
}

fn sub_type_of(bytes: &[u8]) -> (FileType, String) {
    let mime = sniff_mime(bytes);
    classify(&mime).unwrap_or_else(|e| panic!("{mime}: {e}"))
}

/// Named entries of a zip archive.
fn unzip(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("zip");
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            (entry.name().to_string(), data)
        })
        .collect()
}

// ── Acceptance scenarios ─────────────────────────────────────────────────────

#[test]
fn test_scenario_jpeg_to_png() {
    let req = ConversionRequest::new("image/jpeg", raster_fixture("jpeg"), "photo.jpg", "png");
    let out = pipeline().run(&req, None).expect("jpeg → png");

    assert_eq!(out.file_name, "photo.png");
    assert_eq!(out.file_type, FileType::Image);
    assert_eq!(sub_type_of(&out.bytes), (FileType::Image, "png".to_string()));
}

#[test]
fn test_scenario_docx_to_pdf() {
    pdf_skip_unless_ready!();

    let req = ConversionRequest::sniffed(docx_fixture(), "report.docx", "pdf");
    assert_eq!(req.detected_mime, morphos::classify::DOCX_MIME);
    let out = pipeline().run(&req, None).expect("docx → pdf");

    assert_eq!(out.file_name, "report.pdf");
    assert_eq!(out.file_type, FileType::Application);
    assert!(out.bytes.starts_with(b"%PDF-"));
}

#[test]
fn test_scenario_unknown_mime() {
    let req = ConversionRequest::sniffed(vec![0, 159, 146, 150], "blob.bin", "png");
    assert_eq!(req.detected_mime, "application/octet-stream");
    match pipeline().run(&req, None) {
        Err(MorphError::UnsupportedMimeType { mime }) => {
            assert_eq!(mime, "application/octet-stream")
        }
        other => panic!("expected UnsupportedMimeType, got {other:?}"),
    }
}

#[test]
fn test_declared_mime_outside_catalog() {
    let req = ConversionRequest::new("chemical/x-pdb", vec![1, 2, 3], "mol.pdb", "png");
    assert!(matches!(
        pipeline().run(&req, None),
        Err(MorphError::UnsupportedMimeType { .. })
    ));
}

#[test]
fn test_scenario_unsupported_target() {
    let req = ConversionRequest::new("image/png", raster_fixture("png"), "a.png", "mp3");
    match pipeline().run(&req, None) {
        Err(MorphError::ConversionFailed { from, to, .. }) => {
            assert_eq!(from, "png");
            assert_eq!(to, "mp3");
        }
        other => panic!("expected ConversionFailed, got {other:?}"),
    }
}

// ── Properties ───────────────────────────────────────────────────────────────

#[test]
fn test_every_catalog_pair_produces_its_target() {
    let mut checked = 0;
    for (from, to) in catalog().pairs() {
        let needs_engine = from == "pdf" || to == "pdf";
        if needs_engine && !runtime().has_pdf_engine() {
            continue;
        }
        let Some(source) = fixture(from) else { continue };

        let req = ConversionRequest::sniffed(source, format!("in.{from}"), to);
        let out = pipeline()
            .run(&req, None)
            .unwrap_or_else(|e| panic!("{from} → {to}: {e}"));

        if from == "pdf" {
            assert_eq!(out.file_name, "in.zip");
            assert_eq!(out.file_type, FileType::Application);
            for (name, data) in unzip(&out.bytes) {
                assert_eq!(sub_type_of(&data).1, to, "{from} → {to} entry {name}");
            }
        } else {
            assert_eq!(sub_type_of(&out.bytes).1, to, "{from} → {to}");
        }
        checked += 1;
    }
    println!("checked {checked} catalog pairs");
    assert!(checked >= 32, "raster and text pairs always run, got {checked}");
}

#[test]
fn test_round_trip_reclassifies_as_source() {
    let formats = ["png", "gif", "bmp", "tiff", "webp", "jpeg"];
    for a in formats {
        for b in formats.iter().filter(|b| **b != a) {
            let there = ConversionRequest::sniffed(raster_fixture(a), format!("x.{a}"), *b);
            let mid = pipeline().run(&there, None).expect("a → b");
            let back = ConversionRequest::sniffed(mid.bytes, mid.file_name, a);
            let out = pipeline().run(&back, None).expect("b → a");

            assert_eq!(sub_type_of(&out.bytes).1, a, "{a} → {b} → {a}");
            assert_eq!(out.file_name, format!("x.{a}"));
        }
    }

    let there = ConversionRequest::sniffed(text_fixture(), "notes.txt", "docx");
    let mid = pipeline().run(&there, None).expect("txt → docx");
    let back = ConversionRequest::sniffed(mid.bytes, mid.file_name, "txt");
    let out = pipeline().run(&back, None).expect("docx → txt");
    assert_eq!(out.bytes, text_fixture());
}

#[test]
fn test_concurrent_conversions_do_not_cross_contaminate() {
    let colors: Vec<[u8; 4]> = (0..8u8)
        .map(|i| [i * 30, 255 - i * 30, i * 10, 255])
        .collect();

    let handles: Vec<_> = colors
        .iter()
        .copied()
        .enumerate()
        .map(|(i, color)| {
            let pipeline = pipeline();
            std::thread::spawn(move || {
                let png = raster::encode(&image_with(color, 40, 20), "png", 90).unwrap();
                let req = ConversionRequest::new("image/png", png, format!("img{i}.png"), "bmp");
                (i, color, pipeline.run(&req, None).expect("png → bmp"))
            })
        })
        .collect();

    for handle in handles {
        let (i, color, out) = handle.join().expect("thread panicked");
        assert_eq!(out.file_name, format!("img{i}.bmp"));
        let img = raster::decode(&out.bytes, "bmp").unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (40, 20));
        assert_eq!(img.get_pixel(0, 0).0, color, "image {i} got another image's pixels");
    }
}

#[test]
fn test_application_source_is_named_zip() {
    pdf_skip_unless_ready!();

    let pdf = fixture("pdf").expect("pdf fixture");
    let req = ConversionRequest::sniffed(pdf, "deck.pdf", "png");
    let out = pipeline().run(&req, None).expect("pdf → png");
    assert_eq!(out.file_name, "deck.zip");
    assert_eq!(out.target_sub_type, "png");
    assert_eq!(out.file_type, FileType::Application);
    assert_eq!(sniff_mime(&out.bytes), "application/zip");

    let entries = unzip(&out.bytes);
    assert_eq!(entries.len(), 1, "the fixture is a single page");
    assert_eq!(entries[0].0, "page-001.png");
    assert_eq!(sub_type_of(&entries[0].1).1, "png");
}

#[test]
fn test_pdf_to_text_is_one_entry_archive() {
    pdf_skip_unless_ready!();

    let pdf = fixture("pdf").expect("pdf fixture");
    let req = ConversionRequest::sniffed(pdf, "deck.pdf", "txt");
    let out = pipeline().run(&req, None).expect("pdf → txt");
    assert_eq!(out.file_name, "deck.zip");

    let entries = unzip(&out.bytes);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "deck.txt");
    assert!(String::from_utf8_lossy(&entries[0].1).contains("Quarterly report"));
}

#[test]
fn test_multi_page_pdf_becomes_zip_of_pages() {
    pdf_skip_unless_ready!();

    let long_text = (0..200)
        .map(|i| format!("Line {i} of a document long enough to need several pages."))
        .collect::<Vec<_>>()
        .join("\n");
    let req = ConversionRequest::sniffed(long_text.into_bytes(), "long.txt", "pdf");
    let pdf = pipeline().run(&req, None).expect("txt → pdf").bytes;

    let req = ConversionRequest::sniffed(pdf, "long.pdf", "png");
    let out = pipeline().run(&req, None).expect("pdf → png");
    assert_eq!(sniff_mime(&out.bytes), "application/zip");

    let entries = unzip(&out.bytes);
    assert!(entries.len() > 1, "expected several pages");
    for (i, (name, bytes)) in entries.iter().enumerate() {
        assert_eq!(*name, format!("page-{:03}.png", i + 1));
        assert_eq!(sub_type_of(bytes).1, "png");
    }
}

// ── Library entry points ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_convert_to_dir_writes_result() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.tiff");
    std::fs::write(&input, raster_fixture("tiff")).unwrap();

    let out_dir = dir.path().join("out");
    let (output, path) = convert_to_dir(input.to_str().unwrap(), "webp", &out_dir, &runtime())
        .await
        .expect("convert_to_dir");

    assert_eq!(path, out_dir.join("scan.webp"));
    assert_eq!(output.file_name, "scan.webp");
    assert_eq!(sub_type_of(&std::fs::read(&path).unwrap()).1, "webp");
}

#[tokio::test]
async fn test_inspect_lists_targets() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("letter.docx");
    std::fs::write(&input, docx_fixture()).unwrap();

    let info = inspect(input.to_str().unwrap(), &runtime())
        .await
        .expect("inspect");
    assert_eq!(info.file_type, FileType::Document);
    assert_eq!(info.sub_type, "docx");
    assert_eq!(
        info.supported_formats.keys().copied().collect::<Vec<_>>(),
        vec!["pdf", "txt"]
    );
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    let err = inspect("/no/such/file.png", &runtime()).await.unwrap_err();
    assert!(matches!(err, MorphError::InputNotFound { .. }));
}

#[test]
fn test_convert_bytes_from_sync_code() {
    let out = tokio_test::block_on(convert_bytes(
        raster_fixture("gif"),
        "anim.gif",
        "jpeg",
        &runtime(),
    ))
    .expect("gif → jpeg");
    assert_eq!(out.file_name, "anim.jpeg");
    assert_eq!(out.source_file_type, FileType::Image);
}

#[test]
fn test_runtime_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<CodecRuntime>();
    assert_send_sync::<ConversionPipeline>();
    assert_send_sync::<Box<dyn morphos::FormatConverter>>();
}
