//! # morphos
//!
//! Detect a file's format from its bytes and convert it to another format.
//!
//! ## Pipeline Overview
//!
//! ```text
//! bytes
//!  │
//!  ├─ 1. Sniff      content → MIME string
//!  ├─ 2. Classify   MIME → (FileType, SubType) against the format catalog
//!  ├─ 3. Dispatch   FileType → factory → per-subtype converter
//!  ├─ 4. Convert    codec adapter (image / pdfium / OOXML / text)
//!  └─ 5. Name       original name with the final extension replaced
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use morphos::{convert, CodecRuntime, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Binds pdfium once; raster conversions work without it.
//!     let runtime = CodecRuntime::startup(ConversionConfig::default());
//!     let output = convert("report.docx", "pdf", &runtime).await?;
//!     std::fs::write(&output.file_name, &output.bytes)?;
//!     runtime.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Supported conversions
//!
//! | Source | Targets |
//! |--------|---------|
//! | png, jpeg, gif, webp, bmp, tiff | the other raster formats, pdf |
//! | pdf  | png, jpeg, gif, webp, bmp, tiff, docx, txt |
//! | docx | pdf, txt |
//! | txt  | pdf, docx |
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `morphos` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | HTTP upload surface (axum + tower-http) |
//!
//! ```toml
//! morphos = { version = "0.3", default-features = false }
//! ```
//!
//! ## PDF engine
//!
//! PDF reading and writing use pdfium, located by the `pdfium-auto` crate.
//! [`CodecRuntime::startup`] tries `PDFIUM_LIB_PATH`, the pdfium-auto cache,
//! the working directory and the system library path, then downloads the
//! library into the cache once. The `bundled` feature embeds it at compile
//! time instead. Without it, PDF-backed conversions fail with
//! [`MorphError::ConversionFailed`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod catalog;
pub mod classify;
pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod factory;
pub mod output;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use catalog::{catalog, FileType, FormatCatalog};
pub use classify::{classify, sniff_mime};
pub use codec::{CodecRuntime, FormatConverter};
pub use config::{ConversionConfig, ConversionConfigBuilder, ServerConfig};
pub use convert::{
    catalog_summary, convert, convert_bytes, convert_bytes_cancellable, convert_to_dir, inspect,
    inspect_bytes, Inspection,
};
pub use error::MorphError;
pub use factory::{build_factory, ConverterFactory};
pub use output::{ConversionOutput, OutputStore};
pub use pipeline::naming::derive_output_name;
pub use pipeline::{CancelFlag, ConversionPipeline, ConversionRequest, Stage};
