//! CLI binary for morphos.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` / `ServerConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use morphos::{
    catalog_summary, convert_to_dir, inspect, CodecRuntime, ConversionConfig, ConversionOutput,
    MorphError,
};
use serde_json::json;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a photo to PNG in the current directory
  morphos convert photo.jpg --to png

  # Convert several files concurrently into out/
  morphos convert a.docx b.docx notes.txt --to pdf -o out/

  # Convert a remote file, print a JSON summary
  morphos convert https://example.com/scan.pdf --to png --json

  # What can this file become?
  morphos formats report.docx

  # Run the upload server on :8080
  morphos serve

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH          Path to a libpdfium build (PDF conversions)
  TMP_DIR                  Server output directory
  MORPHOS_PORT             Server listen port (default 8080)
  MORPHOS_BIND_HOST        Server bind address (default 0.0.0.0)
  MORPHOS_MAX_UPLOAD_MB    Largest accepted upload (default 100)
  MORPHOS_MAX_CONVERSIONS  Concurrent server conversions (default: CPU cores)
  MORPHOS_LOG              Server log filter (default info)
  MORPHOS_LOG_JSON         Server logs as JSON lines when 1/true
"#;

/// Detect file formats and convert between them.
#[derive(Parser, Debug)]
#[command(
    name = "morphos",
    version,
    about = "Detect file formats and convert between them",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MORPHOS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MORPHOS_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one or more files or URLs.
    Convert(ConvertArgs),
    /// List the formats a file can be converted to.
    Formats {
        /// Local file path or HTTP/HTTPS URL.
        input: String,
        /// Output JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Print every supported conversion.
    Catalog {
        /// Output JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Run the HTTP upload server.
    #[cfg(feature = "server")]
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Local file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Target subtype, e.g. png, pdf, docx, txt.
    #[arg(short, long)]
    to: String,

    /// Directory to write results to.
    #[arg(short, long, env = "MORPHOS_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Number of inputs converted at once.
    #[arg(short, long, env = "MORPHOS_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// JPEG quality (1–100).
    #[arg(long, env = "MORPHOS_JPEG_QUALITY", default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Longest edge in pixels of a rasterised PDF page.
    #[arg(long, env = "MORPHOS_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Font size in points for text laid out into PDF.
    #[arg(long, env = "MORPHOS_FONT_SIZE", default_value_t = 11.0)]
    font_size: f32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "MORPHOS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output a JSON summary instead of progress lines.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MORPHOS_NO_PROGRESS")]
    no_progress: bool,
}

#[cfg(feature = "server")]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen port.
    #[arg(long, env = "MORPHOS_PORT")]
    port: Option<u16>,

    /// Bind address.
    #[arg(long, env = "MORPHOS_BIND_HOST")]
    host: Option<String>,

    /// Directory converted files are written to and served from.
    #[arg(long, env = "TMP_DIR")]
    output_dir: Option<PathBuf>,

    /// Largest accepted upload in MiB.
    #[arg(long, env = "MORPHOS_MAX_UPLOAD_MB")]
    max_upload_mb: Option<usize>,

    /// Conversions allowed in flight at once.
    #[arg(long, env = "MORPHOS_MAX_CONVERSIONS")]
    max_conversions: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (verbose, quiet) = (cli.verbose, cli.quiet);

    match cli.command {
        Command::Convert(args) => {
            // The progress bar replaces INFO logs when active.
            let show_progress = !quiet && !args.no_progress && !args.json;
            init_logging(log_filter(verbose, quiet || show_progress));
            run_convert(&args, quiet, show_progress).await
        }
        Command::Formats { input, json } => {
            init_logging(log_filter(verbose, quiet));
            run_formats(&input, json).await
        }
        Command::Catalog { json } => run_catalog(json),
        #[cfg(feature = "server")]
        Command::Serve(args) => run_serve(args, verbose).await,
    }
}

fn log_filter(verbose: bool, errors_only: bool) -> &'static str {
    if verbose {
        "debug"
    } else if errors_only {
        "error"
    } else {
        "info"
    }
}

fn init_logging(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .init();
}

// ── convert ──────────────────────────────────────────────────────────────────

async fn run_convert(args: &ConvertArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let config = ConversionConfig::builder()
        .jpeg_quality(args.jpeg_quality)
        .max_rendered_pixels(args.max_pixels)
        .text_font_size(args.font_size)
        .download_timeout_secs(args.download_timeout)
        .build()
        .context("Invalid conversion settings")?;

    fetch_pdf_engine(show_progress);
    let runtime = tokio::task::spawn_blocking(move || CodecRuntime::startup(config))
        .await
        .context("PDF engine startup panicked")?;

    let bar = if show_progress {
        let bar = ProgressBar::new(args.inputs.len() as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    let results: Vec<(String, Result<(ConversionOutput, PathBuf), MorphError>)> =
        stream::iter(args.inputs.iter().cloned().map(|input| {
            let runtime = Arc::clone(&runtime);
            let bar = bar.clone();
            let target = args.to.to_ascii_lowercase();
            let dir = args.output_dir.clone();
            async move {
                let result = convert_to_dir(&input, &target, &dir, &runtime).await;
                if let Some(bar) = &bar {
                    bar.println(result_line(&input, &result));
                    bar.inc(1);
                }
                (input, result)
            }
        }))
        .buffer_unordered(args.concurrency.max(1))
        .collect()
        .await;

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    runtime.shutdown();

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();

    if args.json {
        let summary: Vec<_> = results
            .iter()
            .map(|(input, result)| match result {
                Ok((output, path)) => json!({
                    "input": input,
                    "path": path,
                    "output": output,
                }),
                Err(e) => json!({
                    "input": input,
                    "error": e.to_string(),
                    "code": e.code(),
                }),
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !quiet {
        if !show_progress {
            for (input, result) in &results {
                eprintln!("{}", result_line(input, result));
            }
        }
        eprintln!(
            "{} {}/{} files converted",
            if failed == 0 { green("✔") } else { red("✘") },
            bold(&(results.len() - failed).to_string()),
            results.len()
        );
    }

    if failed > 0 {
        bail!("{failed} of {} conversions failed", results.len());
    }
    Ok(())
}

fn result_line(input: &str, result: &Result<(ConversionOutput, PathBuf), MorphError>) -> String {
    match result {
        Ok((output, path)) => format!(
            "  {} {}  →  {}  {}",
            green("✓"),
            input,
            bold(&path.display().to_string()),
            dim(&format!("{} bytes, {}ms", output.len(), output.duration_ms)),
        ),
        Err(e) => format!("  {} {}  {}", red("✗"), input, red(&e.to_string())),
    }
}

// ── formats / catalog ────────────────────────────────────────────────────────

async fn run_formats(input: &str, json: bool) -> Result<()> {
    let runtime = CodecRuntime::raster_only(ConversionConfig::default());
    let inspection = inspect(input, &runtime)
        .await
        .with_context(|| format!("Failed to inspect {input}"))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&inspection).context("Failed to serialise result")?
        );
        return Ok(());
    }

    println!("File:       {}", inspection.filename);
    println!("MIME:       {}", inspection.mime);
    println!("Type:       {} / {}", inspection.file_type, inspection.sub_type);
    println!("Targets:");
    for (sub_type, label) in &inspection.supported_formats {
        println!("  {sub_type:<6} {label}");
    }
    Ok(())
}

fn run_catalog(json: bool) -> Result<()> {
    let summary = catalog_summary();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise catalog")?
        );
        return Ok(());
    }
    for (file_type, subs) in &summary {
        println!("{}", bold(file_type.label()));
        for (sub_type, targets) in subs {
            println!("  {sub_type:<6} → {}", targets.join(", "));
        }
    }
    Ok(())
}

// ── PDF engine ───────────────────────────────────────────────────────────────

/// First-run download of the pdfium library into the cache, with a byte
/// progress bar. A failure leaves the runtime raster-only.
fn fetch_pdf_engine(show_progress: bool) {
    if cfg!(feature = "bundled") || pdfium_auto::is_pdfium_cached() || !show_progress {
        return;
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    bar.set_prefix("PDF engine");
    bar.enable_steady_tick(Duration::from_millis(80));

    let result = tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length() != Some(t) {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    });
    match result {
        Ok(_) => bar.finish_with_message("ready"),
        Err(e) => {
            bar.abandon();
            eprintln!("{} PDF engine unavailable: {e}", red("✗"));
        }
    }
}

// ── serve ────────────────────────────────────────────────────────────────────

#[cfg(feature = "server")]
async fn run_serve(args: ServeArgs, verbose: bool) -> Result<()> {
    let mut config = morphos::ServerConfig::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host {
        config.bind_host = host;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(mb) = args.max_upload_mb {
        config.max_upload_mb = mb.max(1);
    }
    if let Some(n) = args.max_conversions {
        config.max_concurrent_conversions = n.max(1);
    }

    let level = if verbose { "debug" } else { config.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| level.parse::<EnvFilter>())
        .unwrap_or_else(|e| {
            eprintln!("WARN: MORPHOS_LOG='{level}' is not a valid tracing filter ({e}); falling back to 'info'");
            EnvFilter::new("info")
        });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let runtime = tokio::task::spawn_blocking(|| CodecRuntime::startup(ConversionConfig::default()))
        .await
        .context("PDF engine startup panicked")?;

    morphos::server::serve(config, Arc::clone(&runtime))
        .await
        .context("Server failed")?;

    runtime.shutdown();
    Ok(())
}
