//! # pdfium-auto
//!
//! Finds a [PDFium](https://pdfium.googlesource.com/pdfium/) shared library
//! for `pdfium-render`, fetching it when the machine has none.
//!
//! ## Resolution order
//!
//! [`ensure_pdfium_library`] returns the first of:
//!
//! 1. `PDFIUM_LIB_PATH`, when it names an existing file.
//! 2. The per-version cache directory ([`pdfium_cache_dir`]).
//! 3. A fresh download of the platform archive from
//!    [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries),
//!    unpacked into the cache directory.
//!
//! With the `bundled` feature, [`ensure_pdfium_bundled`] instead writes a
//! library embedded at compile time into the cache directory.
//!
//! The download uses a blocking HTTP client. Call it from a plain thread or
//! `spawn_blocking`, never directly on an async worker.
//!
//! ## Environment
//!
//! - `PDFIUM_LIB_PATH`: an existing pdfium library; no download.
//! - `PDFIUM_AUTO_CACHE_DIR`: replaces the platform cache directory.
//!
//! ```rust,no_run
//! use pdfium_auto::{bind_pdfium_from_path, ensure_pdfium_library};
//!
//! let path = ensure_pdfium_library(None).expect("pdfium unavailable");
//! let pdfium = bind_pdfium_from_path(&path).expect("bind failed");
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use pdfium_render::prelude::Pdfium;
use thiserror::Error;

/// pdfium-binaries release used for downloads (`chromium/<VERSION>`).
pub const PDFIUM_VERSION: &str = "7690";

const RELEASES: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Directory name under the platform cache directory.
const CACHE_NAMESPACE: &str = "morphos";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Progress callback: `(bytes_so_far, total_if_known)`.
pub type Progress<'a> = &'a dyn Fn(u64, Option<u64>);

#[derive(Error, Debug)]
pub enum PdfiumAutoError {
    #[error("no pdfium build for {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("cache directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download failed: {0}")]
    Download(String),

    #[error("cannot unpack pdfium archive: {0}")]
    Extract(String),

    #[error("cannot bind pdfium at '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

// ── Platforms ────────────────────────────────────────────────────────────────

/// One release asset and where the library sits inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Platform {
    os: &'static str,
    arch: &'static str,
    archive: &'static str,
    member: &'static str,
    lib_name: &'static str,
}

const PLATFORMS: &[Platform] = &[
    Platform { os: "macos", arch: "aarch64", archive: "pdfium-mac-arm64.tgz", member: "lib/libpdfium.dylib", lib_name: "libpdfium.dylib" },
    Platform { os: "macos", arch: "x86_64", archive: "pdfium-mac-x64.tgz", member: "lib/libpdfium.dylib", lib_name: "libpdfium.dylib" },
    Platform { os: "linux", arch: "x86_64", archive: "pdfium-linux-x64.tgz", member: "lib/libpdfium.so", lib_name: "libpdfium.so" },
    Platform { os: "linux", arch: "aarch64", archive: "pdfium-linux-arm64.tgz", member: "lib/libpdfium.so", lib_name: "libpdfium.so" },
    Platform { os: "windows", arch: "x86_64", archive: "pdfium-win-x64.tgz", member: "bin/pdfium.dll", lib_name: "pdfium.dll" },
    Platform { os: "windows", arch: "aarch64", archive: "pdfium-win-arm64.tgz", member: "bin/pdfium.dll", lib_name: "pdfium.dll" },
    Platform { os: "windows", arch: "x86", archive: "pdfium-win-x86.tgz", member: "bin/pdfium.dll", lib_name: "pdfium.dll" },
];

fn platform_for(os: &str, arch: &str) -> Result<Platform, PdfiumAutoError> {
    PLATFORMS
        .iter()
        .copied()
        .find(|p| p.os == os && p.arch == arch)
        .ok_or_else(|| PdfiumAutoError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        })
}

fn current_platform() -> Result<Platform, PdfiumAutoError> {
    platform_for(std::env::consts::OS, std::env::consts::ARCH)
}

// ── Cache ────────────────────────────────────────────────────────────────────

/// Per-version cache directory, e.g. `~/.cache/morphos/pdfium-7690/` on
/// Linux. `PDFIUM_AUTO_CACHE_DIR` replaces the platform cache root.
pub fn pdfium_cache_dir() -> PathBuf {
    let versioned = format!("pdfium-{PDFIUM_VERSION}");
    if let Some(root) = std::env::var_os("PDFIUM_AUTO_CACHE_DIR") {
        return PathBuf::from(root).join(versioned);
    }
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_NAMESPACE)
        .join(versioned)
}

fn env_library() -> Option<PathBuf> {
    std::env::var_os("PDFIUM_LIB_PATH")
        .map(PathBuf::from)
        .filter(|p| p.is_file())
}

/// A library usable without network access: `PDFIUM_LIB_PATH` or the cache.
pub fn cached_pdfium_path() -> Option<PathBuf> {
    env_library().or_else(|| {
        let platform = current_platform().ok()?;
        Some(pdfium_cache_dir().join(platform.lib_name)).filter(|p| p.is_file())
    })
}

/// `true` when [`ensure_pdfium_library`] would not touch the network.
pub fn is_pdfium_cached() -> bool {
    cached_pdfium_path().is_some()
}

// ── Resolution ───────────────────────────────────────────────────────────────

static RESOLVED: OnceLock<PathBuf> = OnceLock::new();

/// Path to a pdfium library, downloading it into the cache on first use.
///
/// Resolved once per process; later calls return the same path.
pub fn ensure_pdfium_library(on_progress: Option<Progress<'_>>) -> Result<PathBuf, PdfiumAutoError> {
    if let Some(path) = RESOLVED.get() {
        return Ok(path.clone());
    }
    let path = match cached_pdfium_path() {
        Some(path) => path,
        None => download_into_cache(current_platform()?, on_progress)?,
    };
    Ok(RESOLVED.get_or_init(|| path).clone())
}

/// Write the library embedded at compile time into the cache directory.
#[cfg(feature = "bundled")]
pub fn ensure_pdfium_bundled() -> Result<PathBuf, PdfiumAutoError> {
    mod embedded {
        include!(concat!(env!("OUT_DIR"), "/bundled.rs"));
    }

    let dir = pdfium_cache_dir();
    let dest = dir.join(current_platform()?.lib_name);
    let up_to_date = std::fs::metadata(&dest)
        .map(|m| m.len() == embedded::PDFIUM_BYTES.len() as u64)
        .unwrap_or(false);
    if !up_to_date {
        write_atomically(&dir, &dest, embedded::PDFIUM_BYTES)?;
    }
    Ok(dest)
}

/// Load the pdfium library at `path`.
pub fn bind_pdfium_from_path(path: &Path) -> Result<Pdfium, PdfiumAutoError> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| PdfiumAutoError::Bind {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// [`ensure_pdfium_library`] then [`bind_pdfium_from_path`], without
/// progress reporting.
pub fn bind_pdfium_silent() -> Result<Pdfium, PdfiumAutoError> {
    let path = ensure_pdfium_library(None)?;
    bind_pdfium_from_path(&path)
}

fn download_into_cache(
    platform: Platform,
    on_progress: Option<Progress<'_>>,
) -> Result<PathBuf, PdfiumAutoError> {
    let dir = pdfium_cache_dir();
    let dest = dir.join(platform.lib_name);
    let url = format!("{RELEASES}/chromium%2F{PDFIUM_VERSION}/{}", platform.archive);

    let archive = download(&url, on_progress)?;
    let library = extract_member(&archive, platform.member)?;
    write_atomically(&dir, &dest, &library)?;
    Ok(dest)
}

fn download(url: &str, on_progress: Option<Progress<'_>>) -> Result<Vec<u8>, PdfiumAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-auto/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| PdfiumAutoError::Download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| PdfiumAutoError::Download(format!("GET {url}: {e}")))?;
    if !response.status().is_success() {
        return Err(PdfiumAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let mut body = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                body.extend_from_slice(&chunk[..n]);
                if let Some(report) = on_progress {
                    report(body.len() as u64, total);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PdfiumAutoError::Download(format!("reading {url}: {e}"))),
        }
    }
    Ok(body)
}

/// Bytes of `member` inside a gzipped tar archive.
fn extract_member(archive: &[u8], member: &str) -> Result<Vec<u8>, PdfiumAutoError> {
    let extract = |e: std::io::Error| PdfiumAutoError::Extract(e.to_string());
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(archive));

    for entry in tar.entries().map_err(extract)? {
        let mut entry = entry.map_err(extract)?;
        let is_member = entry.path().map_err(extract)?.to_string_lossy() == member;
        if is_member {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).map_err(extract)?;
            return Ok(bytes);
        }
    }
    Err(PdfiumAutoError::Extract(format!("'{member}' is not in the archive")))
}

/// Write through a sibling temp file so a concurrent reader never loads a
/// half-written library.
fn write_atomically(dir: &Path, dest: &Path, bytes: &[u8]) -> Result<(), PdfiumAutoError> {
    let cache_err = |source| PdfiumAutoError::CacheDir {
        path: dir.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(cache_err)?;
    let tmp = dir.join(format!(".{}.partial-{}", PDFIUM_VERSION, std::process::id()));
    std::fs::write(&tmp, bytes).map_err(cache_err)?;
    std::fs::rename(&tmp, dest).map_err(cache_err)
}
