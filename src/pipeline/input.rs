//! Input resolution: turn a user-supplied path or URL into bytes and a name.
//!
//! Inputs are read fully into memory; every codec works on byte slices.
//! A downloaded file takes its name from the last URL path segment, falling
//! back to `download` when the path has none.

use crate::error::MorphError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Raw input bytes plus the name used to derive the output name.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read a local file or download a URL.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, MorphError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<ResolvedInput, MorphError> {
    let path = PathBuf::from(path_str);
    if !path.is_file() {
        return Err(MorphError::InputNotFound { path });
    }

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MorphError::InputNotFound { path: path.clone() },
        _ => MorphError::Internal(format!("cannot read {}: {}", path.display(), e)),
    })?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());

    debug!(path = %path.display(), bytes = bytes.len(), "read local input");
    Ok(ResolvedInput { bytes, filename })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, MorphError> {
    info!("Downloading input from: {}", url);
    let failed = |reason: String| MorphError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| failed(e.to_string()))?
        .to_vec();

    let filename = filename_from_url(url);
    info!(bytes = bytes.len(), %filename, "Downloaded input");
    Ok(ResolvedInput { bytes, filename })
}

/// Last non-empty path segment of `url`, or `download`.
pub fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty())
        .unwrap_or_else(|| "download".to_string())
}
