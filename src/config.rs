//! Configuration types.
//!
//! Codec tuning lives in [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. The upload server reads [`ServerConfig`] from
//! the environment at startup.

use crate::error::MorphError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Codec tuning shared by every conversion of a [`crate::codec::CodecRuntime`].
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use morphos::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .jpeg_quality(70)
///     .max_rendered_pixels(1200)
///     .build()
///     .unwrap();
/// assert_eq!(config.jpeg_quality, 70);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// JPEG encoder quality. Range: 1–100. Default: 85.
    pub jpeg_quality: u8,

    /// Longest edge, in pixels, of a rasterised PDF page. Default: 2000.
    ///
    /// A cap rather than a DPI: an A0 poster at print resolution would
    /// otherwise allocate hundreds of megabytes per page.
    pub max_rendered_pixels: u32,

    /// Font size in points for text laid out into PDF pages. Range: 6–36.
    /// Default: 11.
    pub text_font_size: f32,

    /// Page margin in points for text laid out into PDF pages. Default: 56
    /// (about 2 cm).
    pub page_margin: f32,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 85,
            max_rendered_pixels: 2000,
            text_font_size: 11.0,
            page_margin: 56.0,
            download_timeout_secs: 120,
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn text_font_size(mut self, pt: f32) -> Self {
        self.config.text_font_size = pt.clamp(6.0, 36.0);
        self
    }

    pub fn page_margin(mut self, pt: f32) -> Self {
        self.config.page_margin = pt.max(0.0);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, MorphError> {
        let c = &self.config;
        if !c.text_font_size.is_finite() || !c.page_margin.is_finite() {
            return Err(MorphError::InvalidConfig(
                "font size and margin must be finite".into(),
            ));
        }
        // The printable area of an A4 page (595 × 842 pt) must fit one line.
        if c.page_margin * 2.0 + c.text_font_size >= 595.0 {
            return Err(MorphError::InvalidConfig(format!(
                "page margin {} pt leaves no room for {} pt text",
                c.page_margin, c.text_font_size
            )));
        }
        if c.download_timeout_secs == 0 {
            return Err(MorphError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Server ───────────────────────────────────────────────────────────────

/// Runtime configuration for the upload server.
///
/// Every field has a default so the server starts without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory converted files are written to and served from
    /// (`TMP_DIR`, default: the OS temp dir).
    pub output_dir: PathBuf,

    /// Interface to bind (`MORPHOS_BIND_HOST`, default: `"0.0.0.0"`).
    pub bind_host: String,

    /// Listen port (`MORPHOS_PORT`, default: 8080).
    pub port: u16,

    /// Largest accepted upload in MiB (`MORPHOS_MAX_UPLOAD_MB`, default: 100).
    pub max_upload_mb: usize,

    /// Conversions allowed in flight at once (`MORPHOS_MAX_CONVERSIONS`,
    /// default: available CPU cores).
    pub max_concurrent_conversions: usize,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`
    /// (`MORPHOS_LOG`).
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON
    /// (`MORPHOS_LOG_JSON`).
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir(),
            bind_host: "0.0.0.0".to_owned(),
            port: 8080,
            max_upload_mb: 100,
            max_concurrent_conversions: default_parallelism(),
            log_level: "info".to_owned(),
            log_json: false,
        }
    }
}

impl ServerConfig {
    /// Build [`ServerConfig`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            output_dir: std::env::var_os("TMP_DIR")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            bind_host: env_or("MORPHOS_BIND_HOST", &defaults.bind_host),
            port: parse_env("MORPHOS_PORT", defaults.port),
            max_upload_mb: parse_env("MORPHOS_MAX_UPLOAD_MB", defaults.max_upload_mb).max(1),
            max_concurrent_conversions: parse_env(
                "MORPHOS_MAX_CONVERSIONS",
                defaults.max_concurrent_conversions,
            )
            .max(1),
            log_level: env_or("MORPHOS_LOG", &defaults.log_level),
            log_json: std::env::var("MORPHOS_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps() {
        let c = ConversionConfig::builder()
            .jpeg_quality(0)
            .text_font_size(100.0)
            .max_rendered_pixels(10)
            .build()
            .unwrap();
        assert_eq!(c.jpeg_quality, 1);
        assert_eq!(c.text_font_size, 36.0);
        assert_eq!(c.max_rendered_pixels, 100);
    }

    #[test]
    fn build_rejects_oversized_margin() {
        let err = ConversionConfig::builder()
            .page_margin(400.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, MorphError::InvalidConfig(_)));
    }

    #[test]
    fn build_rejects_zero_timeout() {
        assert!(ConversionConfig::builder()
            .download_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn parse_env_falls_back_on_garbage() {
        std::env::set_var("MORPHOS_TEST_PARSE_ENV", "not-a-number");
        assert_eq!(parse_env("MORPHOS_TEST_PARSE_ENV", 7u16), 7);
        std::env::set_var("MORPHOS_TEST_PARSE_ENV", "9");
        assert_eq!(parse_env("MORPHOS_TEST_PARSE_ENV", 7u16), 9);
        std::env::remove_var("MORPHOS_TEST_PARSE_ENV");
        assert_eq!(parse_env("MORPHOS_TEST_PARSE_ENV", 7u16), 7);
    }

    #[test]
    fn server_defaults() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_address(), "0.0.0.0:8080");
        assert_eq!(c.max_upload_bytes(), 100 * 1024 * 1024);
        assert!(c.max_concurrent_conversions >= 1);
    }
}
