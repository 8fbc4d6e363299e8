//! Configuration types for a Markdown-to-Notion import.
//!
//! All upload behaviour is controlled through [`UploadConfig`], built via its
//! [`UploadConfigBuilder`]. The builder validates the one hard constraint the
//! Notion API imposes on callers (at most 100 children per append request)
//! before any network activity happens.

use crate::client::BlockAppender;
use crate::error::ImportError;
use crate::pipeline::limits::MAX_BLOCKS_PER_REQUEST;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default Notion REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.notion.com/v1";

/// `Notion-Version` header sent with every request.
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";

/// Environment variable read for the integration token.
pub const DEFAULT_TOKEN_ENV: &str = "NOTION_TOKEN";

/// Configuration for uploading a block sequence to a Notion page.
///
/// Built via [`UploadConfig::builder()`] or using [`UploadConfig::default()`].
///
/// # Example
/// ```rust
/// use md2notion::UploadConfig;
///
/// let config = UploadConfig::builder()
///     .batch_size(25)
///     .max_retries(4)
///     .skip_bad_blocks(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_size, 25);
/// ```
#[derive(Clone)]
pub struct UploadConfig {
    /// Blocks per append request. Range: 1–100. Default: 50.
    ///
    /// Shrinks automatically (halving) when Notion rejects a batch as too
    /// large or invalid, and stays shrunk for the rest of the upload.
    pub batch_size: usize,

    /// Pause after every successful request, in milliseconds. Default: 350.
    ///
    /// Notion allows an average of three requests per second per integration.
    pub pacing_delay_ms: u64,

    /// Index of the first block to upload. Default: 0.
    ///
    /// Used to resume an interrupted import: the previous run's progress line
    /// reports how many blocks were appended.
    pub start_offset: usize,

    /// Maximum retries per batch position before giving up. Default: 6.
    ///
    /// Counts rate-limit waits, timeouts and batch shrinks alike. Six is
    /// enough to halve a 50-block batch down to a single block.
    pub max_retries: u32,

    /// Upper bound for exponential backoff waits, in seconds. Default: 30.
    pub max_backoff_secs: u64,

    /// Skip a single block Notion refuses instead of aborting. Default: false.
    pub skip_bad_blocks: bool,

    /// Per-request HTTP timeout in seconds. Default: 60.
    pub request_timeout_secs: u64,

    /// Base URL of the Notion API. Default: [`DEFAULT_API_BASE`].
    pub api_base_url: String,

    /// `Notion-Version` header value. Default: [`DEFAULT_NOTION_VERSION`].
    pub notion_version: String,

    /// Environment variable holding the integration token.
    /// Default: [`DEFAULT_TOKEN_ENV`]. Ignored when `appender` is set.
    pub token_env: String,

    /// Pre-constructed appender. Takes precedence over building an HTTP
    /// client from a token.
    pub appender: Option<Arc<dyn BlockAppender>>,

    /// Optional per-batch progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            pacing_delay_ms: 350,
            start_offset: 0,
            max_retries: 6,
            max_backoff_secs: 30,
            skip_bad_blocks: false,
            request_timeout_secs: 60,
            api_base_url: DEFAULT_API_BASE.to_string(),
            notion_version: DEFAULT_NOTION_VERSION.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            appender: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadConfig")
            .field("batch_size", &self.batch_size)
            .field("pacing_delay_ms", &self.pacing_delay_ms)
            .field("start_offset", &self.start_offset)
            .field("max_retries", &self.max_retries)
            .field("max_backoff_secs", &self.max_backoff_secs)
            .field("skip_bad_blocks", &self.skip_bad_blocks)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("api_base_url", &self.api_base_url)
            .field("notion_version", &self.notion_version)
            .field("token_env", &self.token_env)
            .field("appender", &self.appender.as_ref().map(|_| "<dyn BlockAppender>"))
            .finish()
    }
}

impl UploadConfig {
    /// Create a new builder for `UploadConfig`.
    pub fn builder() -> UploadConfigBuilder {
        UploadConfigBuilder {
            config: Self::default(),
        }
    }

    /// Batch size actually used for the first request.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BLOCKS_PER_REQUEST)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }
}

/// Builder for [`UploadConfig`].
#[derive(Debug)]
pub struct UploadConfigBuilder {
    config: UploadConfig,
}

impl UploadConfigBuilder {
    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    pub fn pacing_delay_ms(mut self, ms: u64) -> Self {
        self.config.pacing_delay_ms = ms;
        self
    }

    /// Set the pacing delay from fractional seconds, as typed on a CLI.
    pub fn pacing_delay_secs(mut self, secs: f64) -> Self {
        self.config.pacing_delay_ms = (secs.max(0.0) * 1000.0).round() as u64;
        self
    }

    pub fn start_offset(mut self, n: usize) -> Self {
        self.config.start_offset = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn max_backoff_secs(mut self, secs: u64) -> Self {
        self.config.max_backoff_secs = secs.max(1);
        self
    }

    pub fn skip_bad_blocks(mut self, v: bool) -> Self {
        self.config.skip_bad_blocks = v;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn notion_version(mut self, version: impl Into<String>) -> Self {
        self.config.notion_version = version.into();
        self
    }

    pub fn token_env(mut self, var: impl Into<String>) -> Self {
        self.config.token_env = var.into();
        self
    }

    pub fn appender(mut self, appender: Arc<dyn BlockAppender>) -> Self {
        self.config.appender = Some(appender);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<UploadConfig, ImportError> {
        let c = &self.config;
        if c.batch_size < 1 || c.batch_size > MAX_BLOCKS_PER_REQUEST {
            return Err(ImportError::InvalidConfig(format!(
                "batch size must be between 1 and {}, got {}",
                MAX_BLOCKS_PER_REQUEST, c.batch_size
            )));
        }
        if c.request_timeout_secs == 0 {
            return Err(ImportError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        if !(c.api_base_url.starts_with("http://") || c.api_base_url.starts_with("https://")) {
            return Err(ImportError::InvalidConfig(format!(
                "API base URL must be http(s), got '{}'",
                c.api_base_url
            )));
        }
        if c.appender.is_none() && c.token_env.trim().is_empty() {
            return Err(ImportError::InvalidConfig(
                "token environment variable name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let config = UploadConfig::builder().build().unwrap();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.pacing_delay_ms, 350);
        assert_eq!(config.max_backoff_secs, 30);
        assert!(!config.skip_bad_blocks);
    }

    #[test]
    fn batch_size_out_of_range_is_rejected() {
        for n in [0, 101, 1000] {
            let err = UploadConfig::builder().batch_size(n).build().unwrap_err();
            assert!(
                matches!(err, ImportError::InvalidConfig(_)),
                "batch size {n} should be rejected"
            );
        }
    }

    #[test]
    fn batch_size_bounds_are_accepted() {
        assert!(UploadConfig::builder().batch_size(1).build().is_ok());
        assert!(UploadConfig::builder().batch_size(100).build().is_ok());
    }

    #[test]
    fn pacing_delay_from_seconds() {
        let config = UploadConfig::builder()
            .pacing_delay_secs(0.35)
            .build()
            .unwrap();
        assert_eq!(config.pacing_delay(), Duration::from_millis(350));
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let err = UploadConfig::builder()
            .api_base_url("ftp://example.org")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http"));
    }
}
