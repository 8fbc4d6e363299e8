//! Notion API access: the append seam and its HTTP implementation.
//!
//! The uploader talks to Notion through exactly one operation, "append these
//! blocks as children of that block". [`BlockAppender`] captures it as an
//! async trait so tests can script responses without a network.
//!
//! ## Failure classification
//!
//! Every non-2xx response is mapped to an [`AppendError`] class the upload
//! loop has a policy for:
//!
//! | Response                                      | Class         |
//! |-----------------------------------------------|---------------|
//! | HTTP 429 or code `rate_limited`               | `RateLimited` |
//! | HTTP 400, HTTP 413 or code `validation_error` | `Payload`     |
//! | client-side timeout                           | `Timeout`     |
//! | no response at all                            | `Transport`   |
//! | anything else                                 | `Api`         |

use crate::config::UploadConfig;
use crate::error::{AppendError, ImportError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Appends blocks to an existing Notion block (page, toggle, callout …).
#[async_trait]
pub trait BlockAppender: Send + Sync {
    /// Append `children` to `block_id`, in order, in a single request.
    async fn append_children(&self, block_id: &str, children: &[Value]) -> Result<(), AppendError>;
}

/// [`BlockAppender`] backed by the Notion REST API.
#[derive(Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    notion_version: String,
    timeout_secs: u64,
}

impl fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("notion_version", &self.notion_version)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl NotionClient {
    /// Build a client from the upload config and an integration token.
    pub fn new(token: impl Into<String>, config: &UploadConfig) -> Result<Self, ImportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("md2notion/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ImportError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            notion_version: config.notion_version.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn children_url(&self, block_id: &str) -> String {
        format!("{}/blocks/{}/children", self.base_url, block_id)
    }
}

#[async_trait]
impl BlockAppender for NotionClient {
    async fn append_children(&self, block_id: &str, children: &[Value]) -> Result<(), AppendError> {
        let url = self.children_url(block_id);
        debug!("PATCH {} ({} blocks)", url, children.len());

        let response = self
            .http
            .patch(&url)
            .bearer_auth(&self.token)
            .header("Notion-Version", self.notion_version.as_str())
            .json(&json!({ "children": children }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppendError::Timeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    AppendError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppendError::Timeout {
                    secs: self.timeout_secs,
                }
            } else {
                AppendError::Transport(e.to_string())
            }
        })?;

        Err(classify_failure(
            status.as_u16(),
            retry_after.as_deref(),
            &body,
        ))
    }
}

/// Error body returned by the Notion API.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Map a failed HTTP response to the class the upload loop acts on.
pub fn classify_failure(status: u16, retry_after: Option<&str>, body: &str) -> AppendError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = if parsed.code.is_empty() {
        "unknown".to_string()
    } else {
        parsed.code
    };
    let message = if parsed.message.is_empty() {
        body.chars().take(500).collect()
    } else {
        parsed.message
    };

    match (status, code.as_str()) {
        (429, _) | (_, "rate_limited") => AppendError::RateLimited {
            retry_after_secs: retry_after.and_then(parse_retry_after),
        },
        (400, _) | (413, _) | (_, "validation_error") => AppendError::Payload {
            status,
            code,
            message,
        },
        _ => AppendError::Api {
            status,
            code,
            message,
        },
    }
}

/// `Retry-After` in delta-seconds form; fractional values round up.
fn parse_retry_after(value: &str) -> Option<u64> {
    let secs: f64 = value.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| secs.ceil() as u64)
}
