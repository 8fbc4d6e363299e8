//! Error types for the md2notion library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ImportError`] (**fatal**): the import cannot proceed (bad input file,
//!   missing credential, retries exhausted, unclassified API error). Returned
//!   as `Err(ImportError)` from the top-level `import*` functions.
//!
//! * [`AppendError`] (**per-request**): one append call failed, classified by
//!   what the upload loop can do about it. Rate limits and timeouts are
//!   retried, payload errors shrink the batch, anything else escalates into
//!   an [`ImportError`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the md2notion library.
#[derive(Debug, Error)]
pub enum ImportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Markdown file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but is not valid UTF-8 text.
    #[error("File '{path}' is not valid UTF-8 text")]
    NotUtf8 { path: PathBuf },

    /// The page identifier could not be parsed.
    #[error("Invalid page id '{input}': expected a 32-digit hex id, a UUID, or a Notion page URL")]
    InvalidPageId { input: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The environment variable holding the API token is unset or empty.
    #[error("Environment variable {var} is not set.\nExample: export {var}='secret_...'")]
    MissingCredential { var: String },

    // ── Upload errors ─────────────────────────────────────────────────────
    /// A single block was rejected by the API and skipping is disabled.
    #[error("Block {index} ({block_type}) failed validation: {detail}")]
    BadBlock {
        index: usize,
        block_type: String,
        detail: String,
    },

    /// A transient failure kept recurring past the retry budget.
    #[error("Giving up on blocks starting at {offset} after {retries} retries: {source}")]
    RetriesExhausted {
        offset: usize,
        retries: u32,
        #[source]
        source: AppendError,
    },

    /// The API returned an error the upload loop has no policy for.
    #[error("Notion API error at block offset {offset}: {source}")]
    Api {
        offset: usize,
        #[source]
        source: AppendError,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read the input file.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A classified failure of one append request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppendError {
    /// HTTP 429 / `rate_limited`; back off and retry the same batch.
    ///
    /// `retry_after_secs` carries the server's `Retry-After` hint when present.
    #[error("Rate limited by Notion API")]
    RateLimited { retry_after_secs: Option<u64> },

    /// HTTP 400, HTTP 413 or code `validation_error`. The batch, or one block in it,
    /// was rejected. A smaller batch may succeed.
    #[error("Payload rejected (HTTP {status}, {code}): {message}")]
    Payload {
        status: u16,
        code: String,
        message: String,
    },

    /// The request did not complete within the client timeout.
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Any other API error response.
    #[error("HTTP {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("Transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_block_display() {
        let e = ImportError::BadBlock {
            index: 42,
            block_type: "equation".into(),
            detail: "body.children[0].equation.expression.length should be ≤ 1000".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Block 42"), "got: {msg}");
        assert!(msg.contains("equation"), "got: {msg}");
    }

    #[test]
    fn missing_credential_names_variable() {
        let e = ImportError::MissingCredential {
            var: "NOTION_TOKEN".into(),
        };
        assert!(e.to_string().contains("export NOTION_TOKEN="));
    }

    #[test]
    fn retries_exhausted_keeps_source() {
        use std::error::Error as _;
        let e = ImportError::RetriesExhausted {
            offset: 100,
            retries: 3,
            source: AppendError::RateLimited {
                retry_after_secs: Some(2),
            },
        };
        assert!(e.to_string().contains("starting at 100"));
        assert!(e.source().is_some());
    }

    #[test]
    fn payload_display() {
        let e = AppendError::Payload {
            status: 400,
            code: "validation_error".into(),
            message: "body failed validation".into(),
        };
        assert!(e.to_string().contains("HTTP 400"));
        assert!(e.to_string().contains("validation_error"));
    }

    #[test]
    fn timeout_display() {
        let e = AppendError::Timeout { secs: 60 };
        assert!(e.to_string().contains("60s"));
    }
}
