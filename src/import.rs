//! Top-level import entry points.
//!
//! ## Why split `prepare` from `import`?
//!
//! Everything up to the upload is pure and deterministic: normalise math,
//! convert, sanitise. [`prepare`] exposes that half on its own so callers
//! (and the CLI's `--dry-run`) can inspect the exact blocks and limit
//! diagnostics without a token or a network. [`import_markdown`] runs the
//! same preparation and then hands the blocks to the uploader.

use crate::client::{BlockAppender, NotionClient};
use crate::config::UploadConfig;
use crate::error::ImportError;
use crate::output::{ImportOutput, PreparedDocument};
use crate::pipeline::input::{self, PageId};
use crate::pipeline::{blocks, math, richtext, upload};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Convert Markdown text into sanitised Notion blocks.
///
/// Never fails: Markdown has no invalid input, and limit violations are
/// reported in the returned document rather than raised.
///
/// ```rust
/// let doc = md2notion::prepare("# Title\n\nBody with $$x^2$$ math.\n");
/// assert_eq!(doc.blocks[0]["type"], "heading_1");
/// assert!(doc.conversion_issues.is_empty());
/// ```
pub fn prepare(markdown: &str) -> PreparedDocument {
    let normalized = math::normalize_display_math(markdown);
    let conversion = blocks::markdown_to_blocks(&normalized);
    for issue in &conversion.limit_issues {
        debug!("Converter output over limit: {}", issue);
    }

    let mut blocks = conversion.blocks;
    let sanitize = richtext::sanitize_blocks(&mut blocks);
    info!(
        "Prepared {} blocks ({} runs split, {} issues remaining)",
        blocks.len(),
        sanitize.runs_split,
        sanitize.remaining_issues.len()
    );

    PreparedDocument {
        blocks,
        conversion_issues: conversion.limit_issues,
        sanitize,
    }
}

/// Read a Markdown file and [`prepare`] it.
pub fn prepare_file(path: impl AsRef<Path>) -> Result<PreparedDocument, ImportError> {
    let markdown = input::read_markdown(path.as_ref())?;
    Ok(prepare(&markdown))
}

/// Import Markdown text into the Notion page identified by `page_id`.
///
/// `page_id` may be a raw id, a UUID or a page URL.
///
/// # Errors
/// Configuration problems ([`ImportError::InvalidPageId`],
/// [`ImportError::MissingCredential`]) are reported before any request is
/// sent. Upload failures are described on [`upload::upload_blocks`].
pub async fn import_markdown(
    markdown: &str,
    page_id: &str,
    config: &UploadConfig,
) -> Result<ImportOutput, ImportError> {
    let page = PageId::parse(page_id)?;
    let appender = resolve_appender(config)?;
    let doc = prepare(markdown);
    upload_prepared(appender.as_ref(), &page, doc, config).await
}

/// Read a Markdown file and import it into the Notion page `page_id`.
///
/// # Example
/// ```rust,no_run
/// use md2notion::{import_file, UploadConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // token read from NOTION_TOKEN
/// let config = UploadConfig::builder().skip_bad_blocks(true).build()?;
/// let output = import_file("notes.md", "0123456789abcdef0123456789abcdef", &config).await?;
/// eprintln!("appended {} blocks", output.upload.appended);
/// # Ok(())
/// # }
/// ```
pub async fn import_file(
    path: impl AsRef<Path>,
    page_id: &str,
    config: &UploadConfig,
) -> Result<ImportOutput, ImportError> {
    let page = PageId::parse(page_id)?;
    let appender = resolve_appender(config)?;
    let doc = prepare_file(path)?;
    upload_prepared(appender.as_ref(), &page, doc, config).await
}

/// Synchronous wrapper around [`import_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn import_file_sync(
    path: impl AsRef<Path>,
    page_id: &str,
    config: &UploadConfig,
) -> Result<ImportOutput, ImportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ImportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(import_file(path, page_id, config))
}

/// Upload an already prepared document.
pub async fn upload_prepared(
    appender: &dyn BlockAppender,
    page: &PageId,
    doc: PreparedDocument,
    config: &UploadConfig,
) -> Result<ImportOutput, ImportError> {
    if !doc.sanitize.remaining_issues.is_empty() {
        warn!(
            "{} limit issues remain; Notion may reject the affected blocks",
            doc.sanitize.remaining_issues.len()
        );
    }
    let report = upload::upload_blocks(appender, page.as_str(), &doc.blocks, config).await?;
    info!(
        "Import complete: {} appended, {} skipped, next offset {}",
        report.appended,
        report.skipped.len(),
        report.end_offset()
    );

    Ok(ImportOutput {
        conversion_issues: doc.conversion_issues,
        sanitize: doc.sanitize,
        upload: report,
    })
}

/// Read the integration token from environment variable `var`.
pub fn token_from_env(var: &str) -> Result<String, ImportError> {
    match std::env::var(var) {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(ImportError::MissingCredential {
            var: var.to_string(),
        }),
    }
}

/// Pick the appender: a pre-built one from the config, or an HTTP client
/// authenticated with the token in `config.token_env`.
pub fn resolve_appender(config: &UploadConfig) -> Result<Arc<dyn BlockAppender>, ImportError> {
    if let Some(ref appender) = config.appender {
        return Ok(Arc::clone(appender));
    }
    let token = token_from_env(&config.token_env)?;
    Ok(Arc::new(NotionClient::new(token, config)?))
}
