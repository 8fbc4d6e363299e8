//! # md2notion
//!
//! Import Markdown documents into Notion pages as native blocks.
//!
//! ## Why this crate?
//!
//! Notion's own Markdown import mangles display math, silently truncates long
//! paragraphs and gives up on large documents. The API route has its own
//! traps: at most 100 blocks per request, 2000 UTF-16 units per text run,
//! aggressive rate limiting, and validation errors that reject a whole batch
//! for one bad block. This crate converts Markdown to blocks locally, fixes
//! what can be fixed before sending, and uploads in batches that shrink,
//! back off and (optionally) skip single bad blocks until the page is complete.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown file
//!  │
//!  ├─ 1. Input     read UTF-8, parse page id / URL
//!  ├─ 2. Math      $$…$$ onto their own lines
//!  ├─ 3. Convert   pulldown-cmark events → Notion block JSON
//!  ├─ 4. Sanitise  split text runs > 2000 UTF-16 units, re-check limits
//!  └─ 5. Upload    batches of ≤ 100 with retry, shrink and skip
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2notion::{import_file, UploadConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Token read from NOTION_TOKEN
//!     let config = UploadConfig::default();
//!     let output = import_file(
//!         "notes.md",
//!         "https://www.notion.so/Team-Notes-0123456789abcdef0123456789abcdef",
//!         &config,
//!     )
//!     .await?;
//!     eprintln!(
//!         "{} blocks appended, {} skipped",
//!         output.upload.appended,
//!         output.upload.skipped.len()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Resuming
//!
//! An aborted upload reports how far it got. Re-run with
//! [`UploadConfigBuilder::start_offset`] set to that index to append the rest
//! without duplicating what is already on the page.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2notion` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! md2notion = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod import;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{classify_failure, BlockAppender, NotionClient};
pub use config::{UploadConfig, UploadConfigBuilder, DEFAULT_API_BASE, DEFAULT_TOKEN_ENV};
pub use error::{AppendError, ImportError};
pub use import::{
    import_file, import_file_sync, import_markdown, prepare, prepare_file, resolve_appender,
    token_from_env, upload_prepared,
};
pub use output::{ImportOutput, PreparedDocument, SkippedBlock, UploadReport};
pub use pipeline::blocks::{markdown_to_blocks, Conversion};
pub use pipeline::input::PageId;
pub use pipeline::limits::{LimitIssue, LimitKind};
pub use pipeline::math::normalize_display_math;
pub use pipeline::richtext::{sanitize_blocks, SanitizeReport};
pub use pipeline::upload::{upload_blocks, Backoff, RetryPolicy};
pub use progress::{NoopProgressCallback, ProgressCallback, UploadProgressCallback};
