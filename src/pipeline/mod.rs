//! Pipeline stages for Markdown-to-Notion import.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable; only the last
//! one touches the network.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ math ──▶ blocks ──▶ richtext ──▶ upload
//! (file)  (normalise) (convert) (split runs) (batched append)
//!                        │           │
//!                        └─ limits ──┘  (diagnostics)
//! ```
//!
//! 1. [`input`]: read the Markdown file, parse the target page id
//! 2. [`math`]: put display math on its own lines so it converts to
//!    equation blocks
//! 3. [`blocks`]: Markdown → Notion block records
//! 4. [`limits`]: Notion's request limits and a scanner that reports
//!    violations without failing
//! 5. [`richtext`]: split text runs over 2000 UTF-16 units
//! 6. [`upload`]: append in batches of ≤ 100 with rate-limit, payload and
//!    timeout recovery

pub mod blocks;
pub mod input;
pub mod limits;
pub mod math;
pub mod richtext;
pub mod upload;
