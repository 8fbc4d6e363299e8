//! Result types returned by the import pipeline.

use crate::pipeline::limits::LimitIssue;
use crate::pipeline::richtext::SanitizeReport;
use serde::Serialize;
use serde_json::Value;

/// A Markdown document converted and sanitised, ready for upload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PreparedDocument {
    /// Top-level Notion block records, in document order.
    pub blocks: Vec<Value>,
    /// Limit violations present in the converter's raw output.
    pub conversion_issues: Vec<LimitIssue>,
    /// What the rich-text sanitizer changed and what it could not fix.
    pub sanitize: SanitizeReport,
}

/// One block the uploader gave up on and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedBlock {
    /// Index in the full block sequence.
    pub index: usize,
    /// Notion block type, e.g. `"equation"`.
    pub block_type: String,
    /// The API's error message for the rejected request.
    pub reason: String,
}

/// Outcome of a completed upload.
///
/// On success `appended + skipped.len() == total_blocks - start_offset`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    /// Length of the whole block sequence.
    pub total_blocks: usize,
    /// Index the upload started from (after clamping).
    pub start_offset: usize,
    /// Blocks Notion accepted.
    pub appended: usize,
    /// Blocks dropped on the skip path, in order.
    pub skipped: Vec<SkippedBlock>,
    /// Append requests sent, including failed ones.
    pub requests: usize,
    /// Retries taken across all batch positions.
    pub retries: u32,
    /// Final batch size after any shrinking.
    pub final_batch_size: usize,
    /// Wall-clock time for the upload loop.
    pub duration_ms: u64,
}

impl UploadReport {
    /// Index one past the last block that was appended or skipped.
    pub fn end_offset(&self) -> usize {
        self.start_offset + self.appended + self.skipped.len()
    }
}

/// Everything [`crate::import::import_file`] produced.
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutput {
    pub conversion_issues: Vec<LimitIssue>,
    pub sanitize: SanitizeReport,
    pub upload: UploadReport,
}
