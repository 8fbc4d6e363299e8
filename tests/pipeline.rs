//! Integration tests for md2notion.
//!
//! Drive the whole pipeline (file → prepare → upload) against an in-memory
//! appender that records every request and can be scripted to fail. No
//! network or token is needed; backoff sleeps run on tokio's paused clock.

use async_trait::async_trait;
use md2notion::{
    import_file, import_file_sync, import_markdown, prepare, AppendError, BlockAppender,
    ImportError, LimitKind, UploadConfig,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

const PAGE_URL: &str = "https://www.notion.so/acme/Imported-0123456789abcdef0123456789abcdef?pvs=4";
const PAGE_UUID: &str = "01234567-89ab-cdef-0123-456789abcdef";

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Records every append request; pops scripted failures before succeeding.
#[derive(Default)]
struct RecordingAppender {
    requests: Mutex<Vec<(String, Vec<Value>)>>,
    failures: Mutex<VecDeque<AppendError>>,
}

impl RecordingAppender {
    fn failing_with(errors: impl IntoIterator<Item = AppendError>) -> Self {
        Self {
            failures: Mutex::new(errors.into_iter().collect()),
            ..Default::default()
        }
    }

    fn requests(&self) -> Vec<(String, Vec<Value>)> {
        self.requests.lock().unwrap().clone()
    }

    /// Blocks from requests that succeeded, in upload order.
    fn accepted(&self, failed_requests: &[usize]) -> Vec<Value> {
        self.requests()
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !failed_requests.contains(i))
            .flat_map(|(_, (_, blocks))| blocks)
            .collect()
    }
}

#[async_trait]
impl BlockAppender for RecordingAppender {
    async fn append_children(&self, block_id: &str, children: &[Value]) -> Result<(), AppendError> {
        self.requests
            .lock()
            .unwrap()
            .push((block_id.to_string(), children.to_vec()));
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn config_with(appender: Arc<RecordingAppender>) -> md2notion::UploadConfigBuilder {
    UploadConfig::builder()
        .pacing_delay_ms(0)
        .appender(appender)
}

fn markdown_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// A document with `n` top-level paragraphs.
fn paragraphs(n: usize) -> String {
    (0..n).map(|i| format!("Paragraph number {i}.\n\n")).collect()
}

fn block_types(blocks: &[Value]) -> Vec<&str> {
    blocks.iter().map(|b| b["type"].as_str().unwrap()).collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn imports_file_in_batches_to_canonical_page_id() {
    let file = markdown_file(&paragraphs(137));
    let appender = Arc::new(RecordingAppender::default());
    let config = config_with(appender.clone()).batch_size(50).build().unwrap();

    let output = import_file(file.path(), PAGE_URL, &config).await.unwrap();

    let requests = appender.requests();
    let sizes: Vec<usize> = requests.iter().map(|(_, b)| b.len()).collect();
    assert_eq!(sizes, [50, 50, 37]);
    assert!(requests.iter().all(|(id, _)| id == PAGE_UUID));
    assert_eq!(output.upload.appended, 137);
    assert_eq!(output.upload.total_blocks, 137);

    // order preserved end to end
    let accepted = appender.accepted(&[]);
    assert_eq!(
        accepted[136]["paragraph"]["rich_text"][0]["text"]["content"],
        "Paragraph number 136."
    );
}

#[tokio::test(start_paused = true)]
async fn mixed_document_converts_to_expected_blocks() {
    let md = "\
# Notes

Intro with **bold** and a [link](https://example.org).
$$ \\int_0^1 x\\,dx = \\tfrac12 $$
- [ ] todo
- item
  1. nested

> [!TIP]
> Use the CLI.

```python
print('hi')
```

---

| a | b |
|---|---|
| 1 | 2 |
";
    let appender = Arc::new(RecordingAppender::default());
    let config = config_with(appender.clone()).build().unwrap();

    import_markdown(md, PAGE_UUID, &config).await.unwrap();

    let blocks = appender.accepted(&[]);
    assert_eq!(
        block_types(&blocks),
        [
            "heading_1",
            "paragraph",
            "equation",
            "to_do",
            "bulleted_list_item",
            "callout",
            "code",
            "divider",
            "table",
        ]
    );
    assert_eq!(blocks[2]["equation"]["expression"], "\\int_0^1 x\\,dx = \\tfrac12");
    assert_eq!(blocks[6]["code"]["language"], "python");
    let nested = &blocks[4]["bulleted_list_item"]["children"][0];
    assert_eq!(nested["type"], "numbered_list_item");
}

#[tokio::test(start_paused = true)]
async fn long_paragraph_is_split_before_upload() {
    let md = format!("{}\n", "lorem ipsum ".repeat(500));
    let appender = Arc::new(RecordingAppender::default());
    let config = config_with(appender.clone()).build().unwrap();

    let output = import_markdown(&md, PAGE_UUID, &config).await.unwrap();
    assert_eq!(output.conversion_issues.len(), 1);
    assert_eq!(output.sanitize.runs_split, 1);
    assert!(output.sanitize.remaining_issues.is_empty());

    let blocks = appender.accepted(&[]);
    let runs = blocks[0]["paragraph"]["rich_text"].as_array().unwrap();
    assert!(runs.len() >= 3);
    let rejoined: String = runs
        .iter()
        .map(|r| r["text"]["content"].as_str().unwrap())
        .collect();
    assert_eq!(rejoined, md.trim_end());
}

#[tokio::test(start_paused = true)]
async fn rate_limit_then_success_appends_everything_once() {
    let file = markdown_file(&paragraphs(20));
    let appender = Arc::new(RecordingAppender::failing_with([AppendError::RateLimited {
        retry_after_secs: Some(2),
    }]));
    let config = config_with(appender.clone()).batch_size(8).build().unwrap();

    let output = import_file(file.path(), PAGE_UUID, &config).await.unwrap();

    let requests = appender.requests();
    assert_eq!(requests[0].1, requests[1].1, "same batch retried");
    assert_eq!(appender.accepted(&[0]).len(), 20);
    assert_eq!(output.upload.appended, 20);
    assert_eq!(output.upload.retries, 1);
}

#[tokio::test(start_paused = true)]
async fn resume_from_start_offset() {
    let file = markdown_file(&paragraphs(30));
    let appender = Arc::new(RecordingAppender::default());
    let config = config_with(appender.clone())
        .batch_size(50)
        .start_offset(25)
        .build()
        .unwrap();

    let output = import_file(file.path(), PAGE_UUID, &config).await.unwrap();

    let accepted = appender.accepted(&[]);
    assert_eq!(accepted.len(), 5);
    assert_eq!(
        accepted[0]["paragraph"]["rich_text"][0]["text"]["content"],
        "Paragraph number 25."
    );
    assert_eq!(
        output.upload.appended + output.upload.skipped.len(),
        output.upload.total_blocks - output.upload.start_offset
    );
}

#[tokio::test(start_paused = true)]
async fn bad_single_block_is_skipped_when_allowed() {
    let file = markdown_file(&paragraphs(2));
    let payload = || AppendError::Payload {
        status: 400,
        code: "validation_error".into(),
        message: "body failed validation".into(),
    };
    // batch of 2 rejected, then block 0 rejected on its own
    let appender = Arc::new(RecordingAppender::failing_with([payload(), payload()]));
    let config = config_with(appender.clone())
        .skip_bad_blocks(true)
        .build()
        .unwrap();

    let output = import_file(file.path(), PAGE_UUID, &config).await.unwrap();

    assert_eq!(output.upload.appended, 1);
    assert_eq!(output.upload.skipped.len(), 1);
    assert_eq!(output.upload.skipped[0].index, 0);
    assert_eq!(output.upload.skipped[0].block_type, "paragraph");
    assert_eq!(output.upload.end_offset(), 2);
}

#[tokio::test(start_paused = true)]
async fn unclassified_api_error_aborts_with_offset() {
    let file = markdown_file(&paragraphs(3));
    let appender = Arc::new(RecordingAppender::failing_with([AppendError::Api {
        status: 403,
        code: "restricted_resource".into(),
        message: "Integration has no access".into(),
    }]));
    let config = config_with(appender.clone()).build().unwrap();

    let err = import_file(file.path(), PAGE_UUID, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Api { offset: 0, .. }), "{err:?}");
    assert_eq!(appender.requests().len(), 1);
}

#[tokio::test]
async fn missing_file_fails_before_upload() {
    let appender = Arc::new(RecordingAppender::default());
    let config = config_with(appender.clone()).build().unwrap();

    let err = import_file("/no/such/file.md", PAGE_UUID, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::FileNotFound { .. }));
    assert!(appender.requests().is_empty());
}

#[tokio::test]
async fn missing_token_fails_before_reading() {
    let config = UploadConfig::builder()
        .token_env("MD2NOTION_INTEGRATION_TEST_UNSET_TOKEN")
        .build()
        .unwrap();
    let err = import_file("/no/such/file.md", PAGE_UUID, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::MissingCredential { .. }), "{err:?}");
}

#[test]
fn prepare_keeps_fenced_dollars_verbatim() {
    let doc = prepare("```\n$$x$$\n```\n");
    assert_eq!(block_types(&doc.blocks), ["code"]);
    assert_eq!(
        doc.blocks[0]["code"]["rich_text"][0]["text"]["content"],
        "$$x$$"
    );
}

#[test]
fn sync_import_uses_injected_appender() {
    let file = markdown_file(&paragraphs(7));
    let appender = Arc::new(RecordingAppender::default());
    let config = config_with(appender.clone()).batch_size(3).build().unwrap();

    let output = import_file_sync(file.path(), PAGE_URL, &config).unwrap();

    let sizes: Vec<usize> = appender.requests().iter().map(|(_, b)| b.len()).collect();
    assert_eq!(sizes, [3, 3, 1]);
    assert_eq!(output.upload.appended, 7);
    assert_eq!(output.upload.end_offset(), 7);
}

#[test]
fn deeply_nested_list_fits_notion_depth() {
    let doc = prepare("- a\n  - b\n    - c\n      - d\n");
    assert!(
        !doc.sanitize
            .remaining_issues
            .iter()
            .any(|i| i.kind == LimitKind::NestingDepth),
        "{:?}",
        doc.sanitize.remaining_issues
    );

    let json = serde_json::to_string(&doc.blocks).unwrap();
    for item in ["\"a\"", "\"b\"", "\"c\"", "\"d\""] {
        assert!(json.contains(item), "{item} missing from {json}");
    }
}

#[test]
fn long_table_cell_is_split() {
    let md = format!("| a | b |\n|---|---|\n| {} | short |\n", "w".repeat(2500));
    let doc = prepare(&md);
    assert_eq!(doc.sanitize.runs_split, 1);
    assert!(doc.sanitize.remaining_issues.is_empty(), "{:?}", doc.sanitize.remaining_issues);

    let cell = &doc.blocks[0]["table"]["children"][1]["table_row"]["cells"][0];
    assert_eq!(cell.as_array().unwrap().len(), 2);
}
