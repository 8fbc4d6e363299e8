//! Notion request limits and a scanner that reports violations.
//!
//! The converter runs the scanner on its output, and the sanitizer runs it
//! again afterwards to confirm nothing over-limit is left. Violations are
//! diagnostics, never errors: Notion is the final judge, and the uploader's
//! shrink/skip policy deals with whatever it still rejects.
//!
//! The walk is a plain recursive descent over `serde_json::Value`; it knows
//! field names, not block types, so new block types need no changes here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Maximum blocks in one `children` array of an append request.
pub const MAX_BLOCKS_PER_REQUEST: usize = 100;

/// Maximum `text.content` length of one rich-text run, in UTF-16 code units.
pub const RICH_TEXT_CONTENT_LIMIT: usize = 2000;

/// Maximum runs in one `rich_text` array.
pub const RICH_TEXT_ITEMS_LIMIT: usize = 100;

/// Maximum length of an equation expression.
pub const EQUATION_EXPRESSION_LIMIT: usize = 1000;

/// Maximum length of any URL.
pub const URL_LIMIT: usize = 2000;

/// Levels of `children` allowed below a top-level block in one request.
pub const MAX_NESTING_DEPTH: usize = 2;

/// Length of `s` as Notion measures it: UTF-16 code units.
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Which Notion limit was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    TextContent,
    RichTextItems,
    EquationExpression,
    Url,
    Children,
    NestingDepth,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LimitKind::TextContent => "rich text content",
            LimitKind::RichTextItems => "rich text array",
            LimitKind::EquationExpression => "equation expression",
            LimitKind::Url => "url",
            LimitKind::Children => "children array",
            LimitKind::NestingDepth => "nesting depth",
        };
        f.write_str(s)
    }
}

/// One limit violation found in a block sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitIssue {
    /// Index of the top-level block containing the violation.
    pub block_index: usize,
    /// JSON path from the top-level block, e.g. `[3].paragraph.rich_text[0].text.content`.
    pub path: String,
    pub kind: LimitKind,
    pub actual: usize,
    pub limit: usize,
}

impl fmt::Display for LimitIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block {}: {} is {} (limit {}) at {}",
            self.block_index, self.kind, self.actual, self.limit, self.path
        )
    }
}

/// Scan a block sequence and report every limit violation, in document order.
pub fn scan(blocks: &[Value]) -> Vec<LimitIssue> {
    let mut issues = Vec::new();
    for (i, block) in blocks.iter().enumerate() {
        visit(block, &format!("[{i}]"), i, 0, &mut issues);
    }
    issues
}

fn visit(value: &Value, path: &str, block_index: usize, depth: usize, out: &mut Vec<LimitIssue>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = format!("{path}.{key}");
                let mut report = |kind, actual, limit| {
                    if actual > limit {
                        out.push(LimitIssue {
                            block_index,
                            path: child_path.clone(),
                            kind,
                            actual,
                            limit,
                        });
                    }
                };
                match (key.as_str(), child) {
                    ("content", Value::String(s)) => {
                        report(LimitKind::TextContent, utf16_len(s), RICH_TEXT_CONTENT_LIMIT)
                    }
                    ("expression", Value::String(s)) => report(
                        LimitKind::EquationExpression,
                        utf16_len(s),
                        EQUATION_EXPRESSION_LIMIT,
                    ),
                    ("url", Value::String(s)) => report(LimitKind::Url, utf16_len(s), URL_LIMIT),
                    ("rich_text", Value::Array(items)) => {
                        report(LimitKind::RichTextItems, items.len(), RICH_TEXT_ITEMS_LIMIT)
                    }
                    ("children", Value::Array(items)) => {
                        report(LimitKind::Children, items.len(), MAX_BLOCKS_PER_REQUEST);
                        if depth >= MAX_NESTING_DEPTH && !items.is_empty() {
                            report(LimitKind::NestingDepth, depth + 1, MAX_NESTING_DEPTH);
                        }
                    }
                    _ => {}
                }
                let child_depth = if key == "children" { depth + 1 } else { depth };
                visit(child, &child_path, block_index, child_depth, out);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                visit(item, &format!("{path}[{i}]"), block_index, depth, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paragraph(content: &str) -> Value {
        json!({
            "object": "block",
            "type": "paragraph",
            "paragraph": {
                "rich_text": [{ "type": "text", "text": { "content": content, "link": null } }]
            }
        })
    }

    #[test]
    fn utf16_counts_surrogate_pairs_twice() {
        assert_eq!(utf16_len("abc"), 3);
        assert_eq!(utf16_len("é"), 1);
        assert_eq!(utf16_len("😀"), 2);
    }

    #[test]
    fn clean_blocks_have_no_issues() {
        assert!(scan(&[paragraph("hello"), paragraph("world")]).is_empty());
    }

    #[test]
    fn long_text_is_reported_with_path() {
        let long = "x".repeat(2001);
        let issues = scan(&[paragraph("ok"), paragraph(&long)]);
        assert_eq!(issues.len(), 1);
        let issue = &issues[0];
        assert_eq!(issue.block_index, 1);
        assert_eq!(issue.kind, LimitKind::TextContent);
        assert_eq!(issue.actual, 2001);
        assert_eq!(issue.path, "[1].paragraph.rich_text[0].text.content");
    }

    #[test]
    fn text_at_limit_is_fine() {
        assert!(scan(&[paragraph(&"x".repeat(2000))]).is_empty());
    }

    #[test]
    fn long_equation_is_reported() {
        let block = json!({
            "type": "equation",
            "equation": { "expression": "a".repeat(1001) }
        });
        let issues = scan(&[block]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, LimitKind::EquationExpression);
    }

    #[test]
    fn too_many_children_is_reported() {
        let children: Vec<Value> = (0..101).map(|_| paragraph("c")).collect();
        let block = json!({
            "type": "toggle",
            "toggle": { "rich_text": [], "children": children }
        });
        let issues = scan(&[block]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, LimitKind::Children);
        assert_eq!(issues[0].actual, 101);
    }

    #[test]
    fn third_level_of_nesting_is_reported() {
        let leaf = paragraph("leaf");
        let level2 = json!({ "type": "bulleted_list_item",
            "bulleted_list_item": { "rich_text": [], "children": [leaf] } });
        let level1 = json!({ "type": "bulleted_list_item",
            "bulleted_list_item": { "rich_text": [], "children": [level2] } });
        let top = json!({ "type": "bulleted_list_item",
            "bulleted_list_item": { "rich_text": [], "children": [level1] } });

        let issues = scan(&[top]);
        assert_eq!(issues.len(), 1, "{issues:?}");
        assert_eq!(issues[0].kind, LimitKind::NestingDepth);
    }

    #[test]
    fn two_levels_of_nesting_are_allowed() {
        let level1 = json!({ "type": "bulleted_list_item",
            "bulleted_list_item": { "rich_text": [], "children": [paragraph("leaf")] } });
        let top = json!({ "type": "bulleted_list_item",
            "bulleted_list_item": { "rich_text": [], "children": [level1] } });
        assert!(scan(&[top]).is_empty());
    }
}
