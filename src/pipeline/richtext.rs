//! Rich-text sanitising: split text runs that exceed Notion's length limit.
//!
//! Notion rejects any block whose `text.content` is longer than 2000 UTF-16
//! code units. Long paragraphs and code blocks hit this constantly. Instead of
//! truncating, every over-long run is split into several consecutive runs that
//! carry the same annotations and link, so the rendered page is identical.
//!
//! Blocks nest arbitrarily (toggles, callouts, list items with children), so the
//! walk descends into every object and array looking for rich-text arrays:
//! `rich_text` fields, image `caption`s and the per-cell arrays of `table_row`.

use crate::pipeline::limits::{self, utf16_len, LimitIssue, RICH_TEXT_CONTENT_LIMIT};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Outcome of [`sanitize_blocks`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SanitizeReport {
    /// Runs that were longer than the limit.
    pub runs_split: usize,
    /// Runs emitted in their place.
    pub chunks_created: usize,
    /// Limit violations still present after sanitising.
    pub remaining_issues: Vec<LimitIssue>,
}

/// Split every over-long text run in `blocks`, in place, then re-scan.
pub fn sanitize_blocks(blocks: &mut [Value]) -> SanitizeReport {
    sanitize_blocks_with_limit(blocks, RICH_TEXT_CONTENT_LIMIT)
}

/// [`sanitize_blocks`] with an explicit limit in UTF-16 code units.
pub fn sanitize_blocks_with_limit(blocks: &mut [Value], limit: usize) -> SanitizeReport {
    let mut report = SanitizeReport::default();
    for block in blocks.iter_mut() {
        sanitize_value(block, limit, &mut report);
    }
    if report.runs_split > 0 {
        debug!(
            "Split {} over-long rich text runs into {} runs",
            report.runs_split, report.chunks_created
        );
    }

    report.remaining_issues = limits::scan(blocks);
    for issue in &report.remaining_issues {
        warn!("Still over a Notion limit after sanitising: {}", issue);
    }
    report
}

fn sanitize_value(value: &mut Value, limit: usize, report: &mut SanitizeReport) {
    match value {
        Value::Object(map) => {
            for key in ["rich_text", "caption"] {
                if let Some(Value::Array(runs)) = map.get_mut(key) {
                    split_runs(runs, limit, report);
                }
            }
            // table_row cells: one rich-text array per cell
            if let Some(Value::Array(cells)) = map.get_mut("cells") {
                for cell in cells {
                    if let Value::Array(runs) = cell {
                        split_runs(runs, limit, report);
                    }
                }
            }
            for child in map.values_mut() {
                sanitize_value(child, limit, report);
            }
        }
        Value::Array(items) => {
            for item in items {
                sanitize_value(item, limit, report);
            }
        }
        _ => {}
    }
}

/// Replace every over-long run in one rich-text array with its chunks.
fn split_runs(runs: &mut Vec<Value>, limit: usize, report: &mut SanitizeReport) {
    if !runs.iter().any(|run| needs_split(run, limit)) {
        return;
    }
    let original = std::mem::take(runs);
    for run in original {
        if needs_split(&run, limit) {
            let pieces = split_run(&run, limit);
            report.runs_split += 1;
            report.chunks_created += pieces.len();
            runs.extend(pieces);
        } else {
            runs.push(run);
        }
    }
}

fn text_content(run: &Value) -> Option<&str> {
    if run.get("type").and_then(Value::as_str) != Some("text") {
        return None;
    }
    run.get("text")?.get("content")?.as_str()
}

fn needs_split(run: &Value, limit: usize) -> bool {
    text_content(run).is_some_and(|s| utf16_len(s) > limit)
}

/// Clone `run` once per chunk, replacing only the text content.
fn split_run(run: &Value, limit: usize) -> Vec<Value> {
    let content = text_content(run).unwrap_or_default();
    split_text(content, limit)
        .into_iter()
        .map(|chunk| {
            let mut piece = run.clone();
            if let Some(text) = piece.get_mut("text").and_then(Value::as_object_mut) {
                text.insert("content".into(), Value::String(chunk.to_string()));
            }
            if let Some(plain) = piece.get_mut("plain_text") {
                *plain = Value::String(chunk.to_string());
            }
            piece
        })
        .collect()
}

/// Split `s` into chunks of at most `limit` UTF-16 code units.
///
/// A chunk ends just after the last newline in the window when that newline
/// sits at 60% of the limit or later; otherwise it ends at the hard boundary.
/// Characters are never split, and the chunks concatenate back to `s`.
pub fn split_text(s: &str, limit: usize) -> Vec<&str> {
    let min_newline_units = (limit * 3).div_ceil(5);
    let mut chunks = Vec::new();
    let mut rest = s;

    while utf16_len(rest) > limit {
        let mut units = 0;
        let mut hard_cut = 0;
        let mut newline_cut: Option<(usize, usize)> = None;

        for (idx, ch) in rest.char_indices() {
            let width = ch.len_utf16();
            if units + width > limit {
                break;
            }
            units += width;
            hard_cut = idx + ch.len_utf8();
            if ch == '\n' {
                newline_cut = Some((hard_cut, units));
            }
        }

        let mut cut = match newline_cut {
            Some((end, at_units)) if at_units >= min_newline_units => end,
            _ => hard_cut,
        };
        if cut == 0 {
            // limit narrower than one character: emit it alone
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }

        let (head, tail) = rest.split_at(cut);
        chunks.push(head);
        rest = tail;
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_run(content: &str) -> Value {
        json!({
            "type": "text",
            "text": { "content": content, "link": { "url": "https://example.org/" } },
            "annotations": { "bold": true, "italic": false, "strikethrough": false,
                             "underline": false, "code": false, "color": "red" }
        })
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(split_text("hello", 2000), vec!["hello"]);
        assert_eq!(split_text("", 2000), vec![""]);
    }

    #[test]
    fn hard_split_respects_limit_and_round_trips() {
        let s = "a".repeat(4500);
        let chunks = split_text(&s, 2000);
        assert_eq!(chunks.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![2000, 2000, 500]);
        assert_eq!(chunks.concat(), s);
    }

    #[test]
    fn newline_late_in_window_is_preferred() {
        let s = format!("{}\n{}", "a".repeat(1500), "b".repeat(1000));
        let chunks = split_text(&s, 2000);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 1501);
        assert!(chunks[0].ends_with('\n'));
        assert_eq!(chunks.concat(), s);
    }

    #[test]
    fn newline_early_in_window_is_ignored() {
        let s = format!("{}\n{}", "a".repeat(100), "b".repeat(2500));
        let chunks = split_text(&s, 2000);
        assert_eq!(chunks[0].len(), 2000);
        assert_eq!(chunks.concat(), s);
    }

    #[test]
    fn newline_exactly_at_sixty_percent_is_used() {
        // newline is unit number 1200 of the window
        let s = format!("{}\n{}", "a".repeat(1199), "b".repeat(1500));
        let chunks = split_text(&s, 2000);
        assert_eq!(utf16_len(chunks[0]), 1200);
    }

    #[test]
    fn surrogate_pairs_are_never_split() {
        // 1999 units of ASCII, then an emoji that would straddle the boundary
        let s = format!("{}😀{}", "a".repeat(1999), "b".repeat(10));
        let chunks = split_text(&s, 2000);
        assert_eq!(utf16_len(chunks[0]), 1999);
        assert!(chunks[1].starts_with('😀'));
        assert_eq!(chunks.concat(), s);
    }

    #[test]
    fn every_chunk_fits_for_mixed_text() {
        let unit = "héllo wörld 😀 日本語\n";
        let s = unit.repeat(400);
        for limit in [7, 64, 2000] {
            let chunks = split_text(&s, limit);
            assert!(chunks.iter().all(|c| utf16_len(c) <= limit), "limit {limit}");
            assert_eq!(chunks.concat(), s);
        }
    }

    #[test]
    fn long_run_is_split_with_annotations_copied() {
        let long = "x".repeat(4001);
        let mut blocks = vec![json!({
            "object": "block",
            "type": "paragraph",
            "paragraph": { "rich_text": [text_run("intro "), text_run(&long)] }
        })];

        let report = sanitize_blocks(&mut blocks);
        assert_eq!(report.runs_split, 1);
        assert_eq!(report.chunks_created, 3);
        assert!(report.remaining_issues.is_empty());

        let runs = blocks[0]["paragraph"]["rich_text"].as_array().unwrap();
        assert_eq!(runs.len(), 4);
        assert_eq!(runs[0]["text"]["content"], "intro ");
        let rejoined: String = runs[1..]
            .iter()
            .map(|r| r["text"]["content"].as_str().unwrap())
            .collect();
        assert_eq!(rejoined, long);
        for run in &runs[1..] {
            assert_eq!(run["annotations"]["bold"], true);
            assert_eq!(run["annotations"]["color"], "red");
            assert_eq!(run["text"]["link"]["url"], "https://example.org/");
        }
    }

    #[test]
    fn short_runs_are_untouched() {
        let original = vec![json!({
            "type": "heading_1",
            "heading_1": { "rich_text": [text_run("Title")] }
        })];
        let mut blocks = original.clone();
        let report = sanitize_blocks(&mut blocks);
        assert_eq!(report.runs_split, 0);
        assert_eq!(blocks, original);
    }

    #[test]
    fn nested_children_are_sanitised() {
        let long = "y".repeat(2500);
        let mut blocks = vec![json!({
            "type": "callout",
            "callout": {
                "rich_text": [],
                "children": [{
                    "type": "bulleted_list_item",
                    "bulleted_list_item": {
                        "rich_text": [],
                        "children": [{ "type": "code",
                                       "code": { "rich_text": [text_run(&long)], "language": "rust" } }]
                    }
                }]
            }
        })];

        let report = sanitize_blocks(&mut blocks);
        assert_eq!(report.runs_split, 1);
        let code = &blocks[0]["callout"]["children"][0]["bulleted_list_item"]["children"][0];
        assert_eq!(code["code"]["rich_text"].as_array().unwrap().len(), 2);
        assert_eq!(code["code"]["language"], "rust");
    }

    #[test]
    fn table_cells_and_captions_are_sanitised() {
        let long = "c".repeat(2500);
        let mut blocks = vec![
            json!({
                "type": "table",
                "table": {
                    "table_width": 2,
                    "children": [{
                        "type": "table_row",
                        "table_row": { "cells": [[text_run(&long)], [text_run("short")]] }
                    }]
                }
            }),
            json!({
                "type": "image",
                "image": { "type": "external", "external": { "url": "https://example.org/a.png" },
                           "caption": [text_run(&long)] }
            }),
        ];

        let report = sanitize_blocks(&mut blocks);
        assert_eq!(report.runs_split, 2);
        assert!(report.remaining_issues.is_empty(), "{:?}", report.remaining_issues);

        let cells = &blocks[0]["table"]["children"][0]["table_row"]["cells"];
        let first: String = cells[0]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["text"]["content"].as_str().unwrap())
            .collect();
        assert_eq!(first, long);
        assert_eq!(cells[1].as_array().unwrap().len(), 1);
        assert_eq!(blocks[1]["image"]["caption"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn equation_runs_are_not_split() {
        let mut blocks = vec![json!({
            "type": "paragraph",
            "paragraph": { "rich_text": [{ "type": "equation",
                                           "equation": { "expression": "z".repeat(2500) } }] }
        })];
        let report = sanitize_blocks(&mut blocks);
        assert_eq!(report.runs_split, 0);
        // over the equation limit, reported but left alone
        assert_eq!(report.remaining_issues.len(), 1);
        assert_eq!(
            report.remaining_issues[0].kind,
            limits::LimitKind::EquationExpression
        );
    }

    #[test]
    fn plain_text_mirror_is_kept_in_sync() {
        let long = "p".repeat(2100);
        let mut run = text_run(&long);
        run["plain_text"] = json!(long);
        let mut blocks = vec![json!({ "type": "quote", "quote": { "rich_text": [run] } })];

        sanitize_blocks(&mut blocks);
        for piece in blocks[0]["quote"]["rich_text"].as_array().unwrap() {
            assert_eq!(piece["plain_text"], piece["text"]["content"]);
        }
    }
}
