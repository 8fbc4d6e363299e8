//! Display-math normalisation: make every `$$…$$` span a standalone block.
//!
//! Markdown converters only recognise display math as an equation block when
//! the `$$` delimiters sit on their own lines and the span is separated from
//! surrounding paragraphs. Authors routinely write `$$ E = mc^2 $$` on one line
//! or glue the span to the preceding sentence; both end up as inline text.
//!
//! This pass rewrites those forms line by line:
//!
//! ```text
//! Some text            Some text
//! $$ a+b $$     ──▶
//! More text            $$
//!                      a+b
//!                      $$
//!
//!                      More text
//! ```
//!
//! Indentation is preserved so math inside list items stays inside the item.
//! Fenced code blocks (```` ``` ```` or `~~~`) pass through untouched.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*)(```|~~~)").unwrap());

static RE_SINGLE_LINE_MATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)\$\$(.+?)\$\$\s*$").unwrap());

static RE_MATH_DELIMITER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*)\$\$\s*$").unwrap());

/// Rewrite display math into multi-line `$$` blocks separated by blank lines.
///
/// Never fails: an unterminated `$$` span is copied through unchanged.
pub fn normalize_display_math(input: &str) -> String {
    let lines: Vec<&str> = input.split_inclusive('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 8);

    let mut fence: Option<&str> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let body = strip_line_ending(line);

        if let Some(caps) = RE_FENCE.captures(body) {
            let marker = caps.get(2).map_or("", |m| m.as_str());
            match fence {
                None => fence = Some(marker),
                Some(open) if open == marker => fence = None,
                Some(_) => {}
            }
            out.push(line.to_string());
            i += 1;
            continue;
        }

        if fence.is_some() {
            out.push(line.to_string());
            i += 1;
            continue;
        }

        if let Some(caps) = RE_SINGLE_LINE_MATH.captures(body) {
            let indent = &caps[1];
            let expr = caps[2].trim();
            if !expr.is_empty() {
                ensure_blank_before(&mut out, indent);
                out.push(format!("{indent}$$\n"));
                out.push(format!("{indent}{expr}\n"));
                out.push(format!("{indent}$$\n"));
                if lines.get(i + 1).is_some_and(|next| !is_blank(next)) {
                    out.push(format!("{indent}\n"));
                }
                i += 1;
                continue;
            }
        }

        if let Some(caps) = RE_MATH_DELIMITER.captures(body) {
            let indent = caps[1].to_string();
            ensure_blank_before(&mut out, &indent);

            out.push(line.to_string());
            i += 1;
            while i < lines.len() {
                let inner = lines[i];
                out.push(inner.to_string());
                i += 1;
                if RE_MATH_DELIMITER.is_match(strip_line_ending(inner)) {
                    if lines.get(i).is_some_and(|next| !is_blank(next)) {
                        out.push(format!("{indent}\n"));
                    }
                    break;
                }
            }
            continue;
        }

        out.push(line.to_string());
        i += 1;
    }

    out.concat()
}

fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn ensure_blank_before(out: &mut Vec<String>, indent: &str) {
    // Only the final input line can lack a terminator, so `prev` always ends in '\n'.
    if out.last().is_some_and(|prev| !is_blank(prev)) {
        out.push(format!("{indent}\n"));
    }
}
