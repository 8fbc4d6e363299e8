//! Markdown → Notion block conversion.
//!
//! Drives a `pulldown-cmark` event stream through a stack of open frames.
//! Every block-level `Start` event pushes a frame and every block-level `End`
//! pops one, so the frame stack mirrors the document tree at all times.
//! Inline events (text, emphasis, links, math) accumulate as rich-text runs on
//! whichever frame is on top.
//!
//! ## Mapping
//!
//! | Markdown                    | Notion block                       |
//! |-----------------------------|------------------------------------|
//! | paragraph                   | `paragraph`                        |
//! | `#`, `##`, `###`–`######`   | `heading_1`, `heading_2`, `heading_3` |
//! | `-` / `1.` items            | `bulleted_list_item` / `numbered_list_item` |
//! | `- [ ]` / `- [x]`           | `to_do`                            |
//! | `>` quote                   | `quote`                            |
//! | `> [!NOTE]` etc.            | `callout` with icon                |
//! | fenced / indented code      | `code`                             |
//! | `---`                       | `divider`                          |
//! | GFM table                   | `table` + `table_row`              |
//! | paragraph of only `$$…$$`   | `equation`                         |
//! | `![alt](https://…)`         | `image` (external)                 |
//!
//! Nested list items and quote contents become `children` of their parent.
//! Notion accepts two levels of `children` per request, so anything deeper is
//! hoisted to sit after its deepest allowed ancestor.
//! Limit violations are not fixed here; they are reported alongside the blocks.

use crate::pipeline::limits::{self, LimitIssue, MAX_NESTING_DEPTH};
use pulldown_cmark::{BlockQuoteKind, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde_json::{json, Map, Value};
use tracing::debug;

/// Blocks produced from one Markdown document, plus limit diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Conversion {
    pub blocks: Vec<Value>,
    pub limit_issues: Vec<LimitIssue>,
}

/// Convert Markdown text into Notion block records.
pub fn markdown_to_blocks(markdown: &str) -> Conversion {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_MATH
        | Options::ENABLE_GFM;

    let mut converter = Converter::new();
    for event in Parser::new_ext(markdown, options) {
        converter.handle(event);
    }
    let blocks = limit_nesting(converter.finish(), 0);
    let limit_issues = limits::scan(&blocks);
    debug!(
        "Converted markdown into {} blocks ({} limit issues)",
        blocks.len(),
        limit_issues.len()
    );

    Conversion {
        blocks,
        limit_issues,
    }
}

/// Keep `children` within the depth one append request accepts.
///
/// A block at the deepest allowed level loses its `children`; they follow it
/// as siblings instead, flattened the same way. Table rows stay put since a
/// table cannot exist without them.
fn limit_nesting(blocks: Vec<Value>, depth: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(blocks.len());
    for mut block in blocks {
        let kind = block_type(&block).to_string();
        let children = match block.get_mut(kind.as_str()).and_then(Value::as_object_mut) {
            Some(body) if kind != "table" => match body.remove("children") {
                Some(Value::Array(children)) => children,
                Some(other) => {
                    body.insert("children".into(), other);
                    Vec::new()
                }
                None => Vec::new(),
            },
            _ => Vec::new(),
        };

        if children.is_empty() {
            out.push(block);
        } else if depth < MAX_NESTING_DEPTH {
            let children = limit_nesting(children, depth + 1);
            block[kind.as_str()]["children"] = Value::Array(children);
            out.push(block);
        } else {
            out.push(block);
            out.extend(limit_nesting(children, depth));
        }
    }
    out
}

/// Build a block record: `{"object":"block","type":T,T:body}`.
pub fn block(kind: &str, body: Value) -> Value {
    let mut map = Map::new();
    map.insert("object".into(), Value::from("block"));
    map.insert("type".into(), Value::from(kind));
    map.insert(kind.into(), body);
    Value::Object(map)
}

/// The `type` tag of a block record, or `"unknown"`.
pub fn block_type(block: &Value) -> &str {
    block.get("type").and_then(Value::as_str).unwrap_or("unknown")
}

// ── Rich text runs ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Style {
    bold: bool,
    italic: bool,
    strikethrough: bool,
    code: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Run {
    Text {
        content: String,
        style: Style,
        link: Option<String>,
    },
    Equation {
        expression: String,
        display: bool,
    },
    /// Alt text of an image that also became its own block. Kept inline only
    /// when the paragraph has other content.
    ImageAlt { alt: String, style: Style },
}

impl Run {
    fn is_blank(&self) -> bool {
        matches!(self, Run::Text { content, .. } if content.trim().is_empty())
    }

    fn to_value(&self) -> Value {
        match self {
            Run::Text {
                content,
                style,
                link,
            } => json!({
                "type": "text",
                "text": {
                    "content": content,
                    "link": link.as_ref().map(|url| json!({ "url": url })),
                },
                "annotations": annotations(*style),
            }),
            Run::Equation { expression, .. } => json!({
                "type": "equation",
                "equation": { "expression": expression },
                "annotations": annotations(Style::default()),
            }),
            Run::ImageAlt { alt, style } => Run::Text {
                content: alt.clone(),
                style: *style,
                link: None,
            }
            .to_value(),
        }
    }
}

fn annotations(style: Style) -> Value {
    json!({
        "bold": style.bold,
        "italic": style.italic,
        "strikethrough": style.strikethrough,
        "underline": false,
        "code": style.code,
        "color": "default",
    })
}

fn push_text(runs: &mut Vec<Run>, text: &str, style: Style, link: Option<String>) {
    if text.is_empty() {
        return;
    }
    if let Some(Run::Text {
        content,
        style: last_style,
        link: last_link,
    }) = runs.last_mut()
    {
        if *last_style == style && *last_link == link {
            content.push_str(text);
            return;
        }
    }
    runs.push(Run::Text {
        content: text.to_string(),
        style,
        link,
    });
}

/// Drop image alt runs from a paragraph that holds nothing else, otherwise
/// turn them into plain text where the image stood.
fn inline_image_alts(runs: Vec<Run>) -> Vec<Run> {
    let images_only = runs
        .iter()
        .all(|r| r.is_blank() || matches!(r, Run::ImageAlt { .. }));
    let mut out = Vec::with_capacity(runs.len());
    for run in runs {
        match run {
            Run::ImageAlt { .. } if images_only => {}
            Run::ImageAlt { alt, style } => push_text(&mut out, &alt, style, None),
            Run::Text {
                content,
                style,
                link,
            } => push_text(&mut out, &content, style, link),
            other => out.push(other),
        }
    }
    out
}

fn rich_text(runs: &[Run]) -> Value {
    Value::Array(runs.iter().map(Run::to_value).collect())
}

fn plain_rich_text(text: &str) -> Value {
    let mut runs = Vec::new();
    push_text(&mut runs, text, Style::default(), None);
    rich_text(&runs)
}

// ── Frames ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum FrameKind {
    Root,
    Paragraph,
    Heading(HeadingLevel),
    Quote(Option<BlockQuoteKind>),
    List { ordered: bool },
    Item { ordered: bool, checked: Option<bool> },
    Code { language: String, content: String },
    Table { width: usize, has_header: bool },
    Row { header: bool },
    Cell,
    /// Block constructs without a Notion counterpart; contents are kept.
    Passthrough,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    runs: Vec<Run>,
    children: Vec<Value>,
    /// Blocks emitted right after this frame's own block (standalone images).
    trailing: Vec<Value>,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            runs: Vec::new(),
            children: Vec::new(),
            trailing: Vec::new(),
        }
    }
}

struct Converter {
    stack: Vec<Frame>,
    bold: usize,
    italic: usize,
    strikethrough: usize,
    links: Vec<Option<String>>,
    /// `(url, alt text)` while inside an image tag.
    image: Option<(String, String)>,
}

impl Converter {
    fn new() -> Self {
        Self {
            stack: vec![Frame::new(FrameKind::Root)],
            bold: 0,
            italic: 0,
            strikethrough: 0,
            links: Vec::new(),
            image: None,
        }
    }

    fn finish(mut self) -> Vec<Value> {
        // Unbalanced input cannot come from pulldown-cmark, but never lose content.
        while self.stack.len() > 1 {
            self.close_frame();
        }
        self.stack.pop().map(|root| root.children).unwrap_or_default()
    }

    fn top(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn emit(&mut self, block: Value) {
        self.top().children.push(block);
    }

    fn style(&self) -> Style {
        Style {
            bold: self.bold > 0,
            italic: self.italic > 0,
            strikethrough: self.strikethrough > 0,
            code: false,
        }
    }

    fn link(&self) -> Option<String> {
        self.links.last().cloned().flatten()
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                let style = Style {
                    code: true,
                    ..self.style()
                };
                let link = self.link();
                push_text(&mut self.top().runs, &code, style, link);
            }
            Event::InlineMath(expr) => self.equation(&expr, false),
            Event::DisplayMath(expr) => self.equation(&expr, true),
            Event::Html(html) | Event::InlineHtml(html) => self.text(&html),
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.text("\n"),
            Event::Rule => self.emit(block("divider", json!({}))),
            Event::TaskListMarker(checked) => {
                let item = self
                    .stack
                    .iter_mut()
                    .rev()
                    .find(|f| matches!(f.kind, FrameKind::Item { .. }));
                if let Some(Frame {
                    kind: FrameKind::Item { checked: slot, .. },
                    ..
                }) = item
                {
                    *slot = Some(checked);
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some((_, alt)) = self.image.as_mut() {
            alt.push_str(text);
            return;
        }
        if let FrameKind::Code { content, .. } = &mut self.top().kind {
            content.push_str(text);
            return;
        }
        let style = self.style();
        let link = self.link();
        push_text(&mut self.top().runs, text, style, link);
    }

    fn equation(&mut self, expr: &str, display: bool) {
        self.top().runs.push(Run::Equation {
            expression: expr.trim().to_string(),
            display,
        });
    }

    fn start(&mut self, tag: Tag<'_>) {
        let kind = match tag {
            Tag::Emphasis => {
                self.italic += 1;
                return;
            }
            Tag::Strong => {
                self.bold += 1;
                return;
            }
            Tag::Strikethrough => {
                self.strikethrough += 1;
                return;
            }
            Tag::Link { dest_url, .. } => {
                self.links
                    .push(is_web_url(&dest_url).then(|| dest_url.to_string()));
                return;
            }
            Tag::Image { dest_url, .. } => {
                self.image = Some((dest_url.to_string(), String::new()));
                return;
            }
            Tag::Paragraph | Tag::HtmlBlock => FrameKind::Paragraph,
            Tag::Heading { level, .. } => FrameKind::Heading(level),
            Tag::BlockQuote(kind) => FrameKind::Quote(kind),
            Tag::CodeBlock(kind) => FrameKind::Code {
                language: match kind {
                    CodeBlockKind::Fenced(info) => notion_language(&info).to_string(),
                    CodeBlockKind::Indented => "plain text".to_string(),
                },
                content: String::new(),
            },
            Tag::List(start) => FrameKind::List {
                ordered: start.is_some(),
            },
            Tag::Item => {
                let ordered = matches!(self.top().kind, FrameKind::List { ordered: true });
                FrameKind::Item {
                    ordered,
                    checked: None,
                }
            }
            Tag::Table(alignments) => FrameKind::Table {
                width: alignments.len(),
                has_header: false,
            },
            Tag::TableHead => FrameKind::Row { header: true },
            Tag::TableRow => FrameKind::Row { header: false },
            Tag::TableCell => FrameKind::Cell,
            _ => FrameKind::Passthrough,
        };
        self.stack.push(Frame::new(kind));
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Emphasis => self.italic = self.italic.saturating_sub(1),
            TagEnd::Strong => self.bold = self.bold.saturating_sub(1),
            TagEnd::Strikethrough => self.strikethrough = self.strikethrough.saturating_sub(1),
            TagEnd::Link => {
                self.links.pop();
            }
            TagEnd::Image => self.finish_image(),
            _ => self.close_frame(),
        }
    }

    fn finish_image(&mut self) {
        let Some((url, alt)) = self.image.take() else {
            return;
        };
        // table cells and headings hold rich text only
        let in_paragraph = matches!(self.top().kind, FrameKind::Paragraph);
        if in_paragraph && is_web_url(&url) {
            let mut body = json!({ "type": "external", "external": { "url": url } });
            if !alt.trim().is_empty() {
                body["caption"] = plain_rich_text(alt.trim());
            }
            let style = self.style();
            let top = self.top();
            top.trailing.push(block("image", body));
            top.runs.push(Run::ImageAlt { alt, style });
        } else {
            let style = self.style();
            push_text(&mut self.top().runs, &alt, style, None);
        }
    }

    fn close_frame(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let Frame {
            kind,
            runs,
            children,
            trailing,
        } = frame;

        match kind {
            FrameKind::Root => {}
            FrameKind::Paragraph | FrameKind::Passthrough => {
                self.finish_paragraph(runs);
                for child in children {
                    self.emit(child);
                }
            }
            FrameKind::Heading(level) => {
                if runs.iter().any(|r| !r.is_blank()) {
                    let kind = match level {
                        HeadingLevel::H1 => "heading_1",
                        HeadingLevel::H2 => "heading_2",
                        _ => "heading_3",
                    };
                    self.emit(block(kind, json!({ "rich_text": rich_text(&runs) })));
                }
            }
            FrameKind::Quote(alert) => {
                let mut body = json!({ "rich_text": rich_text(&runs) });
                if !children.is_empty() {
                    body["children"] = Value::Array(children);
                }
                match alert {
                    None => self.emit(block("quote", body)),
                    Some(alert) => {
                        let (emoji, color) = callout_style(alert);
                        body["icon"] = json!({ "type": "emoji", "emoji": emoji });
                        body["color"] = Value::from(color);
                        self.emit(block("callout", body));
                    }
                }
            }
            FrameKind::List { .. } => {
                for child in children {
                    self.emit(child);
                }
            }
            FrameKind::Item { ordered, checked } => {
                let mut body = json!({ "rich_text": rich_text(&runs) });
                if !children.is_empty() {
                    body["children"] = Value::Array(children);
                }
                let kind = match checked {
                    Some(done) => {
                        body["checked"] = Value::Bool(done);
                        "to_do"
                    }
                    None if ordered => "numbered_list_item",
                    None => "bulleted_list_item",
                };
                self.emit(block(kind, body));
            }
            FrameKind::Code { language, content } => {
                let content = content.trim_end_matches('\n');
                self.emit(block(
                    "code",
                    json!({ "rich_text": plain_rich_text(content), "language": language }),
                ));
            }
            FrameKind::Table { width, has_header } => {
                let rows: Vec<Value> = children
                    .into_iter()
                    .map(|mut row| {
                        if let Some(cells) = row["table_row"]["cells"].as_array_mut() {
                            cells.resize(width, Value::Array(Vec::new()));
                        }
                        row
                    })
                    .collect();
                self.emit(block(
                    "table",
                    json!({
                        "table_width": width,
                        "has_column_header": has_header,
                        "has_row_header": false,
                        "children": rows,
                    }),
                ));
            }
            FrameKind::Row { header } => {
                if header {
                    if let FrameKind::Table { has_header, .. } = &mut self.top().kind {
                        *has_header = true;
                    }
                }
                self.emit(block("table_row", json!({ "cells": children })));
            }
            FrameKind::Cell => {
                self.emit(rich_text(&runs));
            }
        }

        for block in trailing {
            self.emit(block);
        }
    }

    fn finish_paragraph(&mut self, runs: Vec<Run>) {
        let runs = inline_image_alts(runs);
        if runs.iter().all(Run::is_blank) {
            return;
        }

        let display_only = runs
            .iter()
            .all(|r| r.is_blank() || matches!(r, Run::Equation { display: true, .. }));
        if display_only {
            for run in runs {
                if let Run::Equation { expression, .. } = run {
                    self.emit(block("equation", json!({ "expression": expression })));
                }
            }
            return;
        }

        // The first paragraph of a list item or quote is its own text.
        let parent = self.top();
        let absorb = matches!(parent.kind, FrameKind::Item { .. } | FrameKind::Quote(_))
            && parent.runs.is_empty()
            && parent.children.is_empty();
        if absorb {
            parent.runs = runs;
        } else {
            self.emit(block("paragraph", json!({ "rich_text": rich_text(&runs) })));
        }
    }
}

fn is_web_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn callout_style(kind: BlockQuoteKind) -> (&'static str, &'static str) {
    match kind {
        BlockQuoteKind::Note => ("ℹ️", "blue_background"),
        BlockQuoteKind::Tip => ("💡", "green_background"),
        BlockQuoteKind::Important => ("❗", "purple_background"),
        BlockQuoteKind::Warning => ("⚠️", "yellow_background"),
        BlockQuoteKind::Caution => ("🛑", "red_background"),
    }
}

const NOTION_LANGUAGES: &[&str] = &[
    "abap", "arduino", "bash", "basic", "c", "clojure", "coffeescript", "c++", "c#", "css",
    "dart", "diff", "docker", "elixir", "elm", "erlang", "flow", "fortran", "f#", "gherkin",
    "glsl", "go", "graphql", "groovy", "haskell", "html", "java", "javascript", "json", "julia",
    "kotlin", "latex", "less", "lisp", "livescript", "lua", "makefile", "markdown", "markup",
    "matlab", "mermaid", "nix", "objective-c", "ocaml", "pascal", "perl", "php", "plain text",
    "powershell", "prolog", "protobuf", "python", "r", "reason", "ruby", "rust", "sass", "scala",
    "scheme", "scss", "shell", "solidity", "sql", "swift", "typescript", "vb.net", "verilog",
    "vhdl", "visual basic", "webassembly", "xml", "yaml",
];

/// Map a fence info string to one of Notion's code-block languages.
fn notion_language(info: &str) -> &'static str {
    let lang = info
        .split(|c: char| c.is_whitespace() || c == ',' || c == '{')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    let alias = match lang.as_str() {
        "" | "text" | "txt" | "plain" | "plaintext" => "plain text",
        "js" | "jsx" | "mjs" | "node" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" | "python3" => "python",
        "rs" => "rust",
        "sh" | "zsh" | "console" => "shell",
        "yml" => "yaml",
        "cpp" | "cc" | "cxx" | "hpp" => "c++",
        "cs" | "csharp" => "c#",
        "fs" | "fsharp" => "f#",
        "md" => "markdown",
        "golang" => "go",
        "tex" => "latex",
        "dockerfile" => "docker",
        "objc" => "objective-c",
        "kt" | "kts" => "kotlin",
        "rb" => "ruby",
        "ps1" | "pwsh" => "powershell",
        "proto" => "protobuf",
        "make" => "makefile",
        "wasm" => "webassembly",
        "vb" => "visual basic",
        other => other,
    };
    NOTION_LANGUAGES
        .iter()
        .copied()
        .find(|known| *known == alias)
        .unwrap_or("plain text")
}
