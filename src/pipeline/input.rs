//! Input resolution: read the Markdown file and normalise the target page id.
//!
//! ## Why accept URLs for the page id?
//!
//! Users copy the target page from Notion's "Share → Copy link" menu far more
//! often than they dig out the raw id. A share link ends with the page title
//! slug followed by the 32-hex-digit id, optionally with a query string. We
//! extract that id and hyphenate it into the canonical UUID form the API
//! accepts everywhere.

use crate::error::ImportError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// A bare or hyphenated id, possibly at the end of a URL path.
static RE_PAGE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:^|[/\-])([0-9a-f]{32}|[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})$",
    )
    .unwrap()
});

/// A Notion page (or block) id in canonical hyphenated lowercase form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageId(String);

impl PageId {
    /// Parse a raw 32-hex id, a hyphenated UUID, or a Notion page URL.
    ///
    /// ```rust
    /// use md2notion::PageId;
    ///
    /// let id = PageId::parse("https://www.notion.so/team/Roadmap-0123456789abcdef0123456789abcdef?pvs=4").unwrap();
    /// assert_eq!(id.as_str(), "01234567-89ab-cdef-0123-456789abcdef");
    /// ```
    pub fn parse(input: &str) -> Result<Self, ImportError> {
        let trimmed = input.trim();
        // query string and fragment never carry the id
        let path = trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or(trimmed)
            .trim_end_matches('/');

        let caps = RE_PAGE_ID
            .captures(path)
            .ok_or_else(|| ImportError::InvalidPageId {
                input: input.to_string(),
            })?;
        let hex: String = caps[1]
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let id = format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        );
        debug!("Resolved page id {} from '{}'", id, trimmed);
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PageId {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Read a Markdown file as UTF-8 text, mapping I/O failures to typed errors.
pub fn read_markdown(path: &Path) -> Result<String, ImportError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ImportError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => ImportError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ImportError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let text = String::from_utf8(bytes).map_err(|_| ImportError::NotUtf8 {
        path: path.to_path_buf(),
    })?;
    debug!("Read {} bytes of markdown from {}", text.len(), path.display());

    // A leading BOM would end up in the first paragraph.
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}
