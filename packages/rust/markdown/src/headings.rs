//! Heading extraction from Markdown documents.
//!
//! A line is a heading iff it starts with `#`. Documents are split on `\n`
//! only, so line positions line up exactly with [`crate::inject_anchors`].

use std::str::Split;

use crate::anchors::strip_anchor_marker;
use crate::slug::{slug, strip_links};

/// A heading line and everything derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingRecord {
    /// Number of leading `#` characters (always `>= 1`).
    pub level: usize,
    /// Heading text as written, link syntax included.
    pub raw_text: String,
    /// Heading text with link syntax reduced to labels.
    pub clean_text: String,
    /// Anchor id derived from `clean_text`.
    pub anchor_id: String,
    /// The unmodified source line.
    pub original_line: String,
}

impl HeadingRecord {
    /// Parse a single line, returning `None` for non-heading lines.
    pub fn parse(line: &str) -> Option<Self> {
        let level = heading_level(line)?;
        let raw_text = strip_anchor_marker(line[level..].trim()).to_string();
        let clean_text = strip_links(&raw_text);
        let anchor_id = slug(&clean_text);

        Some(Self {
            level,
            raw_text,
            clean_text,
            anchor_id,
            original_line: line.to_string(),
        })
    }
}

/// Count of leading `#` characters, or `None` if the line is not a heading.
pub fn heading_level(line: &str) -> Option<usize> {
    let level = line.bytes().take_while(|&b| b == b'#').count();
    (level > 0).then_some(level)
}

/// Lazy iterator over the headings of a document.
///
/// Clone it before consuming (or call [`extract_headings`] again) to walk
/// the document a second time.
#[derive(Debug, Clone)]
pub struct Headings<'a> {
    lines: Split<'a, char>,
}

impl Iterator for Headings<'_> {
    type Item = HeadingRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.by_ref().find_map(HeadingRecord::parse)
    }
}

/// Walk `document` and yield one [`HeadingRecord`] per heading line, in order.
///
/// Extraction has no side effects; the document is only borrowed.
pub fn extract_headings(document: &str) -> Headings<'_> {
    Headings {
        lines: document.split('\n'),
    }
}
