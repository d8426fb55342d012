//! Anchor injection into heading lines.

use std::sync::LazyLock;

use regex::Regex;

use crate::headings::{HeadingRecord, heading_level};

/// An anchor marker previously written by [`inject_anchors`].
static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<span id='[^']*'></span>").expect("valid regex"));

/// The inline marker that carries a heading's anchor id.
pub fn anchor_marker(anchor_id: &str) -> String {
    format!("<span id='{anchor_id}'></span>")
}

/// Drop a leading anchor marker from heading text, if present.
pub(crate) fn strip_anchor_marker(text: &str) -> &str {
    match MARKER_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// Rewrite every heading line to carry its anchor marker.
///
/// Each heading line becomes `<hashes> <marker><raw text>`, keeping link
/// syntax in the visible text. Other lines pass through untouched and the
/// line count never changes. `headings` must come from [`crate::extract_headings`]
/// over the same document; a record that does not match its line is
/// recomputed from the line.
pub fn inject_anchors<'h>(
    document: &str,
    headings: impl IntoIterator<Item = &'h HeadingRecord>,
) -> String {
    let mut records = headings.into_iter();
    let mut out: Vec<String> = Vec::new();

    for line in document.split('\n') {
        let Some(level) = heading_level(line) else {
            out.push(line.to_string());
            continue;
        };

        let record = match records.next() {
            Some(r) if r.original_line == line => r.clone(),
            _ => match HeadingRecord::parse(line) {
                Some(r) => r,
                None => {
                    out.push(line.to_string());
                    continue;
                }
            },
        };

        let hashes = "#".repeat(level);
        out.push(format!(
            "{hashes} {}{}",
            anchor_marker(&record.anchor_id),
            record.raw_text
        ));
    }

    out.join("\n")
}
