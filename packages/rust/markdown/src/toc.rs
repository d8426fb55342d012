//! Table-of-contents construction from extracted headings.
//!
//! The builder produces an intermediate list of [`TocEntry`] values; the
//! renderers below turn it into HTML (for the rendered document) or Markdown
//! (for the fallback artifact).

use crate::headings::HeadingRecord;
use crate::highlight::HighlightSet;
use crate::strip_toc::TOC_MARKER;

/// Title text of a generated TOC.
pub const TOC_TITLE: &str = "目录";

/// One line of a table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub level: usize,
    /// Display text (heading text without link syntax).
    pub text: String,
    pub anchor_id: String,
    pub highlighted: bool,
}

/// One entry per heading, in document order, none highlighted.
pub fn build_toc<'h>(headings: impl IntoIterator<Item = &'h HeadingRecord>) -> Vec<TocEntry> {
    build(headings, None)
}

/// Like [`build_toc`], marking entries whose text matches any highlight term.
pub fn build_highlighted_toc<'h>(
    headings: impl IntoIterator<Item = &'h HeadingRecord>,
    highlights: &HighlightSet,
) -> Vec<TocEntry> {
    build(headings, Some(highlights))
}

pub(crate) fn build<'h>(
    headings: impl IntoIterator<Item = &'h HeadingRecord>,
    highlights: Option<&HighlightSet>,
) -> Vec<TocEntry> {
    headings
        .into_iter()
        .map(|h| TocEntry {
            level: h.level,
            text: h.clean_text.clone(),
            anchor_id: h.anchor_id.clone(),
            highlighted: highlights.is_some_and(|set| set.matches(&h.clean_text)),
        })
        .collect()
}

fn indent(level: usize) -> String {
    "  ".repeat(level.saturating_sub(1))
}

/// Render entries as the HTML TOC block placed before the document body.
pub fn render_toc_html(entries: &[TocEntry]) -> String {
    let mut html = vec![format!("<h1>{TOC_TITLE}</h1>"), "<ul class='toc'>".to_string()];

    for entry in entries {
        let class = if entry.highlighted {
            " class='highlight'"
        } else {
            ""
        };
        html.push(format!(
            "{}<li><a href='#{}'{class}>{}</a></li>",
            indent(entry.level),
            entry.anchor_id,
            escape_html(&entry.text)
        ));
    }

    html.push("</ul>".to_string());
    html.join("\n")
}

/// Render entries as a Markdown TOC opened by the reserved marker heading,
/// so a later run can strip it again.
pub fn render_toc_markdown(entries: &[TocEntry]) -> String {
    let mut md = vec![TOC_MARKER.to_string(), String::new()];

    for entry in entries {
        let link = format!("[{}](#{})", entry.text, entry.anchor_id);
        let item = if entry.highlighted {
            format!("**{link}**")
        } else {
            link
        };
        md.push(format!("{}- {item}", indent(entry.level)));
    }

    md.join("\n")
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
