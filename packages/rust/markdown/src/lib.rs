//! Markdown structural transforms.
//!
//! Extracts headings, derives anchor ids, builds a table of contents
//! (optionally with highlighted entries), injects anchors and strips any TOC a
//! previous run left behind. [`transform`] chains these into one pass.

mod anchors;
mod headings;
mod highlight;
mod html;
mod slug;
mod strip_toc;
mod toc;

use tracing::{debug, instrument};

pub use anchors::{anchor_marker, inject_anchors};
pub use headings::{HeadingRecord, Headings, extract_headings, heading_level};
pub use highlight::{HighlightSet, normalize as normalize_highlight};
pub use html::{STYLESHEET, markdown_to_html_fragment, render_document_html};
pub use slug::{slug, strip_links};
pub use strip_toc::{TOC_MARKER, remove_existing_toc};
pub use toc::{
    TOC_TITLE, TocEntry, build_highlighted_toc, build_toc, render_toc_html, render_toc_markdown,
};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Output of [`transform`].
#[derive(Debug, Clone)]
pub struct Transformed {
    /// Document body with the old TOC removed and anchors injected.
    pub content: String,
    /// Headings of the TOC-free document, in order.
    pub headings: Vec<HeadingRecord>,
    /// Table of contents built from `headings`.
    pub toc: Vec<TocEntry>,
}

impl Transformed {
    /// The TOC as an HTML block.
    pub fn toc_html(&self) -> String {
        render_toc_html(&self.toc)
    }

    /// Markdown TOC followed by the anchored content. This is the artifact
    /// that survives when the rendering backend fails.
    pub fn markdown_with_toc(&self) -> String {
        format!("{}\n\n{}", render_toc_markdown(&self.toc), self.content)
    }

    /// The full HTML document for the rendering backend.
    pub fn to_html_document(&self, title_line: &str) -> String {
        render_document_html(title_line, &self.toc_html(), &self.content)
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Restructure a merged document.
///
/// 1. Remove any previously generated TOC
/// 2. Extract headings
/// 3. Build the TOC, highlighted when `highlights` is given
/// 4. Inject anchors into heading lines
#[instrument(skip_all, fields(len = document.len(), highlighted = highlights.is_some()))]
pub fn transform(document: &str, highlights: Option<&HighlightSet>) -> Transformed {
    let without_toc = remove_existing_toc(document);

    let headings: Vec<HeadingRecord> = extract_headings(&without_toc).collect();
    let toc = toc::build(&headings, highlights);
    let content = inject_anchors(&without_toc, &headings);

    debug!(
        headings = headings.len(),
        highlighted = toc.iter().filter(|e| e.highlighted).count(),
        "transform complete"
    );

    Transformed {
        content,
        headings,
        toc,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
