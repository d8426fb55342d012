//! Removal of previously generated table-of-contents blocks.
//!
//! A generated TOC starts at the reserved marker heading [`TOC_MARKER`] and
//! runs up to the next level-1 heading. Any user section that happens to use
//! the exact marker heading is treated the same way.

use tracing::debug;

/// The level-1 heading that opens a generated TOC block ("contents").
pub const TOC_MARKER: &str = "# 目录";

fn is_marker(line: &str) -> bool {
    line.trim() == TOC_MARKER
}

fn is_terminator(line: &str) -> bool {
    line.starts_with("# ") && !is_marker(line)
}

/// Find the first removable TOC block as a `start..end` line range.
///
/// A marker with no terminating heading after it is not a block.
fn find_block(lines: &[&str]) -> Option<(usize, usize)> {
    let start = lines.iter().position(|l| is_marker(l))?;
    let end = lines[start + 1..]
        .iter()
        .position(|l| is_terminator(l))
        .map(|offset| start + 1 + offset)?;
    Some((start, end))
}

/// Strip every generated TOC block from `document`.
///
/// Returns the document unchanged when there is no marker, or when the marker
/// is not followed by a level-1 heading (nothing past the end of the
/// document is ever deleted). Blocks are removed until none is left, so the
/// operation is idempotent.
pub fn remove_existing_toc(document: &str) -> String {
    let mut lines: Vec<&str> = document.split('\n').collect();
    let mut removed = 0usize;

    while let Some((start, end)) = find_block(&lines) {
        lines.drain(start..end);
        removed += 1;
    }

    if removed == 0 {
        return document.to_string();
    }

    debug!(blocks = removed, "removed existing TOC");
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn removes_toc_block() {
        let doc = "# 目录\n- old\n# Real Title\nbody";
        assert_eq!(remove_existing_toc(doc), "# Real Title\nbody");
    }

    #[test]
    fn keeps_content_before_marker() {
        let doc = "intro\n# 目录\n- a\n  - b\n\n# First\ntext";
        assert_eq!(remove_existing_toc(doc), "intro\n# First\ntext");
    }

    #[test]
    fn no_marker_is_unchanged() {
        let doc = "# Title\n## Sub\ntext";
        assert_eq!(remove_existing_toc(doc), doc);
    }

    #[test]
    fn unterminated_marker_is_unchanged() {
        let doc = "# Title\n# 目录\n- a\n## Not level one";
        assert_eq!(remove_existing_toc(doc), doc);
    }

    #[test]
    fn level_two_headings_do_not_end_block() {
        let doc = "# 目录\n## Section\n- a\n# Body";
        assert_eq!(remove_existing_toc(doc), "# Body");
    }

    #[test]
    fn marker_with_surrounding_whitespace() {
        let doc = "  # 目录  \n- a\n# Body";
        assert_eq!(remove_existing_toc(doc), "# Body");
    }

    #[test]
    fn repeated_markers_are_all_removed() {
        let doc = "# 目录\n# 目录\n- a\n# A\ntext\n# 目录\n- b\n# B";
        assert_eq!(remove_existing_toc(doc), "# A\ntext\n# B");
    }

    #[test]
    fn example_idempotent() {
        let doc = "# 目录\nx\n# A\n# 目录\ny\n# B";
        let once = remove_existing_toc(doc);
        assert_eq!(once, "# A\n# B");
        assert_eq!(remove_existing_toc(&once), once);
    }

    fn doc_strategy() -> impl Strategy<Value = String> {
        let line = prop_oneof![
            Just(TOC_MARKER.to_string()),
            Just("# Heading".to_string()),
            Just("## Sub".to_string()),
            Just("- item".to_string()),
            Just(String::new()),
            "[a-z ]{0,8}",
        ];
        prop::collection::vec(line, 0..16).prop_map(|lines| lines.join("\n"))
    }

    proptest! {
        #[test]
        fn removal_is_idempotent(doc in doc_strategy()) {
            let once = remove_existing_toc(&doc);
            let twice = remove_existing_toc(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
