//! Input parsing and order-preserving merge.

use mdigest_shared::{FetchOutcome, SourceItem};

/// Separator placed between merged fragments.
const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Parse a newline-separated identifier list.
///
/// Lines are trimmed and blank lines skipped; `index` is the position among
/// the kept lines.
pub fn parse_source_list(text: &str) -> Vec<SourceItem> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, identifier)| SourceItem::new(index, identifier))
        .collect()
}

/// Concatenate successful fragments in index order.
///
/// Failed outcomes and whitespace-only fragments are skipped. Returns `None`
/// when nothing but whitespace is left.
pub fn merge_outcomes(outcomes: &[FetchOutcome]) -> Option<String> {
    let mut ordered: Vec<&FetchOutcome> = outcomes.iter().collect();
    ordered.sort_by_key(|o| o.index);

    let merged = ordered
        .into_iter()
        .filter_map(FetchOutcome::markdown)
        // Whitespace-only fragments are skipped, not joined.
        .filter(|md| !md.trim().is_empty())
        .collect::<Vec<_>>()
        .join(FRAGMENT_SEPARATOR);

    (!merged.trim().is_empty()).then_some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_list_skips_blank_lines() {
        let items = parse_source_list("  https://a.example \n\n\t\nhttps://b.example\r\n");
        assert_eq!(
            items,
            vec![
                SourceItem::new(0, "https://a.example"),
                SourceItem::new(1, "https://b.example"),
            ]
        );
    }

    #[test]
    fn merge_sorts_by_index() {
        let outcomes = vec![
            FetchOutcome::content(2, "c", "# C".into()),
            FetchOutcome::failed(1, "b", "HTTP 500"),
            FetchOutcome::content(0, "a", "# A".into()),
        ];
        assert_eq!(merge_outcomes(&outcomes).as_deref(), Some("# A\n\n# C"));
    }

    #[test]
    fn merge_all_failed_is_none() {
        let outcomes = vec![
            FetchOutcome::failed(0, "a", "timeout"),
            FetchOutcome::failed(1, "b", "timeout"),
        ];
        assert_eq!(merge_outcomes(&outcomes), None);
    }

    #[test]
    fn merge_skips_whitespace_only_fragment() {
        let outcomes = vec![
            FetchOutcome::content(0, "a", "# A".into()),
            FetchOutcome::content(1, "b", " \n\t".into()),
            FetchOutcome::content(2, "c", "# C".into()),
        ];
        assert_eq!(merge_outcomes(&outcomes).as_deref(), Some("# A\n\n# C"));
    }

    #[test]
    fn merge_whitespace_only_is_none() {
        let outcomes = vec![
            FetchOutcome::content(0, "a", "  \n".into()),
            FetchOutcome::content(1, "b", String::new()),
        ];
        assert_eq!(merge_outcomes(&outcomes), None);
    }
}
