//! Anchor id generation for heading text.

use std::sync::LazyLock;

use regex::Regex;

/// Matches Markdown inline links, capturing the label.
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]\(.*?\)").expect("valid regex"));

/// Anything that is not a word character, whitespace or a hyphen.
static NON_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Replace every `[label](target)` with `label`.
pub fn strip_links(text: &str) -> String {
    LINK_RE.replace_all(text, "$1").into_owned()
}

/// Turn heading text into a link-safe anchor id.
///
/// Link syntax is reduced to its label, the text is lowercased and trimmed,
/// characters outside `[\w\s-]` are dropped and whitespace runs become a
/// single `-`. Word characters are Unicode-aware, so CJK headings keep their
/// text.
///
/// Two headings with the same visible text get the same id; callers that
/// need unique ids must disambiguate themselves.
pub fn slug(text: &str) -> String {
    let unlinked = strip_links(text);
    let lowered = unlinked.to_lowercase();
    let kept = NON_SLUG_RE.replace_all(lowered.trim(), "");
    WHITESPACE_RE.replace_all(&kept, "-").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn slug_basic() {
        assert_eq!(slug("Getting Started"), "getting-started");
        assert_eq!(slug("  Hello,   World!  "), "hello-world");
        assert_eq!(slug("already-hyphenated text"), "already-hyphenated-text");
    }

    #[test]
    fn slug_strips_link_syntax() {
        assert_eq!(slug("Intro [link](http://x)"), "intro-link");
        assert_eq!(slug("[OpenAI releases GPT](https://example.com/a?b=c)"), "openai-releases-gpt");
    }

    #[test]
    fn slug_keeps_unicode_word_chars() {
        assert_eq!(slug("人工智能 新闻"), "人工智能-新闻");
        assert_eq!(slug("Café – Übersicht"), "café-übersicht");
    }

    #[test]
    fn slug_keeps_underscores_and_digits() {
        assert_eq!(slug("Top_10 Models (2025)"), "top_10-models-2025");
    }

    #[test]
    fn slug_collisions_are_not_resolved() {
        assert_eq!(slug("Summary"), slug("summary!"));
    }

    #[test]
    fn strip_links_multiple() {
        assert_eq!(
            strip_links("[a](x) and [b](y) plus [not a link]"),
            "a and b plus [not a link]"
        );
    }

    proptest! {
        #[test]
        fn slug_is_deterministic(text in "\\PC{0,40}") {
            prop_assert_eq!(slug(&text), slug(&text));
        }

        #[test]
        fn slug_ignores_case(text in "[a-zA-Z ]{0,30}") {
            prop_assert_eq!(slug(&text), slug(&text.to_uppercase()));
        }

        #[test]
        fn slug_ignores_link_wrapping(label in "[a-zA-Z0-9 ]{1,20}", target in "[a-z:/.]{1,20}") {
            let wrapped = format!("[{label}]({target})");
            prop_assert_eq!(slug(&wrapped), slug(&label));
        }
    }
}
