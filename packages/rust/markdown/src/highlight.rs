//! Highlight terms for marking TOC entries.

/// Keep word characters and whitespace, lowercase the rest.
///
/// Word characters are Unicode letters, digits and `_`.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// A set of free-text terms matched against heading text, ignoring case and
/// punctuation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightSet {
    terms: Vec<String>,
}

impl HighlightSet {
    /// Build a set from raw terms. Terms that normalize to nothing are
    /// dropped, since an empty term would match every heading.
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for term in terms {
            let n = normalize(term.as_ref().trim());
            if !n.trim().is_empty() && !normalized.contains(&n) {
                normalized.push(n);
            }
        }
        Self { terms: normalized }
    }

    /// Parse a newline-separated term list. Lines are trimmed and blank lines
    /// are ignored.
    pub fn parse(text: &str) -> Self {
        Self::from_terms(text.lines().map(str::trim).filter(|l| !l.is_empty()))
    }

    /// Whether any term is a substring of the normalized heading text.
    pub fn matches(&self, clean_text: &str) -> bool {
        if self.terms.is_empty() {
            return false;
        }
        let haystack = normalize(clean_text);
        self.terms.iter().any(|term| haystack.contains(term.as_str()))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
