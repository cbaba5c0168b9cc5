//! Exclusion pattern parsing
//!
//! Callers hand over a single comma-separated string; this module turns it
//! into an ordered, immutable set of trimmed selector patterns. Commas nested
//! inside `(...)`, `[...]` or quoted strings belong to the selector and do not
//! split it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single selector string removed from every scope it matches in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionPattern(String);

impl ExclusionPattern {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExclusionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered set of exclusion patterns for one conversion.
///
/// An empty set disables removal entirely.
///
/// ```
/// use pagecut::ExclusionSet;
///
/// let set = ExclusionSet::parse(" .ad, #cookie-banner ,, ");
/// assert_eq!(set.len(), 2);
/// assert_eq!(set.to_string(), ".ad,#cookie-banner");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExclusionSet {
    patterns: Vec<ExclusionPattern>,
}

impl ExclusionSet {
    /// Parse a comma-separated list. Never fails.
    pub fn parse(input: &str) -> Self {
        let mut patterns = Vec::new();
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut escaped = false;
        let mut start = 0;

        for (i, c) in input.char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            match (quote, c) {
                (_, '\\') => escaped = true,
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => quote = Some(c),
                (None, '(' | '[') => depth += 1,
                (None, ')' | ']') => depth = depth.saturating_sub(1),
                (None, ',') if depth == 0 => {
                    push_trimmed(&mut patterns, &input[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        push_trimmed(&mut patterns, &input[start..]);

        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExclusionPattern> {
        self.patterns.iter()
    }
}

fn push_trimmed(out: &mut Vec<ExclusionPattern>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(ExclusionPattern(piece.to_string()));
    }
}

impl FromStr for ExclusionSet {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for ExclusionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.patterns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(p.as_str())?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ExclusionSet {
    type Item = &'a ExclusionPattern;
    type IntoIter = std::slice::Iter<'a, ExclusionPattern>;

    fn into_iter(self) -> Self::IntoIter {
        self.patterns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(set: &ExclusionSet) -> Vec<&str> {
        set.iter().map(|p| p.as_str()).collect()
    }

    #[test]
    fn empty_and_blank_inputs_disable_removal() {
        assert!(ExclusionSet::parse("").is_empty());
        assert!(ExclusionSet::parse("   ").is_empty());
        assert!(ExclusionSet::parse(" , ,").is_empty());
    }

    #[test]
    fn keeps_order_and_trims() {
        let set = ExclusionSet::parse("  .ad ,footer,  #popup  ");
        assert_eq!(texts(&set), vec![".ad", "footer", "#popup"]);
    }

    #[test]
    fn nested_commas_stay_in_their_selector() {
        let set = ExclusionSet::parse(":is(.a, .b), a[title='x,y'], .c");
        assert_eq!(texts(&set), vec![":is(.a, .b)", "a[title='x,y']", ".c"]);
    }

    #[test]
    fn duplicates_are_kept() {
        let set = ExclusionSet::parse(".ad,.ad");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn from_str_matches_parse() {
        let set: ExclusionSet = ".x,.y".parse().unwrap();
        assert_eq!(set, ExclusionSet::parse(".x,.y"));
    }
}
