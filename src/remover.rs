//! Subtree removal within a single scope

use crate::dom::DocumentTree;
use crate::selectors::{ExclusionPattern, ExclusionSet};
use crate::Result;
use log::debug;
use serde::{Deserialize, Serialize};

/// Per-pattern removal counts for one scope, in pattern order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalReport {
    entries: Vec<(ExclusionPattern, usize)>,
}

impl RemovalReport {
    fn record(&mut self, pattern: &ExclusionPattern, removed: usize) {
        self.entries.push((pattern.clone(), removed));
    }

    /// Count recorded for `pattern` (summed if the pattern was given twice)
    pub fn count(&self, pattern: &str) -> usize {
        self.entries
            .iter()
            .filter(|(p, _)| p.as_str() == pattern)
            .map(|(_, n)| n)
            .sum()
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, n)| n).sum()
    }

    /// True when nothing was removed
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    pub fn entries(&self) -> &[(ExclusionPattern, usize)] {
        &self.entries
    }
}

/// Remove every element matching any of `patterns` from `scope`.
///
/// Patterns run in order and each one's matches are detached before the next
/// pattern is evaluated, so later patterns never see nodes an earlier pattern
/// already removed.
pub fn remove<D: DocumentTree>(dom: &mut D, scope: &D::Scope, patterns: &ExclusionSet) -> Result<RemovalReport> {
    let mut report = RemovalReport::default();
    for pattern in patterns {
        let removed = dom.remove_matching(scope, pattern)?;
        if removed > 0 {
            debug!("Removed {} '{}' element(s) from {}", removed, pattern, scope);
        }
        report.record(pattern, removed);
    }
    Ok(report)
}

#[cfg(all(test, feature = "static"))]
mod tests {
    use super::*;
    use crate::static_dom::StaticDom;

    #[test]
    fn reports_counts_per_pattern_in_order() {
        let mut dom = StaticDom::parse(
            r#"<body><div class="ad">1</div><div class="ad">2</div><p id="keep">k</p><footer>f</footer></body>"#,
        );
        let root = dom.document().unwrap();
        let set = ExclusionSet::parse(".ad, footer, .missing");
        let report = remove(&mut dom, &root, &set).unwrap();

        let counts: Vec<usize> = report.entries().iter().map(|(_, n)| *n).collect();
        assert_eq!(counts, vec![2, 1, 0]);
        assert_eq!(report.total(), 3);
        assert!(dom.text().contains('k'));
    }

    #[test]
    fn second_pass_is_clean() {
        let mut dom = StaticDom::parse(r#"<body><aside>x</aside><aside><aside>y</aside></aside></body>"#);
        let root = dom.document().unwrap();
        let set = ExclusionSet::parse("aside");
        assert_eq!(remove(&mut dom, &root, &set).unwrap().count("aside"), 3);
        assert!(remove(&mut dom, &root, &set).unwrap().is_clean());
    }

    #[test]
    fn earlier_pattern_removal_is_visible_to_later_patterns() {
        let mut dom = StaticDom::parse(r#"<body><section class="wrap"><span>x</span></section></body>"#);
        let root = dom.document().unwrap();
        let set = ExclusionSet::parse(".wrap, span");
        let report = remove(&mut dom, &root, &set).unwrap();
        assert_eq!(report.count(".wrap"), 1);
        assert_eq!(report.count("span"), 0);
    }
}
