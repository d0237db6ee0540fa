//! Classifier configuration for the supported catalog editions.

use regex::Regex;

use super::core::RowClassifier;
use super::types::RowKind;

#[allow(clippy::expect_used)] // Static patterns that are guaranteed to be valid
fn patterns(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
}

/// Create a classifier for Revision 4 tables.
///
/// Records are classified by their identifier column alone:
///
/// ```text
/// AC-1            control
/// AC-1 (1)        control enhancement
/// AC-1a.          statement of a control
/// AC-1 (1)(a)     statement of an enhancement
/// AC-1a.1.        sub-statement of a control
/// AC-1 (1)(a)(1)  sub-statement of an enhancement
/// ```
///
/// Every pattern is anchored on both ends. There is no fallback: an
/// identifier in any other shape means the table layout has drifted.
#[must_use]
pub fn create_rev4_classifier() -> RowClassifier {
    let mut classifier = RowClassifier::new();

    classifier.register(RowKind::TopLevel, patterns(&[r"^\w+-\d+$"]));
    classifier.register(RowKind::Enhancement, patterns(&[r"^(\w+-\d+) \(\d+\)$"]));
    classifier.register(
        RowKind::Statement,
        patterns(&[r"^\w+-\d+\w+\.$", r"^\w+-\d+ \(\d+\)\(\w\)$"]),
    );
    classifier.register(
        RowKind::Substatement,
        patterns(&[r"^\w+-\d+\w+\.\d+\.$", r"^\w+-\d+ \(\d+\)\(\w\)\(\d\)$"]),
    );

    classifier
}

/// Create a classifier for Revision 5 tables.
///
/// Records are raw lines. A control or enhancement line starts with its
/// identifier followed by a tab; lines of a multi-line control text cell
/// start with a clause label. Everything else is free text.
///
/// ```text
/// AC-1\t...       control
/// AC-2 (1)\t...   control enhancement (also "AC-2(1)")
/// a. ...          statement
/// 1. ...          statement
/// (a) ...         statement
/// ```
#[must_use]
pub fn create_rev5_classifier() -> RowClassifier {
    let mut classifier = RowClassifier::new();

    classifier.register(RowKind::TopLevel, patterns(&[r"^\w+-\d+\t"]));
    classifier.register(RowKind::Enhancement, patterns(&[r"^(\w+-\d+) ?\(\d+\)\t"]));
    classifier.register(
        RowKind::Statement,
        patterns(&[r"^(\w+\.) (.*)", r"^(\d+\.) (.*)", r"^(\(\w+\)) (.*)"]),
    );
    classifier.fallback(RowKind::FreeText);

    classifier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rev4_kinds() {
        let c = create_rev4_classifier();
        assert_eq!(c.classify("AC-1", 1).unwrap(), RowKind::TopLevel);
        assert_eq!(c.classify("AC-2 (1)", 1).unwrap(), RowKind::Enhancement);
        assert_eq!(c.classify("AC-1a.", 1).unwrap(), RowKind::Statement);
        assert_eq!(c.classify("AC-2 (4)(a)", 1).unwrap(), RowKind::Statement);
        assert_eq!(c.classify("AC-1a.1.", 1).unwrap(), RowKind::Substatement);
        assert_eq!(
            c.classify("AC-2 (4)(a)(1)", 1).unwrap(),
            RowKind::Substatement
        );
        assert!(!c.has_fallback());
    }

    #[test]
    fn test_rev4_enhancement_never_top_level() {
        let c = create_rev4_classifier();
        let m = c.find("AC-2 (1)").unwrap();
        assert_eq!(m.kind, RowKind::Enhancement);
        assert_eq!(m.group(1), Some("AC-2"));
        assert_eq!(c.classify("AC-10", 1).unwrap(), RowKind::TopLevel);
    }

    #[test]
    fn test_rev4_unknown_format_fails() {
        let c = create_rev4_classifier();
        assert!(c.classify("Appendix J", 12).is_err());
        assert!(c.classify("", 12).is_err());
    }

    #[test]
    fn test_rev5_kinds() {
        let c = create_rev5_classifier();
        assert_eq!(
            c.classify("AC-1\tPolicy and Procedures\ta. Develop", 1).unwrap(),
            RowKind::TopLevel
        );
        let m = c.find("AC-2(1)\tAutomated System Account Management\t").unwrap();
        assert_eq!(m.kind, RowKind::Enhancement);
        assert_eq!(m.group(1), Some("AC-2"));

        let m = c.find("(a) Review and update").unwrap();
        assert_eq!(m.kind, RowKind::Statement);
        assert_eq!(m.group(1), Some("(a)"));
        assert_eq!(m.group(2), Some("Review and update"));

        assert_eq!(
            c.classify("Access control policy can be included", 1).unwrap(),
            RowKind::FreeText
        );
    }

    #[test]
    fn test_rev5_identifier_without_tab_is_free_text() {
        let c = create_rev5_classifier();
        assert_eq!(c.classify("AC-1", 1).unwrap(), RowKind::FreeText);
    }
}
