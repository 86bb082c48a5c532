//! Game-version gate for texture packs.
//!
//! Versions are compared component-wise on their numeric parts, so `1.9` is
//! older than `1.16`. Each dot-separated segment contributes its leading
//! digits; parsing stops at the first segment that has none, or right after a
//! segment with a non-numeric tail (`1.20-pre1` reads as `1.20`). Missing
//! trailing components count as zero.

use std::cmp::Ordering;

fn numeric_components(version: &str) -> Vec<u64> {
    let mut components = Vec::new();
    for segment in version.trim().split('.') {
        let digits: String = segment.chars().take_while(char::is_ascii_digit).collect();
        let Ok(value) = digits.parse::<u64>() else {
            break;
        };
        components.push(value);
        if digits.len() != segment.len() {
            break;
        }
    }
    components
}

fn compare_components(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// Returns whether `candidate` is the same as or newer than `minimum`.
///
/// A candidate without any numeric component (`b1.7.3`, `latest`) never
/// passes. A minimum without numeric components falls back to plain string
/// ordering.
#[must_use]
pub fn version_at_least(candidate: &str, minimum: &str) -> bool {
    let minimum_parts = numeric_components(minimum);
    if minimum_parts.is_empty() {
        return candidate >= minimum;
    }
    let candidate_parts = numeric_components(candidate);
    if candidate_parts.is_empty() {
        return false;
    }
    compare_components(&candidate_parts, &minimum_parts) != Ordering::Less
}

/// Returns whether any of `versions` is at least `minimum`.
#[must_use]
pub fn any_version_at_least<S: AsRef<str>>(versions: &[S], minimum: &str) -> bool {
    versions
        .iter()
        .any(|version| version_at_least(version.as_ref(), minimum))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_components_parsing() {
        assert_eq!(numeric_components("1.16.5"), vec![1, 16, 5]);
        assert_eq!(numeric_components("1.20-pre1"), vec![1, 20]);
        assert_eq!(numeric_components("23w14a"), vec![23]);
        assert!(numeric_components("b1.7.3").is_empty());
        assert!(numeric_components("").is_empty());
    }

    #[test]
    fn test_equal_versions_pass() {
        assert!(version_at_least("1.16", "1.16"));
        assert!(version_at_least("1.16.0", "1.16"));
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        assert!(!version_at_least("1.9", "1.16"));
        assert!(version_at_least("1.19.2", "1.16"));
        assert!(version_at_least("1.16.5", "1.16"));
        assert!(!version_at_least("1.15.2", "1.16"));
    }

    #[test]
    fn test_patch_minimum() {
        assert!(!version_at_least("1.16", "1.16.2"));
        assert!(version_at_least("1.16.3", "1.16.2"));
    }

    #[test]
    fn test_non_numeric_candidate_fails() {
        assert!(!version_at_least("b1.7.3", "1.0"));
        assert!(!version_at_least("", "1.16"));
    }

    #[test]
    fn test_any_version_at_least() {
        assert!(any_version_at_least(&["1.12.2", "1.20.1"], "1.16"));
        assert!(!any_version_at_least(&["1.8.9", "1.12.2"], "1.16"));
        assert!(!any_version_at_least::<&str>(&[], "1.16"));
    }

    #[test]
    fn test_rejects_when_no_version_meets_any_minimum() {
        let versions = ["1.8.9", "1.12.2"];
        for minimum in ["1.13", "1.16", "1.20.4", "2.0"] {
            assert!(
                !any_version_at_least(&versions, minimum),
                "minimum {minimum} should reject {versions:?}"
            );
        }
    }
}
