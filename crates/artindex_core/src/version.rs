//! Version ordering rules.
//!
//! A repository is configured with one [`VersionOrdering`]. The metadata
//! generator uses it to order version lists and the index store uses it to
//! order query results.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// Compares two version strings.
///
/// Implementations must be a total order that only reports `Equal` for
/// identical strings.
pub trait VersionOrdering: Send + Sync {
    /// Compares `a` with `b`.
    fn compare(&self, a: &str, b: &str) -> Ordering;

    /// Short name of the rule, for logs.
    fn name(&self) -> &'static str;
}

/// Numeric-aware ordering.
///
/// Versions are split on `.` and `-`. Segments made only of digits compare
/// numerically, other segments lexicographically (case-insensitive first,
/// then by raw bytes). When one version runs out of segments:
///
/// - a remaining numeric segment makes the longer version greater (`1.0 < 1.0.1`)
/// - a remaining qualifier makes the longer version smaller (`2.0-SNAPSHOT < 2.0`)
///
/// A numeric segment sorts after a qualifier in the same position.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericAwareOrdering;

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Number(&'a str),
    Qualifier(&'a str),
}

impl<'a> Segment<'a> {
    fn parse(raw: &'a str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            Segment::Number(raw)
        } else {
            Segment::Qualifier(raw)
        }
    }
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_qualifiers(a: &str, b: &str) -> Ordering {
    a.to_ascii_lowercase()
        .cmp(&b.to_ascii_lowercase())
        .then_with(|| a.cmp(b))
}

impl VersionOrdering for NumericAwareOrdering {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        let mut left = a.split(['.', '-']).map(Segment::parse);
        let mut right = b.split(['.', '-']).map(Segment::parse);

        loop {
            let ordering = match (left.next(), right.next()) {
                (None, None) => break,
                (Some(Segment::Number(_)), None) => Ordering::Greater,
                (Some(Segment::Qualifier(_)), None) => Ordering::Less,
                (None, Some(Segment::Number(_))) => Ordering::Less,
                (None, Some(Segment::Qualifier(_))) => Ordering::Greater,
                (Some(Segment::Number(x)), Some(Segment::Number(y))) => compare_numbers(x, y),
                (Some(Segment::Qualifier(x)), Some(Segment::Qualifier(y))) => {
                    compare_qualifiers(x, y)
                }
                (Some(Segment::Number(_)), Some(Segment::Qualifier(_))) => Ordering::Greater,
                (Some(Segment::Qualifier(_)), Some(Segment::Number(_))) => Ordering::Less,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        // "1.0" and "1-0", or "01" and "1": fall back to the raw text.
        a.cmp(b)
    }

    fn name(&self) -> &'static str {
        "numeric-aware"
    }
}

/// Plain byte-wise string ordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicographicOrdering;

impl VersionOrdering for LexicographicOrdering {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }

    fn name(&self) -> &'static str {
        "lexicographic"
    }
}

/// Configurable selector for a [`VersionOrdering`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionOrderingKind {
    /// [`NumericAwareOrdering`].
    #[default]
    NumericAware,
    /// [`LexicographicOrdering`].
    Lexicographic,
}

impl VersionOrderingKind {
    /// Builds the selected ordering.
    #[must_use]
    pub fn build(self) -> Arc<dyn VersionOrdering> {
        match self {
            VersionOrderingKind::NumericAware => Arc::new(NumericAwareOrdering),
            VersionOrderingKind::Lexicographic => Arc::new(LexicographicOrdering),
        }
    }
}

/// Sorts `versions` ascending under `ordering`.
pub fn sort_versions(versions: &mut [String], ordering: &dyn VersionOrdering) {
    versions.sort_by(|a, b| ordering.compare(a, b));
}
