//! Property-based test generators.
//!
//! Provides proptest strategies for repository paths and versions.

use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

/// Components of a generated coordinate:
/// `(group_id, artifact_id, version, classifier, packaging)`.
pub type CoordinateParts = (String, String, String, Option<String>, String);

/// Strategy for dotted group identifiers (`org.example.tools`).
pub fn group_id_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z][a-z0-9]{0,7}", 1..=4).prop_map(|segments| segments.join("."))
}

/// Strategy for artifact identifiers, optionally hyphenated.
pub fn artifact_id_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,6}(-[a-z][a-z0-9]{0,5})?"
}

/// Strategy for release versions (`1`, `1.10`, `2.0.3`).
pub fn release_version_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(0u32..=20, 1..=3).prop_map(|parts| {
        parts
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(".")
    })
}

/// Strategy for snapshot build timestamps (`yyyyMMdd.HHmmss`).
pub fn timestamp_strategy() -> impl Strategy<Value = String> {
    (2000u32..=2099, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60).prop_map(
        |(year, month, day, hour, minute, second)| {
            format!("{year:04}{month:02}{day:02}.{hour:02}{minute:02}{second:02}")
        },
    )
}

/// Strategy for versions: releases, `-SNAPSHOT` versions and timestamped
/// snapshot builds.
pub fn version_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => release_version_strategy(),
        1 => release_version_strategy().prop_map(|v| format!("{v}-SNAPSHOT")),
        1 => (release_version_strategy(), timestamp_strategy(), 1u32..1000)
            .prop_map(|(v, ts, build)| format!("{v}-{ts}-{build}")),
    ]
}

/// Strategy for classifiers.
pub fn classifier_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z]{1,8}")
}

/// Strategy for packaging extensions.
pub fn packaging_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,4}"
}

/// Strategy for complete coordinates whose repository path decodes back to
/// the same components.
pub fn coordinate_strategy() -> impl Strategy<Value = CoordinateParts> {
    (
        group_id_strategy(),
        artifact_id_strategy(),
        version_strategy(),
        classifier_strategy(),
        packaging_strategy(),
    )
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
