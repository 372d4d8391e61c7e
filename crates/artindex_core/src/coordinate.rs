//! Artifact coordinates and their extraction from repository paths.
//!
//! Repository layout:
//!
//! ```text
//! <group segments>/<artifactId>/<version>/<artifactId>-<version>[-<classifier>].<extension>
//! ```
//!
//! Snapshot version directories (`1.1-SNAPSHOT`) may also hold timestamped
//! builds named `<artifactId>-1.1-<yyyyMMdd.HHmmss>-<buildNumber>[-<classifier>].<extension>`.
//! Extraction never reads file contents.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version suffix marking a snapshot version directory.
pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// The identifying tuple of one artifact file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    /// Dotted group identifier, e.g. `org.example`.
    pub group_id: String,
    /// Artifact identifier.
    pub artifact_id: String,
    /// Version as encoded in the file name. Timestamped snapshot builds carry
    /// their resolved version (`1.1-20230101.120000-1`).
    pub version: String,
    /// Optional classifier (`sources`, `javadoc`, ...).
    pub classifier: Option<String>,
    /// File extension, e.g. `jar` or `pom`.
    pub packaging: String,
}

impl Coordinate {
    /// Creates an unclassified coordinate.
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        packaging: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            classifier: None,
            packaging: packaging.into(),
        }
    }

    /// Returns the coordinate with `classifier` set.
    #[must_use]
    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    /// Returns the version directory this artifact lives in.
    ///
    /// Timestamped snapshot builds live in their `-SNAPSHOT` directory.
    #[must_use]
    pub fn base_version(&self) -> String {
        match SnapshotBuild::parse(&self.version) {
            Some(build) => build.base_version,
            None => self.version.clone(),
        }
    }

    /// Returns the artifact directory, relative to the repository root.
    #[must_use]
    pub fn artifact_dir(&self) -> String {
        format!("{}/{}", self.group_id.replace('.', "/"), self.artifact_id)
    }

    /// Returns the file name encoding this coordinate.
    #[must_use]
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                self.artifact_id, self.version, classifier, self.packaging
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.packaging),
        }
    }

    /// Returns the path of the file, relative to the repository root.
    #[must_use]
    pub fn relative_path(&self) -> String {
        format!(
            "{}/{}/{}",
            self.artifact_dir(),
            self.base_version(),
            self.file_name()
        )
    }
}

impl fmt::Display for Coordinate {
    /// Formats as `groupId:artifactId:packaging[:classifier]:version`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.packaging)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        write!(f, ":{}", self.version)
    }
}

/// One timestamped snapshot build, decoded from a resolved version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotBuild {
    /// The `-SNAPSHOT` version the build belongs to.
    pub base_version: String,
    /// Build timestamp, `yyyyMMdd.HHmmss`.
    pub timestamp: String,
    /// Build number.
    pub build_number: u32,
}

impl SnapshotBuild {
    /// Decodes `1.1-20230101.120000-2`; returns `None` for any other shape.
    #[must_use]
    pub fn parse(version: &str) -> Option<Self> {
        let mut parts = version.rsplitn(3, '-');
        let build = parts.next()?;
        let timestamp = parts.next()?;
        let base = parts.next()?;

        if base.is_empty() || !is_timestamp(timestamp) || !is_digits(build) {
            return None;
        }

        Some(Self {
            base_version: format!("{base}{SNAPSHOT_SUFFIX}"),
            timestamp: timestamp.to_string(),
            build_number: build.parse().ok()?,
        })
    }
}

/// Returns true for `-SNAPSHOT` versions and timestamped snapshot builds.
#[must_use]
pub fn is_snapshot_version(version: &str) -> bool {
    version.ends_with(SNAPSHOT_SUFFIX) || SnapshotBuild::parse(version).is_some()
}

/// Derives the coordinate of the file at `relative_path`.
///
/// # Errors
///
/// Returns [`CoreError::MalformedPath`] when the path is not
/// `group/artifact/version/file`, or when the file name does not encode
/// `artifactId-version[-classifier].extension`.
pub fn extract(relative_path: &str) -> CoreResult<Coordinate> {
    let normalized = relative_path.replace('\\', "/");
    let trimmed = normalized.trim_matches('/');
    let segments: Vec<&str> = trimmed.split('/').collect();

    if segments.len() < 4 {
        return Err(CoreError::malformed_path(
            relative_path,
            "expected group/artifact/version/file",
        ));
    }
    if segments.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
        return Err(CoreError::malformed_path(relative_path, "empty or relative segment"));
    }

    let n = segments.len();
    // Group directories map one-to-one onto the dot-separated group id.
    if segments[..n - 3].iter().any(|s| s.contains('.')) {
        return Err(CoreError::malformed_path(
            relative_path,
            "group directories must not contain '.'",
        ));
    }

    let file_name = segments[n - 1];
    let version_dir = segments[n - 2];
    let artifact_id = segments[n - 3];
    let group_id = segments[..n - 3].join(".");

    let rest = file_name
        .strip_prefix(artifact_id)
        .and_then(|r| r.strip_prefix('-'))
        .ok_or_else(|| {
            CoreError::malformed_path(
                relative_path,
                format!("file name does not start with {artifact_id}-"),
            )
        })?;

    let (version, tail) = split_version(rest, version_dir).ok_or_else(|| {
        CoreError::malformed_path(
            relative_path,
            format!("file name does not encode version {version_dir}"),
        )
    })?;

    let (classifier, packaging) = split_classifier(tail)
        .ok_or_else(|| CoreError::malformed_path(relative_path, "missing or invalid extension"))?;

    Ok(Coordinate {
        group_id,
        artifact_id: artifact_id.to_string(),
        version,
        classifier,
        packaging,
    })
}

/// Splits `rest` into the file's version and the remaining `[-classifier].ext`.
fn split_version<'a>(rest: &'a str, version_dir: &str) -> Option<(String, &'a str)> {
    if let Some(tail) = rest.strip_prefix(version_dir) {
        if tail.starts_with('.') || tail.starts_with('-') {
            return Some((version_dir.to_string(), tail));
        }
    }

    let base = version_dir.strip_suffix(SNAPSHOT_SUFFIX)?;
    let after_base = rest.strip_prefix(base)?.strip_prefix('-')?;

    // yyyyMMdd.HHmmss-N
    let timestamp = after_base.get(..15)?;
    if !is_timestamp(timestamp) {
        return None;
    }
    let after_timestamp = after_base[15..].strip_prefix('-')?;
    let build_len = after_timestamp
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(after_timestamp.len());
    if build_len == 0 {
        return None;
    }
    let build = &after_timestamp[..build_len];
    let tail = &after_timestamp[build_len..];

    Some((format!("{base}-{timestamp}-{build}"), tail))
}

fn split_classifier(tail: &str) -> Option<(Option<String>, String)> {
    if let Some(ext) = tail.strip_prefix('.') {
        return valid_extension(ext).then(|| (None, ext.to_string()));
    }

    let classified = tail.strip_prefix('-')?;
    let dot = classified.find('.')?;
    let (classifier, ext) = (&classified[..dot], &classified[dot + 1..]);
    if classifier.is_empty() || !valid_extension(ext) {
        return None;
    }
    Some((Some(classifier.to_string()), ext.to_string()))
}

fn valid_extension(ext: &str) -> bool {
    !ext.is_empty() && !ext.starts_with('.') && !ext.ends_with('.')
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_timestamp(s: &str) -> bool {
    s.len() == 15
        && s.as_bytes()[8] == b'.'
        && is_digits(&s[..8])
        && is_digits(&s[9..])
}
