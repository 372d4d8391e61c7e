//! Structured coordinate predicates.
//!
//! A [`Predicate`] is a list of clauses over the coordinate fields. Each
//! clause is either required or optional:
//!
//! - every required clause must match
//! - without required clauses, at least one optional clause must match
//! - an empty predicate matches every entry
//!
//! Predicates also parse from the clause syntax used by repository search
//! front ends:
//!
//! ```text
//! +g:org.example +a:lib +v:1.0 c:javadoc +p:jar
//! ```
//!
//! `+` marks a required clause. A trailing `*` turns the value into a
//! prefix match. An empty value (`+c:`) matches an absent field.

use crate::coordinate::Coordinate;
use crate::error::{CoreError, CoreResult};
use std::fmt;
use std::str::FromStr;

/// A coordinate field a clause can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// `g`
    GroupId,
    /// `a`
    ArtifactId,
    /// `v`
    Version,
    /// `c`
    Classifier,
    /// `p`
    Packaging,
}

impl Field {
    /// Returns the one-letter name used in query strings.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Field::GroupId => 'g',
            Field::ArtifactId => 'a',
            Field::Version => 'v',
            Field::Classifier => 'c',
            Field::Packaging => 'p',
        }
    }

    /// Resolves a one-letter field name.
    #[must_use]
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "g" => Some(Field::GroupId),
            "a" => Some(Field::ArtifactId),
            "v" => Some(Field::Version),
            "c" => Some(Field::Classifier),
            "p" => Some(Field::Packaging),
            _ => None,
        }
    }

    fn value(self, coordinate: &Coordinate) -> Option<&str> {
        match self {
            Field::GroupId => Some(&coordinate.group_id),
            Field::ArtifactId => Some(&coordinate.artifact_id),
            Field::Version => Some(&coordinate.version),
            Field::Classifier => coordinate.classifier.as_deref(),
            Field::Packaging => Some(&coordinate.packaging),
        }
    }
}

/// How a clause compares a field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Matcher {
    /// The field equals the value.
    Exact(String),
    /// The field starts with the value.
    Prefix(String),
    /// The field is absent (only classifiers can be).
    Absent,
}

impl Matcher {
    /// Creates an exact matcher.
    pub fn exact(value: impl Into<String>) -> Self {
        Matcher::Exact(value.into())
    }

    /// Creates a prefix matcher.
    pub fn prefix(value: impl Into<String>) -> Self {
        Matcher::Prefix(value.into())
    }

    fn matches(&self, value: Option<&str>) -> bool {
        match (self, value) {
            (Matcher::Exact(expected), Some(actual)) => expected == actual,
            (Matcher::Prefix(prefix), Some(actual)) => actual.starts_with(prefix.as_str()),
            (Matcher::Absent, None) => true,
            _ => false,
        }
    }
}

/// Whether a clause must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occur {
    /// The clause must match.
    Required,
    /// The clause may match.
    Optional,
}

/// One field test inside a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clause {
    /// Tested field.
    pub field: Field,
    /// Comparison.
    pub matcher: Matcher,
    /// Required or optional.
    pub occur: Occur,
}

impl Clause {
    fn matches(&self, coordinate: &Coordinate) -> bool {
        self.matcher.matches(self.field.value(coordinate))
    }
}

/// A conjunction of required clauses plus optional clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    /// Creates a predicate that matches every entry.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Adds a required clause.
    #[must_use]
    pub fn require(mut self, field: Field, matcher: Matcher) -> Self {
        self.clauses.push(Clause {
            field,
            matcher,
            occur: Occur::Required,
        });
        self
    }

    /// Adds an optional clause.
    #[must_use]
    pub fn optional(mut self, field: Field, matcher: Matcher) -> Self {
        self.clauses.push(Clause {
            field,
            matcher,
            occur: Occur::Optional,
        });
        self
    }

    /// Builds the predicate matching exactly `coordinate`.
    ///
    /// An unclassified coordinate only matches unclassified entries.
    #[must_use]
    pub fn for_coordinate(coordinate: &Coordinate) -> Self {
        let classifier = match &coordinate.classifier {
            Some(classifier) => Matcher::exact(classifier),
            None => Matcher::Absent,
        };

        Self::any()
            .require(Field::GroupId, Matcher::exact(&coordinate.group_id))
            .require(Field::ArtifactId, Matcher::exact(&coordinate.artifact_id))
            .require(Field::Version, Matcher::exact(&coordinate.version))
            .require(Field::Classifier, classifier)
            .require(Field::Packaging, Matcher::exact(&coordinate.packaging))
    }

    /// Returns the clauses.
    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Evaluates the predicate against a coordinate.
    #[must_use]
    pub fn matches(&self, coordinate: &Coordinate) -> bool {
        let mut has_required = false;
        let mut any_optional = false;
        let mut has_optional = false;

        for clause in &self.clauses {
            match clause.occur {
                Occur::Required => {
                    has_required = true;
                    if !clause.matches(coordinate) {
                        return false;
                    }
                }
                Occur::Optional => {
                    has_optional = true;
                    any_optional = any_optional || clause.matches(coordinate);
                }
            }
        }

        has_required || !has_optional || any_optional
    }
}

impl FromStr for Predicate {
    type Err = CoreError;

    fn from_str(query: &str) -> CoreResult<Self> {
        let mut predicate = Predicate::any();

        for token in query.split_whitespace() {
            let (occur, clause) = match token.strip_prefix('+') {
                Some(rest) => (Occur::Required, rest),
                None => (Occur::Optional, token),
            };

            let (name, value) = clause.split_once(':').ok_or_else(|| {
                CoreError::invalid_query(format!("clause {token:?} is not field:value"))
            })?;
            let field = Field::from_letter(name)
                .ok_or_else(|| CoreError::invalid_query(format!("unknown field {name:?}")))?;

            let matcher = if value.is_empty() {
                Matcher::Absent
            } else if let Some(prefix) = value.strip_suffix('*') {
                if prefix.contains('*') {
                    return Err(CoreError::invalid_query(format!(
                        "only trailing wildcards are supported: {token:?}"
                    )));
                }
                Matcher::prefix(prefix)
            } else if value.contains('*') {
                return Err(CoreError::invalid_query(format!(
                    "only trailing wildcards are supported: {token:?}"
                )));
            } else {
                Matcher::exact(value)
            };

            predicate.clauses.push(Clause {
                field,
                matcher,
                occur,
            });
        }

        Ok(predicate)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if clause.occur == Occur::Required {
                f.write_str("+")?;
            }
            write!(f, "{}:", clause.field.letter())?;
            match &clause.matcher {
                Matcher::Exact(value) => f.write_str(value)?,
                Matcher::Prefix(value) => write!(f, "{value}*")?,
                Matcher::Absent => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jar(version: &str) -> Coordinate {
        Coordinate::new("org.carlspring.strongbox.indexes", "strongbox-test", version, "jar")
    }

    #[test]
    fn empty_predicate_matches_everything() {
        assert!(Predicate::any().matches(&jar("1.0")));
    }

    #[test]
    fn required_clauses_are_conjunctive() {
        let p = Predicate::any()
            .require(Field::ArtifactId, Matcher::exact("strongbox-test"))
            .require(Field::Version, Matcher::exact("1.0"));

        assert!(p.matches(&jar("1.0")));
        assert!(!p.matches(&jar("1.1")));
    }

    #[test]
    fn prefix_matching() {
        let p = Predicate::any().require(Field::GroupId, Matcher::prefix("org.carlspring"));
        assert!(p.matches(&jar("1.0")));

        let p = Predicate::any().require(Field::GroupId, Matcher::prefix("com."));
        assert!(!p.matches(&jar("1.0")));
    }

    #[test]
    fn optional_clauses_alone_need_one_match() {
        let p = Predicate::any()
            .optional(Field::Version, Matcher::exact("1.0"))
            .optional(Field::Version, Matcher::exact("1.1"));

        assert!(p.matches(&jar("1.0")));
        assert!(p.matches(&jar("1.1")));
        assert!(!p.matches(&jar("2.0")));
    }

    #[test]
    fn optional_clauses_do_not_filter_next_to_required() {
        let p: Predicate = "+g:org.carlspring.strongbox.indexes +a:strongbox-test +v:1.0 c:javadoc +p:jar"
            .parse()
            .unwrap();

        assert!(p.matches(&jar("1.0")));
        assert!(p.matches(&jar("1.0").with_classifier("javadoc")));
        assert!(!p.matches(&jar("1.1").with_classifier("javadoc")));
    }

    #[test]
    fn coordinate_predicate_separates_classifiers() {
        let plain = jar("1.0");
        let sources = jar("1.0").with_classifier("sources");

        let p = Predicate::for_coordinate(&plain);
        assert!(p.matches(&plain));
        assert!(!p.matches(&sources));

        let p = Predicate::for_coordinate(&sources);
        assert!(p.matches(&sources));
        assert!(!p.matches(&plain));
    }

    #[test]
    fn parse_and_display() {
        let p: Predicate = "+g:org.example* a:lib +c:".parse().unwrap();
        assert_eq!(p.clauses().len(), 3);
        assert_eq!(p.clauses()[0].matcher, Matcher::prefix("org.example"));
        assert_eq!(p.clauses()[1].occur, Occur::Optional);
        assert_eq!(p.clauses()[2].matcher, Matcher::Absent);
        assert_eq!(p.to_string(), "+g:org.example* a:lib +c:");
    }

    #[test]
    fn parse_errors() {
        assert!("+x:foo".parse::<Predicate>().is_err());
        assert!("+g".parse::<Predicate>().is_err());
        assert!("+g:o*g".parse::<Predicate>().is_err());
        assert!("+g:*org*".parse::<Predicate>().is_err());
    }
}
