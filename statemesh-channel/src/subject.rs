//! Routing subjects and subscription patterns.
//!
//! Subjects are hierarchical, dot-separated strings. The wire-visible
//! grammar is fixed: `entity.<uuid>`, `component.<type-tag>`,
//! `query.<sorted-tags…>`, `registry.<type-tag>`. Any implementation
//! interoperating with existing publishers must preserve it.
//!
//! Patterns extend subjects with two wildcards, matched left-to-right:
//! `*` matches exactly one segment; `>` (alias `**`) matches one or more
//! trailing segments and is only legal in final position.

use serde::{Deserialize, Serialize};
use statemesh_types::{EntityId, TypeTag};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from subject and pattern parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubjectError {
    #[error("empty subject")]
    Empty,

    #[error("empty segment in '{0}'")]
    EmptySegment(String),

    #[error("invalid segment '{segment}' in '{subject}'")]
    InvalidSegment { subject: String, segment: String },

    #[error("wildcard '{segment}' not allowed in a concrete subject")]
    WildcardInSubject { segment: String },

    #[error("'>' must be the final segment in '{0}'")]
    TrailingWildcardNotLast(String),
}

fn valid_segment_char(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-'
}

fn check_segments(raw: &str) -> Result<(), SubjectError> {
    if raw.is_empty() {
        return Err(SubjectError::Empty);
    }
    for segment in raw.split('.') {
        if segment.is_empty() {
            return Err(SubjectError::EmptySegment(raw.to_string()));
        }
    }
    Ok(())
}

/// A concrete routing subject: where a message is published.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    /// Parses a concrete subject. Wildcards are rejected.
    pub fn new(raw: impl Into<String>) -> Result<Self, SubjectError> {
        let raw = raw.into();
        check_segments(&raw)?;
        for segment in raw.split('.') {
            if segment == "*" || segment == ">" || segment == "**" {
                return Err(SubjectError::WildcardInSubject {
                    segment: segment.to_string(),
                });
            }
            if !segment.bytes().all(valid_segment_char) {
                return Err(SubjectError::InvalidSegment {
                    subject: raw.clone(),
                    segment: segment.to_string(),
                });
            }
        }
        Ok(Self(raw))
    }

    /// The subject an entity's component updates are published on.
    #[must_use]
    pub fn entity(id: &EntityId) -> Self {
        Self(id.routing_key())
    }

    /// The per-component-type subject: `component.<tag>`.
    #[must_use]
    pub fn component(tag: &TypeTag) -> Self {
        Self(format!("component.{tag}"))
    }

    /// The canonical query subject for a set of required tags:
    /// `query.<tags sorted and dot-joined>`. Sorting makes semantically
    /// identical queries target the same subject.
    #[must_use]
    pub fn query<'a>(tags: impl IntoIterator<Item = &'a TypeTag>) -> Self {
        let mut tags: Vec<&TypeTag> = tags.into_iter().collect();
        tags.sort();
        tags.dedup();
        let joined = tags
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(".");
        Self(format!("query.{joined}"))
    }

    /// The single-tag registry lookup subject: `registry.<tag>`.
    #[must_use]
    pub fn registry(tag: &TypeTag) -> Self {
        Self(format!("registry.{tag}"))
    }

    /// Returns the subject as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates the dot-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Subject {
    type Err = SubjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A subscription pattern: a subject with optional wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectPattern(String);

impl SubjectPattern {
    /// Parses a pattern. `**` is normalized to `>`.
    pub fn new(raw: impl Into<String>) -> Result<Self, SubjectError> {
        let raw = raw.into();
        check_segments(&raw)?;
        let segments: Vec<&str> = raw.split('.').collect();
        let last = segments.len() - 1;
        let mut normalized = Vec::with_capacity(segments.len());
        for (i, segment) in segments.iter().enumerate() {
            match *segment {
                ">" | "**" => {
                    if i != last {
                        return Err(SubjectError::TrailingWildcardNotLast(raw.clone()));
                    }
                    normalized.push(">");
                }
                "*" => normalized.push("*"),
                other => {
                    if !other.bytes().all(valid_segment_char) {
                        return Err(SubjectError::InvalidSegment {
                            subject: raw.clone(),
                            segment: other.to_string(),
                        });
                    }
                    normalized.push(other);
                }
            }
        }
        Ok(Self(normalized.join(".")))
    }

    /// Every concrete subject is also a valid pattern.
    #[must_use]
    pub fn from_subject(subject: &Subject) -> Self {
        Self(subject.as_str().to_string())
    }

    /// Returns the pattern as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Matches a concrete subject against this pattern, left-to-right.
    #[must_use]
    pub fn matches(&self, subject: &Subject) -> bool {
        let mut pattern = self.0.split('.');
        let mut segments = subject.segments();

        loop {
            match (pattern.next(), segments.next()) {
                (Some(">"), Some(_)) => return true,
                (Some(">"), None) => return false,
                (Some("*"), Some(_)) => {}
                (Some(p), Some(s)) if p == s => {}
                (Some(_), Some(_)) => return false,
                (None, None) => return true,
                (None, Some(_)) | (Some(_), None) => return false,
            }
        }
    }
}

impl fmt::Display for SubjectPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubjectPattern {
    type Err = SubjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(s: &str) -> Subject {
        Subject::new(s).unwrap()
    }

    fn pattern(s: &str) -> SubjectPattern {
        SubjectPattern::new(s).unwrap()
    }

    #[test]
    fn exact_match() {
        assert!(pattern("entity.abc").matches(&subject("entity.abc")));
        assert!(!pattern("entity.abc").matches(&subject("entity.def")));
    }

    #[test]
    fn single_segment_wildcard() {
        assert!(pattern("entity.*").matches(&subject("entity.abc")));
        assert!(!pattern("entity.*").matches(&subject("entity.abc.extra")));
        assert!(!pattern("entity.*").matches(&subject("entity")));
        assert!(pattern("*.abc").matches(&subject("entity.abc")));
    }

    #[test]
    fn trailing_wildcard_needs_one_segment() {
        assert!(pattern("entity.>").matches(&subject("entity.abc")));
        assert!(pattern("entity.>").matches(&subject("entity.abc.extra")));
        assert!(!pattern("entity.>").matches(&subject("entity")));
    }

    #[test]
    fn double_star_is_alias_for_gt() {
        assert_eq!(pattern("entity.**"), pattern("entity.>"));
    }

    #[test]
    fn gt_must_be_last() {
        assert!(SubjectPattern::new("entity.>.abc").is_err());
    }
}
