//! Component type tags.
//!
//! Every component type registers an explicit tag at startup. The tag is
//! wire-visible: it becomes a routing-key segment (`component.<tag>`,
//! `query.<tag>...`, `registry.<tag>`), so its grammar is a single
//! subject segment — lowercase ASCII, digits, `_` and `-`, no dots.
//! Runtime type names are never used for routing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Registered tag identifying a component type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(String);

impl TypeTag {
    /// Creates a tag, validating the segment grammar.
    pub fn new(tag: impl Into<String>) -> crate::Result<Self> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(Error::InvalidTypeTag("empty tag".into()));
        }
        if !tag
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
        {
            return Err(Error::InvalidTypeTag(format!(
                "tag '{tag}' must be lowercase ASCII, digits, '_' or '-'"
            )));
        }
        Ok(Self(tag))
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TypeTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
