//! Dotted path parsing.
//!
//! A [`Path`] is parsed once and then used as a list of segments. The empty
//! string parses to the root path.

use crate::{Result, StoreError};
use std::fmt;
use std::str::FromStr;

/// A validated, pre-parsed dotted path such as `entities.review`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// The root path (no segments).
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parse a dotted string into a path.
    ///
    /// Each segment must be a non-empty run of ASCII alphanumerics, `_` or
    /// `-`. Surrounding whitespace is ignored; an empty input is the root.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for part in trimmed.split('.') {
            validate_segment(trimmed, part)?;
            segments.push(part.to_string());
        }
        Ok(Self { segments })
    }

    /// Build a path from already-split segments, validating each one.
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let joined = segments.join(".");
        for seg in &segments {
            validate_segment(&joined, seg)?;
        }
        Ok(Self { segments })
    }

    /// Return a new path with `segment` appended.
    pub fn child(&self, segment: &str) -> Result<Self> {
        validate_segment(&format!("{self}.{segment}"), segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The parent path and final segment, or `None` for the root.
    #[must_use]
    pub fn split_last(&self) -> Option<(Path, &str)> {
        let (last, rest) = self.segments.split_last()?;
        Some((
            Path {
                segments: rest.to_vec(),
            },
            last.as_str(),
        ))
    }

    /// Format back to a dotted string.
    #[must_use]
    pub fn to_dotted(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dotted())
    }
}

impl FromStr for Path {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for Path {
    type Error = StoreError;

    fn try_from(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn validate_segment(path: &str, segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(StoreError::InvalidPath {
            path: path.to_string(),
            reason: "empty segment".to_string(),
        });
    }
    if let Some(bad) = segment
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(StoreError::InvalidPath {
            path: path.to_string(),
            reason: format!("unexpected character {bad:?} in segment '{segment}'"),
        });
    }
    Ok(())
}
