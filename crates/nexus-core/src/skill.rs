use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered node in the hierarchical skill taxonomy,
/// e.g. `["Development", "Backend", "Python", "CodeGeneration"]`.
///
/// Segment comparison is case-insensitive; segment order is significant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillPath(Vec<String>);

impl SkillPath {
    /// Build a path from any sequence of string-like segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The raw segments in order.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First segment, if any.
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Number of leading segments that match `other`, stopping at the first
    /// mismatch.
    pub fn common_prefix_len(&self, other: &SkillPath) -> usize {
        self.0
            .iter()
            .zip(&other.0)
            .take_while(|(a, b)| segment_eq(a, b))
            .count()
    }

    /// True when every segment of `self` matches the leading segments of `other`.
    pub fn is_prefix_of(&self, other: &SkillPath) -> bool {
        self.len() <= other.len() && self.common_prefix_len(other) == self.len()
    }

    /// Segments joined with `"."`, the form used for metrics keys.
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

/// Case-insensitive comparison of two taxonomy segments.
pub fn segment_eq(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

impl PartialEq for SkillPath {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.common_prefix_len(other) == self.len()
    }
}

impl Eq for SkillPath {}

impl fmt::Display for SkillPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" --> "))
    }
}

impl<S: Into<String>> FromIterator<S> for SkillPath {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl From<Vec<String>> for SkillPath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for SkillPath {
    fn from(segments: &[&str]) -> Self {
        Self::new(segments.iter().copied())
    }
}
