//! Ordinal path (OZ) handling for BoQ trees.
//!
//! An ordinal path is the dot-separated sequence of section labels leading to
//! a node, e.g. `"01.02.003"`. It identifies a position within one document
//! and is the default key for matching positions across documents.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Dot-separated ordinal path of a BoQ node.
///
/// Segments keep their original labels verbatim, so `"01"` and `"1"` are
/// distinct paths. Ordering is lexicographic over segments, which matches
/// document order for well-formed GAEB numbering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct OzPath {
    segments: Vec<String>,
}

impl OzPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a path from ancestor labels plus the node's own label.
    /// Empty labels (the synthetic document root) are skipped.
    pub fn from_labels<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            segments: labels
                .into_iter()
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Returns a new path with `label` appended.
    pub fn child(&self, label: &str) -> Self {
        let mut segments = self.segments.clone();
        if !label.is_empty() {
            segments.push(label.to_string());
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The node's own label, i.e. the last segment.
    pub fn label(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for OzPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<OzPath> for String {
    fn from(path: OzPath) -> Self {
        path.to_string()
    }
}

impl From<String> for OzPath {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl FromStr for OzPath {
    type Err = std::convert::Infallible;

    /// `"01.02.003"` -> `["01", "02", "003"]`. Whitespace around segments is
    /// dropped; an empty string yields the empty path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments = s
            .split('.')
            .map(str::trim)
            .filter(|seg| !seg.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self { segments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_round_trip() {
        let path: OzPath = "01.02.003".parse().unwrap();
        assert_eq!(path.segments(), &["01", "02", "003"]);
        assert_eq!(path.to_string(), "01.02.003");
        assert_eq!(path.label(), Some("003"));
        assert_eq!(path.depth(), 3);
    }

    #[test]
    fn test_child_appends_label() {
        let parent: OzPath = "01".parse().unwrap();
        let child = parent.child("002");
        assert_eq!(child.to_string(), "01.002");
        // parent is untouched
        assert_eq!(parent.to_string(), "01");
    }

    #[test]
    fn test_empty_labels_are_skipped() {
        let path = OzPath::from_labels(["", "01", "002"]);
        assert_eq!(path.to_string(), "01.002");
        assert_eq!(path.child("").to_string(), "01.002");
    }

    #[test]
    fn test_labels_are_not_normalized() {
        let a: OzPath = "01.001".parse().unwrap();
        let b: OzPath = "1.1".parse().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_string_is_empty_path() {
        let path: OzPath = "".parse().unwrap();
        assert!(path.is_empty());
        assert_eq!(path.label(), None);
    }
}
