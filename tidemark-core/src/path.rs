//! Path - Dot-separated addresses into a ConfigValue tree
//!
//! A path such as `metadata.0.labels` is a sequence of segments. Segments are
//! kept as strings; whether a segment is a list index or a map key is decided
//! at resolution time against the node being traversed.

use std::fmt;

/// Suffix appended to the last segment of a tracked path to address its
/// origin companion (e.g. `tags` -> `tags_origin`)
pub const ORIGIN_SUFFIX: &str = "_origin";

/// Last segment reported for a map size change (e.g. `tags.%`)
pub const COUNT_MARKER: &str = "%";

/// Last segment reported for a list length change (e.g. `tags.#`)
pub const LENGTH_MARKER: &str = "#";

/// Address of a value inside a nested ConfigValue tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AttrPath {
    segments: Vec<String>,
}

impl AttrPath {
    /// Parse a dot-separated path. The empty string is the empty (root) path.
    pub fn parse(path: &str) -> Self {
        if path.is_empty() {
            return Self::default();
        }
        Self {
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    pub fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path without its last segment (the root path stays the root path)
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Append `suffix` to the last segment
    pub fn with_suffix(&self, suffix: &str) -> Self {
        let mut segments = self.segments.clone();
        match segments.last_mut() {
            Some(last) => last.push_str(suffix),
            None => segments.push(suffix.to_string()),
        }
        Self { segments }
    }

    /// Companion path holding the last locally applied value
    pub fn origin(&self) -> Self {
        self.with_suffix(ORIGIN_SUFFIX)
    }

    /// Whether the last segment names an origin companion
    pub fn is_origin(&self) -> bool {
        self.last().is_some_and(|s| s.ends_with(ORIGIN_SUFFIX))
    }

    /// `<map>.%`
    pub fn is_count_marker(&self) -> bool {
        self.last() == Some(COUNT_MARKER)
    }

    /// `<list>.#`
    pub fn is_length_marker(&self) -> bool {
        self.last() == Some(LENGTH_MARKER)
    }

    pub fn starts_with(&self, prefix: &AttrPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for AttrPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<String> for AttrPath {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let path = AttrPath::parse("policy.annotations.0.key");
        assert_eq!(path.len(), 4);
        assert_eq!(path.segments()[2], "0");
        assert_eq!(path.to_string(), "policy.annotations.0.key");
    }

    #[test]
    fn empty_string_is_root() {
        let path = AttrPath::parse("");
        assert!(path.is_empty());
        assert_eq!(path.to_string(), "");
    }

    #[test]
    fn origin_suffixes_last_segment() {
        assert_eq!(
            AttrPath::parse("metadata.0.labels").origin().to_string(),
            "metadata.0.labels_origin"
        );
        assert_eq!(AttrPath::parse("tags").origin().to_string(), "tags_origin");
        assert!(AttrPath::parse("tags_origin").is_origin());
        assert!(!AttrPath::parse("tags").is_origin());
    }

    #[test]
    fn markers() {
        assert!(AttrPath::parse("tags.%").is_count_marker());
        assert!(AttrPath::parse("tags.#").is_length_marker());
        assert!(!AttrPath::parse("tags.key").is_count_marker());
    }

    #[test]
    fn parent_and_child() {
        let path = AttrPath::parse("tags.env");
        assert_eq!(path.parent(), AttrPath::parse("tags"));
        assert_eq!(path.parent().child("env"), path);
        assert!(path.starts_with(&AttrPath::parse("tags")));
        assert_eq!(AttrPath::parse("").parent(), AttrPath::parse(""));
    }
}
