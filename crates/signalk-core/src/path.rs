//! SignalK path parsing and validation.
//!
//! SignalK paths are dot-separated strings like "navigation.speedOverGround".
//! REST clients address the same paths with slashes
//! ("/vessels/self/navigation/speedOverGround"), so this module converts
//! between both spellings and checks that user-supplied paths are well formed.

use regex::Regex;
use std::sync::OnceLock;

/// A parsed SignalK path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    /// The original path string
    raw: String,
    /// Path segments split by '.'
    segments: Vec<String>,
}

fn segment_regex() -> &'static Regex {
    static SEGMENT: OnceLock<Regex> = OnceLock::new();
    SEGMENT.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static regex"))
}

impl Path {
    /// Parse a path string into segments.
    pub fn new(path: &str) -> Self {
        Self {
            raw: path.to_string(),
            segments: path.split('.').map(String::from).collect(),
        }
    }

    /// Parse and validate a path: every segment must be a non-empty
    /// run of ASCII letters, digits or underscores.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        let parsed = Self::new(path);
        if let Some(bad) = parsed
            .segments
            .iter()
            .find(|s| !segment_regex().is_match(s))
        {
            return Err(PathError::InvalidSegment {
                path: path.to_string(),
                segment: bad.clone(),
            });
        }
        Ok(parsed)
    }

    /// Convert a slash separated URL tail into a dotted path.
    ///
    /// Leading, trailing and repeated slashes are ignored.
    pub fn from_url(url_path: &str) -> Result<Self, PathError> {
        let dotted = url_path
            .split('/')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(".");
        Self::parse(&dotted)
    }

    /// Join a root prefix and a sub-path ("navigation" + "anchor.depth").
    pub fn join(&self, child: &Path) -> Path {
        Path::new(&format!("{}.{}", self.raw, child.raw))
    }

    /// Get the raw path string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Get the path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Errors that can occur when validating a path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathError {
    #[error("Empty path")]
    Empty,

    #[error("Invalid segment '{segment}' in path '{path}'")]
    InvalidSegment { path: String, segment: String },
}
