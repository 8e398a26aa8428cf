//! Path-segment patterns and classification.
//!
//! Patterns follow a simple path-segment convention: literal segments must
//! match, `*` matches any single segment, and a pattern matches any path it
//! is a segment-prefix of. Query strings and fragments are ignored.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Any,
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a pattern like `/checkout` or `/checkout/*/review`.
    ///
    /// # Errors
    /// Returns an error for an empty pattern or one containing a query or
    /// fragment part.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "/" {
            return Err(ConfigError::InvalidValue {
                key: "pattern".to_string(),
                message: "pattern must name at least one path segment".to_string(),
            });
        }
        if trimmed.contains('?') || trimmed.contains('#') {
            return Err(ConfigError::InvalidValue {
                key: "pattern".to_string(),
                message: "pattern must not contain a query or fragment".to_string(),
            });
        }
        let segments = split_segments(trimmed)
            .map(|seg| {
                if seg == "*" {
                    Segment::Any
                } else {
                    Segment::Literal(seg.to_string())
                }
            })
            .collect();
        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Segment-prefix match against a raw location (query/fragment ignored).
    pub fn matches(&self, path: &str) -> bool {
        let path = strip_extras(path);
        let mut path_segments = split_segments(path);
        for segment in &self.segments {
            let Some(actual) = path_segments.next() else {
                return false;
            };
            match segment {
                Segment::Literal(expected) if expected != actual => return false,
                _ => {}
            }
        }
        true
    }
}

fn strip_extras(path: &str) -> &str {
    let path = path.split('?').next().unwrap_or(path);
    path.split('#').next().unwrap_or(path)
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|seg| !seg.is_empty())
}

/// Classification of a single path against the two patterns.
/// Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub is_tracked_section: bool,
    pub is_start_point: bool,
}

impl Classification {
    pub fn classify(section: &PathPattern, start: &PathPattern, path: &str) -> Self {
        Self {
            is_tracked_section: section.matches(path),
            is_start_point: start.matches(path),
        }
    }
}
