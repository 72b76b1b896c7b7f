//! URI patterns and path matching.
//!
//! A pattern is a `/`-segmented template whose segments are either literals or
//! named parameters introduced by `:`:
//!
//! ```text
//! /hello/:thing/:greeting
//! ```
//!
//! Matching is a positional comparison: both sides are split on `/` (a single
//! leading and a single trailing empty segment are ignored), the segment
//! counts must agree, literals must be equal byte for byte, and parameters
//! capture the request segment verbatim.

use std::collections::HashMap;
use std::fmt;

use restdeck_core::{RestDeckError, RestDeckResult};

/// Marker that introduces a parameter segment.
const PARAM_MARKER: char = ':';

/// One segment of a [`UriPattern`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed path template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UriPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl UriPattern {
    /// Parse a pattern such as `/users/:id`.
    ///
    /// # Errors
    ///
    /// Fails when the pattern does not start with `/`, when a parameter has no
    /// name, or when a parameter name repeats.
    pub fn parse(raw: &str) -> RestDeckResult<Self> {
        if !raw.starts_with('/') {
            return Err(invalid(raw, "pattern must start with `/`"));
        }

        let mut segments = Vec::new();
        for segment in split_segments(raw) {
            match segment.strip_prefix(PARAM_MARKER) {
                Some("") => return Err(invalid(raw, "parameter segment has no name")),
                Some(name) => {
                    let duplicate = segments
                        .iter()
                        .any(|s| matches!(s, Segment::Param(existing) if existing == name));
                    if duplicate {
                        return Err(invalid(raw, &format!("parameter `{name}` declared twice")));
                    }
                    segments.push(Segment::Param(name.to_owned()));
                }
                None => segments.push(Segment::Literal(segment.to_owned())),
            }
        }

        Ok(Self {
            raw: raw.to_owned(),
            segments,
        })
    }

    /// The pattern as declared.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern has no parameter segments.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Names of the parameter segments, in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Whether two patterns declare the same template.
    ///
    /// Leading/trailing slashes are insignificant, parameter names are not.
    #[must_use]
    pub fn same_template(&self, other: &Self) -> bool {
        self.segments == other.segments
    }

    /// Match a request path, returning the captured parameters.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let request_segments: Vec<&str> = split_segments(path).collect();
        if request_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::default();
        for (pattern_segment, request_segment) in self.segments.iter().zip(request_segments) {
            match pattern_segment {
                Segment::Literal(literal) => {
                    if literal != request_segment {
                        return None;
                    }
                }
                Segment::Param(name) => params.push(name.clone(), request_segment.to_owned()),
            }
        }

        Some(params)
    }
}

impl fmt::Display for UriPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parameters captured from a request path, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    /// Look up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of captured parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy the parameters into a map.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        self.0.iter().cloned().collect()
    }

    fn push(&mut self, name: String, value: String) {
        self.0.push((name, value));
    }
}

/// Split a path on `/`, dropping a single leading and a single trailing
/// empty segment.
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    // `"".split('/')` yields one empty segment; the root path has none.
    trimmed.split('/').filter(move |_| !trimmed.is_empty())
}

fn invalid(pattern: &str, reason: &str) -> RestDeckError {
    RestDeckError::InvalidPattern {
        pattern: pattern.to_owned(),
        reason: reason.to_owned(),
    }
}
