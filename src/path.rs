//! Path pattern parsing and matching.
//!
//! Patterns are compared segment by segment. A literal segment must match
//! exactly; a `{name}` segment matches any single non-empty segment and binds
//! it. Empty segments are ignored on both sides, so `/examples`,
//! `/examples/` and `//examples` are the same path.
//!
//! Request segments are percent-decoded before they are compared or bound;
//! patterns are taken literally. Invalid UTF-8 after decoding is replaced
//! with U+FFFD.

use percent_encoding::percent_decode_str;

use crate::error::Error;
use crate::request::PathParams;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed route pattern such as `/users/{id}/posts`.
#[derive(Clone, Debug)]
pub struct PathPattern {
    pattern: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parses a pattern.
    ///
    /// ```rust
    /// use ferrule::PathPattern;
    ///
    /// let pattern = PathPattern::parse("/posts/{id}/comments/{comment_id}").unwrap();
    /// let params = pattern.matches("/posts/123/comments/456").unwrap();
    /// assert_eq!(params["id"], "123");
    /// assert_eq!(params["comment_id"], "456");
    ///
    /// assert!(PathPattern::parse("/files/{*rest}").is_err());
    /// ```
    pub fn parse(pattern: &str) -> Result<Self, Error> {
        let invalid = |reason| Error::InvalidPattern { pattern: pattern.to_owned(), reason };

        if !pattern.is_empty() && !pattern.starts_with('/') {
            return Err(invalid("must start with `/`"));
        }

        let mut segments = Vec::new();
        for part in split(pattern) {
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some("") => return Err(invalid("empty variable name")),
                Some(name) if name.starts_with('*') => {
                    return Err(invalid("wildcard segments are not supported"));
                }
                Some(name) if name.contains(['{', '}']) => return Err(invalid("unbalanced braces")),
                Some(name) => {
                    let name = name.to_owned();
                    if segments.contains(&Segment::Variable(name.clone())) {
                        return Err(invalid("duplicate variable name"));
                    }
                    Segment::Variable(name)
                }
                None if part.contains(['{', '}']) => {
                    return Err(invalid("a variable must span a whole segment"));
                }
                None => Segment::Literal(part.to_owned()),
            };
            segments.push(segment);
        }

        Ok(Self { pattern: pattern.to_owned(), segments })
    }

    /// The pattern matching every path with no segments.
    pub(crate) fn root() -> Self {
        Self { pattern: String::new(), segments: Vec::new() }
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// `self` followed by `suffix`, as used for nested routes.
    pub(crate) fn join(&self, suffix: &PathPattern) -> PathPattern {
        let mut segments = self.segments.clone();
        segments.extend(suffix.segments.iter().cloned());
        let pattern = format!("{}{}", self.pattern.trim_end_matches('/'), suffix.pattern);
        PathPattern { pattern, segments }
    }

    /// Matches a request path, returning bound variables.
    ///
    /// When a joined pattern binds the same name twice, the innermost
    /// binding wins.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let mut params = PathParams::new();
        let mut parts = split(path);
        for segment in &self.segments {
            let part = percent_decode_str(parts.next()?).decode_utf8_lossy();
            match segment {
                Segment::Literal(lit) if *lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Variable(name) => {
                    params.insert(name.clone(), part.into_owned());
                }
            }
        }
        parts.next().is_none().then_some(params)
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(p: &str) -> PathPattern {
        PathPattern::parse(p).unwrap()
    }

    #[test]
    fn literal_path() {
        let p = pattern("/users");
        assert!(p.matches("/users").is_some());
        assert!(p.matches("/users/").is_some());
        assert!(p.matches("/posts").is_none());
        assert!(p.matches("/users/1").is_none());
        assert!(p.matches("/").is_none());
    }

    #[test]
    fn root_pattern_matches_only_root() {
        let p = pattern("/");
        assert!(p.matches("/").is_some());
        assert!(p.matches("").is_some());
        assert!(p.matches("/x").is_none());
    }

    #[test]
    fn variables_bind_single_segments() {
        let p = pattern("/posts/{post_id}/comments/{comment_id}");
        let params = p.matches("/posts/42/comments/7").unwrap();
        assert_eq!(params["post_id"], "42");
        assert_eq!(params["comment_id"], "7");
        assert!(p.matches("/posts/42/comments").is_none());
        assert!(p.matches("/posts//comments/7").is_none());
    }

    #[test]
    fn segments_are_percent_decoded() {
        let p = pattern("/examples/{id}");
        assert_eq!(p.matches("/examples/a%20b").unwrap()["id"], "a b");
        assert_eq!(p.matches("/examples/caf%C3%A9").unwrap()["id"], "café");
        // An encoded slash stays inside its segment.
        assert_eq!(p.matches("/examples/a%2Fb").unwrap()["id"], "a/b");
        assert_eq!(p.matches("/examples/%FF").unwrap()["id"], "\u{FFFD}");

        assert!(pattern("/hello world").matches("/hello%20world").is_some());
        assert!(pattern("/examples").matches("/ex%61mples").is_some());
    }

    #[test]
    fn rejects_malformed_patterns() {
        for bad in ["users", "/{}", "/{*rest}", "/a{b}", "/{a}/{a}", "/{{x}}"] {
            assert!(
                matches!(PathPattern::parse(bad), Err(Error::InvalidPattern { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn join_concatenates_segments() {
        let joined = pattern("/examples/").join(&pattern("/{id}"));
        assert_eq!(joined.as_str(), "/examples/{id}");
        assert_eq!(joined.matches("/examples/42").unwrap()["id"], "42");

        let nested_root = pattern("/examples").join(&pattern("/"));
        assert!(nested_root.matches("/examples").is_some());
        assert!(nested_root.matches("/examples/").is_some());
    }

    #[test]
    fn root_join_is_identity() {
        let joined = PathPattern::root().join(&pattern("/a/{b}"));
        assert_eq!(joined.as_str(), "/a/{b}");
        assert!(joined.matches("/a/c").is_some());
    }
}
