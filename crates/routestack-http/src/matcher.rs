//! Path pattern matching.
//!
//! Patterns are `/`-separated segments where `:name` captures the path
//! segment at the same position. Captured values are raw strings.

use std::collections::HashMap;

/// Named captures produced by a successful match.
pub type PathParams = HashMap<String, String>;

/// Match `path` against `pattern`.
///
/// Leading and trailing slashes are ignored on both sides, as are empty
/// segments. Every pattern segment must bind to a path segment, so the
/// segment counts must agree for a match.
///
/// ```
/// use routestack_http::match_route;
///
/// let params = match_route("/users/:id", "/users/42").unwrap();
/// assert_eq!(params["id"], "42");
/// assert!(match_route("/users/:id/posts", "/users/42").is_none());
/// assert!(match_route("/users/:id", "/users/42/posts").is_none());
/// ```
#[must_use]
pub fn match_route(pattern: &str, path: &str) -> Option<PathParams> {
    let pattern_segments = segments(pattern);
    let path_segments = segments(path);

    match (pattern_segments.is_empty(), path_segments.is_empty()) {
        (true, true) => return Some(PathParams::new()),
        (true, false) | (false, true) => return None,
        (false, false) => {}
    }

    if path_segments.len() != pattern_segments.len() {
        return None;
    }

    let mut params = PathParams::new();
    for (expected, actual) in pattern_segments.iter().zip(&path_segments) {
        match expected.strip_prefix(':') {
            Some(name) => {
                params.insert(name.to_owned(), (*actual).to_owned());
            }
            None if actual == expected => {}
            None => return None,
        }
    }
    Some(params)
}

/// Join path fragments with single slashes and a leading `/`.
///
/// Empty fragments and duplicate slashes collapse, so `("", "users/", "/:id")`
/// becomes `/users/:id`.
#[must_use]
pub fn join_path<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::from("/");
    for segment in parts.into_iter().flat_map(segments) {
        if out.len() > 1 {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

fn segments(input: &str) -> Vec<&str> {
    input.split('/').filter(|s| !s.is_empty()).collect()
}
