//! Request matchers
//!
//! A matcher is a named predicate deciding whether a live request corresponds
//! to a recorded one. Cassettes apply an ordered list of matcher names; a
//! recorded interaction is replayed only when every matcher agrees.

mod query;
mod registry;

pub use query::json_query_eq;
pub use registry::{failed_matchers, Matcher, MatcherRegistry};

use crate::interaction::Request;

/// Name under which [`json_query_matcher`] is registered
pub const JSON_QUERY: &str = "json_query";

/// Matcher comparing query parameters with JSON-aware value equality
#[must_use]
pub fn json_query_matcher(r1: &Request, r2: &Request) -> bool {
    json_query_eq(r1.query(), r2.query())
}

fn method(r1: &Request, r2: &Request) -> bool {
    r1.method == r2.method
}

fn scheme(r1: &Request, r2: &Request) -> bool {
    r1.parts.scheme == r2.parts.scheme
}

fn host(r1: &Request, r2: &Request) -> bool {
    r1.parts.host == r2.parts.host
}

fn port(r1: &Request, r2: &Request) -> bool {
    r1.parts.port == r2.parts.port
}

fn path(r1: &Request, r2: &Request) -> bool {
    r1.parts.path == r2.parts.path
}

/// Order-insensitive query comparison
fn query(r1: &Request, r2: &Request) -> bool {
    let mut q1 = r1.query().to_vec();
    let mut q2 = r2.query().to_vec();
    q1.sort();
    q2.sort();
    q1 == q2
}

fn uri(r1: &Request, r2: &Request) -> bool {
    r1.uri == r2.uri
}

/// Header names compared case-insensitively, order ignored
fn headers(r1: &Request, r2: &Request) -> bool {
    let normalize = |request: &Request| {
        let mut headers: Vec<(String, String)> = request
            .headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
            .collect();
        headers.sort();
        headers
    };
    normalize(r1) == normalize(r2)
}

fn body(r1: &Request, r2: &Request) -> bool {
    r1.body == r2.body
}

/// Built-in matchers registered on every [`MatcherRegistry`]
pub(crate) const BUILTIN: [(&str, fn(&Request, &Request) -> bool); 9] = [
    ("method", method),
    ("scheme", scheme),
    ("host", host),
    ("port", port),
    ("path", path),
    ("query", query),
    ("uri", uri),
    ("headers", headers),
    ("body", body),
];
