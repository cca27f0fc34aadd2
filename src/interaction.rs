//! Request/response model shared by matchers and cassettes

use hyper::Uri;
use serde::{Deserialize, Serialize};

use crate::{Result, VcrError};

/// Parsed components of a request URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriParts {
    /// Lowercased scheme, e.g. `https`
    pub scheme: String,
    /// Host without port or credentials
    pub host: String,
    /// Explicit port, or the scheme's default
    pub port: Option<u16>,
    /// Path, always starting with `/`
    pub path: String,
    /// Decoded query parameters in their original order
    pub query: Vec<(String, String)>,
}

impl UriParts {
    /// Parse an absolute URI
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::InvalidUri`] if the URI is malformed or has no
    /// scheme or host
    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = |reason| VcrError::InvalidUri {
            uri: uri.to_string(),
            reason,
        };

        // Fragments never reach the server
        let target = uri.split('#').next().unwrap_or(uri);
        let parsed: Uri = target.parse().map_err(|_| invalid("malformed URI"))?;

        let scheme = parsed
            .scheme_str()
            .ok_or_else(|| invalid("missing scheme"))?
            .to_ascii_lowercase();
        let host = parsed
            .host()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid("missing host"))?;
        let path = match parsed.path() {
            "" => "/",
            path => path,
        };

        Ok(Self {
            port: parsed.port_u16().or_else(|| default_port(&scheme)),
            host: host.to_ascii_lowercase(),
            path: path.to_string(),
            query: parse_query(parsed.query().unwrap_or_default()),
            scheme,
        })
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        _ => None,
    }
}

/// Split a raw query string into decoded `(name, value)` pairs
///
/// `+` decodes to a space. Invalid percent-encoding is kept verbatim.
#[must_use]
pub fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(name), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// An outgoing HTTP request as seen by matchers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredRequest", into = "StoredRequest")]
pub struct Request {
    /// HTTP method, uppercased
    pub method: String,
    /// Full request URI
    pub uri: String,
    /// Parsed URI
    pub parts: UriParts,
    /// Request headers in order
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: String,
}

impl Request {
    /// Create a request from a method and an absolute URI
    ///
    /// # Errors
    ///
    /// Returns error if the URI cannot be parsed
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();
        let parts = UriParts::parse(&uri)?;
        Ok(Self {
            method: method.into().to_ascii_uppercase(),
            uri,
            parts,
            headers: Vec::new(),
            body: String::new(),
        })
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Query parameters in their original order
    #[must_use]
    pub fn query(&self) -> &[(String, String)] {
        &self.parts.query
    }

    /// Remove every header whose name is in `names` (case-insensitive)
    pub fn strip_headers(&mut self, names: &[String]) {
        self.headers
            .retain(|(name, _)| !names.iter().any(|n| n.eq_ignore_ascii_case(name)));
    }
}

#[derive(Serialize, Deserialize)]
struct StoredRequest {
    method: String,
    uri: String,
    #[serde(default)]
    headers: Vec<(String, String)>,
    #[serde(default)]
    body: String,
}

impl TryFrom<StoredRequest> for Request {
    type Error = VcrError;

    fn try_from(stored: StoredRequest) -> Result<Self> {
        let mut request = Self::new(stored.method, stored.uri)?;
        request.headers = stored.headers;
        request.body = stored.body;
        Ok(request)
    }
}

impl From<Request> for StoredRequest {
    fn from(request: Request) -> Self {
        Self {
            method: request.method,
            uri: request.uri,
            headers: request.headers,
            body: request.body,
        }
    }
}

/// A recorded HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Response body
    #[serde(default)]
    pub body: String,
}

impl Response {
    /// Create a response with a status and body
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// One request/response exchange stored in a cassette
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// The request as recorded (after header filtering)
    pub request: Request,
    /// The response returned for it
    pub response: Response,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_uri() {
        let parts = UriParts::parse("HTTPS://User@API.Example.com:8443/v1/items?a=1&b=two#frag")
            .unwrap();
        assert_eq!(parts.scheme, "https");
        assert_eq!(parts.host, "api.example.com");
        assert_eq!(parts.port, Some(8443));
        assert_eq!(parts.path, "/v1/items");
        assert_eq!(
            parts.query,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "two".to_string())
            ]
        );
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(UriParts::parse("http://h/").unwrap().port, Some(80));
        assert_eq!(UriParts::parse("https://h/").unwrap().port, Some(443));
        assert_eq!(UriParts::parse("ftp://h/").unwrap().port, None);
    }

    #[test]
    fn test_path_defaults_to_root() {
        let parts = UriParts::parse("https://h?x=1").unwrap();
        assert_eq!(parts.path, "/");
        assert_eq!(parts.query.len(), 1);
    }

    #[test]
    fn test_ipv6_host() {
        let parts = UriParts::parse("http://[::1]:9000/x").unwrap();
        assert_eq!(parts.host, "[::1]");
        assert_eq!(parts.port, Some(9000));

        let parts = UriParts::parse("http://[::1]/x").unwrap();
        assert_eq!(parts.host, "[::1]");
        assert_eq!(parts.port, Some(80));
    }

    #[test]
    fn test_invalid_uris() {
        assert!(UriParts::parse("no-scheme/path").is_err());
        assert!(UriParts::parse("://host/").is_err());
        assert!(UriParts::parse("http:///path").is_err());
        assert!(UriParts::parse("http://host:port/").is_err());
    }

    #[test]
    fn test_malformed_authority_and_spaces_rejected() {
        assert!(matches!(
            UriParts::parse("http://[::1/x"),
            Err(VcrError::InvalidUri { .. })
        ));
        assert!(matches!(
            UriParts::parse("http://exa mple.com/a b?q=1"),
            Err(VcrError::InvalidUri { .. })
        ));
        assert!(Request::new("GET", "https://api.example.com/a b").is_err());
    }

    #[test]
    fn test_query_decoding() {
        let query = parse_query("q=%7B%22a%22%3A1%7D&name=a+b&flag&&bad=%zz");
        assert_eq!(
            query,
            vec![
                ("q".to_string(), "{\"a\":1}".to_string()),
                ("name".to_string(), "a b".to_string()),
                ("flag".to_string(), String::new()),
                ("bad".to_string(), "%zz".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_keeps_order_and_duplicates() {
        let query = parse_query("b=2&a=1&b=3");
        let names: Vec<&str> = query.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "b"]);
    }

    #[test]
    fn test_strip_headers_case_insensitive() {
        let mut request = Request::new("get", "https://h/")
            .unwrap()
            .header("Authorization", "Bearer secret")
            .header("Accept", "application/json");

        request.strip_headers(&["authorization".to_string()]);

        assert_eq!(request.method, "GET");
        assert_eq!(
            request.headers,
            vec![("Accept".to_string(), "application/json".to_string())]
        );
    }

    #[test]
    fn test_request_yaml_shape() {
        let request = Request::new("POST", "https://h/items?x=1")
            .unwrap()
            .body("{}");
        let yaml = serde_yaml::to_string(&request).unwrap();
        assert!(yaml.contains("uri:"));
        assert!(!yaml.contains("parts"));

        let back: Request = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_stored_request_with_bad_uri_is_rejected() {
        let yaml = "method: GET\nuri: not a uri\n";
        assert!(serde_yaml::from_str::<Request>(yaml).is_err());
    }
}
