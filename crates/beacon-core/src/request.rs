//! Inbound request model
//!
//! The host web server builds one [`InboundRequest`] per HTTP request. Header
//! keys may be plain header names (`User-Agent`) or server-variable style keys
//! (`HTTP_USER_AGENT`, `REMOTE_ADDR`); the header collector understands both.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Read-only view of one inbound HTTP request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundRequest {
    /// Request URI path, including any query string
    #[serde(default)]
    pub path: String,

    /// HTTP method
    #[serde(default)]
    pub method: String,

    /// Request headers and server variables
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl InboundRequest {
    /// Create a request without headers
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            headers: HashMap::new(),
        }
    }

    /// Add a header or server variable
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Exact-key lookup
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Case-insensitive lookup by header name
    ///
    /// Keys differing only in case resolve to the smallest key, so the answer
    /// does not depend on map iteration order.
    pub fn header_ignore_case(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_ignore_case_matches_any_casing() {
        let request = InboundRequest::new("GET", "/").with_header("user-agent", "curl/8.0");
        assert_eq!(request.header_ignore_case("User-Agent"), Some("curl/8.0"));
        assert_eq!(request.header("User-Agent"), None);
    }

    #[test]
    fn header_ignore_case_picks_smallest_key_on_collision() {
        for _ in 0..32 {
            let request = InboundRequest::new("GET", "/")
                .with_header("user-agent", "lower")
                .with_header("User-Agent", "title")
                .with_header("USER-AGENT", "upper");
            // "USER-AGENT" < "User-Agent" < "user-agent" in byte order
            assert_eq!(request.header_ignore_case("User-agent"), Some("upper"));
        }
    }

    #[test]
    fn deserializes_from_partial_json() {
        let request: InboundRequest = serde_json::from_str(r#"{"path": "/about"}"#).unwrap();
        assert_eq!(request.path, "/about");
        assert!(request.method.is_empty());
        assert!(request.headers.is_empty());
    }
}
