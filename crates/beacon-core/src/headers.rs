//! Header collection
//!
//! Extracts a fixed allow-list of request headers into a [`HeaderSnapshot`].
//! Each name is looked up as a server variable first (`X-Real-IP` becomes
//! `X_REAL_IP`), then with the `HTTP_` prefix, then by header name ignoring
//! case. Values are sanitised; anything empty afterwards is left out.

use crate::request::InboundRequest;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Headers forwarded to the collector, in report order
pub const TRACKED_HEADERS: &[&str] = &[
    "User-Agent",
    "Sec-Ch-Ua",
    "Sec-Ch-Ua-Platform",
    "Referer",
    "Origin",
    "From",
    "Accept-Language",
    "Content-Language",
    "X-Country-Code",
    "CF-IPCountry",
    "X-Geo-Country",
    "X-Geo-City",
    "X-Geo-Region",
    "Remote-Addr",
    "X-Forwarded-For",
    "X-Real-IP",
    "Client-IP",
    "CF-Connecting-IP",
    "X-Cluster-Client-IP",
    "Forwarded",
    "X-Original-Forwarded-For",
    "Fastly-Client-IP",
    "True-Client-IP",
    "X-Appengine-User-IP",
    "Connection",
    "Via",
];

/// Header values captured from one request
///
/// Keeps the order of [`TRACKED_HEADERS`] and serializes as a JSON object.
/// Never holds an empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSnapshot {
    entries: Vec<(&'static str, String)>,
}

impl HeaderSnapshot {
    /// Value captured for a tracked header name (exact spelling)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Number of captured headers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No header was captured
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate captured headers in report order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(key, value)| (*key, value.as_str()))
    }

    fn push(&mut self, name: &'static str, value: String) {
        if !value.is_empty() {
            self.entries.push((name, value));
        }
    }
}

impl Serialize for HeaderSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Capture the tracked headers of a request
pub fn collect_headers(request: &InboundRequest) -> HeaderSnapshot {
    let mut snapshot = HeaderSnapshot::default();

    for &name in TRACKED_HEADERS {
        if let Some(value) = header_value(request, name) {
            snapshot.push(name, value);
        }
    }

    snapshot
}

/// Look up one header, returning its sanitised value if non-empty
pub fn header_value(request: &InboundRequest, name: &str) -> Option<String> {
    let server_key = server_key(name);

    // A present-but-empty variable shadows later forms, like an isset() chain.
    let raw = request
        .header(&server_key)
        .or_else(|| request.header(&format!("HTTP_{}", server_key)))
        .or_else(|| request.header_ignore_case(name))?;

    let value = sanitize_text_field(raw);
    (!value.is_empty()).then_some(value)
}

/// Server-variable key for a header name: upper case, `-` replaced by `_`
pub fn server_key(name: &str) -> String {
    name.to_ascii_uppercase().replace('-', "_")
}

/// Normalise a free-text header value
///
/// Strips markup tags, turns control characters into spaces, collapses
/// whitespace runs and trims.
pub fn sanitize_text_field(raw: &str) -> String {
    let stripped = strip_tags(raw);

    let mut out = String::with_capacity(stripped.len());
    let mut pending_space = false;

    for c in stripped.chars() {
        if c.is_whitespace() || c.is_control() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }

    out
}

fn strip_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        let opens_tag = c == '<'
            && chars
                .peek()
                .is_some_and(|&next| next.is_ascii_alphabetic() || matches!(next, '/' | '!' | '?'));

        if opens_tag {
            // Unterminated tags swallow the rest of the value.
            for inner in chars.by_ref() {
                if inner == '>' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }

    out
}
