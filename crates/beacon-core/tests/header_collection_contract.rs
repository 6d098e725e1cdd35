//! Contract Test: Header Collection
//!
//! Constraints verified:
//! - Empty or absent headers are never reported
//! - Collection is a pure function of the request
//! - Every tracked header is found in each accepted key form

mod common;

use beacon_core::headers::{TRACKED_HEADERS, server_key};
use beacon_core::{InboundRequest, collect_headers};
use common::*;

#[test]
fn never_reports_empty_or_absent_values() {
    let mut request = InboundRequest::new("GET", "/");
    for (i, name) in TRACKED_HEADERS.iter().enumerate() {
        // Alternate between empty, whitespace-only and missing.
        match i % 3 {
            0 => request.headers.insert(format!("HTTP_{}", server_key(name)), String::new()),
            1 => request.headers.insert(name.to_string(), " \t ".to_string()),
            _ => None,
        };
    }

    let snapshot = collect_headers(&request);
    assert!(snapshot.is_empty(), "unexpected headers: {:?}", snapshot);
}

#[test]
fn collection_is_deterministic() {
    let request = page_view("/pricing");

    let first = collect_headers(&request);
    let second = collect_headers(&request);

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn every_tracked_header_is_found_in_each_key_form() {
    for name in TRACKED_HEADERS {
        let forms = [
            server_key(name),
            format!("HTTP_{}", server_key(name)),
            name.to_lowercase(),
            name.to_string(),
        ];

        for key in forms {
            let request = InboundRequest::new("GET", "/").with_header(key.clone(), "value");
            let snapshot = collect_headers(&request);
            assert_eq!(
                snapshot.get(name),
                Some("value"),
                "{} not found under key {}",
                name,
                key
            );
            assert_eq!(snapshot.len(), 1);
        }
    }
}

#[test]
fn proxy_chain_is_reported_verbatim() {
    let snapshot = collect_headers(&page_view("/"));
    assert_eq!(snapshot.get("X-Forwarded-For"), Some("203.0.113.7, 10.0.0.1"));
    assert_eq!(snapshot.get("Remote-Addr"), Some("10.0.0.1"));
    assert_eq!(snapshot.get("Accept-Language"), Some("en-US,en;q=0.9"));
}
