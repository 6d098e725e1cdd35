//! Contract Test: Eligibility
//!
//! Constraints verified:
//! - An empty access token never tracks, whatever the flags
//! - Reserved platform paths never track, in any letter case
//! - An ordinary page view with full settings tracks

mod common;

use beacon_core::eligibility::SYSTEM_PATH_PREFIXES;
use beacon_core::{InboundRequest, TrackingSettings, should_track};
use common::*;

#[test]
fn empty_token_never_tracks() {
    let request = page_view("/hello-world");

    for enabled in [false, true] {
        for allowed in [false, true] {
            let settings = TrackingSettings::new("")
                .with_enabled(enabled)
                .with_allowed(allowed);
            assert!(
                !should_track(&settings, &request),
                "tracked with empty token (enabled={}, allowed={})",
                enabled,
                allowed
            );
        }
    }
}

#[test]
fn reserved_prefixes_never_track_in_any_case() {
    let settings = eligible_settings();

    for prefix in SYSTEM_PATH_PREFIXES {
        let upper = prefix.to_uppercase();
        let mixed: String = prefix
            .chars()
            .enumerate()
            .map(|(i, c)| if i % 2 == 0 { c.to_ascii_uppercase() } else { c })
            .collect();

        for base in [prefix.to_string(), upper, mixed] {
            for suffix in ["", "/", ".php", "/index.php?x=1"] {
                let path = format!("{}{}", base, suffix);
                assert!(
                    !should_track(&settings, &page_view(&path)),
                    "tracked system path {}",
                    path
                );
            }
        }
    }
}

#[test]
fn reserved_prefix_elsewhere_in_path_still_tracks() {
    let settings = eligible_settings();
    assert!(should_track(&settings, &page_view("/blog/wp-admin-tips")));
    assert!(should_track(&settings, &page_view("/?redirect=/wp-login.php")));
}

#[test]
fn hello_world_page_view_tracks() {
    let settings = TrackingSettings::new("tok_123")
        .with_enabled(true)
        .with_allowed(true);
    let request = InboundRequest::new("GET", "/hello-world");

    assert!(should_track(&settings, &request));
}

#[test]
fn either_flag_off_disables_tracking() {
    let request = page_view("/hello-world");
    assert!(!should_track(&eligible_settings().with_enabled(false), &request));
    assert!(!should_track(&eligible_settings().with_allowed(false), &request));
}
