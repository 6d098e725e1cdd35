//! Eligibility checks
//!
//! Decides, per inbound request, whether a beacon is sent. Pure: no I/O,
//! no state.

use crate::config::TrackingSettings;
use crate::request::InboundRequest;

/// Path prefixes of internal platform requests, matched case-insensitively
/// at the start of the path
pub const SYSTEM_PATH_PREFIXES: &[&str] = &[
    "/wp-admin",
    "/wp-login",
    "/wp-cron",
    "/wp-json",
    "/wp-includes",
    "/wp-content",
];

/// Why a request was not tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Analytics switched off by the site or disallowed for the account
    AnalyticsDisabled,
    /// No access token configured
    MissingAccessToken,
    /// Request path is empty
    MissingPath,
    /// Request method is empty
    MissingMethod,
    /// Request targets an internal platform path
    SystemPath,
}

impl SkipReason {
    /// Short label for logs and events
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AnalyticsDisabled => "analytics_disabled",
            SkipReason::MissingAccessToken => "missing_access_token",
            SkipReason::MissingPath => "missing_path",
            SkipReason::MissingMethod => "missing_method",
            SkipReason::SystemPath => "system_path",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the eligibility check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// A beacon should be sent
    Eligible,
    /// No beacon; the reason is informational only
    Skipped(SkipReason),
}

impl Eligibility {
    /// Whether a beacon should be sent
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Evaluate every eligibility rule, reporting the first one that fails
pub fn evaluate(settings: &TrackingSettings, request: &InboundRequest) -> Eligibility {
    if !settings.is_analytics_enabled_and_allowed() {
        return Eligibility::Skipped(SkipReason::AnalyticsDisabled);
    }
    if !settings.has_access_token() {
        return Eligibility::Skipped(SkipReason::MissingAccessToken);
    }
    // Whitespace-only values count as missing.
    if request.path.trim().is_empty() {
        return Eligibility::Skipped(SkipReason::MissingPath);
    }
    if request.method.trim().is_empty() {
        return Eligibility::Skipped(SkipReason::MissingMethod);
    }
    if is_system_path(&request.path) {
        return Eligibility::Skipped(SkipReason::SystemPath);
    }
    Eligibility::Eligible
}

/// Whether a beacon should be sent for this request
pub fn should_track(settings: &TrackingSettings, request: &InboundRequest) -> bool {
    evaluate(settings, request).is_eligible()
}

/// Whether the path starts with one of [`SYSTEM_PATH_PREFIXES`], ignoring case
pub fn is_system_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    SYSTEM_PATH_PREFIXES.iter().any(|prefix| {
        bytes.len() >= prefix.len() && bytes[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    })
}
