//! Configuration types for the visit beacon system
//!
//! Settings are read once per request by the host and passed explicitly into
//! the tracker. Nothing in this crate reads global state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Version reported in every beacon and in the loader script URL
pub const PLUGIN_VERSION: &str = "1.0.6";

/// Default collector host
pub const DEFAULT_API_BASE_URL: &str = "https://api.smalk.ai";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// Per-site tracking settings
    #[serde(default)]
    pub settings: TrackingSettings,

    /// Collector endpoint configuration
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Dispatcher tuning
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

impl BeaconConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    ///
    /// An empty access token is not an error: it only disables tracking.
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.collector.validate()?;
        self.dispatcher.validate()?;
        Ok(())
    }
}

/// Tracking settings owned by the host
///
/// Tracking fires only if `access_token` is non-empty and both flags are set.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingSettings {
    /// Collector API key
    #[serde(default)]
    pub access_token: String,

    /// Site owner switched analytics on
    #[serde(default)]
    pub analytics_enabled: bool,

    /// Account lookup allows analytics for this token
    #[serde(default)]
    pub analytics_allowed: bool,
}

impl TrackingSettings {
    /// Create settings with the given token, enabled and allowed
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            analytics_enabled: true,
            analytics_allowed: true,
        }
    }

    /// Set the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.analytics_enabled = enabled;
        self
    }

    /// Set the allowed flag
    pub fn with_allowed(mut self, allowed: bool) -> Self {
        self.analytics_allowed = allowed;
        self
    }

    /// Both the site flag and the account flag are set
    pub fn is_analytics_enabled_and_allowed(&self) -> bool {
        self.analytics_enabled && self.analytics_allowed
    }

    /// A non-empty access token is present
    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Value of the `Authorization` header for collector requests
    pub fn authorization_header(&self) -> String {
        format!("Api-Key {}", self.access_token)
    }
}

// Custom Debug implementation that hides the access token
impl std::fmt::Debug for TrackingSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingSettings")
            .field("access_token", &mask_token(&self.access_token))
            .field("analytics_enabled", &self.analytics_enabled)
            .field("analytics_allowed", &self.analytics_allowed)
            .finish()
    }
}

/// Mask an access token for display, keeping only the last four characters
pub fn mask_token(token: &str) -> String {
    let len = token.chars().count();
    if len <= 4 {
        return "*".repeat(len);
    }

    let visible: String = token.chars().skip(len - 4).collect();
    format!("{}{}", "*".repeat(len - 4), visible)
}

/// Collector endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Scheme and host of the collector API, without trailing slash
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Whole-request timeout for outbound calls (in milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Connect timeout for outbound calls (in milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Log beacons instead of sending them
    #[serde(default)]
    pub dry_run: bool,
}

impl CollectorConfig {
    /// Create a collector configuration for the given base URL
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    /// Validate the collector configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_base_url.is_empty() {
            return Err(crate::Error::config("Collector base URL cannot be empty"));
        }
        if !self.api_base_url.starts_with("https://") && !self.api_base_url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "Collector base URL must use HTTP or HTTPS scheme. Got: {}",
                self.api_base_url
            )));
        }
        if self.api_base_url.contains(['"', '<', '>', ' ']) {
            return Err(crate::Error::config(
                "Collector base URL contains characters not allowed in a URL",
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(crate::Error::config("Collector request timeout must be > 0"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(crate::Error::config("Collector connect timeout must be > 0"));
        }
        Ok(())
    }

    fn base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    /// Base URL of the versioned API
    pub fn api_v1_url(&self) -> String {
        format!("{}/api/v1", self.base())
    }

    /// Visit tracking endpoint
    pub fn tracking_url(&self) -> String {
        format!("{}/tracking/visit/", self.api_v1_url())
    }

    /// Project listing endpoint
    pub fn projects_url(&self) -> String {
        format!("{}/projects/", self.api_v1_url())
    }

    /// Client tracker script
    pub fn tracker_js_url(&self) -> String {
        format!("{}/tracker.js", self.base())
    }

    /// Request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Connect timeout as a Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            dry_run: false,
        }
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Upper bound for a single detached send (in milliseconds)
    ///
    /// The detached task is abandoned after this long. The caller never
    /// waits on it either way.
    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,

    /// Capacity of the dispatch event channel
    ///
    /// When full, new events are dropped. Dispatch itself is unaffected.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl DispatcherConfig {
    /// Validate the dispatcher configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.dispatch_timeout_ms == 0 {
            return Err(crate::Error::config("Dispatch timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Dispatch timeout as a Duration
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    500
}

fn default_connect_timeout_ms() -> u64 {
    300
}

fn default_dispatch_timeout_ms() -> u64 {
    1000
}

fn default_event_channel_capacity() -> usize {
    256
}
