//! Beacon payload
//!
//! One [`Beacon`] is built per eligible request, sent once and dropped.

use crate::config::PLUGIN_VERSION;
use crate::headers::HeaderSnapshot;
use crate::request::InboundRequest;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Prefix of every beacon id
pub const UNIQUE_ID_PREFIX: &str = "smalk_";

/// JSON body of a visit report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Beacon {
    /// Request URI path
    pub request_path: String,
    /// HTTP method
    pub request_method: String,
    /// Captured allow-listed headers
    pub request_headers: HeaderSnapshot,
    /// Version of this reporter
    pub wordpress_plugin_version: String,
    /// Server-side Unix timestamp (seconds)
    pub timestamp: i64,
    /// Deduplication key for the receiving side
    pub unique_id: String,
    /// Always true: the beacon comes from the server, not the browser
    pub server_tracking: bool,
}

impl Beacon {
    /// Build a beacon for a request, stamped now with a fresh id
    pub fn new(request: &InboundRequest, headers: HeaderSnapshot) -> Self {
        Self {
            request_path: request.path.clone(),
            request_method: request.method.clone(),
            request_headers: headers,
            wordpress_plugin_version: PLUGIN_VERSION.to_string(),
            timestamp: Utc::now().timestamp(),
            unique_id: generate_unique_id(),
            server_tracking: true,
        }
    }

    /// Serialize to the JSON wire body
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Fresh beacon id: the prefix followed by 32 hex digits of a v4 UUID
pub fn generate_unique_id() -> String {
    format!("{}{}", UNIQUE_ID_PREFIX, Uuid::new_v4().simple())
}
