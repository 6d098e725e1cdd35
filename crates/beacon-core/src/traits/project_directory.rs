// # Project Directory Trait
//
// Resolves the collector project bound to an access token. The host uses the
// answer to derive `analytics_allowed` and the project id for the loader
// markup; the tracker itself never calls it per request.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

/// A collector project as returned by the projects endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project key, used as `PROJECT_KEY` by the loader
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Publisher ads switched on for this project
    #[serde(default)]
    pub publisher_ads_enabled: bool,
}

// The API has served both numeric and string ids.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number for project id, got {}",
            other
        ))),
    }
}

/// Trait for project lookup implementations
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    /// Fetch the first project visible to the access token
    ///
    /// # Returns
    ///
    /// - `Ok(Project)`: The project bound to the token
    /// - `Err(Error::NotFound)`: The token sees no project
    /// - `Err(Error)`: Authentication, network or decoding failure
    async fn current_project(&self, access_token: &str) -> Result<Project, crate::Error>;
}
