// # HTTP Collector
//
// This crate provides the HTTP client for the collector API:
//
// - `HttpCollector`: a `BeaconSink` that POSTs visit beacons
// - `HttpProjectDirectory`: a `ProjectDirectory` that lists projects
//
// ## Behaviour
//
// - One HTTP request per call; no retry, no backoff, no caching
// - Short connect and request timeouts (from `CollectorConfig`)
// - Non-2xx statuses map to specific errors (401/403, 404, 429, 5xx)
// - Dry-run mode logs the payload instead of sending it
//
// ## Security Requirements
//
// - The access token NEVER appears in logs or Debug output
//
// ## API Reference
//
// - Track visit: POST `/api/v1/tracking/visit/`
// - List projects: GET `/api/v1/projects/`

use async_trait::async_trait;
use beacon_core::config::{CollectorConfig, PLUGIN_VERSION, TrackingSettings};
use beacon_core::traits::{BeaconSink, BeaconSinkFactory, Project, ProjectDirectory};
use beacon_core::{Beacon, Error, Result};
use reqwest::StatusCode;

/// Sink name used in logs and errors
const COLLECTOR_NAME: &str = "http";

/// User agent of outbound collector requests
fn user_agent() -> String {
    format!("Smalk-Analytics/{}", PLUGIN_VERSION)
}

/// Build the shared HTTP client for a collector configuration
fn build_client(config: &CollectorConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .connect_timeout(config.connect_timeout())
        .user_agent(user_agent())
        .build()
        .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))
}

/// Map a non-success status to an error
fn status_error(status: StatusCode, body: &str, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid access token or insufficient permissions. Status: {}",
            status
        )),
        404 => Error::not_found(format!("{}: {}", context, status)),
        429 => Error::rate_limited(format!("Rate limit exceeded. Status: {}", status)),
        500..=599 => Error::collector(
            COLLECTOR_NAME,
            format!("Collector server error (transient): {} - {}", status, body),
        ),
        _ => Error::collector(COLLECTOR_NAME, format!("{} failed: {} - {}", context, status, body)),
    }
}

/// Beacon sink posting to the collector's visit endpoint
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the collector logs the body it would have sent
/// and reports success without any network call.
pub struct HttpCollector {
    /// Visit tracking endpoint
    tracking_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, log beacons instead of sending them
    dry_run: bool,
}

// No token is held here, but keep the output stable and small.
impl std::fmt::Debug for HttpCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCollector")
            .field("tracking_url", &self.tracking_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl HttpCollector {
    /// Create a collector from configuration
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            tracking_url: config.tracking_url(),
            client: build_client(config)?,
            dry_run: config.dry_run,
        })
    }

    /// Tracking endpoint this collector posts to
    pub fn tracking_url(&self) -> &str {
        &self.tracking_url
    }

    /// Whether beacons are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

#[async_trait]
impl BeaconSink for HttpCollector {
    /// Send one beacon
    ///
    /// ```http
    /// POST /api/v1/tracking/visit/
    /// Authorization: Api-Key <token>
    /// Content-Type: application/json
    /// ```
    async fn send(&self, settings: &TrackingSettings, beacon: &Beacon) -> Result<()> {
        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                self.tracking_url,
                beacon.to_json()?
            );
            return Ok(());
        }

        let response = self
            .client
            .post(&self.tracking_url)
            .header("Authorization", settings.authorization_header())
            .header("Cache-Control", "no-cache, no-store, must-revalidate")
            .header("Pragma", "no-cache")
            .header("X-Smalk-Plugin-Version", PLUGIN_VERSION)
            .header("X-Requested-With", "XMLHttpRequest")
            .json(beacon)
            .send()
            .await
            .map_err(|e| Error::collector(COLLECTOR_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            // The body is informational only; an unreadable one is not worth an error of its own.
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body, "Visit tracking"));
        }

        tracing::trace!(unique_id = %beacon.unique_id, %status, "collector accepted beacon");
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        COLLECTOR_NAME
    }
}

/// Project lookup against the collector's projects endpoint
pub struct HttpProjectDirectory {
    /// Project listing endpoint
    projects_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpProjectDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProjectDirectory")
            .field("projects_url", &self.projects_url)
            .finish()
    }
}

impl HttpProjectDirectory {
    /// Create a project directory from configuration
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            projects_url: config.projects_url(),
            client: build_client(config)?,
        })
    }
}

#[async_trait]
impl ProjectDirectory for HttpProjectDirectory {
    /// Fetch the first project of the token
    ///
    /// ```http
    /// GET /api/v1/projects/
    /// Authorization: Api-Key <token>
    /// ```
    async fn current_project(&self, access_token: &str) -> Result<Project> {
        if access_token.is_empty() {
            return Err(Error::config("Access token is required for project lookup"));
        }

        tracing::debug!("Looking up project for access token");

        let response = self
            .client
            .get(&self.projects_url)
            .header("Authorization", format!("Api-Key {}", access_token))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::collector(COLLECTOR_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body, "Project lookup"));
        }

        let projects: Vec<Project> = response
            .json()
            .await
            .map_err(|e| Error::collector(COLLECTOR_NAME, format!("Failed to parse response: {}", e)))?;

        let project = projects
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("No project is bound to this access token"))?;

        tracing::debug!(project_id = %project.id, name = %project.name, "Found project");
        Ok(project)
    }
}

/// Factory for creating HTTP collectors
pub struct HttpCollectorFactory;

impl BeaconSinkFactory for HttpCollectorFactory {
    fn create(&self, config: &CollectorConfig) -> Result<Box<dyn BeaconSink>> {
        if config.dry_run {
            tracing::warn!("HTTP collector running in DRY-RUN mode - no beacons will be sent");
        }

        Ok(Box::new(HttpCollector::new(config)?))
    }
}
