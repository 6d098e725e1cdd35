// # Beacon Sink Trait
//
// Defines the interface for delivering a beacon to a collector.
//
// ## Implementations
//
// - HTTP collector: `beacon-collector-http` crate
//
// ## Usage
//
// ```rust,ignore
// use beacon_core::{Beacon, BeaconSink, TrackingSettings};
//
// async fn send(sink: &dyn BeaconSink, settings: &TrackingSettings, beacon: &Beacon) {
//     // The tracker calls this from a detached task and ignores the outcome.
//     let _ = sink.send(settings, beacon).await;
// }
// ```

use crate::beacon::Beacon;
use crate::config::{CollectorConfig, TrackingSettings};
use async_trait::async_trait;

/// Trait for beacon delivery implementations
///
/// A sink performs exactly one delivery attempt per call. It never retries,
/// never spawns tasks and never caches anything between calls; the
/// [`crate::Tracker`] owns scheduling and timeouts.
///
/// Errors are returned so the tracker can log them and report a
/// [`crate::DispatchEvent::Failed`]. They never reach the page path.
#[async_trait]
pub trait BeaconSink: Send + Sync {
    /// Deliver one beacon
    ///
    /// # Parameters
    ///
    /// - `settings`: Settings of the request; the sink reads the access token
    /// - `beacon`: The payload
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The collector accepted the request (or dry-run)
    /// - `Err(Error)`: Network failure or non-2xx status
    async fn send(&self, settings: &TrackingSettings, beacon: &Beacon) -> Result<(), crate::Error>;

    /// Get the sink name (for logging)
    fn sink_name(&self) -> &'static str;
}

/// Helper trait for constructing sinks from configuration
pub trait BeaconSinkFactory: Send + Sync {
    /// Create a BeaconSink instance from collector configuration
    fn create(&self, config: &CollectorConfig) -> Result<Box<dyn BeaconSink>, crate::Error>;
}
