//! Test doubles and common utilities for tracker contract tests
//!
//! The sinks here never touch the network; they record, fail or stall so the
//! contract tests can observe what the tracker does around them.

#![allow(dead_code)]

use beacon_core::error::{Error, Result};
use beacon_core::{Beacon, BeaconConfig, BeaconSink, DispatchEvent, InboundRequest, TrackingSettings};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// A sink that records every beacon it receives
#[derive(Clone, Default)]
pub struct RecordingSink {
    send_call_count: Arc<AtomicUsize>,
    beacons: Arc<Mutex<Vec<Beacon>>>,
    tokens: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of times send() was called
    pub fn send_call_count(&self) -> usize {
        self.send_call_count.load(Ordering::SeqCst)
    }

    /// Beacons received so far
    pub fn beacons(&self) -> Vec<Beacon> {
        self.beacons.lock().unwrap().clone()
    }

    /// Access tokens seen so far
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl BeaconSink for RecordingSink {
    async fn send(&self, settings: &TrackingSettings, beacon: &Beacon) -> Result<()> {
        self.send_call_count.fetch_add(1, Ordering::SeqCst);
        self.beacons.lock().unwrap().push(beacon.clone());
        self.tokens.lock().unwrap().push(settings.access_token.clone());
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "recording"
    }
}

/// A sink that fails every send, like a refused connection
#[derive(Clone, Default)]
pub struct FailingSink {
    send_call_count: Arc<AtomicUsize>,
}

impl FailingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send_call_count(&self) -> usize {
        self.send_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BeaconSink for FailingSink {
    async fn send(&self, _settings: &TrackingSettings, _beacon: &Beacon) -> Result<()> {
        self.send_call_count.fetch_add(1, Ordering::SeqCst);
        Err(Error::collector("failing", "connection refused"))
    }

    fn sink_name(&self) -> &'static str {
        "failing"
    }
}

/// A sink whose send never completes, like an unreachable collector
#[derive(Clone, Default)]
pub struct StalledSink;

#[async_trait::async_trait]
impl BeaconSink for StalledSink {
    async fn send(&self, _settings: &TrackingSettings, _beacon: &Beacon) -> Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "stalled"
    }
}

/// Settings that allow tracking
pub fn eligible_settings() -> TrackingSettings {
    TrackingSettings::new("tok_123")
}

/// An ordinary page view from a browser behind a proxy
pub fn page_view(path: &str) -> InboundRequest {
    InboundRequest::new("GET", path)
        .with_header("HTTP_USER_AGENT", "Mozilla/5.0 (compatible; GPTBot/1.0)")
        .with_header("HTTP_ACCEPT_LANGUAGE", "en-US,en;q=0.9")
        .with_header("REMOTE_ADDR", "10.0.0.1")
        .with_header("HTTP_X_FORWARDED_FOR", "203.0.113.7, 10.0.0.1")
}

/// Config with a short dispatch timeout for tests
pub fn test_config(dispatch_timeout: Duration) -> BeaconConfig {
    let mut config = BeaconConfig::new();
    config.dispatcher.dispatch_timeout_ms = dispatch_timeout.as_millis() as u64;
    config
}

/// Wait for the next event that is not a `Dispatched` or `Skipped` marker
pub async fn next_outcome(events: &mut mpsc::Receiver<DispatchEvent>) -> DispatchEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Some(DispatchEvent::Dispatched { .. }) | Some(DispatchEvent::Skipped { .. }) => {
                    continue;
                }
                Some(event) => return event,
                None => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("outcome event within 2s")
}
