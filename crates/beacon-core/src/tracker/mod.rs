//! Visit tracker
//!
//! The [`Tracker`] composes the per-request flow that a host calls once per
//! inbound request:
//!
//! ```text
//! InboundRequest ──► eligibility::evaluate ──► headers::collect_headers
//!                          │                            │
//!                          ▼                            ▼
//!                 DispatchEvent::Skipped        Beacon::new ──► tokio::spawn
//!                                                                   │
//!                                               BeaconSink::send (with timeout)
//!                                                                   │
//!                                      DispatchEvent::{Delivered, Failed, TimedOut}
//! ```
//!
//! ## Fire-and-forget
//!
//! Sending happens on a detached task. `track` and `dispatch` return as soon
//! as the task is spawned; the returned handle may be dropped. Failures,
//! timeouts and non-2xx answers are logged at debug level and reported on the
//! event channel, never returned. There is no retry.

use crate::beacon::Beacon;
use crate::config::{BeaconConfig, TrackingSettings};
use crate::eligibility::{self, Eligibility, SkipReason};
use crate::error::Result;
use crate::headers::{self, HeaderSnapshot};
use crate::loader::LoaderScript;
use crate::request::InboundRequest;
use crate::traits::BeaconSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Events emitted by the Tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// Request was not eligible
    Skipped {
        path: String,
        reason: SkipReason,
    },

    /// Beacon handed to a detached task
    Dispatched {
        unique_id: String,
        path: String,
    },

    /// Collector accepted the beacon
    Delivered {
        unique_id: String,
    },

    /// Sink reported an error; the beacon is dropped
    Failed {
        unique_id: String,
        error: String,
    },

    /// Sink did not finish within the dispatch timeout; the beacon is dropped
    TimedOut {
        unique_id: String,
    },
}

/// Per-request visit tracker
///
/// Holds no per-request state; one instance serves all requests and can be
/// shared behind an `Arc`.
pub struct Tracker {
    /// Beacon delivery
    sink: Arc<dyn BeaconSink>,

    /// Loader markup renderer
    loader: LoaderScript,

    /// Budget of one detached send
    dispatch_timeout: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<DispatchEvent>,
}

impl Tracker {
    /// Create a new tracker
    ///
    /// # Returns
    ///
    /// A tuple of (tracker, event_receiver). Dropping the receiver is fine:
    /// events are then discarded.
    pub fn new(
        sink: Box<dyn BeaconSink>,
        config: &BeaconConfig,
    ) -> Result<(Self, mpsc::Receiver<DispatchEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.dispatcher.event_channel_capacity);

        let tracker = Self {
            sink: Arc::from(sink),
            loader: LoaderScript::from_config(&config.collector),
            dispatch_timeout: config.dispatcher.dispatch_timeout(),
            event_tx: tx,
        };

        Ok((tracker, rx))
    }

    /// Whether a beacon should be sent for this request
    pub fn should_track(&self, settings: &TrackingSettings, request: &InboundRequest) -> bool {
        eligibility::should_track(settings, request)
    }

    /// Capture the tracked headers of a request
    pub fn collect_headers(&self, request: &InboundRequest) -> HeaderSnapshot {
        headers::collect_headers(request)
    }

    /// Run the whole per-request flow
    ///
    /// Returns the handle of the detached send when a beacon was dispatched.
    /// Callers serving pages should drop it.
    pub fn track(
        &self,
        settings: &TrackingSettings,
        request: &InboundRequest,
    ) -> Option<JoinHandle<()>> {
        if let Eligibility::Skipped(reason) = eligibility::evaluate(settings, request) {
            trace!(path = %request.path, %reason, "visit not tracked");
            self.emit_event(DispatchEvent::Skipped {
                path: request.path.clone(),
                reason,
            });
            return None;
        }

        let headers = self.collect_headers(request);
        self.dispatch(settings, request, headers)
    }

    /// Build a beacon and send it on a detached task
    ///
    /// Never blocks and never fails. Without a tokio runtime nothing is sent.
    pub fn dispatch(
        &self,
        settings: &TrackingSettings,
        request: &InboundRequest,
        headers: HeaderSnapshot,
    ) -> Option<JoinHandle<()>> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!(path = %request.path, "no async runtime, beacon dropped");
                return None;
            }
        };

        let beacon = Beacon::new(request, headers);
        let unique_id = beacon.unique_id.clone();

        debug!(
            unique_id = %unique_id,
            path = %beacon.request_path,
            method = %beacon.request_method,
            headers = beacon.request_headers.len(),
            sink = self.sink.sink_name(),
            "dispatching visit beacon"
        );

        self.emit_event(DispatchEvent::Dispatched {
            unique_id: unique_id.clone(),
            path: beacon.request_path.clone(),
        });

        let sink = Arc::clone(&self.sink);
        let settings = settings.clone();
        let timeout = self.dispatch_timeout;
        let event_tx = self.event_tx.clone();

        let handle = runtime.spawn(async move {
            let event = match tokio::time::timeout(timeout, sink.send(&settings, &beacon)).await {
                Ok(Ok(())) => {
                    debug!(unique_id = %unique_id, "visit beacon delivered");
                    DispatchEvent::Delivered { unique_id }
                }
                Ok(Err(e)) => {
                    debug!(unique_id = %unique_id, error = %e, "visit beacon failed");
                    DispatchEvent::Failed {
                        unique_id,
                        error: e.to_string(),
                    }
                }
                Err(_) => {
                    debug!(unique_id = %unique_id, ?timeout, "visit beacon timed out");
                    DispatchEvent::TimedOut { unique_id }
                }
            };
            send_event(&event_tx, event);
        });

        Some(handle)
    }

    /// Loader markup for the page head, if analytics are on for this site
    ///
    /// Returns `None` when analytics are disabled or disallowed, or when no
    /// project id is known.
    pub fn loader_markup(&self, settings: &TrackingSettings, project_id: &str) -> Option<String> {
        if !settings.is_analytics_enabled_and_allowed() || project_id.is_empty() {
            return None;
        }
        Some(self.render_client_loader_markup(project_id))
    }

    /// Loader markup for a project, unconditionally
    pub fn render_client_loader_markup(&self, project_id: &str) -> String {
        self.loader.render(project_id)
    }

    /// Emit an event to the channel
    fn emit_event(&self, event: DispatchEvent) {
        send_event(&self.event_tx, event);
    }
}

fn send_event(tx: &mpsc::Sender<DispatchEvent>, event: DispatchEvent) {
    // Full or closed channels drop the event; dispatch is unaffected.
    if let Err(mpsc::error::TrySendError::Full(event)) = tx.try_send(event) {
        debug!(?event, "event channel full, dropping event");
    }
}
