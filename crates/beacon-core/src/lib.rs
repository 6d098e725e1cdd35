// # beacon-core
//
// Core library for server-side visit reporting.
//
// ## Architecture Overview
//
// This library decides, per inbound HTTP request, whether a visit beacon is
// sent, and assembles and dispatches it:
// - **eligibility**: Pure predicate over settings and request path
// - **headers**: Allow-listed header capture into a `HeaderSnapshot`
// - **Beacon**: The JSON payload, stamped with a timestamp and unique id
// - **BeaconSink**: Trait for delivering a beacon to a collector
// - **Tracker**: Composes the flow and sends on a detached task
// - **LoaderScript**: Markup that loads the browser tracker script
//
// ## Design Principles
//
// 1. **Fail silent**: Nothing on the tracking path returns an error
// 2. **Never block**: Delivery is fire-and-forget with a short timeout
// 3. **Explicit settings**: Configuration is passed in, never read globally
// 4. **Library-First**: The host composes the calls; no hook registry

pub mod beacon;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod headers;
pub mod loader;
pub mod request;
pub mod tracker;
pub mod traits;

// Re-export core types for convenience
pub use beacon::Beacon;
pub use config::{BeaconConfig, CollectorConfig, DispatcherConfig, TrackingSettings};
pub use eligibility::{Eligibility, SkipReason, should_track};
pub use error::{Error, Result};
pub use headers::{HeaderSnapshot, collect_headers};
pub use loader::{LoaderScript, render_client_loader_markup};
pub use request::InboundRequest;
pub use tracker::{DispatchEvent, Tracker};
pub use traits::{BeaconSink, BeaconSinkFactory, Project, ProjectDirectory};
