//! Core traits for the visit beacon system
//!
//! This module defines the seams between the tracker and the collector API.
//!
//! - [`BeaconSink`]: Deliver one beacon to a collector
//! - [`ProjectDirectory`]: Resolve the project bound to an access token

pub mod beacon_sink;
pub mod project_directory;

pub use beacon_sink::{BeaconSink, BeaconSinkFactory};
pub use project_directory::{Project, ProjectDirectory};
