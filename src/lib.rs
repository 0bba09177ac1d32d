//! # LiveTrack - Live Device Location Broadcast
//!
//! Devices report GPS positions over HTTP; viewers connect over WebSocket and
//! receive every update in near-real-time. A viewer that joins late is first
//! sent the last known position of every device.
//!
//! ## Architecture
//!
//! - [`registry::LocationRegistry`]: last known location per device, the single
//!   source of truth for current state
//! - [`sync::BroadcastHub`]: the subscriber set; fans updates out and replays
//!   the registry to new subscribers atomically with respect to publishes
//! - [`ingest::Tracker`]: parses and validates updates, then commits them
//!   through the hub
//! - [`server`]: the axum HTTP/WebSocket surface
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use livetrack::{Location, Tracker};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let tracker = Tracker::default();
//!     let mut viewer = tracker.hub().attach()?;
//!
//!     tracker.hub().commit("tracker01", Location::new(24.58, 73.71))?;
//!
//!     if let Some(event) = viewer.recv().await {
//!         println!("{} is at {:?}", event.device_id, event.location);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod ingest;
pub mod location;
pub mod logging;
pub mod registry;
pub mod server;
pub mod sync;

// Re-export main types for library consumers
pub use config::{Config, HubConfig};
pub use error::{HubError, IngestError, ValidationError};
pub use ingest::{Ack, IngestRequest, Tracker};
pub use location::{Location, UpdateEvent};
pub use registry::{LocationRegistry, Snapshot};
pub use sync::{BroadcastHub, StreamMessage, SubscriberHandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
