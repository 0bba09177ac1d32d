//! Ingestion pipeline
//!
//! Turns a raw payload into a registry write and a broadcast. Transport
//! agnostic: the HTTP handler only maps the outcome to a status code.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::HubConfig;
use crate::error::IngestError;
use crate::location::{Location, UpdateEvent};
use crate::registry::LocationRegistry;
use crate::sync::BroadcastHub;

/// Payload accepted by the ingest endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub device_id: String,
    pub lat: f64,
    pub lng: f64,
}

impl IngestRequest {
    pub fn new(device_id: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            device_id: device_id.into(),
            lat,
            lng,
        }
    }

    /// Parse a JSON body; any missing or mistyped field is a malformed request
    pub fn from_slice(body: &[u8]) -> Result<Self, IngestError> {
        serde_json::from_slice(body).map_err(|e| IngestError::MalformedRequest(e.to_string()))
    }

    pub fn location(&self) -> Location {
        Location::new(self.lat, self.lng)
    }
}

/// Acknowledgment returned to the ingesting caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub status: String,
}

impl Ack {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
        }
    }
}

/// Registry plus hub, shared by the ingest and subscribe handlers
#[derive(Debug, Clone)]
pub struct Tracker {
    hub: Arc<BroadcastHub>,
}

impl Tracker {
    pub fn new(config: HubConfig) -> Self {
        let registry = Arc::new(LocationRegistry::new());
        Self {
            hub: Arc::new(BroadcastHub::new(registry, config)),
        }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn registry(&self) -> &Arc<LocationRegistry> {
        self.hub.registry()
    }

    /// Parse, validate, store and publish a raw JSON payload
    pub fn ingest(&self, body: &[u8]) -> Result<UpdateEvent, IngestError> {
        let request = IngestRequest::from_slice(body)?;
        self.accept(request)
    }

    /// Validate, store and publish an already parsed request
    ///
    /// The update is queued for every subscriber before this returns; delivery
    /// over the network happens afterwards.
    pub fn accept(&self, request: IngestRequest) -> Result<UpdateEvent, IngestError> {
        let location = request.location();
        let (event, delivered) = self.hub.commit(request.device_id, location)?;

        tracing::info!(
            device_id = %event.device_id,
            lat = location.lat,
            lng = location.lng,
            subscribers = delivered,
            "Received location update"
        );

        Ok(event)
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}
