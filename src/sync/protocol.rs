use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::location::{Location, UpdateEvent};

/// Frames pushed to stream viewers
///
/// Serialized as `{"type":"new_location","device_id":..,"location":{"lat":..,"lng":..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    NewLocation {
        device_id: String,
        location: Location,
    },
}

impl StreamMessage {
    pub fn new_location(event: &UpdateEvent) -> Self {
        StreamMessage::NewLocation {
            device_id: event.device_id.clone(),
            location: event.location,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn into_event(self) -> UpdateEvent {
        match self {
            StreamMessage::NewLocation {
                device_id,
                location,
            } => UpdateEvent {
                device_id,
                location,
            },
        }
    }
}
