use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check that both coordinates are finite and in range
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(ValidationError::LatitudeOutOfRange(self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(ValidationError::LongitudeOutOfRange(self.lng));
        }
        Ok(())
    }
}

/// Reject empty or whitespace-only device ids
pub fn validate_device_id(device_id: &str) -> Result<(), ValidationError> {
    if device_id.trim().is_empty() {
        return Err(ValidationError::EmptyDeviceId);
    }
    Ok(())
}

/// The unit of fan-out: one device's newly accepted location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub device_id: String,
    pub location: Location,
}

impl UpdateEvent {
    pub fn new(device_id: impl Into<String>, location: Location) -> Self {
        Self {
            device_id: device_id.into(),
            location,
        }
    }
}
