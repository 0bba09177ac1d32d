//! Last known location per device
//!
//! The registry is the single source of truth for current state. It never
//! broadcasts; the hub reads it when replaying to new subscribers and the
//! ingestion path writes to it before publishing.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use crate::error::ValidationError;
use crate::location::{validate_device_id, Location, UpdateEvent};

/// Process-wide map of device id to most recent location
///
/// Entries are created on first update and never removed. Writes are
/// last-write-wins in arrival order.
#[derive(Debug, Default)]
pub struct LocationRegistry {
    devices: RwLock<HashMap<String, Location>>,
}

impl LocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a device's location
    ///
    /// Returns the accepted pair. Nothing is written when validation fails.
    pub fn set(
        &self,
        device_id: impl Into<String>,
        location: Location,
    ) -> Result<UpdateEvent, ValidationError> {
        let device_id = device_id.into();
        validate_device_id(&device_id)?;
        location.validate()?;

        self.devices.write().insert(device_id.clone(), location);

        Ok(UpdateEvent::new(device_id, location))
    }

    /// Point-in-time copy of every device's location
    pub fn snapshot(&self) -> Snapshot {
        let devices = self.devices.read();
        Snapshot {
            devices: devices
                .iter()
                .map(|(id, location)| (id.clone(), *location))
                .collect(),
        }
    }

    pub fn get(&self, device_id: &str) -> Option<Location> {
        self.devices.read().get(device_id).copied()
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}

/// Owned copy of the registry, ordered by device id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    devices: BTreeMap<String, Location>,
}

impl Snapshot {
    pub fn get(&self, device_id: &str) -> Option<&Location> {
        self.devices.get(device_id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Location)> {
        self.devices.iter().map(|(id, loc)| (id.as_str(), loc))
    }

    /// One `UpdateEvent` per device, in device id order
    pub fn into_events(self) -> Vec<UpdateEvent> {
        self.devices
            .into_iter()
            .map(|(device_id, location)| UpdateEvent { device_id, location })
            .collect()
    }
}
