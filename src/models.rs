use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::utils::unix_seconds;

/// Physical placement of the beacon, forwarded verbatim to the collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub zone: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// Who this beacon is. Loaded once at startup and never mutated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identity {
    pub beacon_id: Option<String>,
    pub location: Location,
}

/// A single device as reported by one scan invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredDevice {
    pub address: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

/// One valid signal strength reading.
#[derive(Debug, Clone)]
pub struct Observation {
    pub address: String,
    pub name: Option<String>,
    pub rssi: i16,
    pub captured_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAggregate {
    pub mac_address: String,
    pub rssi: f64,
    pub sample_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Payload posted to the collector once per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub beacon_id: Option<String>,
    pub location: Location,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub devices: Vec<DeviceAggregate>,
}

impl Report {
    pub fn new(identity: &Identity, devices: Vec<DeviceAggregate>, at: OffsetDateTime) -> Self {
        Report {
            beacon_id: identity.beacon_id.clone(),
            location: identity.location.clone(),
            timestamp: unix_seconds(&at),
            devices,
        }
    }
}
