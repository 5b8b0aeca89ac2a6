/// Utility functions for data processing and formatting
use time::{format_description, OffsetDateTime};

use crate::models::DeviceAggregate;

/// Readings pooled for one device over a scan window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceReadings {
    pub address: String,
    pub name: Option<String>,
    pub rssi: Vec<i16>,
}

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    match format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Seconds since the Unix epoch with sub-second precision.
pub fn unix_seconds(dt: &OffsetDateTime) -> f64 {
    dt.unix_timestamp_nanos() as f64 / 1_000_000_000.0
}

/// Calculate mean signal strength for every device with at least one reading
///
/// Devices without readings are left out, so every returned aggregate has a
/// sample count of at least one. Input order is preserved.
pub fn calculate_averages(readings: &[DeviceReadings]) -> Vec<DeviceAggregate> {
    readings
        .iter()
        .filter(|device| !device.rssi.is_empty())
        .map(|device| {
            let sum: f64 = device.rssi.iter().map(|&v| f64::from(v)).sum();
            DeviceAggregate {
                mac_address: device.address.clone(),
                rssi: sum / device.rssi.len() as f64,
                sample_count: device.rssi.len(),
                name: device.name.clone(),
            }
        })
        .collect()
}
