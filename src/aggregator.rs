/// Pooling of repeated discovery windows into per-device signal averages
use log::{debug, info, warn};
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::time::{sleep, Instant};

use crate::bluetooth::{ScanError, Scanner};
use crate::config::ScanSettings;
use crate::models::{DeviceAggregate, DiscoveredDevice, Observation};
use crate::utils::{calculate_averages, format_datetime, DeviceReadings};

/// Readings collected during one scan duration, kept in first-seen order.
#[derive(Debug, Default)]
pub struct Accumulator {
    index: HashMap<String, usize>,
    devices: Vec<DeviceReadings>,
}

impl Accumulator {
    /// Record the result of one discovery invocation.
    ///
    /// Devices without a signal strength are skipped for this invocation
    /// only. Returns the number of valid readings recorded.
    pub fn record_scan(
        &mut self,
        devices: Vec<DiscoveredDevice>,
        captured_at: OffsetDateTime,
    ) -> usize {
        let mut recorded = 0;
        for device in devices {
            let Some(rssi) = device.rssi else {
                debug!("Device {} reported without RSSI", device.address);
                continue;
            };
            self.record(Observation {
                address: device.address,
                name: device.name,
                rssi,
                captured_at,
            });
            recorded += 1;
        }
        recorded
    }

    pub fn record(&mut self, observation: Observation) {
        debug!(
            "Device {} (name: {}): RSSI={} at {}",
            observation.address,
            observation.name.as_deref().unwrap_or("-"),
            observation.rssi,
            format_datetime(&observation.captured_at)
        );

        let slot = match self.index.get(&observation.address).copied() {
            Some(slot) => slot,
            None => {
                self.index
                    .insert(observation.address.clone(), self.devices.len());
                self.devices.push(DeviceReadings {
                    address: observation.address,
                    ..Default::default()
                });
                self.devices.len() - 1
            }
        };

        let entry = &mut self.devices[slot];
        entry.rssi.push(observation.rssi);
        if let Some(name) = observation.name.filter(|n| !n.is_empty()) {
            entry.name = Some(name);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Reduce the pooled readings to one mean per device.
    pub fn finish(self) -> Vec<DeviceAggregate> {
        let averages = calculate_averages(&self.devices);
        for avg in &averages {
            debug!(
                "Device {}: mean RSSI={:.2} ({} samples)",
                avg.mac_address, avg.rssi, avg.sample_count
            );
        }
        averages
    }
}

/// Scan repeatedly for `settings.duration` and average the signal strength
/// of every device seen.
///
/// A discovery invocation that starts before the deadline runs its full
/// window. Any scan fault aborts the whole window.
pub async fn collect(
    scanner: &dyn Scanner,
    settings: &ScanSettings,
) -> Result<Vec<DeviceAggregate>, ScanError> {
    info!(
        "Scanning for {} seconds ({} second windows)",
        settings.duration.as_secs(),
        settings.window.as_secs()
    );

    let mut accumulator = Accumulator::default();
    let start = Instant::now();
    let mut passes = 0;

    while start.elapsed() < settings.duration {
        let devices = scanner.discover(settings.window).await?;
        passes += 1;

        let seen = devices.len();
        let recorded = accumulator.record_scan(devices, OffsetDateTime::now_utc());
        debug!(
            "Scan pass {}: {} devices, {} valid readings",
            passes, seen, recorded
        );

        sleep(settings.pause).await;
    }

    if accumulator.is_empty() {
        warn!("No readings collected during this window");
    }

    let aggregates = accumulator.finish();
    info!(
        "Detected {} devices over {} scan passes",
        aggregates.len(),
        passes
    );
    Ok(aggregates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{device, ScriptedScanner};
    use std::time::Duration;

    #[test]
    fn null_readings_are_skipped_for_that_pass_only() {
        let mut acc = Accumulator::default();
        let now = OffsetDateTime::now_utc();

        assert_eq!(acc.record_scan(vec![device("CC:DD", Some(-80))], now), 1);
        assert_eq!(acc.record_scan(vec![device("CC:DD", None)], now), 0);
        assert_eq!(acc.record_scan(vec![device("CC:DD", Some(-82))], now), 1);

        let result = acc.finish();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].mac_address, "CC:DD");
        assert_eq!(result[0].rssi, -81.0);
        assert_eq!(result[0].sample_count, 2);
    }

    #[test]
    fn output_follows_first_seen_order() {
        let mut acc = Accumulator::default();
        let now = OffsetDateTime::now_utc();
        acc.record_scan(vec![device("BB", Some(-50)), device("AA", Some(-60))], now);
        acc.record_scan(vec![device("CC", Some(-70)), device("AA", Some(-62))], now);

        let order: Vec<_> = acc.finish().into_iter().map(|a| a.mac_address).collect();
        assert_eq!(order, vec!["BB", "AA", "CC"]);
    }

    #[test]
    fn keeps_latest_advertised_name() {
        let mut acc = Accumulator::default();
        let now = OffsetDateTime::now_utc();
        let mut named = device("AA", Some(-60));
        named.name = Some("Tag".to_string());
        let mut blank = device("AA", Some(-62));
        blank.name = Some(String::new());

        acc.record_scan(vec![named, blank], now);

        assert_eq!(acc.finish()[0].name.as_deref(), Some("Tag"));
    }

    #[tokio::test(start_paused = true)]
    async fn averages_readings_across_the_window() {
        let scanner = ScriptedScanner::new(vec![
            Ok(vec![device("AA:BB", Some(-70)), device("CC:DD", Some(-80))]),
            Ok(vec![device("AA:BB", Some(-72)), device("CC:DD", None)]),
            Ok(vec![device("AA:BB", Some(-71)), device("CC:DD", Some(-82))]),
        ]);

        let result = collect(&scanner, &ScanSettings::default()).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].mac_address, "AA:BB");
        assert_eq!(result[0].rssi, -71.0);
        assert_eq!(result[0].sample_count, 3);
        assert_eq!(result[1].mac_address, "CC:DD");
        assert_eq!(result[1].rssi, -81.0);
        assert_eq!(result[1].sample_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn devices_never_read_are_omitted() {
        let scanner = ScriptedScanner::new(vec![
            Ok(vec![device("EE:FF", None)]),
            Ok(vec![device("EE:FF", None), device("AA:BB", Some(-40))]),
        ]);

        let result = collect(&scanner, &ScanSettings::default()).await.unwrap();

        assert_eq!(result.len(), 1);
        assert!(result.iter().all(|a| a.mac_address != "EE:FF"));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_radio_yields_empty_result() {
        let scanner = ScriptedScanner::new(Vec::new());

        let result = collect(&scanner, &ScanSettings::default()).await.unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn window_is_split_into_timed_passes() {
        let scanner = ScriptedScanner::new(Vec::new());
        let start = Instant::now();

        collect(&scanner, &ScanSettings::default()).await.unwrap();

        // Passes start at 0, 4, ..., 28 seconds: 3s window plus 1s pause each
        assert_eq!(scanner.calls(), 8);
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn scan_fault_aborts_the_window() {
        let scanner = ScriptedScanner::new(vec![
            Ok(vec![device("AA:BB", Some(-70))]),
            Err(ScanError::Interrupted("adapter removed".into())),
        ]);

        let err = collect(&scanner, &ScanSettings::default()).await.unwrap_err();

        assert!(matches!(err, ScanError::Interrupted(_)));
        assert_eq!(scanner.calls(), 2);
    }
}
