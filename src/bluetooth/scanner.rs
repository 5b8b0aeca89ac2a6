/// Bluetooth Low Energy discovery of nearby devices and their signal strength
use async_trait::async_trait;
use futures_util::{pin_mut, StreamExt};
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio::time::{sleep, Duration};

use crate::models::DiscoveredDevice;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to create Bluetooth session: {0}")]
    Session(#[source] bluer::Error),
    #[error("Bluetooth adapter unavailable: {0}")]
    Adapter(#[source] bluer::Error),
    #[error("device discovery failed: {0}")]
    Discovery(#[source] bluer::Error),
    #[error("scan interrupted: {0}")]
    Interrupted(String),
}

/// Source of device sightings for one discovery window.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Run discovery for `timeout` and return every device seen, with its
    /// current signal strength if the radio reported one.
    async fn discover(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>, ScanError>;
}

/// Scanner backed by the BlueZ daemon.
///
/// The session is opened on first use and kept for later windows. A failed
/// connection attempt is retried on the next call.
#[derive(Default)]
pub struct BluerScanner {
    connection: OnceCell<(bluer::Session, bluer::Adapter)>,
}

impl BluerScanner {
    pub fn new() -> Self {
        Self::default()
    }

    async fn adapter(&self) -> Result<&bluer::Adapter, ScanError> {
        let (_, adapter) = self.connection.get_or_try_init(connect).await?;
        Ok(adapter)
    }
}

/// Open a session on the default adapter and make sure it is powered.
async fn connect() -> Result<(bluer::Session, bluer::Adapter), ScanError> {
    let session = match bluer::Session::new().await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to create Bluetooth session: {}", e);
            return Err(ScanError::Session(e));
        }
    };

    let adapter = match session.default_adapter().await {
        Ok(adapter) => adapter,
        Err(e) => {
            error!("Failed to get default Bluetooth adapter: {}", e);
            return Err(ScanError::Adapter(e));
        }
    };

    if let Err(e) = adapter.set_powered(true).await {
        error!("Failed to power on adapter: {}", e);
        return Err(ScanError::Adapter(e));
    }

    // Repeated advertisements keep the RSSI property fresh
    let filter = bluer::DiscoveryFilter {
        transport: bluer::DiscoveryTransport::Le,
        duplicate_data: true,
        ..Default::default()
    };

    // Apply the discovery filter (warn if it fails, but continue)
    if let Err(e) = adapter.set_discovery_filter(filter).await {
        warn!("Failed to set discovery filter: {}", e);
    }

    info!("Using Bluetooth adapter {}", adapter.name());
    Ok((session, adapter))
}

#[async_trait]
impl Scanner for BluerScanner {
    async fn discover(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>, ScanError> {
        let adapter = self.adapter().await?;
        let events = adapter
            .discover_devices()
            .await
            .map_err(ScanError::Discovery)?;
        pin_mut!(events);

        let deadline = sleep(timeout);
        pin_mut!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                event = events.next() => match event {
                    Some(event) => debug!("Discovery event: {:?}", event),
                    None => {
                        return Err(ScanError::Interrupted(
                            "discovery event stream closed".into(),
                        ))
                    }
                },
            }
        }

        // BlueZ drops RSSI values once discovery stops, so read them while
        // the event stream is still alive.
        let addresses = adapter
            .device_addresses()
            .await
            .map_err(ScanError::Discovery)?;

        let mut devices = Vec::with_capacity(addresses.len());
        for addr in addresses {
            let device = match adapter.device(addr) {
                Ok(device) => device,
                Err(_) => continue,
            };

            let address = device.address().to_string().to_uppercase();
            let rssi = match device.rssi().await {
                Ok(rssi) => rssi,
                Err(e) => {
                    debug!("Failed to read RSSI for {}: {}", address, e);
                    None
                }
            };
            let name = device.name().await.unwrap_or_default();

            devices.push(DiscoveredDevice {
                address,
                name,
                rssi,
            });
        }

        Ok(devices)
    }
}
