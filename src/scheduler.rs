/// Scan → report → wait loop with per-cycle error isolation
use log::{error, info, warn};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::time::{sleep, Duration};
use url::Url;

use crate::aggregator;
use crate::bluetooth::{ScanError, Scanner};
use crate::config::ScanSettings;
use crate::models::Identity;
use crate::reporting::{send_report, DeliveryOutcome, ReportError, Transport};
use crate::utils::format_datetime;

/// Faults that abort a cycle and trigger the back-off wait.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// How a cycle that ran to completion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Delivered { devices: usize },
    Skipped,
    /// The collector rejected the report or could not be reached
    DeliveryFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Scanning,
    IdleWait(Duration),
}

/// The two waits of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub interval: Duration,
    pub backoff: Duration,
}

impl Schedule {
    pub fn from_settings(settings: &ScanSettings) -> Self {
        Schedule {
            interval: settings.interval,
            backoff: settings.backoff,
        }
    }

    /// State to enter once a cycle has finished.
    pub fn after_cycle(&self, result: &Result<CycleOutcome, CycleError>) -> LoopState {
        match result {
            Ok(_) => LoopState::IdleWait(self.interval),
            Err(_) => LoopState::IdleWait(self.backoff),
        }
    }
}

pub struct CollectionLoop<S, T> {
    identity: Identity,
    settings: ScanSettings,
    server_url: Url,
    scanner: S,
    transport: T,
}

impl<S: Scanner, T: Transport> CollectionLoop<S, T> {
    pub fn new(
        identity: Identity,
        settings: ScanSettings,
        server_url: Url,
        scanner: S,
        transport: T,
    ) -> Self {
        CollectionLoop {
            identity,
            settings,
            server_url,
            scanner,
            transport,
        }
    }

    /// Run one scan window and report its averages.
    ///
    /// Delivery failures are logged here and do not fail the cycle.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        let devices = aggregator::collect(&self.scanner, &self.settings).await?;

        match send_report(&self.transport, &self.server_url, &self.identity, devices).await {
            Ok(DeliveryOutcome::Delivered { devices }) => Ok(CycleOutcome::Delivered { devices }),
            Ok(DeliveryOutcome::Skipped) => Ok(CycleOutcome::Skipped),
            Err(ReportError::Delivery(e)) => {
                error!("Failed to deliver report: {}", e);
                Ok(CycleOutcome::DeliveryFailed)
            }
            Err(ReportError::Encode(e)) => Err(e.into()),
        }
    }

    /// Advance the loop by one state transition.
    pub async fn step(&self, state: LoopState) -> LoopState {
        match state {
            LoopState::Scanning => {
                info!(
                    "Starting scan cycle at: {}",
                    format_datetime(&OffsetDateTime::now_utc())
                );
                let result = self.run_cycle().await;
                if let Err(e) = &result {
                    error!("Cycle failed: {}", e);
                }
                let next = Schedule::from_settings(&self.settings).after_cycle(&result);
                if let (Err(_), LoopState::IdleWait(wait)) = (&result, next) {
                    warn!("Backing off for {} seconds", wait.as_secs());
                }
                next
            }
            LoopState::IdleWait(wait) => {
                info!("Next scan in {} seconds", wait.as_secs());
                sleep(wait).await;
                LoopState::Scanning
            }
        }
    }

    /// Cycle forever. Only process termination stops the loop.
    pub async fn run_forever(&self) {
        info!(
            "Starting beacon {}",
            self.identity.beacon_id.as_deref().unwrap_or("<unnamed>")
        );

        let mut state = LoopState::Scanning;
        loop {
            state = self.step(state).await;
        }
    }
}
