/// Building and delivering the per-cycle report
use log::{debug, info};
use thiserror::Error;
use time::OffsetDateTime;
use url::Url;

use crate::models::{DeviceAggregate, Identity, Report};
use crate::reporting::Transport;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("collector answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        DeliveryError::Transport(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Nothing was observed, so no request was made
    Skipped,
    Delivered { devices: usize },
}

/// Send the averaged devices of one cycle to the collector
///
/// An empty device list is a no-op. Only an HTTP 200 counts as delivered;
/// the response body of any other status is kept in the error.
///
/// # Arguments
/// * `transport` - Capability used to post the JSON payload
/// * `server_url` - Collector endpoint
/// * `identity` - Beacon identity and location stamped on the report
/// * `devices` - Averages produced by the scan window
pub async fn send_report(
    transport: &dyn Transport,
    server_url: &Url,
    identity: &Identity,
    devices: Vec<DeviceAggregate>,
) -> Result<DeliveryOutcome, ReportError> {
    if devices.is_empty() {
        info!("No devices to report, skipping delivery");
        return Ok(DeliveryOutcome::Skipped);
    }

    let count = devices.len();
    let report = Report::new(identity, devices, OffsetDateTime::now_utc());
    let payload = serde_json::to_value(&report)?;
    debug!("Posting report to {}: {}", server_url, payload);

    let response = transport.post_json(server_url, &payload).await?;
    if response.status != 200 {
        return Err(DeliveryError::Status {
            status: response.status,
            body: response.body,
        }
        .into());
    }

    info!("Report delivered: {} devices", count);
    Ok(DeliveryOutcome::Delivered { devices: count })
}
