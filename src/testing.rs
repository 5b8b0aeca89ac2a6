//! In-memory scanner and transport used by the unit tests.
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::{sleep, Duration};
use url::Url;

use crate::bluetooth::{ScanError, Scanner};
use crate::models::DiscoveredDevice;
use crate::reporting::{DeliveryError, Transport, TransportResponse};

pub fn device(address: &str, rssi: Option<i16>) -> DiscoveredDevice {
    DiscoveredDevice {
        address: address.to_string(),
        name: None,
        rssi,
    }
}

/// Plays back one scripted result per discovery call, then reports an empty
/// radio. Every call occupies its full window on the tokio clock.
pub struct ScriptedScanner {
    script: Mutex<VecDeque<Result<Vec<DiscoveredDevice>, ScanError>>>,
    calls: AtomicUsize,
}

impl ScriptedScanner {
    pub fn new(script: Vec<Result<Vec<DiscoveredDevice>, ScanError>>) -> Self {
        ScriptedScanner {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scanner for ScriptedScanner {
    async fn discover(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        sleep(timeout).await;
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Records every payload and answers with a fixed status.
pub struct RecordingTransport {
    status: u16,
    body: String,
    fail_with: Option<String>,
    pub sent: Mutex<Vec<(Url, Value)>>,
}

impl RecordingTransport {
    pub fn with_status(status: u16, body: &str) -> Self {
        RecordingTransport {
            status,
            body: body.to_string(),
            fail_with: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn ok() -> Self {
        Self::with_status(200, r#"{"status":"success"}"#)
    }

    pub fn unreachable(reason: &str) -> Self {
        RecordingTransport {
            fail_with: Some(reason.to_string()),
            ..Self::ok()
        }
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post_json(&self, url: &Url, payload: &Value) -> Result<TransportResponse, DeliveryError> {
        self.sent.lock().unwrap().push((url.clone(), payload.clone()));
        if let Some(reason) = &self.fail_with {
            return Err(DeliveryError::Transport(reason.clone()));
        }
        Ok(TransportResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}
