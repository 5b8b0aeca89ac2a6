use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::reporting::DeliveryError;

/// Status line and body of a collector response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Delivers a JSON document to a URL.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, url: &Url, payload: &Value)
        -> Result<TransportResponse, DeliveryError>;
}

/// Transport over HTTP(S) using a shared connection pool.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        url: &Url,
        payload: &Value,
    ) -> Result<TransportResponse, DeliveryError> {
        let response = self.client.post(url.clone()).json(payload).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}
