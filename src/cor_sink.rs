use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::http::{self, body_snippet};
use crate::types::StructuredRecord;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sink returned status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Client for the downstream log ingestion endpoint. One batch per file,
/// one request per batch; a rejected batch is dropped, never retried here.
pub struct CoralogixSink {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl CoralogixSink {
    pub fn new(cfg: &Config) -> reqwest::Result<Self> {
        let client = http::build_client(cfg.http_timeout(), cfg.insecure_tls)?;
        Ok(Self {
            client,
            endpoint: cfg.cor_endpoint.clone(),
            api_key: cfg.cor_api_key.clone(),
        })
    }

    pub async fn deliver(&self, batch: &[StructuredRecord]) -> Result<(), DeliveryError> {
        if batch.is_empty() {
            return Ok(());
        }

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", self.api_key.as_str())
            .json(batch)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::OK {
            info!(records = batch.len(), "batch delivered");
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body: body_snippet(&body, 500),
        })
    }
}
