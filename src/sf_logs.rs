use std::time::Duration;

use reqwest::{Client, Response};
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

use crate::config::Config;
use crate::http::{self, body_snippet};
use crate::types::{LogFileDescriptor, QueryResponse};

/// Transient failures retry this many times before surfacing; whole-run
/// retry belongs to the next scheduled run.
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("source returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Client for the event log file API of the source platform.
pub struct SfLogClient {
    client: Client,
    host: String,
    api_version: String,
    log_interval: String,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl SfLogClient {
    pub fn new(cfg: &Config) -> reqwest::Result<Self> {
        let client = http::build_client(cfg.http_timeout(), cfg.insecure_tls)?;
        Ok(Self {
            client,
            host: cfg.host.trim_end_matches('/').to_string(),
            api_version: cfg.api_version.clone(),
            log_interval: cfg.log_interval.clone(),
            backoff_base: cfg.backoff_base(),
            backoff_max: cfg.backoff_max(),
        })
    }

    /// List event log files with a log date at or after the watermark,
    /// following pagination until the result set is complete. Order of the
    /// returned descriptors is the listing order.
    pub async fn list_files_since(
        &self,
        token: &str,
        watermark: &str,
    ) -> Result<Vec<LogFileDescriptor>, SourceError> {
        let soql = format!(
            "SELECT Id, EventType, Interval, LogDate, LogFile FROM EventLogFile \
             WHERE Interval = '{}' AND LogDate >= {}",
            self.log_interval, watermark
        );
        let query_url = format!("{}/services/data/{}/query/", self.host, self.api_version);

        let mut out = Vec::new();
        let mut page = self
            .query_page(token, &query_url, Some(&soql), "event log file query")
            .await?;
        loop {
            out.extend(page.records);
            if page.done {
                break;
            }
            let Some(next) = page.next_records_url else {
                break;
            };
            let next_url = format!("{}{}", self.host, next);
            page = self
                .query_page(token, &next_url, None, "event log file query page")
                .await?;
        }
        Ok(out)
    }

    /// Retrieve the raw tabular content of one listed file.
    pub async fn fetch_file(
        &self,
        token: &str,
        descriptor: &LogFileDescriptor,
    ) -> Result<String, SourceError> {
        let url = format!("{}{}", self.host, descriptor.log_file);
        let resp = self
            .send_with_backoff(|| self.client.get(&url).bearer_auth(token), "log file fetch")
            .await?;
        resp.text().await.map_err(SourceError::Http)
    }

    async fn query_page(
        &self,
        token: &str,
        url: &str,
        soql: Option<&str>,
        context: &'static str,
    ) -> Result<QueryResponse, SourceError> {
        let resp = self
            .send_with_backoff(
                || {
                    let mut req = self.client.get(url).bearer_auth(token);
                    if let Some(q) = soql {
                        req = req.query(&[("q", q)]);
                    }
                    req
                },
                context,
            )
            .await?;
        resp.json::<QueryResponse>().await.map_err(SourceError::Http)
    }

    async fn send_with_backoff<F>(
        &self,
        build: F,
        context: &'static str,
    ) -> Result<Response, SourceError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut backoff = self.backoff_base;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match build().send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    let retryable = matches!(status.as_u16(), 408 | 429) || status.is_server_error();
                    if retryable && attempt < MAX_ATTEMPTS {
                        warn!(
                            "{context} status={status} attempt={attempt}: retrying in {backoff:?}"
                        );
                        sleep(backoff).await;
                        backoff = (backoff * 2).min(self.backoff_max);
                        continue;
                    }
                    let body = resp.text().await.unwrap_or_default();
                    return Err(SourceError::Status {
                        status: status.as_u16(),
                        body: body_snippet(&body, 500),
                    });
                }
                Err(err) if err.is_connect() || err.is_timeout() => {
                    if attempt < MAX_ATTEMPTS {
                        warn!("{context} connection error attempt={attempt}: {err}");
                        sleep(backoff).await;
                        backoff = (backoff * 2).min(self.backoff_max);
                        continue;
                    }
                    return Err(SourceError::Http(err));
                }
                Err(err) => return Err(SourceError::Http(err)),
            }
        }
    }
}
