use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::http::{self, body_snippet};

const TOKEN_PATH: &str = "/services/oauth2/token";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub instance_url: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Client credentials exchange. Rotate the consumer secret as needed on the
/// platform side; the token is consumed once per run.
pub async fn get_access_token(cfg: &Config) -> Result<String, AuthError> {
    let client = http::build_client(cfg.http_timeout(), cfg.insecure_tls)?;
    let url = format!("{}{}", cfg.host.trim_end_matches('/'), TOKEN_PATH);

    let params = [
        ("grant_type", "client_credentials"),
        ("client_id", cfg.client_id.as_str()),
        ("client_secret", cfg.client_secret.as_str()),
    ];

    let resp = client.post(&url).form(&params).send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AuthError::Status {
            status: status.as_u16(),
            body: body_snippet(&body, 500),
        });
    }

    let token: TokenResponse = resp.json().await?;
    info!("access token obtained");
    Ok(token.access_token)
}
