use std::{env, fs, path::PathBuf, time::Duration};

use anyhow::Result;
use directories::ProjectDirs;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub client_id: String,
    pub client_secret: String,
    pub api_version: String,
    pub cor_api_key: String,
    pub cor_endpoint: String,
    pub watermark_path: PathBuf,
    pub log_interval: String,
    pub max_in_flight: usize,
    pub http_timeout_secs: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub run_interval_secs: u64,
    pub insecure_tls: bool,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    host: String,
    client_id: String,
    client_secret: String,
    api_version: String,
    cor_api_key: String,
    #[serde(default = "default_cor_endpoint")]
    cor_endpoint: String,
    #[serde(default)]
    watermark_path: Option<PathBuf>,
    #[serde(default = "default_log_interval")]
    log_interval: String,
    #[serde(default = "default_max_in_flight")]
    max_in_flight: usize,
    #[serde(default = "default_http_timeout_secs")]
    http_timeout_secs: u64,
    #[serde(default = "default_backoff_base_ms")]
    backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    backoff_max_ms: u64,
    #[serde(default)]
    run_interval_secs: u64,
    #[serde(default)]
    insecure_tls: bool,
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        Self {
            host: raw.host,
            client_id: raw.client_id,
            client_secret: raw.client_secret,
            api_version: raw.api_version,
            cor_api_key: raw.cor_api_key,
            cor_endpoint: raw.cor_endpoint,
            watermark_path: raw.watermark_path.unwrap_or_else(default_watermark_path),
            log_interval: raw.log_interval,
            max_in_flight: raw.max_in_flight,
            http_timeout_secs: raw.http_timeout_secs,
            backoff_base_ms: raw.backoff_base_ms,
            backoff_max_ms: raw.backoff_max_ms,
            run_interval_secs: raw.run_interval_secs,
            insecure_tls: raw.insecure_tls,
        }
    }
}

impl Config {
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut cfg = if let Some(path) = path {
            let raw = fs::read_to_string(path)?;
            Config::from(toml::from_str::<RawConfig>(&raw)?)
        } else {
            let default_path = default_config_path();
            if default_path.exists() {
                let raw = fs::read_to_string(&default_path)?;
                Config::from(toml::from_str::<RawConfig>(&raw)?)
            } else {
                Self::default_from_env()?
            }
        };

        if let Ok(v) = env::var("HOST") {
            cfg.host = v;
        }
        if let Ok(v) = env::var("CLIENT_ID") {
            cfg.client_id = v;
        }
        if let Ok(v) = env::var("CLIENT_SECRET") {
            cfg.client_secret = v;
        }
        if let Ok(v) = env::var("API_VERSION") {
            cfg.api_version = v;
        }
        if let Ok(v) = env::var("COR_API_KEY") {
            cfg.cor_api_key = v;
        }
        if let Ok(v) = env::var("COR_ENDPOINT") {
            cfg.cor_endpoint = v;
        }
        if let Ok(v) = env::var("LOG_INTERVAL") {
            cfg.log_interval = v;
        }
        if let Ok(p) = env::var("WATERMARK_PATH") {
            cfg.watermark_path = PathBuf::from(p);
        }
        maybe_env_usize(&mut cfg.max_in_flight, "MAX_IN_FLIGHT");
        maybe_env_u64(&mut cfg.http_timeout_secs, "HTTP_TIMEOUT_SECS");
        maybe_env_u64(&mut cfg.backoff_base_ms, "BACKOFF_BASE_MS");
        maybe_env_u64(&mut cfg.backoff_max_ms, "BACKOFF_MAX_MS");
        maybe_env_u64(&mut cfg.run_interval_secs, "RUN_INTERVAL_SECS");
        maybe_env_bool(&mut cfg.insecure_tls, "INSECURE_TLS");
        validate_required(&cfg)?;
        Ok(cfg)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

impl Config {
    fn default_from_env() -> Result<Self> {
        Ok(Self {
            host: env_required("HOST")?,
            client_id: env_required("CLIENT_ID")?,
            client_secret: env_required("CLIENT_SECRET")?,
            api_version: env_required("API_VERSION")?,
            cor_api_key: env_required("COR_API_KEY")?,
            cor_endpoint: env::var("COR_ENDPOINT").unwrap_or_else(|_| default_cor_endpoint()),
            watermark_path: env::var("WATERMARK_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_watermark_path()),
            log_interval: env::var("LOG_INTERVAL").unwrap_or_else(|_| default_log_interval()),
            max_in_flight: env_usize("MAX_IN_FLIGHT", default_max_in_flight()),
            http_timeout_secs: env_u64("HTTP_TIMEOUT_SECS", default_http_timeout_secs()),
            backoff_base_ms: env_u64("BACKOFF_BASE_MS", default_backoff_base_ms()),
            backoff_max_ms: env_u64("BACKOFF_MAX_MS", default_backoff_max_ms()),
            run_interval_secs: env_u64("RUN_INTERVAL_SECS", 0),
            insecure_tls: env_bool("INSECURE_TLS"),
        })
    }
}

fn default_config_path() -> PathBuf {
    default_state_dir().join("config.toml")
}

fn default_state_dir() -> PathBuf {
    ProjectDirs::from("com", "salesforce", "sfstream")
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".sfstream"))
}

fn default_watermark_path() -> PathBuf {
    default_state_dir().join("watermark.json")
}

fn default_cor_endpoint() -> String {
    "https://ingress.coralogix.com/logs/v1/singles".to_string()
}

fn default_log_interval() -> String {
    "Hourly".to_string()
}

fn default_max_in_flight() -> usize {
    4
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_backoff_base_ms() -> u64 {
    200
}

fn default_backoff_max_ms() -> u64 {
    10_000
}

fn validate_required(cfg: &Config) -> Result<()> {
    if cfg.host.trim().is_empty() {
        anyhow::bail!("HOST is required (set via env or config)");
    }
    if cfg.client_id.trim().is_empty() {
        anyhow::bail!("CLIENT_ID is required (set via env or config)");
    }
    if cfg.client_secret.trim().is_empty() {
        anyhow::bail!("CLIENT_SECRET is required (set via env or config)");
    }
    if cfg.api_version.trim().is_empty() {
        anyhow::bail!("API_VERSION is required (set via env or config)");
    }
    if cfg.cor_api_key.trim().is_empty() {
        anyhow::bail!("COR_API_KEY is required (set via env or config)");
    }
    Ok(())
}

fn maybe_env_usize(val: &mut usize, key: &str) {
    if let Ok(v) = env::var(key) {
        if let Ok(n) = v.parse::<usize>() {
            *val = n;
        }
    }
}

fn maybe_env_u64(val: &mut u64, key: &str) {
    if let Ok(v) = env::var(key) {
        if let Ok(n) = v.parse::<u64>() {
            *val = n;
        }
    }
}

fn maybe_env_bool(val: &mut bool, key: &str) {
    if let Ok(v) = env::var(key) {
        *val = parse_bool(&v);
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str) -> bool {
    env::var(key).map(|v| parse_bool(&v)).unwrap_or(false)
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn env_required(key: &str) -> Result<String> {
    let val = env::var(key).unwrap_or_default();
    if val.trim().is_empty() {
        anyhow::bail!("{key} is required");
    }
    Ok(val)
}
