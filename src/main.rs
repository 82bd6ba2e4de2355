use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sfstream::config::Config;
use sfstream::runner;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    init_tracing();

    let cfg_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = Config::load(cfg_path)?;
    info!(host = %cfg.host, interval = %cfg.log_interval, "starting sfstream");

    if cfg.run_interval_secs == 0 {
        let summary = runner::run_once(&cfg).await?;
        info!(
            files = summary.files_listed,
            records = summary.records_sent,
            "single run finished"
        );
        return Ok(());
    }

    // Sequential loop: a slow run delays the next tick instead of
    // overlapping it, so no two runs touch the watermark concurrently.
    let tick = Duration::from_secs(cfg.run_interval_secs);
    loop {
        match runner::run_once(&cfg).await {
            Ok(summary) => info!(
                files = summary.files_listed,
                failed = summary.files_failed,
                records = summary.records_sent,
                watermark = %summary.watermark,
                "run finished"
            ),
            // The next tick retries from the last successful watermark.
            Err(err) => error!("run failed: {err}"),
        }
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(tick) => {}
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
