use std::{fs, io, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Cursor format: second precision, UTC. Lexicographic order matches
/// chronological order for this fixed-width layout.
pub const WATERMARK_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WatermarkState {
    /// Point in time up to which logs have been fully processed.
    pub last_run: Option<String>,
}

impl WatermarkState {
    pub fn load(path: &Path) -> Result<Self> {
        let data = match fs::read(path) {
            Ok(d) => d,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err).context("reading watermark file"),
        };
        let state: Self = serde_json::from_slice(&data).context("parsing watermark file")?;
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("creating watermark directory")?;
        }
        let tmp = path.with_extension("tmp");
        let data = serde_json::to_vec_pretty(self).context("serializing watermark")?;
        fs::write(&tmp, data).context("writing temp watermark")?;
        fs::rename(&tmp, path).context("replacing watermark")?;
        Ok(())
    }
}

pub fn format_watermark(at: DateTime<Utc>) -> String {
    at.format(WATERMARK_FORMAT).to_string()
}

pub fn now_watermark() -> String {
    format_watermark(Utc::now())
}

pub fn parse_watermark(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, WATERMARK_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
