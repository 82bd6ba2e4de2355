use serde::{Deserialize, Serialize};

/// One retrievable event log file, as returned by the source listing query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogFileDescriptor {
    pub id: String,
    pub event_type: String,
    pub interval: String,
    pub log_date: String,
    /// Retrieval path for the file content, relative to the host.
    pub log_file: String,
}

/// Response shape of the source listing query.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub records: Vec<LogFileDescriptor>,
    pub done: bool,
    #[serde(rename = "nextRecordsUrl", default)]
    pub next_records_url: Option<String>,
}

/// The transformed unit sent downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredRecord {
    /// Milliseconds since the Unix epoch, UTC.
    pub timestamp: i64,
    #[serde(rename = "applicationName")]
    pub application_name: String,
    #[serde(rename = "subsystemName")]
    pub subsystem_name: String,
    /// JSON object string carrying the remaining columns of the source row.
    pub text: String,
}
