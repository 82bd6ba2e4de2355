use chrono::{NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::types::StructuredRecord;

pub const APPLICATION_NAME: &str = "Salesforce";

/// Column whose value becomes the record timestamp.
pub const TIMESTAMP_COLUMN: &str = "TIMESTAMP_DERIVED";

/// Duplicate of the derived column in a legacy format; dropped.
pub const LEGACY_TIMESTAMP_COLUMN: &str = "TIMESTAMP";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Normalize one raw tabular log file into structured records.
///
/// The first row defines column names. Each data row becomes one record:
/// the `TIMESTAMP_DERIVED` value is converted to epoch milliseconds, the
/// legacy `TIMESTAMP` column is discarded, and the remaining columns are
/// serialized as a JSON object into `text`. Malformed rows are dropped and
/// logged; row order is preserved. Pure function of its input.
pub fn transform(event_type: &str, raw: &str) -> Vec<StructuredRecord> {
    let mut rows = parse_rows(raw).into_iter();
    let Some(headers) = rows.next() else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for (idx, cells) in rows.enumerate() {
        match transform_row(event_type, &headers, &cells) {
            Ok(record) => records.push(record),
            Err(reason) => {
                warn!(event_type, row = idx + 2, "dropping row: {reason}");
            }
        }
    }
    records
}

fn transform_row(
    event_type: &str,
    headers: &[String],
    cells: &[String],
) -> Result<StructuredRecord, String> {
    if cells.len() != headers.len() {
        return Err(format!(
            "expected {} columns, found {}",
            headers.len(),
            cells.len()
        ));
    }

    let mut fields = Map::new();
    let mut timestamp = None;
    for (name, value) in headers.iter().zip(cells) {
        if name == TIMESTAMP_COLUMN {
            timestamp = Some(
                parse_row_timestamp(value)
                    .ok_or_else(|| format!("unparsable {TIMESTAMP_COLUMN} '{value}'"))?,
            );
        } else if name == LEGACY_TIMESTAMP_COLUMN {
            continue;
        } else {
            fields.insert(name.clone(), Value::String(value.clone()));
        }
    }
    let Some(timestamp) = timestamp else {
        return Err(format!("missing {TIMESTAMP_COLUMN} column"));
    };

    let text = serde_json::to_string(&Value::Object(fields)).map_err(|e| e.to_string())?;
    Ok(StructuredRecord {
        timestamp,
        application_name: APPLICATION_NAME.to_string(),
        subsystem_name: event_type.to_string(),
        text,
    })
}

fn parse_row_timestamp(value: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive).timestamp_millis())
}

/// Split comma-separated text into rows of cells. Handles quoted fields
/// with embedded commas, doubled-quote escapes, and newlines inside quotes.
/// Blank lines are skipped.
fn parse_rows(raw: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => row.push(std::mem::take(&mut field)),
                '\r' => {}
                '\n' => {
                    row.push(std::mem::take(&mut field));
                    flush_row(&mut rows, &mut row);
                }
                _ => field.push(c),
            }
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        flush_row(&mut rows, &mut row);
    }
    rows
}

fn flush_row(rows: &mut Vec<Vec<String>>, row: &mut Vec<String>) {
    if row.len() == 1 && row[0].is_empty() {
        row.clear();
        return;
    }
    rows.push(std::mem::take(row));
}
