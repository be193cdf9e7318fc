use std::path::Path;

use anyhow::Context;
use tracing::warn;

use crate::filters::{DateWindow, ExportFilters};
use crate::models::StatusRecord;

/// Parses a status list as served by the status API. Entries that are not
/// objects, lack an `_id`, or fail to decode are skipped.
pub fn parse_records(json: &str) -> anyhow::Result<Vec<StatusRecord>> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(json).context("status list must be a JSON array")?;

    let mut records = Vec::with_capacity(values.len());
    for (position, value) in values.into_iter().enumerate() {
        let has_id = value
            .get("_id")
            .and_then(|id| id.as_str())
            .is_some_and(|id| !id.is_empty());
        if !has_id {
            warn!(position, "skipping status entry without an id");
            continue;
        }
        match serde_json::from_value::<StatusRecord>(value) {
            Ok(record) => records.push(record),
            Err(err) => warn!(position, error = %err, "skipping invalid status entry"),
        }
    }
    Ok(records)
}

pub fn read_records(path: &Path) -> anyhow::Result<Vec<StatusRecord>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_records(&json)
}

pub fn apply_filters(
    records: Vec<StatusRecord>,
    filters: &ExportFilters,
    window: &DateWindow,
) -> Vec<StatusRecord> {
    records
        .into_iter()
        .filter(|record| filters.matches(record, window))
        .collect()
}
