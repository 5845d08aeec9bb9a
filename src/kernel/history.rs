use serde::Deserialize;
use serde_json::Value;

use super::selection::{Selection, SelectionEpoch};
use super::series::{Point, TimeSeries};
use super::time::{elapsed_seconds, Timestamp};

/// Identifies one history request. Only the most recent ticket issued under
/// the current selection epoch may land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistoryTicket {
    pub epoch: SelectionEpoch,
    pub seq: u64,
    pub selection: Selection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryRow {
    pub timestamp: Timestamp,
    pub freshness: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryOutcome {
    Rows(Vec<HistoryRow>),
    /// Valid response with zero rows.
    Empty,
    /// Not an array, or a row that does not decode.
    Malformed(String),
    /// Transport or HTTP failure. Prior state is kept.
    Failed(String),
}

impl HistoryOutcome {
    /// Sort a raw response body into an outcome. Never partially accepts.
    pub fn classify(body: Value) -> Self {
        let Value::Array(items) = body else {
            return HistoryOutcome::Malformed(format!("expected array, got {}", kind_of(&body)));
        };
        if items.is_empty() {
            return HistoryOutcome::Empty;
        }
        let mut rows = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<HistoryRow>(item) {
                Ok(row) => rows.push(row),
                Err(e) => return HistoryOutcome::Malformed(format!("row {i}: {e}")),
            }
        }
        HistoryOutcome::Rows(rows)
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Freshness series anchored at the first row's timestamp.
pub fn derive_freshness(rows: &[HistoryRow]) -> TimeSeries {
    let Some(first) = rows.first() else {
        return TimeSeries::new();
    };
    let t0 = first.timestamp;
    TimeSeries::from_points(
        rows.iter()
            .map(|r| Point::new(elapsed_seconds(t0, r.timestamp), r.freshness))
            .collect(),
    )
}
