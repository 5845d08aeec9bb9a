#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use freshview::kernel::event::Reading;
use freshview::kernel::phase::Phase;
use freshview::kernel::scheduler::SimAction;
use freshview::kernel::selection::Selection;
use freshview::kernel::summary::{PatchSummaryRow, PhaseOverviewRow};
use freshview::kernel::time::Timestamp;
use freshview::services::api::{ApiError, Backend};

pub fn reading(patch_id: u32, phase: Phase, millis: i64, freshness: f64) -> Reading {
    Reading {
        patch_id,
        phase,
        time: Timestamp::from_millis(millis),
        freshness,
        temperature: 21.0,
        humidity: 60.0,
        soil_moisture: (phase == Phase::Farm).then_some(35.0),
        sunlight: matches!(phase, Phase::Farm | Phase::Market).then_some(500.0),
        airflow: (phase == Phase::Depot).then_some(4.0),
        vibration: (phase == Phase::Transport).then_some(0.8),
    }
}

pub fn wire(reading: &Reading) -> Value {
    serde_json::to_value(reading).unwrap()
}

pub fn row(patch_id: u32, avg_freshness: f64) -> PatchSummaryRow {
    PatchSummaryRow { patch_id, avg_freshness }
}

#[derive(Default)]
struct Script {
    history: HashMap<(u32, Phase), Value>,
    history_delay: Duration,
    history_fails: bool,
    summaries: HashMap<Phase, Vec<Result<Vec<PatchSummaryRow>, String>>>,
    overview: Vec<PhaseOverviewRow>,
    calls: Vec<String>,
}

/// Scripted in-memory backend. Summary scripts are consumed in order; the
/// last entry repeats.
#[derive(Clone, Default)]
pub struct MockBackend {
    script: Arc<Mutex<Script>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(&self, selection: Selection, body: Value) {
        self.script.lock().unwrap().history.insert((selection.patch_id, selection.phase), body);
    }

    pub fn delay_history(&self, delay: Duration) {
        self.script.lock().unwrap().history_delay = delay;
    }

    pub fn fail_history(&self, fails: bool) {
        self.script.lock().unwrap().history_fails = fails;
    }

    pub fn with_summaries(&self, phase: Phase, results: Vec<Result<Vec<PatchSummaryRow>, String>>) {
        self.script.lock().unwrap().summaries.insert(phase, results);
    }

    pub fn with_overview(&self, rows: Vec<PhaseOverviewRow>) {
        self.script.lock().unwrap().overview = rows;
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

fn unavailable() -> ApiError {
    ApiError::Status { url: "mock://backend".to_string(), status: 503 }
}

impl Backend for MockBackend {
    async fn history(&self, selection: Selection) -> Result<Value, ApiError> {
        let (delay, fails, body) = {
            let mut s = self.script.lock().unwrap();
            s.calls.push(format!("history {} {}", selection.patch_id, selection.phase));
            let body = s.history.get(&(selection.patch_id, selection.phase)).cloned();
            (s.history_delay, s.history_fails, body)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fails {
            return Err(unavailable());
        }
        Ok(body.unwrap_or_else(|| json!([])))
    }

    async fn patch_summary(&self, phase: Phase) -> Result<Vec<PatchSummaryRow>, ApiError> {
        let mut s = self.script.lock().unwrap();
        s.calls.push(format!("summary {phase}"));
        let queue = s.summaries.entry(phase).or_default();
        let next = if queue.len() > 1 {
            queue.remove(0)
        } else {
            queue.first().cloned().unwrap_or_else(|| Ok(Vec::new()))
        };
        next.map_err(|_| unavailable())
    }

    async fn phase_overview(&self) -> Result<Vec<PhaseOverviewRow>, ApiError> {
        let mut s = self.script.lock().unwrap();
        s.calls.push("overview".to_string());
        Ok(s.overview.clone())
    }

    async fn simulation(&self, phase: Phase, action: SimAction) -> Result<Value, ApiError> {
        let mut s = self.script.lock().unwrap();
        s.calls.push(format!("{} {phase}", action.path()));
        Ok(json!({"status": "ok"}))
    }
}
