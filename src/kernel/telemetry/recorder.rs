use std::collections::VecDeque;

use super::event::TelemetryEvent;
use super::metrics::{compute_snapshot, IngestStats};

/// Ring capacity. `snapshot` covers at most this many recent events.
pub const MAX_EVENTS: usize = 10_000;

#[derive(Debug)]
pub struct TelemetryRecorder {
    buffer: VecDeque<TelemetryEvent>,
    // Session-long counters, never evicted
    totals: IngestStats,
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(MAX_EVENTS),
            totals: IngestStats::default(),
        }
    }

    pub fn record(&mut self, event: TelemetryEvent) {
        if self.buffer.len() >= MAX_EVENTS {
            self.buffer.pop_front();
        }
        self.totals.apply(&event);
        self.buffer.push_back(event);
    }

    /// Stats over the recent window only.
    pub fn snapshot(&self) -> IngestStats {
        compute_snapshot(&self.buffer)
    }

    /// Stats over every event recorded since construction.
    pub fn totals(&self) -> &IngestStats {
        &self.totals
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drops the recent window. Totals are kept.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
