use serde::Serialize;
use std::collections::VecDeque;

use super::event::{StaleKind, TelemetryEvent};
use crate::kernel::event::ConnectionStatus;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    pub accepted: u64,
    pub filtered: u64,
    pub resets: u64,
    pub history: HistoryStats,
    pub summary: SummaryStats,
    pub stale_history: u64,
    pub stale_summary: u64,
    pub disconnects: u64,
    pub reconnect_attempts: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryStats {
    pub applied: u64,
    pub empty: u64,
    pub malformed: u64,
    pub failed: u64,
    pub total_points: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryStats {
    pub applied: u64,
    pub failed: u64,
    pub last_row_count: usize,
}

impl IngestStats {
    /// Share of stream readings that passed the selection filter.
    pub fn acceptance_ratio(&self) -> f64 {
        let seen = self.accepted + self.filtered;
        if seen == 0 {
            0.0
        } else {
            self.accepted as f64 / seen as f64
        }
    }
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> IngestStats {
    let mut snap = IngestStats::default();
    for event in events {
        snap.apply(event);
    }
    snap
}

impl IngestStats {
    /// Fold one event into the counters.
    pub fn apply(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::ReadingAccepted => self.accepted += 1,
            TelemetryEvent::ReadingFiltered => self.filtered += 1,
            TelemetryEvent::SelectionReset => self.resets += 1,
            TelemetryEvent::HistoryApplied { points } => {
                self.history.applied += 1;
                self.history.total_points += *points as u64;
            }
            TelemetryEvent::HistoryEmpty => self.history.empty += 1,
            TelemetryEvent::HistoryMalformed => self.history.malformed += 1,
            TelemetryEvent::HistoryFailed => self.history.failed += 1,
            TelemetryEvent::StaleDiscarded { kind } => match kind {
                StaleKind::History => self.stale_history += 1,
                StaleKind::Summary => self.stale_summary += 1,
            },
            TelemetryEvent::SummaryApplied { rows, .. } => {
                self.summary.applied += 1;
                self.summary.last_row_count = *rows;
            }
            TelemetryEvent::SummaryFailed { .. } => self.summary.failed += 1,
            TelemetryEvent::Connection(status) => match status {
                ConnectionStatus::Disconnected => self.disconnects += 1,
                ConnectionStatus::Reconnecting { .. } => self.reconnect_attempts += 1,
                _ => {}
            },
        }
    }
}
