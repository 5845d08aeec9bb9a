use serde::{Deserialize, Serialize};

use crate::kernel::event::ConnectionStatus;
use crate::kernel::phase::Phase;

// Allowed: IDs, counts, phases, statuses. Sensor values stay out.

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    ReadingAccepted,
    ReadingFiltered,
    SelectionReset,
    HistoryApplied { points: usize },
    HistoryEmpty,
    HistoryMalformed,
    HistoryFailed,
    StaleDiscarded { kind: StaleKind },
    SummaryApplied { phase: Phase, rows: usize },
    SummaryFailed { phase: Phase },
    Connection(ConnectionStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaleKind {
    History,
    Summary,
}
