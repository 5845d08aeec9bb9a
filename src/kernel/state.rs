use tracing::debug;

use super::event::{ConnectionStatus, Reading};
use super::phase::{Metric, Phase};
use super::selection::Selection;
use super::series::{Point, SeriesSet, TimeSeries};
use super::summary::{PatchSummaryRow, PhaseOverviewRow};
use super::time::{TimeAnchor, Timestamp};

/// Strict state delta. This is the ONLY way dashboard state mutates.
#[derive(Debug, Clone)]
pub enum StateDelta {
    /// Clear anchor and every series.
    Reset,
    /// Append one already-filtered reading.
    ReadingAccepted(Reading),
    /// Reset, then install a full freshness series in one step.
    HistoryReplaced(TimeSeries),
    SummaryReplaced { phase: Phase, rows: Vec<PatchSummaryRow> },
    OverviewReplaced(Vec<PhaseOverviewRow>),
    ConnectionChanged(ConnectionStatus),
}

#[derive(Debug, Clone)]
pub struct DashboardState {
    series: SeriesSet,
    anchor: TimeAnchor,
    summary: Vec<PatchSummaryRow>,
    summary_phase: Option<Phase>,
    overview: Vec<PhaseOverviewRow>,
    connection: ConnectionStatus,
    retention: Option<usize>,
    // Monotonic version, bumped on every reduction
    pub version: u64,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new(None)
    }
}

impl DashboardState {
    pub fn new(retention: Option<usize>) -> Self {
        Self {
            series: SeriesSet::new(),
            anchor: TimeAnchor::new(),
            summary: Vec::new(),
            summary_phase: None,
            overview: Vec::new(),
            connection: ConnectionStatus::Connecting,
            retention,
            version: 0,
        }
    }

    /// Pure reduction: State + Delta -> Mutated State
    pub fn reduce(&mut self, delta: StateDelta) {
        self.version += 1;

        match delta {
            StateDelta::Reset => self.clear_live(),
            StateDelta::ReadingAccepted(reading) => {
                let elapsed = self.anchor.place(reading.time);
                let metrics = Metric::CORE
                    .into_iter()
                    .chain(reading.phase.specific_metrics().iter().copied());
                for metric in metrics {
                    match reading.value(metric) {
                        Some(value) => self.series.get_mut(metric).push(Point::new(elapsed, value), self.retention),
                        None => debug!(patch = reading.patch_id, phase = %reading.phase, %metric, "reading lacks metric, not appended"),
                    }
                }
            }
            StateDelta::HistoryReplaced(freshness) => {
                self.clear_live();
                self.series.replace(Metric::Freshness, freshness);
            }
            StateDelta::SummaryReplaced { phase, rows } => {
                self.summary = rows;
                self.summary_phase = Some(phase);
            }
            StateDelta::OverviewReplaced(rows) => {
                self.overview = rows;
            }
            StateDelta::ConnectionChanged(status) => {
                self.connection = status;
            }
        }
    }

    fn clear_live(&mut self) {
        self.series.clear();
        self.anchor.clear();
    }

    pub fn series(&self, metric: Metric) -> &TimeSeries {
        self.series.get(metric)
    }

    pub fn all_series_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn anchor(&self) -> Option<Timestamp> {
        self.anchor.get()
    }

    pub fn summary(&self) -> &[PatchSummaryRow] {
        &self.summary
    }

    pub fn summary_phase(&self) -> Option<Phase> {
        self.summary_phase
    }

    pub fn overview(&self) -> &[PhaseOverviewRow] {
        &self.overview
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn snapshot(&self, selection: Selection) -> DashboardSnapshot {
        DashboardSnapshot {
            version: self.version,
            selection,
            anchor: self.anchor.get(),
            series: selection
                .phase
                .rendered_metrics()
                .map(|m| (m, self.series.get(m).clone()))
                .collect(),
            summary: self.summary.clone(),
            summary_phase: self.summary_phase,
            overview: self.overview.clone(),
            connection: self.connection,
        }
    }
}

/// Immutable view handed to renderers. Series share storage with the state
/// they were taken from and never change afterwards.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub version: u64,
    pub selection: Selection,
    pub anchor: Option<Timestamp>,
    /// Rendered metrics for `selection.phase`, in render order.
    pub series: Vec<(Metric, TimeSeries)>,
    pub summary: Vec<PatchSummaryRow>,
    pub summary_phase: Option<Phase>,
    pub overview: Vec<PhaseOverviewRow>,
    pub connection: ConnectionStatus,
}

impl DashboardSnapshot {
    pub fn empty(selection: Selection) -> Self {
        DashboardState::default().snapshot(selection)
    }

    pub fn series(&self, metric: Metric) -> Option<&TimeSeries> {
        self.series.iter().find(|(m, _)| *m == metric).map(|(_, s)| s)
    }
}
