use std::ops::RangeInclusive;
use tracing::{debug, info, warn};

use super::event::{Command, ConnectionStatus, Event, Reading};
use super::history::{derive_freshness, HistoryOutcome, HistoryTicket};
use super::phase::Phase;
use super::scheduler::{Scheduler, SideEffect, SimAction};
use super::selection::{Selection, SelectionController, SelectionError};
use super::state::{DashboardSnapshot, DashboardState, StateDelta};
use super::summary::{PatchSummaryRow, PhaseOverviewRow, SummaryTicket};
use super::telemetry::event::{StaleKind, TelemetryEvent};
use super::telemetry::recorder::TelemetryRecorder;

#[derive(Debug, Clone)]
pub struct ReactorConfig {
    pub initial: Selection,
    pub patch_range: RangeInclusive<u32>,
    /// Per-series point cap. `None` keeps everything for the session.
    pub retention: Option<usize>,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            initial: Selection::default(),
            patch_range: 1..=100,
            retention: None,
        }
    }
}

/// Single owner of dashboard state.
///
/// **KERNEL LAW**: every mutation happens inside one `step` call, one event
/// at a time, in delivery order. The reactor never awaits; anything that
/// needs I/O leaves as a [`SideEffect`] and comes back as an [`Event`].
pub struct Reactor {
    pub state: DashboardState,
    selection: SelectionController,
    pub scheduler: Scheduler,
    pub telemetry: TelemetryRecorder,
    outbox: Vec<SideEffect>,
}

impl Reactor {
    pub fn new(config: ReactorConfig) -> Self {
        Self {
            state: DashboardState::new(config.retention),
            selection: SelectionController::new(config.initial, config.patch_range),
            scheduler: Scheduler::new(),
            telemetry: TelemetryRecorder::new(),
            outbox: Vec::new(),
        }
    }

    /// View mounted: start polling the summary for the initial phase.
    pub fn mount(&mut self) -> Vec<SideEffect> {
        self.restart_poller();
        self.take_effects()
    }

    /// View unmounted: nothing in flight may land afterwards.
    pub fn unmount(&mut self) -> Vec<SideEffect> {
        self.scheduler.drop_pending_history();
        self.scheduler.retire_summary();
        self.outbox.push(SideEffect::CancelHistory);
        self.outbox.push(SideEffect::StopPoller);
        self.take_effects()
    }

    pub fn step(&mut self, event: Event) -> Vec<SideEffect> {
        match event {
            Event::Stream(reading) => {
                self.ingest(&reading);
            }
            Event::Command(cmd) => {
                if let Err(e) = self.apply_command(cmd) {
                    warn!("command rejected: {}", e);
                }
            }
            Event::HistoryResolved { ticket, outcome } => {
                self.resolve_history(ticket, outcome);
            }
            Event::SummaryResolved { ticket, result } => {
                self.resolve_summary(ticket, result);
            }
            Event::OverviewResolved(result) => self.resolve_overview(result),
            Event::Connection(status) => self.connection_changed(status),
        }
        self.take_effects()
    }

    pub fn take_effects(&mut self) -> Vec<SideEffect> {
        std::mem::take(&mut self.outbox)
    }

    /// Read-only view of the filter. Mutation goes through `set_phase`/`set_patch`.
    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn current(&self) -> Selection {
        self.selection.current()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.state.snapshot(self.selection.current())
    }

    pub fn apply_command(&mut self, cmd: Command) -> Result<(), SelectionError> {
        match cmd {
            Command::SetPhase(phase) => {
                self.set_phase(phase);
            }
            Command::SetPatch(id) => {
                self.set_patch(id)?;
            }
            Command::Reset => self.reset(),
            Command::LoadHistory => {
                self.load();
            }
            Command::Start => {
                let phase = self.selection.current().phase;
                self.outbox.push(SideEffect::Simulation { phase, action: SimAction::Start });
                self.reset();
            }
            Command::Stop => {
                let phase = self.selection.current().phase;
                self.outbox.push(SideEffect::Simulation { phase, action: SimAction::Stop });
            }
            Command::RefreshOverview => self.outbox.push(SideEffect::FetchOverview),
            Command::Reconnect => self.outbox.push(SideEffect::Reconnect),
        }
        Ok(())
    }

    /// Accept the reading if it matches the selection. Returns whether it did.
    pub fn ingest(&mut self, reading: &Reading) -> bool {
        if !self.selection.admits(reading.patch_id, reading.phase) {
            self.telemetry.record(TelemetryEvent::ReadingFiltered);
            return false;
        }
        self.state.reduce(StateDelta::ReadingAccepted(reading.clone()));
        self.telemetry.record(TelemetryEvent::ReadingAccepted);
        true
    }

    /// Clear anchor and series. Selection stays as is.
    pub fn reset(&mut self) {
        self.state.reduce(StateDelta::Reset);
        self.telemetry.record(TelemetryEvent::SelectionReset);
    }

    pub fn set_phase(&mut self, phase: Phase) -> Selection {
        let selection = self.selection.set_phase(phase);
        self.after_selection_change();
        self.restart_poller();
        selection
    }

    /// Like [`Reactor::set_phase`] but from user text. Unknown names are a no-op.
    pub fn set_phase_str(&mut self, phase: &str) -> Result<Selection, SelectionError> {
        let phase: Phase = phase.parse()?;
        Ok(self.set_phase(phase))
    }

    pub fn set_patch(&mut self, patch_id: u32) -> Result<Selection, SelectionError> {
        let selection = self.selection.set_patch(patch_id)?;
        self.after_selection_change();
        Ok(selection)
    }

    fn after_selection_change(&mut self) {
        // CRITICAL: reset inside the same step, before any later reading.
        self.reset();
        if self.scheduler.pending_history().is_some() {
            self.scheduler.drop_pending_history();
            self.outbox.push(SideEffect::CancelHistory);
        }
    }

    fn restart_poller(&mut self) {
        let ticket = self.scheduler.issue_summary(self.selection.current().phase);
        self.outbox.push(SideEffect::RestartPoller(ticket));
    }

    /// Ask for history of the current selection.
    pub fn load(&mut self) -> HistoryTicket {
        let ticket = self
            .scheduler
            .issue_history(self.selection.epoch(), self.selection.current());
        self.outbox.push(SideEffect::FetchHistory(ticket));
        ticket
    }

    /// Apply a history response. Returns false when it was stale or failed.
    pub fn resolve_history(&mut self, ticket: HistoryTicket, outcome: HistoryOutcome) -> bool {
        if !self.scheduler.settle_history(&ticket, self.selection.epoch()) {
            debug!(seq = ticket.seq, epoch = ticket.epoch.0, "discarding stale history response");
            self.telemetry.record(TelemetryEvent::StaleDiscarded { kind: StaleKind::History });
            return false;
        }

        match outcome {
            HistoryOutcome::Rows(rows) => {
                let series = derive_freshness(&rows);
                info!(patch = ticket.selection.patch_id, phase = %ticket.selection.phase, points = series.len(), "history loaded");
                self.telemetry.record(TelemetryEvent::HistoryApplied { points: series.len() });
                self.state.reduce(StateDelta::HistoryReplaced(series));
                true
            }
            HistoryOutcome::Empty => {
                info!(patch = ticket.selection.patch_id, phase = %ticket.selection.phase, "history empty");
                self.telemetry.record(TelemetryEvent::HistoryEmpty);
                self.reset();
                true
            }
            HistoryOutcome::Malformed(reason) => {
                warn!("malformed history response: {}", reason);
                self.telemetry.record(TelemetryEvent::HistoryMalformed);
                self.reset();
                true
            }
            HistoryOutcome::Failed(reason) => {
                warn!("history fetch failed: {}", reason);
                self.telemetry.record(TelemetryEvent::HistoryFailed);
                false
            }
        }
    }

    /// Replace the summary table on success; keep the old one on failure.
    pub fn resolve_summary(&mut self, ticket: SummaryTicket, result: Result<Vec<PatchSummaryRow>, String>) -> bool {
        if !self.scheduler.accepts_summary(&ticket) {
            debug!(phase = %ticket.phase, generation = ticket.generation, "discarding stale summary");
            self.telemetry.record(TelemetryEvent::StaleDiscarded { kind: StaleKind::Summary });
            return false;
        }
        match result {
            Ok(rows) => {
                self.telemetry.record(TelemetryEvent::SummaryApplied { phase: ticket.phase, rows: rows.len() });
                self.state.reduce(StateDelta::SummaryReplaced { phase: ticket.phase, rows });
                true
            }
            Err(reason) => {
                warn!(phase = %ticket.phase, "summary poll failed, keeping previous table: {}", reason);
                self.telemetry.record(TelemetryEvent::SummaryFailed { phase: ticket.phase });
                false
            }
        }
    }

    fn resolve_overview(&mut self, result: Result<Vec<PhaseOverviewRow>, String>) {
        match result {
            Ok(rows) => self.state.reduce(StateDelta::OverviewReplaced(rows)),
            Err(reason) => warn!("overview fetch failed: {}", reason),
        }
    }

    fn connection_changed(&mut self, status: ConnectionStatus) {
        if status == self.state.connection() {
            return;
        }
        // Live series survive disconnects untouched
        self.telemetry.record(TelemetryEvent::Connection(status));
        self.state.reduce(StateDelta::ConnectionChanged(status));
    }
}
