use super::history::HistoryTicket;
use super::phase::Phase;
use super::selection::{Selection, SelectionEpoch};
use super::summary::SummaryTicket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimAction {
    Start,
    Stop,
}

impl SimAction {
    pub fn path(&self) -> &'static str {
        match self {
            SimAction::Start => "start",
            SimAction::Stop => "stop",
        }
    }
}

/// Work the reactor asks the driver to perform. Results come back as events.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    FetchHistory(HistoryTicket),
    /// Abort any in-flight history fetch. Its result would be stale anyway.
    CancelHistory,
    /// Stop the running poller (if any) and start one for this ticket.
    RestartPoller(SummaryTicket),
    StopPoller,
    Simulation { phase: Phase, action: SimAction },
    FetchOverview,
    /// Tear down the stream and subscribe again from scratch.
    Reconnect,
}

/// Issues request tickets and remembers which ones are still wanted.
#[derive(Debug, Default)]
pub struct Scheduler {
    history_seq: u64,
    pending_history: Option<HistoryTicket>,
    summary_generation: u64,
    active_summary: Option<SummaryTicket>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A newer request supersedes any pending one.
    pub fn issue_history(&mut self, epoch: SelectionEpoch, selection: Selection) -> HistoryTicket {
        self.history_seq += 1;
        let ticket = HistoryTicket { epoch, seq: self.history_seq, selection };
        self.pending_history = Some(ticket);
        ticket
    }

    pub fn pending_history(&self) -> Option<HistoryTicket> {
        self.pending_history
    }

    pub fn drop_pending_history(&mut self) {
        self.pending_history = None;
    }

    /// STALE REJECTION: the ticket must be the pending one AND still belong
    /// to the live selection epoch. Consumes the pending slot on success.
    pub fn settle_history(&mut self, ticket: &HistoryTicket, current: SelectionEpoch) -> bool {
        let wanted = self.pending_history.as_ref() == Some(ticket) && ticket.epoch == current;
        if wanted {
            self.pending_history = None;
        }
        wanted
    }

    pub fn issue_summary(&mut self, phase: Phase) -> SummaryTicket {
        self.summary_generation += 1;
        let ticket = SummaryTicket { phase, generation: self.summary_generation };
        self.active_summary = Some(ticket);
        ticket
    }

    pub fn active_summary(&self) -> Option<SummaryTicket> {
        self.active_summary
    }

    pub fn retire_summary(&mut self) {
        self.active_summary = None;
    }

    pub fn accepts_summary(&self, ticket: &SummaryTicket) -> bool {
        self.active_summary.as_ref() == Some(ticket)
    }
}
