use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::api::Backend;
use crate::kernel::event::Event;
use crate::kernel::summary::SummaryTicket;

/// Fixed-cadence fetch of the per-patch summary for one phase.
///
/// The first fetch fires immediately. Results, failures included, go back to
/// the reactor tagged with the ticket; the reactor decides what to keep.
pub struct SummaryPoller {
    ticket: SummaryTicket,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SummaryPoller {
    pub fn spawn<B: Backend>(
        backend: B,
        ticket: SummaryTicket,
        period: Duration,
        tx: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let token = CancellationToken::new();
        let child = token.clone();
        info!(phase = %ticket.phase, generation = ticket.generation, period_ms = period.as_millis() as u64, "summary poller started");

        let handle = tokio::spawn(async move {
            let mut cadence = interval(period);
            cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = child.cancelled() => break,
                    _ = cadence.tick() => {}
                }

                let result = tokio::select! {
                    biased;
                    _ = child.cancelled() => break,
                    r = backend.patch_summary(ticket.phase) => r,
                };

                let result = result.map_err(|e| e.to_string());
                if tx.send(Event::SummaryResolved { ticket, result }).is_err() {
                    debug!("summary receiver gone, poller exiting");
                    break;
                }
            }
        });

        Self {
            ticket,
            token,
            handle: Some(handle),
        }
    }

    pub fn ticket(&self) -> SummaryTicket {
        self.ticket
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Signal the task to stop without waiting for it.
    pub fn cancel(&mut self) {
        self.token.cancel();
    }

    /// Stop and wait until the task has fully exited.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!(phase = %self.ticket.phase, "summary poller stopped");
    }
}

impl Drop for SummaryPoller {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
