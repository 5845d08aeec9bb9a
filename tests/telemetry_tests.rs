mod common;

use common::{reading, row};
use freshview::kernel::event::{ConnectionStatus, Event};
use freshview::kernel::phase::Phase;
use freshview::kernel::reactor::{Reactor, ReactorConfig};
use freshview::kernel::summary::SummaryTicket;
use freshview::kernel::telemetry::recorder::MAX_EVENTS;

#[tokio::test]
async fn test_ingest_telemetry() {
    let mut reactor = Reactor::new(ReactorConfig::default());

    for i in 0..6 {
        reactor.step(Event::Stream(reading(1, Phase::Farm, i * 1_000, 90.0)));
    }
    for i in 0..2 {
        reactor.step(Event::Stream(reading(2, Phase::Farm, i * 1_000, 90.0)));
    }
    reactor.reset();

    let snapshot = reactor.telemetry.snapshot();
    assert_eq!(snapshot.accepted, 6);
    assert_eq!(snapshot.filtered, 2);
    assert_eq!(snapshot.resets, 1);
    assert_eq!(snapshot.acceptance_ratio(), 0.75);
}

#[tokio::test]
async fn test_connection_telemetry_ignores_repeats() {
    let mut reactor = Reactor::new(ReactorConfig::default());
    let before = reactor.state.version;

    reactor.step(Event::Connection(ConnectionStatus::Connected));
    reactor.step(Event::Connection(ConnectionStatus::Connected));
    reactor.step(Event::Connection(ConnectionStatus::Disconnected));
    reactor.step(Event::Connection(ConnectionStatus::Reconnecting { attempt: 1 }));
    reactor.step(Event::Connection(ConnectionStatus::Reconnecting { attempt: 2 }));
    reactor.step(Event::Connection(ConnectionStatus::Connected));

    assert_eq!(reactor.state.version - before, 5, "Repeated status must not bump the version");
    let snapshot = reactor.telemetry.snapshot();
    assert_eq!(snapshot.disconnects, 1);
    assert_eq!(snapshot.reconnect_attempts, 2);
}

#[tokio::test]
async fn test_stale_summary_counted() {
    let mut reactor = Reactor::new(ReactorConfig::default());
    reactor.mount();
    let old = reactor.scheduler.active_summary().unwrap();
    reactor.set_phase(Phase::Depot);

    assert!(!reactor.resolve_summary(old, Ok(vec![row(1, 50.0)])));
    let bogus = SummaryTicket { phase: Phase::Depot, generation: 999 };
    assert!(!reactor.resolve_summary(bogus, Ok(vec![row(1, 50.0)])));
    assert!(reactor.state.summary().is_empty());

    let current = reactor.scheduler.active_summary().unwrap();
    assert!(reactor.resolve_summary(current, Ok(vec![row(1, 50.0), row(2, 70.0)])));

    let snapshot = reactor.telemetry.snapshot();
    assert_eq!(snapshot.stale_summary, 2);
    assert_eq!(snapshot.summary.applied, 1);
    assert_eq!(snapshot.summary.last_row_count, 2);
}

#[tokio::test]
async fn test_session_totals_outlive_ring_window() {
    let mut reactor = Reactor::new(ReactorConfig::default());
    let overflow = MAX_EVENTS as i64 + 250;

    for i in 0..overflow {
        reactor.ingest(&reading(1, Phase::Market, i, 80.0));
    }
    reactor.ingest(&reading(9, Phase::Market, 0, 80.0));

    let recent = reactor.telemetry.snapshot();
    let totals = reactor.telemetry.totals();
    assert_eq!(recent.accepted + recent.filtered, MAX_EVENTS as u64, "Recent window is capped");
    assert_eq!(totals.accepted, overflow as u64);
    assert_eq!(totals.filtered, 1);
}
