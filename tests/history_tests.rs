mod common;

use common::reading;
use freshview::kernel::event::{Command, Event};
use freshview::kernel::history::HistoryOutcome;
use freshview::kernel::phase::{Metric, Phase};
use freshview::kernel::reactor::{Reactor, ReactorConfig};
use freshview::kernel::scheduler::SideEffect;
use freshview::kernel::series::Point;
use serde_json::json;

fn reactor() -> Reactor {
    Reactor::new(ReactorConfig::default())
}

#[test]
fn test_history_replaces_freshness_series() {
    let mut reactor = reactor();
    reactor.ingest(&reading(1, Phase::Farm, 100, 99.0));

    // 1. Request
    let ticket = reactor.load();
    assert_eq!(reactor.take_effects(), vec![SideEffect::FetchHistory(ticket)]);
    assert_eq!(reactor.state.series(Metric::Freshness).len(), 1, "Load does not reset until the response lands");

    // 2. Response
    let body = json!([
        {"timestamp": 1000, "freshness": 80},
        {"timestamp": 3500, "freshness": 78}
    ]);
    assert!(reactor.resolve_history(ticket, HistoryOutcome::classify(body)));
    assert_eq!(
        reactor.state.series(Metric::Freshness).points(),
        &[Point::new(0.0, 80.0), Point::new(2.5, 78.0)]
    );

    // 3. Only freshness is populated, live anchor stays unset
    assert!(reactor.state.series(Metric::Temperature).is_empty());
    assert!(reactor.state.series(Metric::SoilMoisture).is_empty());
    assert_eq!(reactor.state.anchor(), None);
}

#[test]
fn test_empty_history_equals_reset() {
    let mut loaded = reactor();
    loaded.ingest(&reading(1, Phase::Farm, 100, 99.0));
    let ticket = loaded.load();
    assert!(loaded.resolve_history(ticket, HistoryOutcome::classify(json!([]))));

    let mut reset = reactor();
    reset.ingest(&reading(1, Phase::Farm, 100, 99.0));
    reset.reset();

    assert!(loaded.state.all_series_empty());
    assert_eq!(loaded.state.anchor(), reset.state.anchor());
    assert_eq!(loaded.snapshot().series, reset.snapshot().series);
}

#[test]
fn test_malformed_history_resets() {
    let mut reactor = reactor();
    reactor.ingest(&reading(1, Phase::Farm, 100, 99.0));
    let ticket = reactor.load();
    assert!(reactor.resolve_history(ticket, HistoryOutcome::classify(json!({"error": "boom"}))));
    assert!(reactor.state.all_series_empty());

    let stats = reactor.telemetry.snapshot();
    assert_eq!(stats.history.malformed, 1);
    assert_eq!(stats.history.empty, 0, "Malformed and empty responses are counted apart");
}

#[test]
fn test_history_failure_keeps_prior_state() {
    let mut reactor = reactor();
    reactor.ingest(&reading(1, Phase::Farm, 100, 99.0));
    let ticket = reactor.load();
    assert!(!reactor.resolve_history(ticket, HistoryOutcome::Failed("connection refused".into())));
    assert_eq!(reactor.state.series(Metric::Freshness).len(), 1);
    assert_eq!(reactor.telemetry.snapshot().history.failed, 1);
}

#[test]
fn test_stale_history_after_selection_change() {
    let mut reactor = reactor();
    let ticket = reactor.load();
    reactor.take_effects();

    // Selection moves while the fetch is in flight
    let effects = reactor.step(Event::Command(Command::SetPatch(2)));
    assert!(effects.contains(&SideEffect::CancelHistory));
    reactor.ingest(&reading(2, Phase::Farm, 5_000, 60.0));

    let late = HistoryOutcome::classify(json!([{"timestamp": 1000, "freshness": 80}]));
    assert!(!reactor.resolve_history(ticket, late), "Response for patch 1 must not land on patch 2");
    assert_eq!(reactor.state.series(Metric::Freshness).points(), &[Point::new(0.0, 60.0)]);
    assert_eq!(reactor.telemetry.snapshot().stale_history, 1);
}

#[test]
fn test_newer_history_request_supersedes_older() {
    let mut reactor = reactor();
    let first = reactor.load();
    let second = reactor.load();

    let rows = json!([{"timestamp": 0, "freshness": 50}]);
    assert!(!reactor.resolve_history(first, HistoryOutcome::classify(rows.clone())));
    assert!(reactor.resolve_history(second, HistoryOutcome::classify(rows.clone())));
    // Each ticket lands at most once
    assert!(!reactor.resolve_history(second, HistoryOutcome::classify(rows)));
}
