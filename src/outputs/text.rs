use std::fmt::Write;

use crate::kernel::event::ConnectionStatus;
use crate::kernel::state::DashboardSnapshot;

pub const PLACEHOLDER: &str = "No data yet.";

fn status_label(status: ConnectionStatus) -> String {
    match status {
        ConnectionStatus::Connecting => "connecting".to_string(),
        ConnectionStatus::Connected => "live".to_string(),
        ConnectionStatus::Reconnecting { attempt } => format!("reconnecting (attempt {attempt})"),
        ConnectionStatus::Disconnected => "disconnected".to_string(),
        ConnectionStatus::Failed => "offline".to_string(),
    }
}

/// PURE FUNCTION: one console frame for a snapshot.
pub fn render(snapshot: &DashboardSnapshot) -> String {
    let mut out = String::new();
    let sel = snapshot.selection;
    let _ = writeln!(
        out,
        "== Patch {} | {} | {} ==",
        sel.patch_id,
        sel.phase,
        status_label(snapshot.connection)
    );

    for (metric, series) in &snapshot.series {
        let _ = write!(out, "{:<14}", format!("{} ({})", metric.label(), metric.unit()));
        match series.last() {
            None => {
                let _ = writeln!(out, " {PLACEHOLDER}");
            }
            Some(last) => {
                let _ = writeln!(out, " {:>8.2} @ {:.2}s  [{} pts]", last.value, last.time, series.len());
            }
        }
    }

    let _ = writeln!(out, "-- Average Freshness per Patch (24h), {} --", sel.phase);
    // Rows from a previous phase are not shown under the new one
    if snapshot.summary.is_empty() || snapshot.summary_phase != Some(sel.phase) {
        let _ = writeln!(out, "  {PLACEHOLDER}");
    } else {
        for row in &snapshot.summary {
            let _ = writeln!(out, "  patch {:>3}  {:>6.2}", row.patch_id, row.avg_freshness);
        }
    }

    if !snapshot.overview.is_empty() {
        let _ = writeln!(out, "-- Phase overview --");
        for row in &snapshot.overview {
            let _ = writeln!(
                out,
                "  {:<9} avg {:>6.2}  min {:>6.2}  max {:>6.2}  warn {}",
                row.phase.as_str(),
                row.avg_freshness,
                row.min_freshness,
                row.max_freshness,
                row.warning_patches
            );
        }
    }

    out
}
