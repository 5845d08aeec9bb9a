use serde::{Deserialize, Serialize};

use super::phase::Phase;

/// Average freshness of one patch over the trailing day, for one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchSummaryRow {
    pub patch_id: u32,
    pub avg_freshness: f64,
}

/// Issued per poller start. A restart on phase change bumps `generation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SummaryTicket {
    pub phase: Phase,
    pub generation: u64,
}

/// Latest-timestamp aggregate for one phase, from `/api/summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseOverviewRow {
    pub phase: Phase,
    pub avg_freshness: f64,
    pub min_freshness: f64,
    pub max_freshness: f64,
    #[serde(default)]
    pub freshness_std: Option<f64>,
    pub avg_temp: f64,
    pub avg_humidity: f64,
    #[serde(default)]
    pub avg_airflow: Option<f64>,
    /// Patches under 70% freshness.
    pub warning_patches: u32,
}
