use serde::{Deserialize, Serialize};

use super::history::{HistoryOutcome, HistoryTicket};
use super::phase::{Metric, Phase};
use super::summary::{PatchSummaryRow, PhaseOverviewRow, SummaryTicket};
use super::time::Timestamp;

/// Name of the stream event carrying a [`Reading`].
pub const SENSOR_UPDATE: &str = "sensor_update";

/// One sensor sample as delivered on the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub patch_id: u32,
    pub phase: Phase,
    pub time: Timestamp,
    pub freshness: f64,
    pub temperature: f64,
    pub humidity: f64,
    #[serde(default)]
    pub soil_moisture: Option<f64>,
    #[serde(default)]
    pub sunlight: Option<f64>,
    #[serde(default)]
    pub airflow: Option<f64>,
    #[serde(default)]
    pub vibration: Option<f64>,
}

impl Reading {
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Freshness => Some(self.freshness),
            Metric::Temperature => Some(self.temperature),
            Metric::Humidity => Some(self.humidity),
            Metric::SoilMoisture => self.soil_moisture,
            Metric::Sunlight => self.sunlight,
            Metric::Airflow => self.airflow,
            Metric::Vibration => self.vibration,
        }
    }
}

/// User intent coming from the selection UI.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetPhase(Phase),
    SetPatch(u32),
    Reset,
    LoadHistory,
    Start,
    Stop,
    RefreshOverview,
    Reconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Disconnected,
    /// Retry budget exhausted. Nothing more arrives until an explicit reconnect.
    Failed,
}

/// Everything that can mutate dashboard state, in delivery order.
#[derive(Debug, Clone)]
pub enum Event {
    Stream(Reading),
    Command(Command),
    HistoryResolved {
        ticket: HistoryTicket,
        outcome: HistoryOutcome,
    },
    SummaryResolved {
        ticket: SummaryTicket,
        result: Result<Vec<PatchSummaryRow>, String>,
    },
    OverviewResolved(Result<Vec<PhaseOverviewRow>, String>),
    Connection(ConnectionStatus),
}
