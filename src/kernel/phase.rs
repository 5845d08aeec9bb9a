use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::selection::SelectionError;

/// Supply-chain stage a reading was taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Farm,
    Depot,
    Transport,
    Market,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Farm, Phase::Depot, Phase::Transport, Phase::Market];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Farm => "farm",
            Phase::Depot => "depot",
            Phase::Transport => "transport",
            Phase::Market => "market",
        }
    }

    /// Metric table: which environmental series a phase carries beyond the core three.
    pub const fn specific_metrics(self) -> &'static [Metric] {
        match self {
            Phase::Farm => &[Metric::SoilMoisture, Metric::Sunlight],
            Phase::Depot => &[Metric::Airflow],
            Phase::Transport => &[Metric::Vibration],
            Phase::Market => &[Metric::Sunlight],
        }
    }

    /// Core metrics followed by the phase-specific ones, in render order.
    pub fn rendered_metrics(self) -> impl Iterator<Item = Metric> {
        Metric::CORE.into_iter().chain(self.specific_metrics().iter().copied())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = SelectionError;

    // Exact lowercase names only. "Farm" or " farm" are rejected, not coerced.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| SelectionError::UnknownPhase(s.to_string()))
    }
}

/// One chartable quantity carried by a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Freshness,
    Temperature,
    Humidity,
    SoilMoisture,
    Sunlight,
    Airflow,
    Vibration,
}

impl Metric {
    pub const COUNT: usize = 7;

    pub const ALL: [Metric; Metric::COUNT] = [
        Metric::Freshness,
        Metric::Temperature,
        Metric::Humidity,
        Metric::SoilMoisture,
        Metric::Sunlight,
        Metric::Airflow,
        Metric::Vibration,
    ];

    /// Always present on every reading regardless of phase.
    pub const CORE: [Metric; 3] = [Metric::Freshness, Metric::Temperature, Metric::Humidity];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn key(&self) -> &'static str {
        match self {
            Metric::Freshness => "freshness",
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::SoilMoisture => "soil_moisture",
            Metric::Sunlight => "sunlight",
            Metric::Airflow => "airflow",
            Metric::Vibration => "vibration",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Freshness => "Freshness",
            Metric::Temperature => "Temperature",
            Metric::Humidity => "Humidity",
            Metric::SoilMoisture => "Soil Moisture",
            Metric::Sunlight => "Sunlight",
            Metric::Airflow => "Airflow",
            Metric::Vibration => "Vibration",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Freshness => "%",
            Metric::Temperature => "°C",
            Metric::Humidity => "%",
            Metric::SoilMoisture => "%",
            Metric::Sunlight => "lux",
            Metric::Airflow => "m/s",
            Metric::Vibration => "units",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
