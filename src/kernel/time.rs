use chrono::{DateTime, NaiveDateTime};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Absolute wall-clock instant, epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub millis: i64,
}

impl Timestamp {
    pub fn from_millis(millis: i64) -> Self {
        Timestamp { millis }
    }

    /// Accepts RFC 3339, or a naive ISO-8601 datetime which is read as UTC.
    pub fn parse(s: &str) -> Option<Self> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(Self::from_millis(dt.timestamp_millis()));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| Self::from_millis(naive.and_utc().timestamp_millis()))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.millis)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimestampVisitor;

        impl<'de> Visitor<'de> for TimestampVisitor {
            type Value = Timestamp;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("epoch milliseconds or an ISO-8601 datetime string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Timestamp, E> {
                Ok(Timestamp::from_millis(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Timestamp, E> {
                i64::try_from(v)
                    .map(Timestamp::from_millis)
                    .map_err(|_| E::custom("timestamp out of range"))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Timestamp, E> {
                if v.is_finite() {
                    Ok(Timestamp::from_millis(v.trunc() as i64))
                } else {
                    Err(E::custom("timestamp is not finite"))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Timestamp, E> {
                Timestamp::parse(v).ok_or_else(|| E::custom(format!("unparseable datetime '{v}'")))
            }
        }

        deserializer.deserialize_any(TimestampVisitor)
    }
}

/// Seconds between `anchor` and `at`, rounded to two decimals.
///
/// INVARIANT: the axis never goes negative. A sample older than the anchor
/// lands on 0.0.
pub fn elapsed_seconds(anchor: Timestamp, at: Timestamp) -> f64 {
    let delta_ms = at.millis.saturating_sub(anchor.millis).max(0);
    // ms / 1000 rounded to 2dp == ms / 10 rounded, then / 100
    (delta_ms as f64 / 10.0).round() / 100.0
}

/// First-sample anchor for the live session. Set at most once between resets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeAnchor {
    origin: Option<Timestamp>,
}

impl TimeAnchor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Timestamp> {
        self.origin
    }

    pub fn is_set(&self) -> bool {
        self.origin.is_some()
    }

    /// Establish the anchor if unset, then place `at` on the elapsed axis.
    pub fn place(&mut self, at: Timestamp) -> f64 {
        let origin = *self.origin.get_or_insert(at);
        elapsed_seconds(origin, at)
    }

    pub fn clear(&mut self) {
        self.origin = None;
    }
}
