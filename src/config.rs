use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::kernel::phase::Phase;
use crate::kernel::reactor::ReactorConfig;
use crate::kernel::selection::Selection;
use crate::stream::ReconnectPolicy;

pub const DEFAULT_API_BASE: &str = "http://localhost:5000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}='{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ViewConfig {
    pub api_base: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub patch_range: RangeInclusive<u32>,
    pub initial: Selection,
    pub retention: Option<usize>,
    pub reconnect: ReconnectPolicy,
    /// NDJSON feed consumed by the console binary.
    pub feed_path: Option<PathBuf>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            poll_interval: Duration::from_millis(5000),
            request_timeout: Duration::from_millis(10_000),
            patch_range: 1..=100,
            initial: Selection::default(),
            retention: None,
            reconnect: ReconnectPolicy::default(),
            feed_path: None,
        }
    }
}

impl ViewConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` provides.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(base) = lookup("FRESHVIEW_API_BASE") {
            cfg.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(ms) = parse::<u64>(&lookup, "FRESHVIEW_POLL_MS")? {
            if ms == 0 {
                return Err(invalid("FRESHVIEW_POLL_MS", "0", "must be positive"));
            }
            cfg.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&lookup, "FRESHVIEW_TIMEOUT_MS")? {
            cfg.request_timeout = Duration::from_millis(ms);
        }
        if let Some(max) = parse::<u32>(&lookup, "FRESHVIEW_MAX_PATCH")? {
            if max == 0 {
                return Err(invalid("FRESHVIEW_MAX_PATCH", "0", "must be at least 1"));
            }
            cfg.patch_range = 1..=max;
        }
        if let Some(cap) = parse::<usize>(&lookup, "FRESHVIEW_RETENTION")? {
            cfg.retention = (cap > 0).then_some(cap);
        }
        if let Some(n) = parse::<u32>(&lookup, "FRESHVIEW_RECONNECT_ATTEMPTS")? {
            cfg.reconnect.max_attempts = n;
        }
        if let Some(ms) = parse::<u64>(&lookup, "FRESHVIEW_RECONNECT_DELAY_MS")? {
            cfg.reconnect.delay = Duration::from_millis(ms);
        }
        if let Some(phase) = lookup("FRESHVIEW_PHASE") {
            cfg.initial.phase = phase
                .parse::<Phase>()
                .map_err(|e| invalid("FRESHVIEW_PHASE", &phase, &e.to_string()))?;
        }
        if let Some(patch) = parse::<u32>(&lookup, "FRESHVIEW_PATCH")? {
            cfg.initial.patch_id = patch;
        }
        if !cfg.patch_range.contains(&cfg.initial.patch_id) {
            return Err(invalid(
                "FRESHVIEW_PATCH",
                &cfg.initial.patch_id.to_string(),
                &format!("outside 1..={}", cfg.patch_range.end()),
            ));
        }
        cfg.feed_path = lookup("FRESHVIEW_FEED").map(PathBuf::from);

        Ok(cfg)
    }

    pub fn reactor(&self) -> ReactorConfig {
        ReactorConfig {
            initial: self.initial,
            patch_range: self.patch_range.clone(),
            retention: self.retention,
        }
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(key, &raw, &e.to_string())),
    }
}
