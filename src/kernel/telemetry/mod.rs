//! Ingest telemetry.
//!
//! # INVARIANT
//! Telemetry is a READ-ONLY side-effect layer. Nothing in the reactor's
//! decision path reads it back; it exists for observability and tests.

pub mod event;
pub mod metrics;
pub mod recorder;
