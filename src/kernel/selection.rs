use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use thiserror::Error;
use tracing::info;

use super::phase::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub patch_id: u32,
    pub phase: Phase,
}

impl Selection {
    pub fn new(patch_id: u32, phase: Phase) -> Self {
        Self { patch_id, phase }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self { patch_id: 1, phase: Phase::Farm }
    }
}

/// Monotonic generation of the active selection. Any async result tagged
/// with an older epoch belongs to a selection that no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SelectionEpoch(pub u64);

impl SelectionEpoch {
    pub fn next(&self) -> Self {
        SelectionEpoch(self.0 + 1)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("unknown phase '{0}'")]
    UnknownPhase(String),
    #[error("patch {id} outside configured range {min}..={max}")]
    PatchOutOfRange { id: u32, min: u32, max: u32 },
}

/// Owns the (patch, phase) filter and its generation counter.
///
/// Mutations report whether they happened; the reactor performs the reset
/// inside the same step, so no reading is ever judged against a half-applied
/// selection.
#[derive(Debug, Clone)]
pub struct SelectionController {
    current: Selection,
    epoch: SelectionEpoch,
    patch_range: RangeInclusive<u32>,
}

impl SelectionController {
    pub fn new(initial: Selection, patch_range: RangeInclusive<u32>) -> Self {
        Self {
            current: initial,
            epoch: SelectionEpoch::default(),
            patch_range,
        }
    }

    pub fn current(&self) -> Selection {
        self.current
    }

    pub fn epoch(&self) -> SelectionEpoch {
        self.epoch
    }

    pub fn patch_range(&self) -> &RangeInclusive<u32> {
        &self.patch_range
    }

    /// Filter predicate for the live stream.
    pub fn admits(&self, patch_id: u32, phase: Phase) -> bool {
        self.current.patch_id == patch_id && self.current.phase == phase
    }

    /// Crate-private: only the reactor may move the filter, since it resets alongside.
    pub(crate) fn set_phase(&mut self, phase: Phase) -> Selection {
        self.current.phase = phase;
        self.advance();
        self.current
    }

    pub(crate) fn set_patch(&mut self, patch_id: u32) -> Result<Selection, SelectionError> {
        if !self.patch_range.contains(&patch_id) {
            return Err(SelectionError::PatchOutOfRange {
                id: patch_id,
                min: *self.patch_range.start(),
                max: *self.patch_range.end(),
            });
        }
        self.current.patch_id = patch_id;
        self.advance();
        Ok(self.current)
    }

    fn advance(&mut self) {
        self.epoch = self.epoch.next();
        info!(patch = self.current.patch_id, phase = %self.current.phase, epoch = self.epoch.0, "selection changed");
    }
}
