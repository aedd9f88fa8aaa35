//! Acquisition run lifecycle.

use std::fmt;
use std::time::Instant;

use tracing::debug;

use crate::coord::Level;

/// Phase of an acquisition run. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AcquisitionState {
    FetchingMetadata,
    CheckingExistingOutput,
    FetchingTiles,
    Assembling,
    Persisting,
    Done,
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FetchingMetadata => "fetching_metadata",
            Self::CheckingExistingOutput => "checking_existing_output",
            Self::FetchingTiles => "fetching_tiles",
            Self::Assembling => "assembling",
            Self::Persisting => "persisting",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Tracks one run through its phases and logs each transition.
#[derive(Debug)]
pub(crate) struct AcquisitionRun {
    label: &'static str,
    level: Level,
    state: AcquisitionState,
    started: Instant,
}

impl AcquisitionRun {
    pub(crate) fn new(label: &'static str, level: Level, state: AcquisitionState) -> Self {
        debug!(run = label, level = %level, state = %state, "Acquisition started");
        Self {
            label,
            level,
            state,
            started: Instant::now(),
        }
    }

    pub(crate) fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Moves to `next`. Moving backwards or staying put is a logic error.
    pub(crate) fn advance(&mut self, next: AcquisitionState) {
        debug_assert!(next > self.state, "{} -> {} is not forward", self.state, next);
        debug!(
            run = self.label,
            level = %self.level,
            from = %self.state,
            to = %next,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Acquisition state"
        );
        self.state = next;
    }
}
