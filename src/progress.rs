//! Process-wide record of the current run: single writer (the engine),
//! many pollers. Status and counter always move together under one lock,
//! and only at batch boundaries, so readers never observe a torn pair.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy)]
struct ProgressState {
    status: RunStatus,
    records_processed: u64,
}

#[derive(Debug)]
pub struct ProgressTracker {
    state: Mutex<ProgressState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        ProgressTracker {
            state: Mutex::new(ProgressState {
                status: RunStatus::Idle,
                records_processed: 0,
            }),
        }
    }

    pub fn status(&self) -> RunStatus {
        self.lock().status
    }

    pub fn records_processed(&self) -> u64 {
        self.lock().records_processed
    }

    /// A consistent (status, records_processed) pair.
    pub fn snapshot(&self) -> (RunStatus, u64) {
        let state = self.lock();
        (state.status, state.records_processed)
    }

    /// Idle or terminal -> Running, resetting the counter. Rejects a second
    /// concurrent run.
    pub(crate) fn try_begin(&self) -> Result<(), EngineError> {
        let mut state = self.lock();
        if state.status == RunStatus::Running {
            return Err(EngineError::Busy);
        }
        state.status = RunStatus::Running;
        state.records_processed = 0;
        Ok(())
    }

    /// Called once per fully written batch.
    pub(crate) fn advance(&self, rows: u64) {
        self.lock().records_processed += rows;
    }

    pub(crate) fn finish(&self, status: RunStatus) {
        debug_assert!(status.is_terminal());
        self.lock().status = status;
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        // A writer panicking mid-update cannot leave the pair torn; the last
        // consistent state is still the right thing to report.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        ProgressTracker::new()
    }
}

#[cfg(test)]
mod tests;
