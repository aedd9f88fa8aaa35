//! Fan-out/fan-in coordinator for work units.
//!
//! The [`Manager`] launches one [`Worker`] task per submitted unit and, in
//! [`Manager::await_all`], waits until every one of them is terminal before
//! reporting. A failed unit does not cancel its siblings: the batch always
//! runs to completion, then reports which units failed.
//!
//! ```text
//! submit(U1) ──► tokio task ──► Worker(U1) ──┐
//! submit(U2) ──► tokio task ──► Worker(U2) ──┼──► await_all() ──► BatchReport
//! submit(Un) ──► tokio task ──► Worker(Un) ──┘
//! ```
//!
//! A manager is single-use: `await_all` consumes it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::work::Work;
use super::worker::{WorkOutcome, Worker};

/// Progress callback: `(completed, total)`, invoked once per unit reaching a
/// terminal state.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Decrements the shared pending tally exactly once, even if the task panics.
struct CompletionGuard(Arc<AtomicUsize>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Coordinates a batch of concurrently running work units.
pub struct Manager<W: Work> {
    tasks: JoinSet<WorkOutcome<W>>,
    submitted: usize,
    pending: Arc<AtomicUsize>,
    attempt_timeout: Option<Duration>,
    progress: Option<ProgressCallback>,
}

impl<W: Work> Default for Manager<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Work> Manager<W> {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            submitted: 0,
            pending: Arc::new(AtomicUsize::new(0)),
            attempt_timeout: None,
            progress: None,
        }
    }

    /// Applies a per-attempt timeout to every worker started afterwards.
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Reports progress as units reach a terminal state.
    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Registers a unit and starts its worker immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&mut self, work: W) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        let guard = CompletionGuard(Arc::clone(&self.pending));
        let worker = Worker::new(work).with_attempt_timeout(self.attempt_timeout);

        self.tasks.spawn(async move {
            let _guard = guard;
            worker.run().await
        });
        self.submitted += 1;
    }

    /// Number of units submitted so far.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Number of submitted units that have not reached a terminal state.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Waits for every submitted unit to reach a terminal state.
    ///
    /// Never returns early: even after a unit has exhausted its retries, the
    /// remaining units run to completion before the report is produced.
    pub async fn await_all(mut self) -> BatchReport<W> {
        let total = self.submitted;
        let mut outcomes = Vec::with_capacity(total);
        let mut panicked = 0;

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(error = %e, "Worker task panicked");
                    panicked += 1;
                }
            }
            if let Some(ref progress) = self.progress {
                progress(outcomes.len() + panicked, total);
            }
        }

        let report = BatchReport { outcomes, panicked };
        debug!(
            total,
            succeeded = report.succeeded_count(),
            failed = report.failed_count(),
            "Batch complete"
        );
        report
    }
}

/// Aggregate result of a batch.
pub struct BatchReport<W: Work> {
    outcomes: Vec<WorkOutcome<W>>,
    panicked: usize,
}

impl<W: Work> BatchReport<W> {
    /// True iff every submitted unit succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.panicked == 0 && self.outcomes.iter().all(WorkOutcome::is_success)
    }

    /// Outcomes in completion order.
    pub fn outcomes(&self) -> &[WorkOutcome<W>] {
        &self.outcomes
    }

    /// Consumes the report, returning all outcomes.
    pub fn into_outcomes(self) -> Vec<WorkOutcome<W>> {
        self.outcomes
    }

    /// Units that exhausted their retries.
    pub fn failures(&self) -> impl Iterator<Item = &WorkOutcome<W>> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Number of units that succeeded.
    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of units that failed, including panicked tasks.
    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.succeeded_count() + self.panicked
    }

    /// Number of worker tasks that panicked. Their units are lost.
    pub fn panicked(&self) -> usize {
        self.panicked
    }
}
