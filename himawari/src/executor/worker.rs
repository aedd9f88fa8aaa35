//! Retry-bounded executor for a single work unit.
//!
//! A [`Worker`] drives one [`Work`] through repeated attempts until it either
//! succeeds or has used all of its attempts. Each attempt is logged with its
//! index, elapsed time, and outcome. The terminal state is reported once, as a
//! [`WorkOutcome`] that hands the unit back to the caller.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::work::{Work, WorkError};

/// Final state of a work unit. No other state is reachable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminalState {
    /// An attempt succeeded.
    Succeeded,
    /// Every allowed attempt failed.
    ExhaustedRetries,
}

/// Result of driving one work unit to a terminal state.
pub struct WorkOutcome<W: Work> {
    /// The unit itself, returned so callers can inspect its identity.
    pub work: W,
    /// Terminal state.
    pub state: TerminalState,
    /// Number of attempts made.
    pub attempts: u32,
    /// Wall time from the first attempt to the terminal state.
    pub elapsed: Duration,
    /// Output of the successful attempt.
    pub output: Option<W::Output>,
    /// Error of the last failed attempt, if any attempt failed.
    pub last_error: Option<WorkError>,
}

impl<W: Work> WorkOutcome<W> {
    /// Returns true if the unit succeeded.
    pub fn is_success(&self) -> bool {
        self.state == TerminalState::Succeeded
    }
}

impl<W: Work> fmt::Debug for WorkOutcome<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkOutcome")
            .field("work", &self.work.name())
            .field("state", &self.state)
            .field("attempts", &self.attempts)
            .field("elapsed", &self.elapsed)
            .field("last_error", &self.last_error)
            .finish()
    }
}

/// Drives a single work unit through its retry loop.
pub struct Worker<W: Work> {
    work: W,
    attempt_timeout: Option<Duration>,
}

impl<W: Work> Worker<W> {
    /// Creates a worker for the given unit.
    pub fn new(work: W) -> Self {
        Self {
            work,
            attempt_timeout: None,
        }
    }

    /// Bounds each attempt. An attempt that runs longer fails with
    /// [`WorkError::Timeout`] and counts against the attempt budget.
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Runs attempts until success or exhaustion.
    ///
    /// Exactly `max_attempts()` attempts are made if all fail; a unit that
    /// succeeds on attempt `k` is attempted exactly `k` times. A fixed cooldown
    /// separates attempts and is skipped after the last one.
    pub async fn run(self) -> WorkOutcome<W> {
        let policy = self.work.retry_policy();
        let max_attempts = self.work.max_attempts();
        let started = Instant::now();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let attempt_start = Instant::now();
            let result = self.attempt().await;
            let elapsed_ms = attempt_start.elapsed().as_millis() as u64;

            match result {
                Ok(output) => {
                    debug!(
                        work = %self.work.name(),
                        attempt,
                        elapsed_ms,
                        "Work done"
                    );
                    return WorkOutcome {
                        work: self.work,
                        state: TerminalState::Succeeded,
                        attempts: attempt,
                        elapsed: started.elapsed(),
                        output: Some(output),
                        last_error,
                    };
                }
                Err(e) => {
                    warn!(
                        work = %self.work.name(),
                        attempt,
                        max_attempts,
                        elapsed_ms,
                        error = %e,
                        "Work attempt failed"
                    );
                    last_error = Some(e);
                }
            }

            let cooldown = policy
                .delay_after_attempt(attempt)
                .filter(|_| attempt < max_attempts);
            if let Some(cooldown) = cooldown.filter(|c| !c.is_zero()) {
                tokio::time::sleep(cooldown).await;
            }
        }

        warn!(
            work = %self.work.name(),
            attempts = max_attempts,
            "Work exhausted retries"
        );

        WorkOutcome {
            work: self.work,
            state: TerminalState::ExhaustedRetries,
            attempts: max_attempts,
            elapsed: started.elapsed(),
            output: None,
            last_error,
        }
    }

    async fn attempt(&self) -> Result<W::Output, WorkError> {
        let fut = self.work.execute();
        match self.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(WorkError::Timeout(limit)),
            },
            None => fut.await,
        }
    }
}
