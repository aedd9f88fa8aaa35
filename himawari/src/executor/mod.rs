//! Retry-bounded execution of work units
//!
//! Three layers, leaves first:
//!
//! - [`Work`]: an opaque, retryable operation that knows how to run one attempt
//! - [`Worker`]: drives one unit through its attempts to a [`TerminalState`]
//! - [`Manager`]: fans units out to concurrent workers and fans their
//!   outcomes back in as a [`BatchReport`]
//!
//! ```ignore
//! use himawari::executor::Manager;
//!
//! let mut manager = Manager::new();
//! for unit in units {
//!     manager.submit(unit);
//! }
//! let report = manager.await_all().await;
//! if !report.all_succeeded() {
//!     for failed in report.failures() {
//!         eprintln!("{} failed after {} attempts", failed.work.name(), failed.attempts);
//!     }
//! }
//! ```

mod manager;
mod policy;
mod work;
mod worker;

pub use manager::{BatchReport, Manager, ProgressCallback};
pub use policy::{RetryPolicy, DEFAULT_COOLDOWN_MS, DEFAULT_MAX_ATTEMPTS};
pub use work::{Work, WorkError};
pub use worker::{TerminalState, WorkOutcome, Worker};
