//! Bot (job) types - a configured scrape target with execution state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Execution state of a bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    /// Never run, or waiting for the next trigger
    Idle,

    /// A run is in flight; the bot must not be started again
    Running,

    /// Last run finished successfully (possibly with zero records)
    Completed,

    /// Last run ended in an uncaught error
    Error,
}

impl Default for BotStatus {
    fn default() -> Self {
        Self::Idle
    }
}

/// A configured scrape target with persistent execution state.
///
/// Owned by the orchestration layer; mutated only by the pipeline
/// during a run. Distinct bots run concurrently, but a single bot never
/// overlaps itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bot {
    /// Stable identity
    pub id: Uuid,

    /// Human-readable name (shown in telemetry)
    pub name: String,

    /// Target listings URL
    pub url: String,

    /// Inactive bots are skipped by batch runs
    pub active: bool,

    /// Current execution state
    pub status: BotStatus,

    /// Total runs attempted
    pub total_runs: u64,

    /// Runs that finished without an uncaught error
    pub successful_runs: u64,

    /// Runs that ended in error state
    pub failed_runs: u64,

    /// New records persisted by the most recent run
    pub last_run_count: u64,

    /// Error text from the most recent failed run
    pub last_error: Option<String>,

    /// When the bot was created
    pub created_at: DateTime<Utc>,

    /// When the most recent run started
    pub last_run_at: Option<DateTime<Utc>>,
}

impl Bot {
    /// Create a new idle, active bot.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            url: url.into(),
            active: true,
            status: BotStatus::Idle,
            total_runs: 0,
            successful_runs: 0,
            failed_runs: 0,
            last_run_count: 0,
            last_error: None,
            created_at: Utc::now(),
            last_run_at: None,
        }
    }

    /// Deactivate the bot (builder style).
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Mark the start of a run.
    pub fn mark_running(&mut self) {
        self.status = BotStatus::Running;
        self.last_run_at = Some(Utc::now());
    }

    /// Mark a successful run with the number of new records.
    pub fn mark_completed(&mut self, new_records: u64) {
        self.status = BotStatus::Completed;
        self.total_runs += 1;
        self.successful_runs += 1;
        self.last_run_count = new_records;
        self.last_error = None;
    }

    /// Mark a failed run with the terminal error text.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = BotStatus::Error;
        self.total_runs += 1;
        self.failed_runs += 1;
        self.last_run_count = 0;
        self.last_error = Some(error.into());
    }
}

/// Terminal outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The pipeline ran to completion
    Completed {
        /// Records persisted this run (post-dedup, post-store-check)
        new_records: u64,
    },

    /// Content stayed below the absolute minimum after escalation;
    /// the model was never invoked
    SparseContent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lifecycle_counters() {
        let mut bot = Bot::new("test", "https://example.com/listings");
        assert_eq!(bot.status, BotStatus::Idle);

        bot.mark_running();
        assert_eq!(bot.status, BotStatus::Running);
        assert!(bot.last_run_at.is_some());

        bot.mark_completed(3);
        assert_eq!(bot.status, BotStatus::Completed);
        assert_eq!(bot.total_runs, 1);
        assert_eq!(bot.successful_runs, 1);
        assert_eq!(bot.last_run_count, 3);

        bot.mark_running();
        bot.mark_failed("boom");
        assert_eq!(bot.status, BotStatus::Error);
        assert_eq!(bot.total_runs, 2);
        assert_eq!(bot.failed_runs, 1);
        assert_eq!(bot.last_error.as_deref(), Some("boom"));
        assert_eq!(bot.last_run_count, 0);
    }
}
