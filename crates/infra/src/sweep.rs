//! Batch sweep across all registered trigger types.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use relay_triggers::ExecutionContext;

use crate::lock::{LockError, SweepLock};
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::processor::{ProcessOutcome, TriggerProcessor};
use crate::store::{StoreError, TriggerStore};

/// Sweep configuration.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Name used in sweep logs.
    pub name: String,
    /// Base execution context handed to every handler in the sweep.
    pub context: ExecutionContext,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            name: "process-triggers".to_string(),
            context: ExecutionContext::new(),
        }
    }
}

impl SweepConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }
}

/// Outcome counts for one trigger type's batch.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TypeTally {
    pub trigger_type: String,
    /// Records that completed normally.
    pub done: u64,
    /// Records that ended with a recognized failure (terminal).
    pub errors: u64,
    /// Records whose execution failed in an unrecognized way (kept pending).
    pub exceptions: u64,
}

/// Aggregate result of one sweep.
///
/// Deferred and not-yet-due records are excluded from all counts.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SweepReport {
    /// The single timestamp all due-checks in the sweep used.
    pub started_at: DateTime<Utc>,
    /// One entry per registered trigger type, in enumeration order.
    pub tallies: Vec<TypeTally>,
}

impl SweepReport {
    pub fn total_done(&self) -> u64 {
        self.tallies.iter().map(|t| t.done).sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.tallies.iter().map(|t| t.errors).sum()
    }

    pub fn total_exceptions(&self) -> u64 {
        self.tallies.iter().map(|t| t.exceptions).sum()
    }
}

/// Sweep error.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One full pass over all registered trigger types.
///
/// Invoked periodically by an external scheduler (cron or similar); the
/// runner has no timer of its own. At most one sweep runs at a time within
/// the lock's namespace; contention is resolved by skipping the cycle.
pub struct SweepRunner<S: TriggerStore, L: SweepLock> {
    processor: TriggerProcessor<S>,
    lock: L,
    metrics: Box<dyn MetricsSink>,
    config: SweepConfig,
}

impl<S: TriggerStore, L: SweepLock> SweepRunner<S, L> {
    pub fn new(processor: TriggerProcessor<S>, lock: L) -> Self {
        Self {
            processor,
            lock,
            metrics: Box::new(NoopMetrics),
            config: SweepConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SweepConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_metrics(mut self, metrics: impl MetricsSink + 'static) -> Self {
        self.metrics = Box::new(metrics);
        self
    }

    /// The processor driving per-record lifecycle; also the entry point for
    /// single-item dispatch, which deliberately bypasses the sweep lock.
    pub fn processor(&self) -> &TriggerProcessor<S> {
        &self.processor
    }

    /// Run one sweep.
    ///
    /// Returns `Ok(None)` when another sweep holds the lock: not an error,
    /// the next cycle picks up the same due work. Per-record failures are
    /// counted and isolated; only lock i/o and due-query failures abort the
    /// sweep (the lock guard still releases on drop).
    pub fn run_sweep(&self) -> Result<Option<SweepReport>, SweepError> {
        let Some(_guard) = self.lock.try_acquire()? else {
            debug!(sweep = %self.config.name, "another sweep holds the lock; skipping");
            return Ok(None);
        };

        // One timestamp for every due-check in this sweep, so a record
        // becoming due mid-sweep cannot produce a partially ordered pass.
        let now = Utc::now();
        info!(sweep = %self.config.name, started_at = %now, "processing all due triggers");

        let mut tallies = Vec::new();
        for trigger_type in self.processor.registry().types() {
            let due = self.processor.store().due(trigger_type, now)?;
            info!(
                trigger_type,
                count = due.len(),
                "start processing due triggers"
            );

            let mut tally = TypeTally {
                trigger_type: trigger_type.to_string(),
                ..TypeTally::default()
            };

            for mut record in due {
                match self.processor.process(&mut record, &self.config.context, false) {
                    Ok(ProcessOutcome::Completed(_)) => {
                        tally.done += 1;
                        self.observe_completion(trigger_type, &record);
                    }
                    Ok(ProcessOutcome::Failed(_)) => {
                        tally.errors += 1;
                    }
                    // Deferred or raced to done/not-due: benign, uncounted.
                    Ok(_) => {}
                    Err(err) => {
                        tally.exceptions += 1;
                        error!(
                            trigger_type,
                            trigger_id = %record.id(),
                            error = ?err,
                            "trigger processing raised an unexpected error"
                        );
                    }
                }
            }

            info!(
                trigger_type,
                done = tally.done,
                errors = tally.errors,
                exceptions = tally.exceptions,
                "finished trigger batch"
            );
            tallies.push(tally);
        }

        Ok(Some(SweepReport {
            started_at: now,
            tallies,
        }))
    }

    fn observe_completion(&self, trigger_type: &str, record: &relay_triggers::TriggerRecord) {
        self.metrics
            .incr(&format!("triggers.{trigger_type}.processed"));
        if let (Some(processed), Some(after)) = (record.date_processed(), record.process_after()) {
            let delay = (processed - after).num_milliseconds() as f64 / 1000.0;
            self.metrics.timing(
                &format!("triggers.{trigger_type}.process_delay_seconds"),
                delay,
            );
        }
    }
}
