//! `relay-infra`
//!
//! Processing infrastructure for trigger records: the persistence seam, the
//! per-record processor (shared by the batch sweep and single-item
//! dispatch), the exclusively-locked sweep, and the optional metrics side
//! channel.

pub mod lock;
pub mod metrics;
pub mod processor;
pub mod store;
pub mod sweep;


pub use lock::{FileSweepLock, InProcessSweepLock, LockError, SweepGuard, SweepLock};
pub use metrics::{MetricsSink, NoopMetrics, RecordingMetrics};
pub use processor::{ProcessError, ProcessOutcome, TriggerProcessor};
pub use store::{InMemoryTriggerStore, StoreError, TriggerStore};
pub use sweep::{SweepConfig, SweepError, SweepReport, SweepRunner, TypeTally};
