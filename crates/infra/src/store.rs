//! Trigger persistence seam and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use relay_core::TriggerId;
use relay_triggers::{TriggerRecord, TriggerResult};

/// Persistence abstraction for trigger records and their result log.
///
/// The processing core only needs the capabilities below; real deployments
/// can back them with a database table pair, the in-memory store serves
/// tests and development.
pub trait TriggerStore: Send + Sync {
    /// Persist a newly created record.
    fn insert(&self, record: TriggerRecord) -> Result<TriggerId, StoreError>;

    /// Load one record by discriminator + identity.
    ///
    /// A record stored under a different discriminator is treated as absent.
    fn get(&self, trigger_type: &str, id: TriggerId) -> Result<Option<TriggerRecord>, StoreError>;

    /// All records of `trigger_type` that are due as of `now`.
    ///
    /// Within-type order is implementation-defined.
    fn due(&self, trigger_type: &str, now: DateTime<Utc>) -> Result<Vec<TriggerRecord>, StoreError>;

    /// Persist lifecycle mutations of an existing record.
    fn update(&self, record: &TriggerRecord) -> Result<(), StoreError>;

    /// Append an outcome log entry.
    fn append_result(&self, result: TriggerResult) -> Result<(), StoreError>;

    /// Outcome log entries for one record, oldest first.
    fn results_for(&self, trigger_id: TriggerId) -> Result<Vec<TriggerResult>, StoreError>;
}

/// Trigger store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("trigger not found: {0}")]
    NotFound(TriggerId),
    #[error("trigger already exists: {0}")]
    AlreadyExists(TriggerId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// In-memory trigger store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryTriggerStore {
    records: RwLock<HashMap<TriggerId, TriggerRecord>>,
    results: RwLock<Vec<TriggerResult>>,
}

impl InMemoryTriggerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of stored records (all types, any status).
    pub fn record_count(&self) -> usize {
        self.records.read().unwrap().len()
    }
}

impl TriggerStore for InMemoryTriggerStore {
    fn insert(&self, record: TriggerRecord) -> Result<TriggerId, StoreError> {
        let mut records = self.records.write().unwrap();
        if records.contains_key(&record.id()) {
            return Err(StoreError::AlreadyExists(record.id()));
        }
        let id = record.id();
        records.insert(id, record);
        Ok(id)
    }

    fn get(&self, trigger_type: &str, id: TriggerId) -> Result<Option<TriggerRecord>, StoreError> {
        let records = self.records.read().unwrap();
        Ok(records
            .get(&id)
            .filter(|r| r.trigger_type() == trigger_type)
            .cloned())
    }

    fn due(&self, trigger_type: &str, now: DateTime<Utc>) -> Result<Vec<TriggerRecord>, StoreError> {
        let records = self.records.read().unwrap();
        let mut due: Vec<_> = records
            .values()
            .filter(|r| r.trigger_type() == trigger_type && r.is_due(now))
            .cloned()
            .collect();

        // Arrival order; callers must not rely on it.
        due.sort_by_key(|r| r.date_received());
        Ok(due)
    }

    fn update(&self, record: &TriggerRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap();
        if !records.contains_key(&record.id()) {
            return Err(StoreError::NotFound(record.id()));
        }
        records.insert(record.id(), record.clone());
        Ok(())
    }

    fn append_result(&self, result: TriggerResult) -> Result<(), StoreError> {
        self.results.write().unwrap().push(result);
        Ok(())
    }

    fn results_for(&self, trigger_id: TriggerId) -> Result<Vec<TriggerResult>, StoreError> {
        let results = self.results.read().unwrap();
        Ok(results
            .iter()
            .filter(|r| r.trigger_id() == trigger_id)
            .cloned()
            .collect())
    }
}

impl TriggerStore for Arc<InMemoryTriggerStore> {
    fn insert(&self, record: TriggerRecord) -> Result<TriggerId, StoreError> {
        (**self).insert(record)
    }

    fn get(&self, trigger_type: &str, id: TriggerId) -> Result<Option<TriggerRecord>, StoreError> {
        (**self).get(trigger_type, id)
    }

    fn due(&self, trigger_type: &str, now: DateTime<Utc>) -> Result<Vec<TriggerRecord>, StoreError> {
        (**self).due(trigger_type, now)
    }

    fn update(&self, record: &TriggerRecord) -> Result<(), StoreError> {
        (**self).update(record)
    }

    fn append_result(&self, result: TriggerResult) -> Result<(), StoreError> {
        (**self).append_result(result)
    }

    fn results_for(&self, trigger_id: TriggerId) -> Result<Vec<TriggerResult>, StoreError> {
        (**self).results_for(trigger_id)
    }
}
